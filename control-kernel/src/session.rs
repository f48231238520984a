/**
 * SESSION - État opérateur du tableau de bord
 *
 * RÔLE : Valeur explicite possédée par le Dashboard (un seul écrivain).
 * Sélection courante, itinéraire, mode interactif, dernier popup cliqué, avertissement.
 *
 * RÈGLE : changer de feuille remet à zéro itinéraire, clic et avertissement ;
 * le mode interactif est conservé.
 */

use serde::Serialize;

use crate::models::LatLon;

/// Feuille sélectionnée (source = nom du classeur sans extension)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub source: String,
    pub sheet: String,
}

impl Selection {
    pub fn new<S: Into<String>, T: Into<String>>(source: S, sheet: T) -> Self {
        Self { source: source.into(), sheet: sheet.into() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Session {
    selection: Option<Selection>,
    route: Vec<LatLon>,
    interactive: bool,
    selected_popup: Option<String>,
    warning: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Retourne true si la sélection a changé (état dépendant remis à zéro)
    pub fn select(&mut self, selection: Selection) -> bool {
        if self.selection.as_ref() == Some(&selection) {
            return false;
        }
        self.selection = Some(selection);
        self.route.clear();
        self.selected_popup = None;
        self.warning = None;
        true
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    /// Remplacement atomique : la géométrie est déjà complète
    pub fn replace_route(&mut self, route: Vec<LatLon>) {
        self.route = route;
        self.warning = None;
    }

    pub fn clear_route(&mut self) {
        self.route.clear();
    }

    pub fn route(&self) -> &[LatLon] {
        &self.route
    }

    pub fn toggle_interactive(&mut self) -> bool {
        self.interactive = !self.interactive;
        if !self.interactive {
            self.selected_popup = None;
        }
        self.interactive
    }

    pub fn interactive(&self) -> bool {
        self.interactive
    }

    /// Popup cliqué ; ignoré hors mode interactif
    pub fn record_click<S: Into<String>>(&mut self, popup: S) -> bool {
        if !self.interactive {
            return false;
        }
        self.selected_popup = Some(popup.into());
        true
    }

    pub fn selected_popup(&self) -> Option<&str> {
        self.selected_popup.as_deref()
    }

    pub fn warn<S: Into<String>>(&mut self, message: S) {
        self.warning = Some(message.into());
    }

    pub fn warning(&self) -> Option<&str> {
        self.warning.as_deref()
    }
}
