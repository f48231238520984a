/**
 * DASHBOARD - Contrôleur : sélection, itinéraire, carte, KPI
 *
 * RÔLE :
 * Colle les composants entre eux pour une action opérateur à la fois :
 * choisir une feuille, demander l'itinéraire, basculer le mode interactif,
 * remonter un clic, puis produire la Frame à afficher.
 *
 * ERREURS :
 * - SourceError : renvoyée à l'appelant (sélection inchangée)
 * - RouteError : transformée en avertissement de session (ancien itinéraire conservé)
 * - KpiError : gardée dans la Frame, la carte reste affichée
 */

use std::sync::Arc;
use tracing::{info, warn};

use crate::config::ControlConfig;
use crate::kpi::{KpiEngine, KpiError, KpiSet};
use crate::models::Dataset;
use crate::overlay::{MapOverlayBuilder, Overlay, OverlayRequest};
use crate::route::{OsrmTransport, RouteClient, RouteError, RouteTransport, ServiceError};
use crate::session::{Selection, Session};
use crate::source::{DatasetCatalog, SourceError};
use crate::time_norm::TimeNormalizer;

/// Ce que reçoit le moteur de rendu après chaque action
#[derive(Debug)]
pub struct Frame {
    pub title: String,
    pub overlay: Option<Arc<Overlay>>,
    pub interactive: bool,
    /// None pour une feuille sans catégorie
    pub kpis: Option<Result<KpiSet, KpiError>>,
    pub warning: Option<String>,
}

pub struct Dashboard<T: RouteTransport> {
    config: ControlConfig,
    catalog: DatasetCatalog,
    engine: KpiEngine,
    router: RouteClient<T>,
    overlays: MapOverlayBuilder,
    session: Session,
    dataset: Option<Dataset>,
}

impl Dashboard<OsrmTransport> {
    /// Dashboard complet : transport OSRM, date de référence = aujourd'hui
    pub fn from_config(config: ControlConfig) -> Result<Self, ServiceError> {
        let transport = OsrmTransport::new(&config.routing)?;
        Ok(Self::new(config, transport, TimeNormalizer::today()))
    }
}

impl<T: RouteTransport> Dashboard<T> {
    pub fn new(config: ControlConfig, transport: T, normalizer: TimeNormalizer) -> Self {
        Self {
            catalog: DatasetCatalog::new(config.data_dir.clone()),
            engine: KpiEngine::new(&config, normalizer),
            router: RouteClient::new(transport, &config.routing),
            overlays: MapOverlayBuilder::new(config.overlay.clone()),
            session: Session::new(),
            dataset: None,
            config,
        }
    }

    pub fn config(&self) -> &ControlConfig {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn dataset(&self) -> Option<&Dataset> {
        self.dataset.as_ref()
    }

    pub fn router(&self) -> &RouteClient<T> {
        &self.router
    }

    pub fn sources(&self) -> Result<Vec<String>, SourceError> {
        self.catalog.discover()
    }

    pub fn sheets(&self, source: &str) -> Result<Vec<String>, SourceError> {
        Ok(self.catalog.open(source)?.sheet_names())
    }

    /// Charge la feuille ; une nouvelle sélection vide le cache carte et l'état dépendant
    pub fn select(&mut self, source: &str, sheet: &str) -> Result<(), SourceError> {
        let dataset = self.catalog.open(source)?.dataset(sheet, &self.config)?;
        if self.session.select(Selection::new(source, sheet)) {
            self.overlays.invalidate();
        }
        info!(
            "selected {source}/{sheet}: {} records, category {}",
            dataset.len(),
            dataset.category.map(|c| c.to_string()).unwrap_or_else(|| "none".into())
        );
        self.dataset = Some(dataset);
        Ok(())
    }

    /// Itinéraire sur les lignes de la feuille, dans leur ordre ; true si remplacé
    pub async fn request_route(&mut self) -> bool {
        let Some(dataset) = self.dataset.as_ref() else {
            self.session.warn("No dataset selected");
            return false;
        };
        match self.router.compute_route(&dataset.coordinates()).await {
            Ok(geometry) => {
                self.session.replace_route(geometry.points);
                true
            }
            Err(e) => {
                warn!("route not updated: {e}");
                if matches!(e, RouteError::TooManyWaypoints { .. } | RouteError::InsufficientWaypoints { .. }) {
                    self.session.clear_route();
                }
                self.session.warn(e.to_string());
                false
            }
        }
    }

    pub fn clear_route(&mut self) {
        self.session.clear_route();
    }

    pub fn toggle_interactive(&mut self) -> bool {
        self.session.toggle_interactive()
    }

    pub fn record_click(&mut self, popup: &str) -> bool {
        self.session.record_click(popup)
    }

    pub fn frame(&self) -> Frame {
        let title = self
            .session
            .selection()
            .map(|s| format!("{} - {} Table", capitalize(&s.source), s.sheet))
            .unwrap_or_default();

        let overlay = self.dataset.as_ref().map(|dataset| {
            let terminal_status = match dataset.category {
                Some(category) => self.config.terminal_status(category),
                None => &self.config.incidents.terminal_status,
            };
            self.overlays.build(OverlayRequest {
                dataset,
                terminal_status,
                route: self.session.route(),
                selected_popup: self.session.selected_popup(),
            })
        });

        let kpis = self.dataset.as_ref().and_then(|dataset| {
            let category = dataset.category?;
            let result = self.engine.compute(dataset, category);
            if let Err(e) = &result {
                warn!("KPIs unavailable for {}/{}: {e}", dataset.source, dataset.sheet);
            }
            Some(result)
        });

        Frame {
            title,
            overlay,
            interactive: self.session.interactive(),
            kpis,
            warning: self.session.warning().map(str::to_string),
        }
    }
}

/// "riyadh north" -> "Riyadh north"
fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
