/**
 * MODELS - Données tabulaires du tableau de bord
 *
 * RÔLE : Représentation d'une feuille chargée (Dataset) : colonnes, lignes,
 * position géographique de chaque ligne et catégorie déduite du nom de feuille.
 *
 * CONVENTION : une colonne dont l'en-tête finit par '*' est affichée dans le popup
 * du marqueur. Le nom "logique" de la colonne est l'en-tête sans ce suffixe.
 */

use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;

/// Suffixe d'en-tête qui marque une colonne "à afficher"
pub const DISPLAY_MARKER: char = '*';

pub(crate) static EMPTY_CELL: CellValue = CellValue::Empty;

/// Position (latitude, longitude) en degrés
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

impl From<(f64, f64)> for LatLon {
    fn from((lat, lon): (f64, f64)) -> Self {
        Self { lat, lon }
    }
}

/// Catégorie métier d'une feuille
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Incidents,
    Workforce,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Incidents => write!(f, "incidents"),
            Category::Workforce => write!(f, "workforce"),
        }
    }
}

/// Valeur d'une cellule après lecture du classeur
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
}

impl CellValue {
    /// Interprétation d'un champ texte brut (CSV) ; TRUE/false -> booléen
    pub fn infer(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return CellValue::Empty;
        }
        if trimmed.eq_ignore_ascii_case("true") {
            return CellValue::Bool(true);
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return CellValue::Bool(false);
        }
        match trimmed.parse::<f64>() {
            Ok(n) => CellValue::Number(n),
            Err(_) => CellValue::Text(raw.to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Valeur numérique (bool = 1/0, texte numérique accepté)
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            CellValue::Text(s) => s.trim().parse::<f64>().ok(),
            CellValue::Empty | CellValue::DateTime(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(s) => write!(f, "{s}"),
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            CellValue::Number(n) => write!(f, "{n}"),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

/// En-tête de colonne
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    /// En-tête tel qu'il apparaît dans la feuille (ex: "Status*")
    pub header: String,
}

impl Column {
    pub fn new<S: Into<String>>(header: S) -> Self {
        Self { header: header.into() }
    }

    /// Nom sans le(s) marqueur(s) '*' final(aux)
    pub fn name(&self) -> &str {
        self.header.trim_end_matches(DISPLAY_MARKER)
    }

    pub fn is_display(&self) -> bool {
        self.header.ends_with(DISPLAY_MARKER)
    }
}

/// Une ligne de la feuille
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub position: LatLon,
    /// Cellules alignées sur `Dataset::columns`
    pub cells: Vec<CellValue>,
}

impl Record {
    pub fn cell(&self, index: usize) -> &CellValue {
        self.cells.get(index).unwrap_or(&EMPTY_CELL)
    }
}

/// Feuille chargée et validée (Latitude/Longitude présentes)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dataset {
    pub source: String,
    pub sheet: String,
    pub category: Option<Category>,
    pub columns: Vec<Column>,
    pub records: Vec<Record>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Index d'une colonne par nom logique (sans '*')
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name() == name)
    }

    /// Colonnes marquées pour le popup, dans l'ordre de la feuille
    pub fn display_columns(&self) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_display())
            .map(|(i, _)| i)
            .collect()
    }

    /// Liste brute des positions (ordre des lignes), sert aux waypoints et au cadrage
    pub fn coordinates(&self) -> Vec<LatLon> {
        self.records.iter().map(|r| r.position).collect()
    }
}
