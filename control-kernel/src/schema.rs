/**
 * SCHEMAS - Colonnes requises / optionnelles par catégorie
 *
 * RÔLE : Chaque catégorie (incidents, effectifs) déclare ses colonnes. Le schéma
 * est lié une seule fois à un Dataset (`bind`) : une colonne absente est rejetée
 * tout de suite avec une SchemaError, avant tout calcul.
 */

use crate::models::{CellValue, Category, Dataset, Record, EMPTY_CELL};
use std::collections::HashMap;

pub const LATITUDE: &str = "Latitude";
pub const LONGITUDE: &str = "Longitude";

pub const OPEN_TIME: &str = "Open Time";
pub const WORKFORCE_OPEN_TIME: &str = "Open-Time";
pub const CLOSURE_TIME: &str = "Closure Time";
pub const STATUS: &str = "Status";
pub const SATISFACTION: &str = "Satisfaction";
pub const EVALUATION: &str = "Evaluation";
pub const COMPLAIN_TODAY: &str = "Complain today";
pub const OPERATION: &str = "Operation";

/// Erreurs de structure d'une feuille
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    #[error("Column '{column}' is missing from sheet '{sheet}'")]
    MissingColumn { sheet: String, column: String },
    #[error("Row {row}: column '{column}' holds '{value}', expected a number")]
    InvalidNumber { row: usize, column: String, value: String },
}

/// Description déclarative des colonnes d'une catégorie
#[derive(Debug, Clone, Copy)]
pub struct SchemaDescriptor {
    pub category: Category,
    pub open_time: &'static str,
    pub required: &'static [&'static str],
    pub optional: &'static [&'static str],
}

pub const INCIDENT_SCHEMA: SchemaDescriptor = SchemaDescriptor {
    category: Category::Incidents,
    open_time: OPEN_TIME,
    required: &[OPEN_TIME, CLOSURE_TIME, STATUS, SATISFACTION],
    optional: &[],
};

pub const WORKFORCE_SCHEMA: SchemaDescriptor = SchemaDescriptor {
    category: Category::Workforce,
    open_time: WORKFORCE_OPEN_TIME,
    required: &[WORKFORCE_OPEN_TIME, CLOSURE_TIME, STATUS, EVALUATION, COMPLAIN_TODAY],
    optional: &[OPERATION],
};

impl SchemaDescriptor {
    pub fn for_category(category: Category) -> &'static SchemaDescriptor {
        match category {
            Category::Incidents => &INCIDENT_SCHEMA,
            Category::Workforce => &WORKFORCE_SCHEMA,
        }
    }

    /// Résout les index de colonnes ; échoue sur la première colonne requise absente
    pub fn bind(&self, dataset: &Dataset) -> Result<BoundSchema, SchemaError> {
        let mut indices = HashMap::new();
        for column in self.required {
            let index = dataset.column_index(column).ok_or_else(|| SchemaError::MissingColumn {
                sheet: dataset.sheet.clone(),
                column: column.to_string(),
            })?;
            indices.insert(*column, index);
        }
        for column in self.optional {
            if let Some(index) = dataset.column_index(column) {
                indices.insert(*column, index);
            }
        }
        Ok(BoundSchema { indices })
    }
}

/// Schéma résolu sur un Dataset donné
#[derive(Debug, Clone)]
pub struct BoundSchema {
    indices: HashMap<&'static str, usize>,
}

impl BoundSchema {
    pub fn has(&self, column: &str) -> bool {
        self.indices.contains_key(column)
    }

    /// Cellule d'une ligne ; Empty si la colonne (optionnelle) n'existe pas
    pub fn cell<'r>(&self, record: &'r Record, column: &str) -> &'r CellValue {
        match self.indices.get(column) {
            Some(index) => record.cell(*index),
            None => &EMPTY_CELL,
        }
    }

    /// Valeur numérique ; vide = None, texte non numérique = InvalidNumber
    pub fn number(&self, record: &Record, row: usize, column: &str) -> Result<Option<f64>, SchemaError> {
        let cell = self.cell(record, column);
        if cell.is_empty() {
            return Ok(None);
        }
        cell.as_number().map(Some).ok_or_else(|| SchemaError::InvalidNumber {
            row,
            column: column.to_string(),
            value: cell.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Column, LatLon};

    fn dataset(headers: &[&str]) -> Dataset {
        Dataset {
            source: "city".into(),
            sheet: "Workforce".into(),
            category: Some(Category::Workforce),
            columns: headers.iter().map(|h| Column::new(*h)).collect(),
            records: vec![Record {
                position: LatLon::new(24.7, 46.6),
                cells: headers.iter().map(|_| CellValue::Text("x".into())).collect(),
            }],
        }
    }

    #[test]
    fn test_bind_strips_display_marker() {
        let ds = dataset(&["Latitude", "Longitude", "Open-Time", "Closure Time", "Status*", "Evaluation", "Complain today"]);
        let bound = WORKFORCE_SCHEMA.bind(&ds).unwrap();
        assert!(bound.has(STATUS));
        assert!(!bound.has(OPERATION));
        assert_eq!(bound.cell(&ds.records[0], OPERATION), &CellValue::Empty);
    }

    #[test]
    fn test_bind_reports_missing_column() {
        let ds = dataset(&["Latitude", "Longitude", "Open Time", "Closure Time", "Status"]);
        let err = INCIDENT_SCHEMA.bind(&ds).unwrap_err();
        assert_eq!(
            err,
            SchemaError::MissingColumn { sheet: "Workforce".into(), column: "Satisfaction".into() }
        );
    }

    #[test]
    fn test_number_rejects_text() {
        let ds = dataset(&["Latitude", "Longitude", "Open-Time", "Closure Time", "Status", "Evaluation", "Complain today"]);
        let bound = WORKFORCE_SCHEMA.bind(&ds).unwrap();
        let err = bound.number(&ds.records[0], 0, EVALUATION).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidNumber { row: 0, .. }));
    }
}
