/**
 * KPI ENGINE - Indicateurs clés par catégorie de feuille
 *
 * RÔLE :
 * Calcule le jeu d'indicateurs affiché sous la carte pour la feuille sélectionnée.
 * Deux catégories : incidents (feuille "Emergency") et effectifs ("Workforce").
 *
 * FONCTIONNEMENT :
 * - Le schéma de la catégorie est lié au Dataset (colonne absente = SchemaError)
 * - Chaque ligne devient une ligne typée ; une heure illisible = FormatError (ligne + colonne)
 * - Les moyennes de durée ignorent les lignes sans ouverture ou sans clôture
 * - Toute fraction sur un Dataset vide vaut 0
 *
 * INDICATEURS :
 * - Incidents : Closure Percentage, Emergency Closure Time, Satisfaction Rate,
 *   Emergency Numbers, Expected Emergency Alarm (non calculé)
 * - Effectifs : Operation Percentage, Working Hours, Evaluation Rate,
 *   Complain Numbers, Expected Complains Alarm (non calculé) + répartition "Operation"
 */

use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::config::{ControlConfig, IncidentConf, WorkforceConf};
use crate::models::{CellValue, Category, Dataset, LatLon, Record};
use crate::schema::{
    BoundSchema, SchemaDescriptor, SchemaError, CLOSURE_TIME, COMPLAIN_TODAY, EVALUATION, OPERATION,
    SATISFACTION, STATUS,
};
use crate::time_norm::{FormatError, TimeInput, TimeNormalizer};

pub const CLOSURE_PERCENTAGE: &str = "Closure Percentage";
pub const EMERGENCY_CLOSURE_TIME: &str = "Emergency Closure Time";
pub const SATISFACTION_RATE: &str = "Satisfaction Rate";
pub const EMERGENCY_NUMBERS: &str = "Emergency Numbers";
pub const EXPECTED_EMERGENCY_ALARM: &str = "Expected Emergency Alarm";

pub const OPERATION_PERCENTAGE: &str = "Operation Percentage";
pub const WORKING_HOURS: &str = "Working Hours";
pub const EVALUATION_RATE: &str = "Evaluation Rate";
pub const COMPLAIN_NUMBERS: &str = "Complain Numbers";
pub const EXPECTED_COMPLAINS_ALARM: &str = "Expected Complains Alarm";

pub const OPERATIONS_DISTRIBUTION: &str = "Operations Status Distribution";

const NOT_COMPUTED_TEXT: &str = "To be calculated based on relationships";

/// Erreurs de calcul des KPI (fatales pour la feuille concernée uniquement)
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum KpiError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("Row {row}, column '{column}': {source}")]
    Format {
        row: usize,
        column: String,
        #[source]
        source: FormatError,
    },
    #[error("Sheet '{0}' has no KPI category")]
    Uncategorized(String),
}

/// Rendu textuel d'une durée moyenne
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationStyle {
    /// "D days H hrs M mins"
    Short,
    /// "D days H hours M min"
    Long,
}

/// Durée moyenne, tronquée à la seconde (plancher)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MeanDuration {
    pub seconds: i64,
    pub style: DurationStyle,
}

impl MeanDuration {
    /// Jours entiers (plancher, négatif si la moyenne l'est)
    pub fn days(&self) -> i64 {
        self.seconds.div_euclid(86_400)
    }

    /// Heures 0..=23 restant après les jours
    pub fn hours(&self) -> i64 {
        self.seconds.rem_euclid(86_400) / 3_600
    }

    /// Minutes 0..=59 restant après les heures
    pub fn minutes(&self) -> i64 {
        (self.seconds.rem_euclid(86_400) % 3_600) / 60
    }
}

impl fmt::Display for MeanDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.style {
            DurationStyle::Short => write!(f, "{} days {} hrs {} mins", self.days(), self.hours(), self.minutes()),
            DurationStyle::Long => write!(f, "{} days {} hours {} min", self.days(), self.hours(), self.minutes()),
        }
    }
}

/// Valeur d'un indicateur
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum KpiValue {
    Percentage(f64),
    Rate(f64),
    Count(u64),
    Total(f64),
    Duration(MeanDuration),
    /// Indicateur prévu mais pas encore calculé (jamais 0)
    NotComputed,
}

impl fmt::Display for KpiValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KpiValue::Percentage(p) => write!(f, "{p:.2}%"),
            KpiValue::Rate(r) => write!(f, "{r:.2}"),
            KpiValue::Count(n) => write!(f, "{n}"),
            KpiValue::Total(t) if t.fract() == 0.0 => write!(f, "{t:.0}"),
            KpiValue::Total(t) => write!(f, "{t:.2}"),
            KpiValue::Duration(d) => write!(f, "{d}"),
            KpiValue::NotComputed => f.write_str(NOT_COMPUTED_TEXT),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Indicator {
    pub name: &'static str,
    pub value: KpiValue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionEntry {
    pub label: String,
    pub count: u64,
    /// part en pourcentage des valeurs non vides
    pub share: f64,
}

/// Répartition label -> effectif (données du camembert)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Distribution {
    pub title: &'static str,
    pub entries: Vec<DistributionEntry>,
}

impl Distribution {
    fn from_labels<I: IntoIterator<Item = String>>(title: &'static str, labels: I) -> Self {
        let mut counts: HashMap<String, u64> = HashMap::new();
        for label in labels {
            *counts.entry(label).or_insert(0) += 1;
        }
        let total: u64 = counts.values().sum();
        let mut entries: Vec<DistributionEntry> = counts
            .into_iter()
            .map(|(label, count)| DistributionEntry {
                label,
                count,
                share: percentage(count as usize, total as usize),
            })
            .collect();
        // effectif décroissant, puis label
        entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
        Self { title, entries }
    }

    pub fn count(&self, label: &str) -> Option<u64> {
        self.entries.iter().find(|e| e.label == label).map(|e| e.count)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Jeu d'indicateurs d'une feuille, dans l'ordre d'affichage
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiSet {
    pub category: Category,
    pub indicators: Vec<Indicator>,
    pub distribution: Option<Distribution>,
}

impl KpiSet {
    pub fn get(&self, name: &str) -> Option<&KpiValue> {
        self.indicators.iter().find(|i| i.name == name).map(|i| &i.value)
    }
}

struct IncidentRow {
    position: LatLon,
    opened: Option<NaiveDateTime>,
    closed: Option<NaiveDateTime>,
    status: String,
    satisfaction: Option<String>,
}

struct WorkforceRow {
    opened: Option<NaiveDateTime>,
    closed: Option<NaiveDateTime>,
    status: String,
    evaluation: f64,
    complaints: f64,
    operation: Option<String>,
}

pub struct KpiEngine {
    normalizer: TimeNormalizer,
    incidents: IncidentConf,
    workforce: WorkforceConf,
}

impl KpiEngine {
    pub fn new(config: &ControlConfig, normalizer: TimeNormalizer) -> Self {
        Self {
            normalizer,
            incidents: config.incidents.clone(),
            workforce: config.workforce.clone(),
        }
    }

    /// Calcule les KPI selon la catégorie portée par le Dataset
    pub fn compute_for(&self, dataset: &Dataset) -> Result<KpiSet, KpiError> {
        let category = dataset.category.ok_or_else(|| KpiError::Uncategorized(dataset.sheet.clone()))?;
        self.compute(dataset, category)
    }

    pub fn compute(&self, dataset: &Dataset, category: Category) -> Result<KpiSet, KpiError> {
        let schema = SchemaDescriptor::for_category(category);
        let bound = schema.bind(dataset)?;
        match category {
            Category::Incidents => self.incident_kpis(dataset, schema, &bound),
            Category::Workforce => self.workforce_kpis(dataset, schema, &bound),
        }
    }

    fn incident_kpis(
        &self,
        dataset: &Dataset,
        schema: &SchemaDescriptor,
        bound: &BoundSchema,
    ) -> Result<KpiSet, KpiError> {
        let mut rows = Vec::with_capacity(dataset.len());
        for (row, record) in dataset.records.iter().enumerate() {
            rows.push(IncidentRow {
                position: record.position,
                opened: self.read_time(bound, record, row, schema.open_time)?,
                closed: self.read_time(bound, record, row, CLOSURE_TIME)?,
                status: bound.cell(record, STATUS).to_string(),
                satisfaction: bound.cell(record, SATISFACTION).as_text().map(str::to_lowercase),
            });
        }

        let total = rows.len();
        let closed = rows.iter().filter(|r| r.status == self.incidents.closed_status).count();
        let token = self.incidents.satisfied_token.to_lowercase();
        let satisfied = rows
            .iter()
            .filter(|r| r.satisfaction.as_deref() == Some(token.as_str()))
            .count();
        let locations: HashSet<(u64, u64)> = rows
            .iter()
            .map(|r| (r.position.lat.to_bits(), r.position.lon.to_bits()))
            .collect();
        let closure_time = mean_duration(rows.iter().map(|r| (r.opened, r.closed)), DurationStyle::Short);

        Ok(KpiSet {
            category: Category::Incidents,
            indicators: vec![
                Indicator { name: CLOSURE_PERCENTAGE, value: KpiValue::Percentage(percentage(closed, total)) },
                Indicator { name: EMERGENCY_CLOSURE_TIME, value: duration_value(closure_time) },
                Indicator { name: SATISFACTION_RATE, value: KpiValue::Percentage(percentage(satisfied, total)) },
                Indicator { name: EMERGENCY_NUMBERS, value: KpiValue::Count(locations.len() as u64) },
                Indicator { name: EXPECTED_EMERGENCY_ALARM, value: KpiValue::NotComputed },
            ],
            distribution: None,
        })
    }

    fn workforce_kpis(
        &self,
        dataset: &Dataset,
        schema: &SchemaDescriptor,
        bound: &BoundSchema,
    ) -> Result<KpiSet, KpiError> {
        let mut rows = Vec::with_capacity(dataset.len());
        for (row, record) in dataset.records.iter().enumerate() {
            let operation = bound.cell(record, OPERATION);
            rows.push(WorkforceRow {
                opened: self.read_time(bound, record, row, schema.open_time)?,
                closed: self.read_time(bound, record, row, CLOSURE_TIME)?,
                status: bound.cell(record, STATUS).to_string(),
                evaluation: bound.number(record, row, EVALUATION)?.unwrap_or(0.0),
                complaints: bound.number(record, row, COMPLAIN_TODAY)?.unwrap_or(0.0),
                operation: (!operation.is_empty()).then(|| operation.to_string()),
            });
        }

        let total = rows.len();
        let active = rows.iter().filter(|r| r.status == self.workforce.active_status).count();
        let evaluation_sum: f64 = rows.iter().map(|r| r.evaluation).sum();
        let evaluation_rate = if total > 0 { evaluation_sum / total as f64 } else { 0.0 };
        let complaints: f64 = rows.iter().map(|r| r.complaints).sum();
        let working = mean_duration(rows.iter().map(|r| (r.opened, r.closed)), DurationStyle::Long);
        let distribution = Distribution::from_labels(
            OPERATIONS_DISTRIBUTION,
            rows.into_iter().filter_map(|r| r.operation),
        );

        Ok(KpiSet {
            category: Category::Workforce,
            indicators: vec![
                Indicator { name: OPERATION_PERCENTAGE, value: KpiValue::Percentage(percentage(active, total)) },
                Indicator { name: WORKING_HOURS, value: duration_value(working) },
                Indicator { name: EVALUATION_RATE, value: KpiValue::Rate(evaluation_rate) },
                Indicator { name: COMPLAIN_NUMBERS, value: KpiValue::Total(complaints) },
                Indicator { name: EXPECTED_COMPLAINS_ALARM, value: KpiValue::NotComputed },
            ],
            distribution: Some(distribution),
        })
    }

    /// Heure d'une cellule ; vide = absente, illisible = FormatError
    fn read_time(
        &self,
        bound: &BoundSchema,
        record: &Record,
        row: usize,
        column: &str,
    ) -> Result<Option<NaiveDateTime>, KpiError> {
        let input = match bound.cell(record, column) {
            CellValue::Empty => return Ok(None),
            CellValue::DateTime(dt) => TimeInput::DateTime(*dt),
            CellValue::Text(s) => TimeInput::Text(s),
            other => {
                return Err(KpiError::Format {
                    row,
                    column: column.to_string(),
                    source: FormatError { value: other.to_string() },
                })
            }
        };
        self.normalizer
            .normalize(input)
            .map(Some)
            .map_err(|source| KpiError::Format { row, column: column.to_string(), source })
    }
}

/// matches / total * 100, 0 sur un ensemble vide
fn percentage(matches: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    matches as f64 / total as f64 * 100.0
}

fn mean_duration<I>(pairs: I, style: DurationStyle) -> Option<MeanDuration>
where
    I: Iterator<Item = (Option<NaiveDateTime>, Option<NaiveDateTime>)>,
{
    let mut sum_ms: i64 = 0;
    let mut count: i64 = 0;
    for (opened, closed) in pairs {
        if let (Some(opened), Some(closed)) = (opened, closed) {
            sum_ms += (closed - opened).num_milliseconds();
            count += 1;
        }
    }
    if count == 0 {
        return None;
    }
    Some(MeanDuration { seconds: sum_ms.div_euclid(count * 1_000), style })
}

fn duration_value(duration: Option<MeanDuration>) -> KpiValue {
    duration.map(KpiValue::Duration).unwrap_or(KpiValue::NotComputed)
}
