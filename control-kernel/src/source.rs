/**
 * SOURCES - Découverte et lecture des classeurs du dossier data
 *
 * RÔLE :
 * Un "système" = un fichier du dossier data. Un classeur .xlsx contient une feuille
 * par catégorie (Emergency, Workforce...), un .csv compte comme une feuille unique
 * nommée d'après le fichier.
 *
 * FONCTIONNEMENT :
 * - DatasetCatalog::discover liste les fichiers (sans extension, triés), en ignorant
 *   les verrous Office "~$..."
 * - DatasetCatalog::open charge toutes les feuilles : 1ère ligne = en-têtes
 * - Workbook::dataset valide Latitude/Longitude et produit un Dataset typé
 */

use calamine::{open_workbook, Data, Reader, Xlsx};
use chrono::NaiveDateTime;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::ControlConfig;
use crate::models::{CellValue, Column, Dataset, LatLon, Record};
use crate::schema::{SchemaError, LATITUDE, LONGITUDE};

const LOCK_PREFIX: &str = "~$";
const SUPPORTED: [&str; 2] = ["xlsx", "csv"];

/// Erreurs de lecture d'une source
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Source not found: {0}")]
    NotFound(String),
    #[error("Sheet '{sheet}' not found in '{source_name}'")]
    SheetNotFound { source_name: String, sheet: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Workbook error: {0}")]
    Xlsx(#[from] calamine::XlsxError),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Feuille brute : en-têtes + lignes non typées
#[derive(Debug, Clone, PartialEq)]
pub struct RawSheet {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

/// Classeur chargé en mémoire
#[derive(Debug, Clone, PartialEq)]
pub struct Workbook {
    pub source: String,
    pub sheets: Vec<RawSheet>,
}

impl Workbook {
    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.name.clone()).collect()
    }

    /// Construit le Dataset d'une feuille ; la catégorie vient du nom de feuille
    pub fn dataset(&self, sheet: &str, config: &ControlConfig) -> Result<Dataset, SourceError> {
        let raw = self
            .sheets
            .iter()
            .find(|s| s.name == sheet)
            .ok_or_else(|| SourceError::SheetNotFound {
                source_name: self.source.clone(),
                sheet: sheet.to_string(),
            })?;

        let columns: Vec<Column> = raw.headers.iter().map(Column::new).collect();
        let locate = |name: &str| {
            columns.iter().position(|c| c.name() == name).ok_or_else(|| SchemaError::MissingColumn {
                sheet: raw.name.clone(),
                column: name.to_string(),
            })
        };
        let lat_idx = locate(LATITUDE)?;
        let lon_idx = locate(LONGITUDE)?;

        let mut records = Vec::with_capacity(raw.rows.len());
        for (row, cells) in raw.rows.iter().enumerate() {
            let mut cells = cells.clone();
            cells.resize(columns.len(), CellValue::Empty);
            let lat = coordinate(&cells[lat_idx], row, LATITUDE)?;
            let lon = coordinate(&cells[lon_idx], row, LONGITUDE)?;
            records.push(Record { position: LatLon::new(lat, lon), cells });
        }

        Ok(Dataset {
            source: self.source.clone(),
            sheet: raw.name.clone(),
            category: config.category_for_sheet(&raw.name),
            columns,
            records,
        })
    }
}

fn coordinate(cell: &CellValue, row: usize, column: &str) -> Result<f64, SchemaError> {
    cell.as_number().ok_or_else(|| SchemaError::InvalidNumber {
        row,
        column: column.to_string(),
        value: cell.to_string(),
    })
}

/// Catalogue des sources du dossier data
#[derive(Debug, Clone)]
pub struct DatasetCatalog {
    dir: PathBuf,
}

impl DatasetCatalog {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Noms des sources disponibles (sans extension, triés)
    pub fn discover(&self) -> Result<Vec<String>, SourceError> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let Some(file_name) = path.file_name().and_then(|s| s.to_str()) else { continue };
            if file_name.starts_with(LOCK_PREFIX) {
                debug!("skipping lock file {file_name}");
                continue;
            }
            let supported = path
                .extension()
                .and_then(|s| s.to_str())
                .map(|ext| SUPPORTED.contains(&ext))
                .unwrap_or(false);
            if !supported || !path.is_file() {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        names.dedup();
        info!("discovered {} sources in {}", names.len(), self.dir.display());
        Ok(names)
    }

    /// Charge toutes les feuilles d'une source (.xlsx prioritaire sur .csv)
    pub fn open(&self, source: &str) -> Result<Workbook, SourceError> {
        let xlsx = self.dir.join(format!("{source}.xlsx"));
        let csv = self.dir.join(format!("{source}.csv"));
        let sheets = if xlsx.is_file() {
            read_xlsx(&xlsx)?
        } else if csv.is_file() {
            vec![read_csv(&csv, source)?]
        } else {
            return Err(SourceError::NotFound(source.to_string()));
        };
        debug!("opened {source}: {} sheets", sheets.len());
        Ok(Workbook { source: source.to_string(), sheets })
    }
}

fn read_xlsx(path: &Path) -> Result<Vec<RawSheet>, SourceError> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let mut sheets = Vec::new();
    for name in workbook.sheet_names() {
        let range = workbook.worksheet_range(&name)?;
        let mut rows = range.rows();
        let Some(header_row) = rows.next() else {
            warn!("sheet {name} in {} is empty, skipped", path.display());
            continue;
        };
        let headers = header_row.iter().map(|c| cell_from_data(c).to_string()).collect();
        let rows = rows.map(|row| row.iter().map(cell_from_data).collect()).collect();
        sheets.push(RawSheet { name, headers, rows });
    }
    Ok(sheets)
}

fn read_csv(path: &Path, sheet: &str) -> Result<RawSheet, SourceError> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).flexible(true).from_path(path)?;
    let headers = reader.headers()?.iter().map(|h| h.to_string()).collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(record?.iter().map(CellValue::infer).collect());
    }
    Ok(RawSheet { name: sheet.to_string(), headers, rows })
}

fn cell_from_data(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::String(s) if s.trim().is_empty() => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(value) => CellValue::DateTime(value),
            None => CellValue::Number(dt.as_f64()),
        },
        // "%Y-%m-%dT%H:%M:%S%.f" : secondes fractionnaires acceptées
        Data::DateTimeIso(s) => s
            .parse::<NaiveDateTime>()
            .map(CellValue::DateTime)
            .unwrap_or_else(|_| CellValue::Text(s.clone())),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => CellValue::Text(e.to_string()),
    }
}
