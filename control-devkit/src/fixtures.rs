/*!
Constructeurs de feuilles de test

Produit des feuilles incidents / effectifs au format attendu par le noyau
(en-têtes, marqueur '*' des colonnes affichées) et les écrit en CSV dans un
dossier de données.
*/

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Feuille en construction : en-têtes + lignes texte
#[derive(Debug, Clone, PartialEq)]
pub struct SheetFixture {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl SheetFixture {
    pub fn new<S: AsRef<str>>(headers: &[S]) -> Self {
        Self {
            headers: headers.iter().map(|h| h.as_ref().to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn row<S: AsRef<str>>(mut self, cells: &[S]) -> Self {
        self.rows.push(cells.iter().map(|c| c.as_ref().to_string()).collect());
        self
    }

    /// Écrit `{source}.csv` ; la feuille porte alors le nom de la source
    pub fn write_csv(&self, dir: &Path, source: &str) -> Result<PathBuf> {
        let path = dir.join(format!("{source}.csv"));
        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        log::info!("[fixtures] wrote {} rows to {}", self.rows.len(), path.display());
        Ok(path)
    }
}

/// Ligne incident simplifiée
#[derive(Debug, Clone)]
pub struct IncidentRow<'a> {
    pub lat: f64,
    pub lon: f64,
    pub site: &'a str,
    pub status: &'a str,
    pub open: &'a str,
    pub close: &'a str,
    pub satisfaction: &'a str,
}

pub fn incident_sheet(rows: &[IncidentRow<'_>]) -> SheetFixture {
    rows.iter().fold(
        SheetFixture::new(&[
            "Latitude",
            "Longitude",
            "Site*",
            "Status*",
            "Open Time",
            "Closure Time",
            "Satisfaction",
        ]),
        |sheet, r| {
            sheet.row(&[
                r.lat.to_string(),
                r.lon.to_string(),
                r.site.to_string(),
                r.status.to_string(),
                r.open.to_string(),
                r.close.to_string(),
                r.satisfaction.to_string(),
            ])
        },
    )
}

/// Ligne effectif simplifiée
#[derive(Debug, Clone)]
pub struct WorkforceRow<'a> {
    pub lat: f64,
    pub lon: f64,
    pub team: &'a str,
    pub status: &'a str,
    pub open: &'a str,
    pub close: &'a str,
    pub evaluation: &'a str,
    pub complaints: &'a str,
    pub operation: &'a str,
}

pub fn workforce_sheet(rows: &[WorkforceRow<'_>]) -> SheetFixture {
    rows.iter().fold(
        SheetFixture::new(&[
            "Latitude",
            "Longitude",
            "Team*",
            "Status*",
            "Open-Time",
            "Closure Time",
            "Evaluation",
            "Complain today",
            "Operation",
        ]),
        |sheet, r| {
            sheet.row(&[
                r.lat.to_string(),
                r.lon.to_string(),
                r.team.to_string(),
                r.status.to_string(),
                r.open.to_string(),
                r.close.to_string(),
                r.evaluation.to_string(),
                r.complaints.to_string(),
                r.operation.to_string(),
            ])
        },
    )
}

/// `n` points alignés à partir de (lat, lon), pas de 0.01°
pub fn waypoint_sheet(n: usize, lat: f64, lon: f64) -> SheetFixture {
    (0..n).fold(SheetFixture::new(&["Latitude", "Longitude", "Name*"]), |sheet, i| {
        sheet.row(&[
            format!("{:.4}", lat + i as f64 * 0.01),
            format!("{lon:.4}"),
            format!("Point {i}"),
        ])
    })
}
