use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

use crate::models::Category;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ControlConfig {
    pub data_dir: PathBuf,
    pub routing: RoutingConf,
    pub incidents: IncidentConf,
    pub workforce: WorkforceConf,
    pub overlay: OverlayConf,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RoutingConf {
    pub base_url: String,
    pub profile: String,
    /// limite dure du service OSRM public
    pub max_waypoints: usize,
    pub timeout_secs: u64,
    pub retries: u32,
    pub retry_delay_ms: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct IncidentConf {
    pub sheet: String,
    pub closed_status: String,
    /// Jeton tel qu'écrit dans les données source ("sattisfied"), comparé sans casse
    pub satisfied_token: String,
    pub terminal_status: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct WorkforceConf {
    pub sheet: String,
    pub active_status: String,
    pub terminal_status: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct OverlayConf {
    pub cache_capacity: usize,
    pub terminal_color: String,
    pub active_color: String,
    pub highlight_color: String,
    pub route_color: String,
    pub route_weight: f32,
    pub route_opacity: f32,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            routing: RoutingConf::default(),
            incidents: IncidentConf::default(),
            workforce: WorkforceConf::default(),
            overlay: OverlayConf::default(),
        }
    }
}

impl Default for RoutingConf {
    fn default() -> Self {
        Self {
            base_url: "https://router.project-osrm.org".into(),
            profile: "driving".into(),
            max_waypoints: 100,
            timeout_secs: 10,
            retries: 1,
            retry_delay_ms: 500,
        }
    }
}

impl Default for IncidentConf {
    fn default() -> Self {
        Self {
            sheet: "Emergency".into(),
            closed_status: "Closed".into(),
            satisfied_token: "sattisfied".into(),
            terminal_status: "Closed".into(),
        }
    }
}

impl Default for WorkforceConf {
    fn default() -> Self {
        Self {
            sheet: "Workforce".into(),
            active_status: "Active".into(),
            terminal_status: "Inactive".into(),
        }
    }
}

impl Default for OverlayConf {
    fn default() -> Self {
        Self {
            cache_capacity: 16,
            terminal_color: "blue".into(),
            active_color: "red".into(),
            highlight_color: "green".into(),
            route_color: "blue".into(),
            route_weight: 2.5,
            route_opacity: 1.0,
        }
    }
}

impl ControlConfig {
    pub fn from_yaml_str(txt: &str) -> Result<Self, ConfigError> {
        if txt.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(txt)?)
    }

    pub async fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let txt = fs::read_to_string(path).await?;
        Self::from_yaml_str(&txt)
    }

    /// Catégorie d'une feuille d'après son nom (sensible à la casse)
    pub fn category_for_sheet(&self, sheet: &str) -> Option<Category> {
        if sheet == self.incidents.sheet {
            Some(Category::Incidents)
        } else if sheet == self.workforce.sheet {
            Some(Category::Workforce)
        } else {
            None
        }
    }

    /// Statut "terminal" qui donne la couleur neutre aux marqueurs
    pub fn terminal_status(&self, category: Category) -> &str {
        match category {
            Category::Incidents => &self.incidents.terminal_status,
            Category::Workforce => &self.workforce.terminal_status,
        }
    }
}

pub async fn load_config() -> ControlConfig {
    let path = std::env::var("CONTROL_CENTER_CONFIG").unwrap_or_else(|_| "control-center.yaml".into());
    if Path::new(&path).exists() {
        match ControlConfig::from_path(&path).await {
            Ok(cfg) => {
                info!("config loaded from {path}");
                cfg
            }
            Err(e) => {
                warn!("invalid config {path}: {e}, using defaults");
                ControlConfig::default()
            }
        }
    } else {
        warn!("no {path}, using default config");
        ControlConfig::default()
    }
}
