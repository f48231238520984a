/*!
 * CONTROL KERNEL - Noyau du tableau de bord incidents / effectifs
 *
 * RÔLE : Chargement des feuilles, calcul des KPI, itinéraire via service de routage
 * externe, construction de la couche carte, état de session.
 *
 * MODULES (des feuilles vers la racine) :
 * time_norm -> models/schema -> source -> kpi | route -> overlay -> session -> dashboard
 */

pub mod config;
pub mod dashboard;
pub mod kpi;
pub mod models;
pub mod overlay;
pub mod route;
pub mod schema;
pub mod session;
pub mod source;
pub mod time_norm;

pub use config::{load_config, ControlConfig};
pub use dashboard::{Dashboard, Frame};
pub use kpi::{KpiEngine, KpiError, KpiSet, KpiValue};
pub use models::{Category, CellValue, Column, Dataset, LatLon, Record};
pub use overlay::{MapOverlayBuilder, Overlay, OverlayRequest};
pub use route::{OsrmTransport, RouteClient, RouteError, RoutePayload, RouteRequest, RouteTransport, ServiceError};
pub use session::{Selection, Session};
pub use source::{DatasetCatalog, SourceError};
pub use time_norm::{FormatError, TimeInput, TimeNormalizer};
