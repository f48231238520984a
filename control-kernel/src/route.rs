/**
 * ROUTE CLIENT - Itinéraire ordonné via un service de routage externe (OSRM)
 *
 * RÔLE :
 * Transforme la liste ordonnée des points d'une feuille en géométrie d'itinéraire.
 * Premier point = départ, dernier = arrivée, les autres = étapes, dans l'ordre
 * d'entrée (aucune réoptimisation de l'ordre).
 *
 * FONCTIONNEMENT :
 * - Vérifications locales AVANT tout appel : 2 points minimum, 100 maximum
 * - RouteTransport = contrat étroit vers le service (OsrmTransport via reqwest)
 * - Chaque tentative est bornée par un timeout, les échecs service sont retentés
 * - La géométrie arrive en (lon, lat) et repart en (lat, lon)
 *
 * FORMAT RÉPONSE (extrait) :
 * ```json
 * { "code": "Ok", "routes": [ { "geometry": { "coordinates": [[46.6, 24.7], [46.7, 24.8]] } } ] }
 * ```
 * Les réponses du service "trip" (clé "trips") sont acceptées aussi.
 */

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::RoutingConf;
use crate::models::LatLon;

/// Échecs côté service (transport, HTTP, contenu)
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Routing service answered HTTP {0}")]
    Status(u16),
    #[error("Routing service returned no route ({code}): {message}")]
    NoRoute { code: String, message: String },
    #[error("Invalid routing payload: {0}")]
    Payload(String),
}

#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("The number of waypoints exceeds the OSRM limit of {limit}. Please reduce the number of locations.")]
    TooManyWaypoints { count: usize, limit: usize },
    #[error("At least 2 waypoints are needed to compute a route, got {count}")]
    InsufficientWaypoints { count: usize },
    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// Requête ordonnée : départ, étapes, arrivée
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteRequest {
    pub origin: LatLon,
    pub via: Vec<LatLon>,
    pub destination: LatLon,
}

impl RouteRequest {
    pub fn from_waypoints(waypoints: &[LatLon]) -> Option<Self> {
        match waypoints {
            [origin, via @ .., destination] => Some(Self {
                origin: *origin,
                via: via.to_vec(),
                destination: *destination,
            }),
            _ => None,
        }
    }

    /// Tous les points dans l'ordre d'envoi
    pub fn points(&self) -> impl Iterator<Item = &LatLon> {
        std::iter::once(&self.origin).chain(self.via.iter()).chain(std::iter::once(&self.destination))
    }

    /// Segment de coordonnées OSRM : "lon,lat;lon,lat;..."
    pub fn coordinate_path(&self) -> String {
        self.points()
            .map(|p| format!("{},{}", p.lon, p.lat))
            .collect::<Vec<_>>()
            .join(";")
    }
}

/// Ligne GeoJSON : positions en (lon, lat)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineGeometry {
    pub coordinates: Vec<[f64; 2]>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteAlternative {
    pub geometry: LineGeometry,
    #[serde(default)]
    pub distance: Option<f64>,
    #[serde(default)]
    pub duration: Option<f64>,
}

/// Réponse du service de routage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutePayload {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, alias = "trips")]
    pub routes: Vec<RouteAlternative>,
}

impl RoutePayload {
    /// Réponse "Ok" avec une seule alternative, points en (lon, lat)
    pub fn single(coordinates: Vec<[f64; 2]>) -> Self {
        Self {
            code: Some("Ok".into()),
            message: None,
            routes: vec![RouteAlternative {
                geometry: LineGeometry { coordinates },
                distance: None,
                duration: None,
            }],
        }
    }
}

/// Géométrie renvoyée à l'appelant, points en (lat, lon)
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RouteGeometry {
    pub points: Vec<LatLon>,
}

impl RouteGeometry {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Contrat étroit vers le service de routage
#[allow(async_fn_in_trait)]
pub trait RouteTransport {
    async fn fetch(&self, request: &RouteRequest) -> Result<RoutePayload, ServiceError>;
}

/// Transport HTTP vers une instance OSRM (service "route")
#[derive(Clone)]
pub struct OsrmTransport {
    client: reqwest::Client,
    base_url: String,
    profile: String,
}

impl OsrmTransport {
    pub fn new(conf: &RoutingConf) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(conf.timeout_secs))
            .user_agent("control-center")
            .build()?;
        Ok(Self {
            client,
            base_url: conf.base_url.trim_end_matches('/').to_string(),
            profile: conf.profile.clone(),
        })
    }

    /// Une seule alternative, géométrie complète en GeoJSON
    pub fn url(&self, request: &RouteRequest) -> String {
        format!(
            "{}/route/v1/{}/{}?alternatives=false&overview=full&geometries=geojson&steps=false",
            self.base_url,
            self.profile,
            request.coordinate_path()
        )
    }
}

impl RouteTransport for OsrmTransport {
    async fn fetch(&self, request: &RouteRequest) -> Result<RoutePayload, ServiceError> {
        let url = self.url(request);
        debug!("GET {url}");
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(ServiceError::Status(response.status().as_u16()));
        }
        Ok(response.json::<RoutePayload>().await?)
    }
}

pub struct RouteClient<T: RouteTransport> {
    transport: T,
    max_waypoints: usize,
    retries: u32,
    retry_delay: Duration,
}

impl<T: RouteTransport> RouteClient<T> {
    pub fn new(transport: T, conf: &RoutingConf) -> Self {
        Self {
            transport,
            max_waypoints: conf.max_waypoints,
            retries: conf.retries,
            retry_delay: Duration::from_millis(conf.retry_delay_ms),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Vérifie le nombre de points sans rien appeler
    pub fn check_waypoints(&self, waypoints: &[LatLon]) -> Result<RouteRequest, RouteError> {
        let count = waypoints.len();
        if count > self.max_waypoints {
            return Err(RouteError::TooManyWaypoints { count, limit: self.max_waypoints });
        }
        RouteRequest::from_waypoints(waypoints).ok_or(RouteError::InsufficientWaypoints { count })
    }

    pub async fn compute_route(&self, waypoints: &[LatLon]) -> Result<RouteGeometry, RouteError> {
        let request = self.check_waypoints(waypoints)?;
        let mut attempt = 0;
        let payload = loop {
            match self.transport.fetch(&request).await {
                Ok(payload) => break payload,
                Err(e) if attempt < self.retries => {
                    attempt += 1;
                    warn!("route request failed ({e}), retry {attempt}/{}", self.retries);
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => return Err(e.into()),
            }
        };
        let geometry = first_route_geometry(payload)?;
        info!("route computed: {} waypoints -> {} points", waypoints.len(), geometry.points.len());
        Ok(geometry)
    }
}

/// Première alternative, (lon, lat) -> (lat, lon)
fn first_route_geometry(payload: RoutePayload) -> Result<RouteGeometry, ServiceError> {
    let code = payload.code.unwrap_or_else(|| "Ok".into());
    if code != "Ok" {
        return Err(ServiceError::NoRoute {
            code,
            message: payload.message.unwrap_or_default(),
        });
    }
    let first = payload.routes.into_iter().next().ok_or_else(|| ServiceError::NoRoute {
        code: "Ok".into(),
        message: "empty route list".into(),
    })?;
    if first.geometry.coordinates.is_empty() {
        return Err(ServiceError::Payload("route geometry has no points".into()));
    }
    let points = first
        .geometry
        .coordinates
        .into_iter()
        .map(|[lon, lat]| LatLon::new(lat, lon))
        .collect();
    Ok(RouteGeometry { points })
}
