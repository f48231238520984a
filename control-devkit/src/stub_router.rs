/*!
Stub du service de routage pour développement sans réseau

Implémente `RouteTransport` : enregistre chaque requête reçue et renvoie les
réponses préparées dans l'ordre. Sans réponse préparée, renvoie un tracé droit
passant par les points demandés.
*/

use control_kernel::{RoutePayload, RouteRequest, RouteTransport, ServiceError};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Handle partagé : le test garde un clone, le Dashboard possède l'autre
#[derive(Clone, Default)]
pub struct StubRouteService {
    requests: Arc<Mutex<Vec<RouteRequest>>>,
    responses: Arc<Mutex<VecDeque<Result<RoutePayload, ServiceError>>>>,
}

impl StubRouteService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prochaine réponse : tracé donné en (lon, lat), comme le service réel
    pub fn respond_with(&self, lon_lat: &[(f64, f64)]) -> &Self {
        let coordinates = lon_lat.iter().map(|&(lon, lat)| [lon, lat]).collect();
        self.responses.lock().push_back(Ok(RoutePayload::single(coordinates)));
        self
    }

    pub fn respond_payload(&self, payload: RoutePayload) -> &Self {
        self.responses.lock().push_back(Ok(payload));
        self
    }

    /// Prochaine réponse en échec
    pub fn fail_with(&self, error: ServiceError) -> &Self {
        self.responses.lock().push_back(Err(error));
        self
    }

    pub fn requests(&self) -> Vec<RouteRequest> {
        self.requests.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn last_request(&self) -> Option<RouteRequest> {
        self.requests.lock().last().cloned()
    }

    pub fn clear(&self) {
        self.requests.lock().clear();
        self.responses.lock().clear();
    }
}

impl RouteTransport for StubRouteService {
    async fn fetch(&self, request: &RouteRequest) -> Result<RoutePayload, ServiceError> {
        self.requests.lock().push(request.clone());
        log::info!("[stub-router] route request with {} via points", request.via.len());
        match self.responses.lock().pop_front() {
            Some(response) => response,
            None => Ok(RoutePayload::single(request.points().map(|p| [p.lon, p.lat]).collect())),
        }
    }
}
