/**
 * MAP OVERLAY - Couche carte : marqueurs + itinéraire + cadrage
 *
 * RÔLE :
 * Construit ce que le moteur de rendu affiche pour une feuille : un marqueur par
 * ligne (tooltip, popup, couleur), le tracé de l'itinéraire s'il existe et la liste
 * brute des positions pour ajuster la vue.
 *
 * FONCTIONNEMENT :
 * - Clé de cache = SHA-256 sur le contenu (feuille, itinéraire, statut terminal, popup cliqué)
 * - Même clé => même Arc<Overlay> (aucune reconstruction)
 * - Cache borné, éviction FIFO, vidé explicitement par `invalidate()`
 * - Mutex interne : `build` prend `&self`
 *
 * COULEURS :
 * statut == statut terminal (ou pas de colonne Status) -> couleur terminale
 * sinon -> couleur active ; popup identique au dernier clic -> couleur de surbrillance
 */

use parking_lot::Mutex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::debug;

use crate::config::OverlayConf;
use crate::models::{Dataset, LatLon, Record};
use crate::schema::STATUS;

type CacheKey = [u8; 32];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub id: String,
    pub position: LatLon,
    pub tooltip: String,
    pub popup: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutePath {
    pub points: Vec<LatLon>,
    pub color: String,
    pub weight: f32,
    pub opacity: f32,
}

/// Indication de cadrage ; le zoom reste l'affaire du moteur de rendu
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "mode", content = "at", rename_all = "snake_case")]
pub enum ViewHint {
    Unset,
    Center(LatLon),
    FitBounds,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overlay {
    pub markers: Vec<Marker>,
    pub route: Option<RoutePath>,
    pub view: ViewHint,
    pub coordinates: Vec<LatLon>,
}

impl Overlay {
    pub fn marker(&self, id: &str) -> Option<&Marker> {
        self.markers.iter().find(|m| m.id == id)
    }
}

/// Entrées d'une construction
#[derive(Debug, Clone, Copy)]
pub struct OverlayRequest<'a> {
    pub dataset: &'a Dataset,
    pub terminal_status: &'a str,
    pub route: &'a [LatLon],
    pub selected_popup: Option<&'a str>,
}

#[derive(Default)]
struct OverlayCache {
    entries: HashMap<CacheKey, Arc<Overlay>>,
    order: VecDeque<CacheKey>,
}

pub struct MapOverlayBuilder {
    style: OverlayConf,
    cache: Mutex<OverlayCache>,
}

impl MapOverlayBuilder {
    pub fn new(style: OverlayConf) -> Self {
        Self {
            style,
            cache: Mutex::new(OverlayCache::default()),
        }
    }

    pub fn build(&self, request: OverlayRequest<'_>) -> Arc<Overlay> {
        let key = cache_key(&request);
        if let Some(hit) = self.cache.lock().entries.get(&key) {
            debug!("overlay cache hit for {}/{}", request.dataset.source, request.dataset.sheet);
            return Arc::clone(hit);
        }
        debug!("overlay cache miss for {}/{}", request.dataset.source, request.dataset.sheet);

        let overlay = Arc::new(self.assemble(&request));
        self.store(key, Arc::clone(&overlay));
        overlay
    }

    /// Vide le cache (nouvelle sélection de feuille)
    pub fn invalidate(&self) {
        let mut cache = self.cache.lock();
        cache.entries.clear();
        cache.order.clear();
    }

    pub fn cached(&self) -> usize {
        self.cache.lock().entries.len()
    }

    fn store(&self, key: CacheKey, overlay: Arc<Overlay>) {
        let capacity = self.style.cache_capacity.max(1);
        let mut cache = self.cache.lock();
        while cache.order.len() >= capacity {
            match cache.order.pop_front() {
                Some(oldest) => {
                    cache.entries.remove(&oldest);
                }
                None => break,
            }
        }
        cache.order.push_back(key);
        cache.entries.insert(key, overlay);
    }

    fn assemble(&self, request: &OverlayRequest<'_>) -> Overlay {
        let dataset = request.dataset;
        let display = dataset.display_columns();
        let status = dataset.column_index(STATUS);

        let markers = dataset
            .records
            .iter()
            .enumerate()
            .map(|(i, record)| {
                let (tooltip, popup) = marker_text(dataset, record, &display);
                let color = self.marker_color(record, status, request, &popup);
                Marker {
                    id: format!("marker_{i}"),
                    position: record.position,
                    tooltip,
                    popup,
                    color: color.to_string(),
                }
            })
            .collect();

        let route = (!request.route.is_empty()).then(|| RoutePath {
            points: request.route.to_vec(),
            color: self.style.route_color.clone(),
            weight: self.style.route_weight,
            opacity: self.style.route_opacity,
        });

        let coordinates = dataset.coordinates();
        let view = match coordinates.as_slice() {
            [] => ViewHint::Unset,
            [only] => ViewHint::Center(*only),
            _ => ViewHint::FitBounds,
        };

        Overlay { markers, route, view, coordinates }
    }

    fn marker_color<'s>(
        &'s self,
        record: &Record,
        status: Option<usize>,
        request: &OverlayRequest<'_>,
        popup: &str,
    ) -> &'s str {
        if request.selected_popup.is_some_and(|sel| !popup.is_empty() && sel == popup) {
            return &self.style.highlight_color;
        }
        let terminal = match status {
            Some(index) => record.cell(index).to_string() == request.terminal_status,
            None => true,
        };
        if terminal {
            &self.style.terminal_color
        } else {
            &self.style.active_color
        }
    }
}

/// Tooltip = 1re colonne affichée ; popup = les suivantes, "Label: valeur" par ligne
fn marker_text(dataset: &Dataset, record: &Record, display: &[usize]) -> (String, String) {
    let Some((first, rest)) = display.split_first() else {
        return (String::new(), String::new());
    };
    let tooltip = record.cell(*first).to_string();
    let popup = rest
        .iter()
        .map(|&i| format!("{}: {}", dataset.columns[i].name(), record.cell(i)))
        .collect::<Vec<_>>()
        .join("\n");
    (tooltip, popup)
}

fn cache_key(request: &OverlayRequest<'_>) -> CacheKey {
    let mut hasher = Sha256::new();
    let mut field = |bytes: &[u8]| {
        hasher.update((bytes.len() as u64).to_be_bytes());
        hasher.update(bytes);
    };

    let dataset = request.dataset;
    field(&(dataset.columns.len() as u64).to_be_bytes());
    field(&(dataset.records.len() as u64).to_be_bytes());
    field(dataset.source.as_bytes());
    field(dataset.sheet.as_bytes());
    for column in &dataset.columns {
        field(column.header.as_bytes());
    }
    for record in &dataset.records {
        field(&record.position.lat.to_bits().to_be_bytes());
        field(&record.position.lon.to_bits().to_be_bytes());
        for cell in &record.cells {
            field(cell.to_string().as_bytes());
        }
    }
    field(&(request.route.len() as u64).to_be_bytes());
    for point in request.route {
        field(&point.lat.to_bits().to_be_bytes());
        field(&point.lon.to_bits().to_be_bytes());
    }
    field(request.terminal_status.as_bytes());
    match request.selected_popup {
        Some(popup) => {
            field(b"selected");
            field(popup.as_bytes());
        }
        None => field(b""),
    }

    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, CellValue, Column};

    fn workforce() -> Dataset {
        let headers = ["Latitude", "Longitude", "Name*", "Status*", "Operation"];
        let rows = [
            (24.70, 46.60, "Team A", "Active", "Cleaning"),
            (24.80, 46.70, "Team B", "Inactive", "Repair"),
        ];
        Dataset {
            source: "riyadh".into(),
            sheet: "Workforce".into(),
            category: Some(Category::Workforce),
            columns: headers.iter().map(|h| Column::new(*h)).collect(),
            records: rows
                .iter()
                .map(|(lat, lon, name, status, op)| Record {
                    position: LatLon::new(*lat, *lon),
                    cells: vec![
                        CellValue::Number(*lat),
                        CellValue::Number(*lon),
                        CellValue::Text(name.to_string()),
                        CellValue::Text(status.to_string()),
                        CellValue::Text(op.to_string()),
                    ],
                })
                .collect(),
        }
    }

    fn request<'a>(dataset: &'a Dataset, route: &'a [LatLon]) -> OverlayRequest<'a> {
        OverlayRequest { dataset, terminal_status: "Inactive", route, selected_popup: None }
    }

    #[test]
    fn test_cache_hit_returns_same_overlay() {
        let builder = MapOverlayBuilder::new(OverlayConf::default());
        let ds = workforce();
        let route = [LatLon::new(24.7, 46.6), LatLon::new(24.8, 46.7)];
        let first = builder.build(request(&ds, &route));
        let second = builder.build(request(&ds, &route));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(builder.cached(), 1);
    }

    #[test]
    fn test_new_route_builds_new_overlay() {
        let builder = MapOverlayBuilder::new(OverlayConf::default());
        let ds = workforce();
        let without = builder.build(request(&ds, &[]));
        assert!(without.route.is_none());

        let route = [LatLon::new(24.7, 46.6), LatLon::new(24.75, 46.65), LatLon::new(24.8, 46.7)];
        let with = builder.build(request(&ds, &route));
        assert!(!Arc::ptr_eq(&without, &with));
        let path = with.route.as_ref().unwrap();
        assert_eq!(path.points, route.to_vec());
        assert_eq!(path.color, "blue");
        assert_eq!(path.weight, 2.5);
        assert_eq!(path.opacity, 1.0);
    }

    #[test]
    fn test_workforce_colors_follow_terminal_token() {
        let builder = MapOverlayBuilder::new(OverlayConf::default());
        let ds = workforce();
        let overlay = builder.build(request(&ds, &[]));
        assert_eq!(overlay.markers[0].color, "red");
        assert_eq!(overlay.markers[1].color, "blue");
        assert_ne!(overlay.markers[0].color, overlay.markers[1].color);
    }

    #[test]
    fn test_status_match_is_exact() {
        let builder = MapOverlayBuilder::new(OverlayConf::default());
        let mut ds = workforce();
        ds.records[1].cells[3] = CellValue::Text("Inactive ".into());
        let overlay = builder.build(request(&ds, &[]));
        assert_eq!(overlay.markers[1].color, "red");
    }

    #[test]
    fn test_marker_text_and_ids() {
        let builder = MapOverlayBuilder::new(OverlayConf::default());
        let ds = workforce();
        let overlay = builder.build(request(&ds, &[]));
        let marker = overlay.marker("marker_1").unwrap();
        assert_eq!(marker.tooltip, "Team B");
        assert_eq!(marker.popup, "Status: Inactive");
        assert_eq!(marker.position, LatLon::new(24.8, 46.7));
    }

    #[test]
    fn test_selected_popup_is_highlighted() {
        let builder = MapOverlayBuilder::new(OverlayConf::default());
        let ds = workforce();
        let overlay = builder.build(OverlayRequest { selected_popup: Some("Status: Active"), ..request(&ds, &[]) });
        assert_eq!(overlay.markers[0].color, "green");
        assert_eq!(overlay.markers[1].color, "blue");
    }

    #[test]
    fn test_no_status_column_uses_terminal_color() {
        let builder = MapOverlayBuilder::new(OverlayConf::default());
        let mut ds = workforce();
        ds.columns.truncate(3);
        for record in &mut ds.records {
            record.cells.truncate(3);
        }
        let overlay = builder.build(request(&ds, &[]));
        assert!(overlay.markers.iter().all(|m| m.color == "blue"));
        assert!(overlay.markers.iter().all(|m| m.popup.is_empty()));
    }

    #[test]
    fn test_view_hint() {
        let builder = MapOverlayBuilder::new(OverlayConf::default());
        let mut ds = workforce();
        assert_eq!(builder.build(request(&ds, &[])).view, ViewHint::FitBounds);
        ds.records.truncate(1);
        let single = builder.build(request(&ds, &[]));
        assert_eq!(single.view, ViewHint::Center(LatLon::new(24.7, 46.6)));
        assert_eq!(single.coordinates.len(), 1);
        ds.records.clear();
        let empty = builder.build(request(&ds, &[]));
        assert_eq!(empty.view, ViewHint::Unset);
        assert!(empty.markers.is_empty());
    }

    #[test]
    fn test_eviction_and_invalidate() {
        let builder = MapOverlayBuilder::new(OverlayConf { cache_capacity: 2, ..OverlayConf::default() });
        let ds = workforce();
        let a = [LatLon::new(1.0, 1.0)];
        let b = [LatLon::new(2.0, 2.0)];
        let c = [LatLon::new(3.0, 3.0)];
        let first = builder.build(request(&ds, &a));
        builder.build(request(&ds, &b));
        builder.build(request(&ds, &c));
        assert_eq!(builder.cached(), 2);
        assert!(!Arc::ptr_eq(&first, &builder.build(request(&ds, &a))));

        builder.invalidate();
        assert_eq!(builder.cached(), 0);
    }

    #[test]
    fn test_overlay_serializes() {
        let builder = MapOverlayBuilder::new(OverlayConf::default());
        let ds = workforce();
        let json = serde_json::to_value(&*builder.build(request(&ds, &[]))).unwrap();
        assert_eq!(json["markers"][0]["id"], "marker_0");
        assert_eq!(json["view"]["mode"], "fit_bounds");
    }
}
