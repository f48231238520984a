//! Parcours complets : dossier de données -> Dashboard -> Frame

use control_devkit::{incident_sheet, waypoint_sheet, workforce_sheet, DashboardHarness, IncidentRow, WorkforceRow};
use control_kernel::kpi::{
    CLOSURE_PERCENTAGE, COMPLAIN_NUMBERS, EMERGENCY_CLOSURE_TIME, EMERGENCY_NUMBERS, EVALUATION_RATE,
    EXPECTED_COMPLAINS_ALARM, EXPECTED_EMERGENCY_ALARM, OPERATION_PERCENTAGE, SATISFACTION_RATE, WORKING_HOURS,
};
use control_kernel::{KpiError, LatLon, ServiceError};
use std::sync::Arc;

fn incidents() -> Vec<IncidentRow<'static>> {
    (0..10)
        .map(|i| IncidentRow {
            // les deux dernières lignes reprennent la position de la première
            lat: if i >= 8 { 24.70 } else { 24.70 + i as f64 * 0.01 },
            lon: 46.60,
            site: "Clinic",
            status: if i < 3 { "Closed" } else { "Open" },
            open: "08:00",
            close: if i % 2 == 0 { "09:30" } else { "09:30:00" },
            satisfaction: if i < 2 { "Sattisfied" } else { "unsatisfied" },
        })
        .collect()
}

fn workforce() -> Vec<WorkforceRow<'static>> {
    vec![
        WorkforceRow {
            lat: 24.70,
            lon: 46.60,
            team: "Team A",
            status: "Active",
            open: "08:00",
            close: "16:00",
            evaluation: "4",
            complaints: "1",
            operation: "Cleaning",
        },
        WorkforceRow {
            lat: 24.75,
            lon: 46.65,
            team: "Team B",
            status: "Active",
            open: "07:30",
            close: "15:30",
            evaluation: "5",
            complaints: "0",
            operation: "Cleaning",
        },
        WorkforceRow {
            lat: 24.80,
            lon: 46.70,
            team: "Team C",
            status: "Inactive",
            open: "09:00",
            close: "17:00",
            evaluation: "",
            complaints: "2",
            operation: "Repair",
        },
    ]
}

#[tokio::test]
async fn test_incident_board() {
    let mut harness = DashboardHarness::new().unwrap();
    harness.add_source("Emergency", &incident_sheet(&incidents())).unwrap();
    harness.select("Emergency").unwrap();

    harness.expect_kpi(CLOSURE_PERCENTAGE, "30.00%").unwrap();
    harness.expect_kpi(SATISFACTION_RATE, "20.00%").unwrap();
    harness.expect_kpi(EMERGENCY_CLOSURE_TIME, "0 days 1 hrs 30 mins").unwrap();
    harness.expect_kpi(EMERGENCY_NUMBERS, "8").unwrap();
    harness
        .expect_kpi(EXPECTED_EMERGENCY_ALARM, "To be calculated based on relationships")
        .unwrap();

    let frame = harness.frame();
    assert_eq!(frame.title, "Emergency - Emergency Table");
    let overlay = frame.overlay.unwrap();
    assert_eq!(overlay.markers.len(), 10);
    assert_eq!(overlay.markers[0].color, "blue");
    assert_eq!(overlay.markers[3].color, "red");
    assert_eq!(overlay.markers[0].tooltip, "Clinic");
    assert_eq!(overlay.markers[0].popup, "Status: Closed");
}

#[tokio::test]
async fn test_workforce_board() {
    let mut harness = DashboardHarness::new().unwrap();
    harness.add_source("Workforce", &workforce_sheet(&workforce())).unwrap();
    harness.select("Workforce").unwrap();

    harness.expect_kpi(OPERATION_PERCENTAGE, "66.67%").unwrap();
    harness.expect_kpi(WORKING_HOURS, "0 days 8 hours 0 min").unwrap();
    harness.expect_kpi(EVALUATION_RATE, "3.00").unwrap();
    harness.expect_kpi(COMPLAIN_NUMBERS, "3").unwrap();
    harness
        .expect_kpi(EXPECTED_COMPLAINS_ALARM, "To be calculated based on relationships")
        .unwrap();

    let kpis = harness.kpis().unwrap();
    let distribution = kpis.distribution.unwrap();
    assert_eq!(distribution.entries[0].label, "Cleaning");
    assert_eq!(distribution.count("Cleaning"), Some(2));
    assert_eq!(distribution.count("Repair"), Some(1));

    let overlay = harness.frame().overlay.unwrap();
    assert_eq!(overlay.markers[0].color, "red");
    assert_eq!(overlay.markers[2].color, "blue");
    assert_ne!(overlay.markers[0].color, overlay.markers[2].color);
}

#[tokio::test]
async fn test_workforce_boolean_cells() {
    let mut rows = workforce();
    rows[0].complaints = "TRUE";
    rows[1].complaints = "FALSE";
    rows[0].evaluation = "True";
    rows[1].evaluation = "false";
    let mut harness = DashboardHarness::new().unwrap();
    harness.add_source("Workforce", &workforce_sheet(&rows)).unwrap();
    harness.select("Workforce").unwrap();

    // TRUE + FALSE + 2
    harness.expect_kpi(COMPLAIN_NUMBERS, "3").unwrap();
    // (1 + 0 + vide) / 3
    harness.expect_kpi(EVALUATION_RATE, "0.33").unwrap();
}

#[tokio::test]
async fn test_status_with_trailing_space_is_not_closed() {
    let mut rows = incidents();
    rows[0].status = "Closed ";
    let mut harness = DashboardHarness::new().unwrap();
    harness.add_source("Emergency", &incident_sheet(&rows)).unwrap();
    harness.select("Emergency").unwrap();

    harness.expect_kpi(CLOSURE_PERCENTAGE, "20.00%").unwrap();
    let overlay = harness.frame().overlay.unwrap();
    assert_eq!(overlay.markers[0].color, "red");
    assert_eq!(overlay.markers[1].color, "blue");
}

#[tokio::test]
async fn test_route_axis_swap_and_cache() {
    let mut harness = DashboardHarness::new().unwrap();
    harness.add_source("depots", &waypoint_sheet(2, 24.7, 46.6)).unwrap();
    harness.select("depots").unwrap();

    let before = harness.frame().overlay.unwrap();
    assert!(Arc::ptr_eq(&before, &harness.frame().overlay.unwrap()));
    assert!(before.route.is_none());

    harness.router.respond_with(&[(46.6, 24.7), (46.7, 24.8)]);
    assert!(harness.route().await);

    let request = harness.router.last_request().unwrap();
    assert!(request.via.is_empty());
    assert_eq!(request.origin, LatLon::new(24.7, 46.6));
    assert_eq!(request.destination, LatLon::new(24.71, 46.6));

    let after = harness.frame().overlay.unwrap();
    assert!(!Arc::ptr_eq(&before, &after));
    assert_eq!(
        after.route.as_ref().unwrap().points,
        vec![LatLon::new(24.7, 46.6), LatLon::new(24.8, 46.7)]
    );
    assert!(Arc::ptr_eq(&after, &harness.frame().overlay.unwrap()));
}

#[tokio::test]
async fn test_waypoint_limit_never_calls_service() {
    let mut harness = DashboardHarness::new().unwrap();
    harness.add_source("city", &waypoint_sheet(101, 20.0, 46.6)).unwrap();
    harness.select("city").unwrap();

    assert!(!harness.route().await);
    assert_eq!(harness.router.call_count(), 0);
    harness
        .expect_warning_containing("The number of waypoints exceeds the OSRM limit of 100")
        .unwrap();
    assert!(harness.frame().overlay.unwrap().route.is_none());
}

#[tokio::test]
async fn test_service_failure_keeps_previous_route() {
    let mut harness = DashboardHarness::new().unwrap();
    harness.add_source("depots", &waypoint_sheet(4, 24.7, 46.6)).unwrap();
    harness.select("depots").unwrap();
    assert!(harness.route().await);
    assert_eq!(harness.router.last_request().unwrap().via.len(), 2);

    // 1 tentative + 1 retry par défaut
    harness
        .router
        .fail_with(ServiceError::Status(503))
        .fail_with(ServiceError::Status(503));
    assert!(!harness.route().await);
    assert_eq!(harness.router.call_count(), 3);
    harness.expect_warning_containing("HTTP 503").unwrap();
    assert_eq!(harness.frame().overlay.unwrap().route.as_ref().unwrap().points.len(), 4);
}

#[tokio::test]
async fn test_missing_column_keeps_map() {
    let mut harness = DashboardHarness::new().unwrap();
    let mut sheet = incident_sheet(&incidents());
    sheet.headers.pop();
    for row in &mut sheet.rows {
        row.pop();
    }
    harness.add_source("Emergency", &sheet).unwrap();
    harness.select("Emergency").unwrap();

    let frame = harness.frame();
    assert!(matches!(frame.kpis, Some(Err(KpiError::Schema(_)))));
    assert_eq!(frame.overlay.unwrap().markers.len(), 10);
}

#[tokio::test]
async fn test_malformed_time_is_reported() {
    let mut harness = DashboardHarness::new().unwrap();
    let mut rows = incidents();
    rows[4].open = "8 o'clock";
    harness.add_source("Emergency", &incident_sheet(&rows)).unwrap();
    harness.select("Emergency").unwrap();

    match harness.frame().kpis {
        Some(Err(KpiError::Format { row, column, source })) => {
            assert_eq!(row, 4);
            assert_eq!(column, "Open Time");
            assert_eq!(source.value, "8 o'clock");
        }
        other => panic!("expected a format error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_interactive_click_highlights_marker() {
    let mut harness = DashboardHarness::new().unwrap();
    harness.add_source("Workforce", &workforce_sheet(&workforce())).unwrap();
    harness.select("Workforce").unwrap();

    assert!(!harness.dashboard.record_click("Status: Inactive"));
    assert!(harness.dashboard.toggle_interactive());
    assert!(harness.dashboard.record_click("Status: Inactive"));

    let frame = harness.frame();
    assert!(frame.interactive);
    let overlay = frame.overlay.unwrap();
    assert_eq!(overlay.markers[2].color, "green");
    assert_eq!(overlay.markers[0].color, "red");

    let json = serde_json::to_value(&*overlay).unwrap();
    assert_eq!(json["markers"][2]["color"], "green");
}

#[tokio::test]
async fn test_sources_listing() {
    let harness = DashboardHarness::new().unwrap();
    harness
        .add_source("Workforce", &workforce_sheet(&workforce()))
        .unwrap()
        .add_source("Emergency", &incident_sheet(&incidents()))
        .unwrap();
    assert_eq!(
        harness.dashboard.sources().unwrap(),
        vec!["Emergency".to_string(), "Workforce".to_string()]
    );
    assert_eq!(harness.dashboard.sheets("Emergency").unwrap(), vec!["Emergency".to_string()]);
}
