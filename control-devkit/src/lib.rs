/*!
# Control DevKit - Stubs et utilitaires pour le tableau de bord

Bibliothèque facilitant le développement et les tests du noyau avec:
- Stub du service de routage (requêtes enregistrées, réponses préparées)
- Constructeurs de feuilles incidents / effectifs écrites en CSV
- Harness pilotant un vrai Dashboard sur un dossier temporaire
*/

pub mod fixtures;
pub mod harness;
pub mod stub_router;

pub use fixtures::{incident_sheet, waypoint_sheet, workforce_sheet, IncidentRow, SheetFixture, WorkforceRow};
pub use harness::DashboardHarness;
pub use stub_router::StubRouteService;
