/**
 * CONTROL KERNEL - Passe "headless" du tableau de bord
 *
 * RÔLE : Charge la config, parcourt toutes les sources et feuilles du dossier data,
 * demande l'itinéraire de chaque feuille et journalise la Frame obtenue
 * (marqueurs, itinéraire, KPI, avertissements).
 *
 * UTILITÉ : Vérifier un dossier de données sans moteur de rendu.
 */

use anyhow::{Context, Result};
use control_kernel::{load_config, Dashboard, Frame};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().init();

    let config = load_config().await;
    info!("control kernel starting, data dir {}", config.data_dir.display());

    let mut board = Dashboard::from_config(config).context("Failed to build routing client")?;
    let sources = board.sources().context("Failed to list data sources")?;
    if sources.is_empty() {
        warn!("no .xlsx/.csv source found");
    }

    for source in sources {
        let sheets = match board.sheets(&source) {
            Ok(sheets) => sheets,
            Err(e) => {
                error!("cannot open {source}: {e}");
                continue;
            }
        };
        for sheet in sheets {
            if let Err(e) = board.select(&source, &sheet) {
                error!("cannot load {source}/{sheet}: {e}");
                continue;
            }
            board.request_route().await;
            log_frame(&board.frame());
        }
    }
    Ok(())
}

fn log_frame(frame: &Frame) {
    info!("== {} ==", frame.title);
    if let Some(overlay) = &frame.overlay {
        let route_points = overlay.route.as_ref().map(|r| r.points.len()).unwrap_or(0);
        info!("{} markers, route of {} points", overlay.markers.len(), route_points);
    }
    match &frame.kpis {
        Some(Ok(kpis)) => {
            for indicator in &kpis.indicators {
                info!("  {}: {}", indicator.name, indicator.value);
            }
            if let Some(distribution) = &kpis.distribution {
                for entry in &distribution.entries {
                    info!("  {} / {}: {} ({:.2}%)", distribution.title, entry.label, entry.count, entry.share);
                }
            }
        }
        Some(Err(e)) => warn!("  KPIs unavailable: {e}"),
        None => {}
    }
    if let Some(warning) = &frame.warning {
        warn!("  {warning}");
    }
}
