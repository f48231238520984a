/*!
Harness de test du tableau de bord

Monte un vrai `Dashboard` sur un dossier de données temporaire avec le stub de
routage :
- Écriture des feuilles de test
- Date de référence fixe pour les durées
- Assertions sur la Frame produite (KPI, marqueurs, avertissement)
*/

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use control_kernel::{ControlConfig, Dashboard, Frame, KpiSet, TimeNormalizer};
use tempfile::TempDir;

use crate::fixtures::SheetFixture;
use crate::stub_router::StubRouteService;

pub struct DashboardHarness {
    // gardé vivant tant que le harness existe
    data_dir: TempDir,
    pub router: StubRouteService,
    pub dashboard: Dashboard<StubRouteService>,
}

impl DashboardHarness {
    pub fn new() -> Result<Self> {
        Self::with_config(ControlConfig::default())
    }

    /// `data_dir` est remplacé par le dossier temporaire, le reste est conservé
    pub fn with_config(mut config: ControlConfig) -> Result<Self> {
        env_logger::try_init().ok();

        let data_dir = tempfile::tempdir().context("Failed to create temp data dir")?;
        config.data_dir = data_dir.path().to_path_buf();
        config.routing.retry_delay_ms = 0;

        let reference = NaiveDate::from_ymd_opt(2024, 5, 1).context("invalid reference date")?;
        let router = StubRouteService::new();
        let dashboard = Dashboard::new(config, router.clone(), TimeNormalizer::on(reference));
        log::info!("[harness] data dir {}", data_dir.path().display());

        Ok(Self { data_dir, router, dashboard })
    }

    pub fn add_source(&self, source: &str, sheet: &SheetFixture) -> Result<&Self> {
        sheet.write_csv(self.data_dir.path(), source)?;
        Ok(self)
    }

    /// Source CSV = une feuille du même nom
    pub fn select(&mut self, source: &str) -> Result<&mut Self> {
        self.dashboard
            .select(source, source)
            .with_context(|| format!("Failed to select {source}"))?;
        Ok(self)
    }

    pub async fn route(&mut self) -> bool {
        self.dashboard.request_route().await
    }

    pub fn frame(&self) -> Frame {
        self.dashboard.frame()
    }

    /// KPI de la feuille courante ; erreur si absents ou en échec
    pub fn kpis(&self) -> Result<KpiSet> {
        match self.frame().kpis {
            Some(Ok(kpis)) => Ok(kpis),
            Some(Err(e)) => bail!("KPI computation failed: {e}"),
            None => bail!("no KPIs for the current selection"),
        }
    }

    pub fn expect_kpi(&self, name: &str, rendered: &str) -> Result<()> {
        let kpis = self.kpis()?;
        let Some(value) = kpis.get(name) else {
            bail!("indicator '{name}' missing");
        };
        let actual = value.to_string();
        if actual != rendered {
            bail!("indicator '{name}': expected '{rendered}', got '{actual}'");
        }
        log::info!("[harness] {name} = {actual}");
        Ok(())
    }

    pub fn expect_warning_containing(&self, needle: &str) -> Result<()> {
        match self.frame().warning {
            Some(warning) if warning.contains(needle) => Ok(()),
            Some(warning) => bail!("warning '{warning}' does not contain '{needle}'"),
            None => bail!("no warning, expected one containing '{needle}'"),
        }
    }
}
