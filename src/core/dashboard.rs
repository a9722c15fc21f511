/// One dashboard refresh cycle
///
/// collect -> compare with persisted snapshot -> render and show if changed
/// -> persist. The display is only opened once a refresh is known to be due.

use anyhow::{Context, Result};
use image::RgbImage;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::core::display::{Display, DisplayError};
use crate::core::metrics::{MetricsCollector, Readings, Snapshot};
use crate::core::render::{compose, load_background};
use crate::core::state::{decide, persist_snapshot, FileStateStore, RefreshDecision, StateStore};
use crate::utils::app_config::AppConfig;
use crate::utils::constants::{InkyColor, Palette};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nothing changed since the last render
    Skipped(Snapshot),
    Refreshed(Snapshot, RefreshDecision),
}

pub struct Dashboard {
    collector: MetricsCollector,
    store: Box<dyn StateStore>,
    background_path: PathBuf,
    palette: Palette,
    border: InkyColor,
}

impl Dashboard {
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            MetricsCollector::new(config.metrics.clone()),
            Box::new(FileStateStore::new(config.state_path())),
            config.background_path(),
            Palette::new(config.display.accent),
            config.display.border,
        )
    }

    pub fn new(
        collector: MetricsCollector,
        store: Box<dyn StateStore>,
        background_path: PathBuf,
        palette: Palette,
        border: InkyColor,
    ) -> Self {
        Self {
            collector,
            store,
            background_path,
            palette,
            border,
        }
    }

    pub fn store(&self) -> &dyn StateStore {
        self.store.as_ref()
    }

    pub fn collect(&self) -> Readings {
        self.collector.collect()
    }

    pub fn decide(&self, snapshot: &Snapshot) -> RefreshDecision {
        decide(self.store(), snapshot)
    }

    /// Compose `snapshot` on the background artwork
    pub fn render(&self, snapshot: &Snapshot) -> Result<RgbImage> {
        let background = load_background(&self.background_path)?;
        Ok(compose(&background, snapshot, &self.palette))
    }

    /// Run one cycle; `force` redraws even when nothing changed
    pub fn refresh<F>(&self, force: bool, open_display: F) -> Result<CycleOutcome>
    where
        F: FnOnce() -> Result<Box<dyn Display>, DisplayError>,
    {
        let snapshot = self.collect().snapshot();
        let decision = self.decide(&snapshot);
        debug!("Snapshot {}: {}", snapshot, decision.reason());

        if !decision.needs_refresh() && !force {
            info!("No need to refresh");
            return Ok(CycleOutcome::Skipped(snapshot));
        }

        let image = self.render(&snapshot)?;

        let mut display = open_display().context("Failed to detect display")?;
        display.set_border(self.border);
        display.set_image(&image).context("Failed to set display image")?;
        display.show().context("Failed to update display")?;
        info!("Display refreshed ({})", snapshot);

        persist_snapshot(self.store(), &snapshot);

        Ok(CycleOutcome::Refreshed(snapshot, decision))
    }
}
