use super::ActionSink;
use crate::detection::Detection;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Logs each verdict
#[derive(Debug, Default)]
pub struct LogAction;

impl ActionSink for LogAction {
    fn apply(&mut self, detection: &Detection) -> Result<()> {
        if detection.present {
            tracing::info!("Token present ({} changed pixels)", detection.changed_pixels);
        } else {
            tracing::info!("Token absent ({} changed pixels)", detection.changed_pixels);
        }
        Ok(())
    }
}

/// Mirrors the verdict into a file as `on` / `off`, the way a binary
/// home-automation state is toggled
pub struct StateFileAction {
    path: PathBuf,
    last: Option<bool>,
}

impl StateFileAction {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            last: None,
        }
    }
}

impl ActionSink for StateFileAction {
    fn apply(&mut self, detection: &Detection) -> Result<()> {
        let state = if detection.present { "on" } else { "off" };

        fs::write(&self.path, format!("{}\n", state))
            .with_context(|| format!("Failed to write state to {}", self.path.display()))?;

        if self.last != Some(detection.present) {
            tracing::info!("State {} turned {}", self.path.display(), state);
        }
        self.last = Some(detection.present);

        Ok(())
    }
}
