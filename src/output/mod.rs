mod action;
mod diagnostics;

pub use action::{LogAction, StateFileAction};
pub use diagnostics::{ArtifactDiagnostics, LogDiagnostics};

use crate::detection::Detection;
use anyhow::Result;
use image::GrayImage;

/// Trait for whatever acts on a verdict (home-automation toggle, notifier, ...)
pub trait ActionSink {
    fn apply(&mut self, detection: &Detection) -> Result<()>;
}

/// Intermediate results offered to a diagnostics sink for threshold tuning
pub struct Diagnostic<'a> {
    /// Normalized candidate region
    pub region: &'a GrayImage,
    pub mask: &'a GrayImage,
    pub changed_pixels: u64,
    pub present: bool,
}

/// Side channel for calibration artifacts. Never load-bearing.
pub trait DiagnosticsSink {
    fn emit(&mut self, diagnostic: &Diagnostic<'_>) -> Result<()>;
}

/// Hand `diagnostic` to `sink`, downgrading any failure to a warning
pub fn report(sink: &mut dyn DiagnosticsSink, diagnostic: &Diagnostic<'_>) {
    if let Err(err) = sink.emit(diagnostic) {
        tracing::warn!("Diagnostics failed, detection unaffected: {:#}", err);
    }
}
