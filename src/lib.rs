//! Presence detection for a visual token (a set of keys) by comparing a
//! live frame against a token-free reference inside a fixed region.
//!
//! Pipeline: load both frames, normalize the region of each to the same
//! size and to intensity, threshold the per-pixel difference, and decide
//! on the changed-pixel count.

pub mod capture;
pub mod config;
pub mod detection;
pub mod error;
pub mod output;

pub use capture::{FileSource, ImageSource, MemorySource};
pub use config::{DetectionConfig, DiagnosticsConfig, SourceConfig};
pub use detection::{Detection, Detector, Resample, Roi, Thresholds};
pub use error::{DetectError, Result};
pub use output::{ActionSink, Diagnostic, DiagnosticsSink};

/// Load both frames and compare them.
///
/// Any loading or region error is returned as such; it never becomes an
/// "absent" verdict.
pub fn detect_presence(
    reference: &mut dyn ImageSource,
    candidate: &mut dyn ImageSource,
    detector: &Detector,
    diagnostics: Option<&mut dyn DiagnosticsSink>,
) -> Result<Detection> {
    tracing::debug!(
        "Comparing {} against reference {}",
        candidate.describe(),
        reference.describe()
    );

    let reference = reference.load()?;
    let candidate = candidate.load()?;

    match diagnostics {
        Some(sink) => detector.detect_with(&reference, &candidate, sink),
        None => detector.detect(&reference, &candidate),
    }
}

/// Run one detection as described by `config`, including its diagnostics sink
pub fn detect_with_config(config: &DetectionConfig) -> Result<Detection> {
    let mut reference = config.open_reference()?;
    let mut candidate = config.open_candidate()?;
    let mut diagnostics = config.diagnostics_sink();
    let sink: &mut dyn DiagnosticsSink = diagnostics.as_mut();

    detect_presence(
        reference.as_mut(),
        candidate.as_mut(),
        &config.detector(),
        Some(sink),
    )
}
