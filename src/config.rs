use crate::capture::{FileSource, ImageSource};
use crate::detection::types::{DEFAULT_PIXEL_THRESHOLD, DEFAULT_PRESENCE_THRESHOLD};
use crate::detection::{Detector, Resample, Roi, Thresholds};
use crate::error::Result;
use crate::output::{
    ActionSink, ArtifactDiagnostics, DiagnosticsSink, LogAction, LogDiagnostics, StateFileAction,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Everything a deployment supplies: where the frames come from, which part
/// of the scene to watch, and how sensitive to be.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DetectionConfig {
    /// Frame known to be token-free
    pub reference: SourceConfig,
    /// Frame to check
    pub candidate: SourceConfig,
    pub roi: Roi,
    #[serde(default = "default_pixel_threshold")]
    pub pixel_threshold: u8,
    #[serde(default = "default_presence_threshold")]
    pub presence_threshold: u64,
    #[serde(default)]
    pub resample: Resample,
    #[serde(default = "default_load_timeout_ms")]
    pub load_timeout_ms: u64,
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
    /// File mirroring the verdict as on/off
    #[serde(default)]
    pub state_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceConfig {
    File(PathBuf),
    Camera(u32),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiagnosticsConfig {
    /// Where to save the normalized candidate region
    #[serde(default)]
    pub artifact: Option<PathBuf>,
    /// Where to save the difference mask
    #[serde(default)]
    pub mask_artifact: Option<PathBuf>,
}

fn default_pixel_threshold() -> u8 {
    DEFAULT_PIXEL_THRESHOLD
}

fn default_presence_threshold() -> u64 {
    DEFAULT_PRESENCE_THRESHOLD
}

fn default_load_timeout_ms() -> u64 {
    5000
}

impl DetectionConfig {
    /// Config with default thresholds and no diagnostics
    pub fn new(reference: SourceConfig, candidate: SourceConfig, roi: Roi) -> Self {
        Self {
            reference,
            candidate,
            roi,
            pixel_threshold: DEFAULT_PIXEL_THRESHOLD,
            presence_threshold: DEFAULT_PRESENCE_THRESHOLD,
            resample: Resample::default(),
            load_timeout_ms: default_load_timeout_ms(),
            diagnostics: DiagnosticsConfig::default(),
            state_file: None,
        }
    }

    /// Read a JSON config file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        use anyhow::Context;

        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config {}", path.display()))
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            pixel_threshold: self.pixel_threshold,
            presence_threshold: self.presence_threshold,
        }
    }

    pub fn detector(&self) -> Detector {
        Detector::new(self.roi, self.thresholds()).with_resample(self.resample)
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }

    pub fn open_reference(&self) -> Result<Box<dyn ImageSource>> {
        self.reference.open(self.load_timeout())
    }

    pub fn open_candidate(&self) -> Result<Box<dyn ImageSource>> {
        self.candidate.open(self.load_timeout())
    }

    /// Artifact writer when an artifact path is configured, plain logging otherwise
    pub fn diagnostics_sink(&self) -> Box<dyn DiagnosticsSink> {
        match &self.diagnostics.artifact {
            Some(region_path) => {
                let sink = ArtifactDiagnostics::new(region_path);
                match &self.diagnostics.mask_artifact {
                    Some(mask_path) => Box::new(sink.with_mask(mask_path)),
                    None => Box::new(sink),
                }
            }
            None => Box::new(LogDiagnostics),
        }
    }

    pub fn action_sinks(&self) -> Vec<Box<dyn ActionSink>> {
        let mut sinks: Vec<Box<dyn ActionSink>> = vec![Box::new(LogAction)];
        if let Some(path) = &self.state_file {
            sinks.push(Box::new(StateFileAction::new(path)));
        }
        sinks
    }
}

impl SourceConfig {
    pub fn open(&self, timeout: Duration) -> Result<Box<dyn ImageSource>> {
        match self {
            SourceConfig::File(path) => Ok(Box::new(FileSource::new(path).with_timeout(timeout))),
            SourceConfig::Camera(index) => open_camera(*index, timeout),
        }
    }
}

#[cfg(feature = "camera")]
fn open_camera(index: u32, timeout: Duration) -> Result<Box<dyn ImageSource>> {
    Ok(Box::new(crate::capture::CameraSource::new(index, timeout)?))
}

#[cfg(not(feature = "camera"))]
fn open_camera(index: u32, _timeout: Duration) -> Result<Box<dyn ImageSource>> {
    Err(crate::error::DetectError::not_found(
        format!("camera {}", index),
        "built without the `camera` feature",
    ))
}
