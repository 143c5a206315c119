use super::{Diagnostic, DiagnosticsSink};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Reports the changed-pixel count through the log only
#[derive(Debug, Default)]
pub struct LogDiagnostics;

impl DiagnosticsSink for LogDiagnostics {
    fn emit(&mut self, diagnostic: &Diagnostic<'_>) -> Result<()> {
        tracing::info!(
            changed_pixels = diagnostic.changed_pixels,
            present = diagnostic.present,
            "Region {}x{}",
            diagnostic.region.width(),
            diagnostic.region.height()
        );
        Ok(())
    }
}

/// Writes the normalized region, and optionally the difference mask, to disk
/// so the detection area can be checked by eye. The format follows the file
/// extension.
pub struct ArtifactDiagnostics {
    region_path: PathBuf,
    mask_path: Option<PathBuf>,
}

impl ArtifactDiagnostics {
    pub fn new<P: AsRef<Path>>(region_path: P) -> Self {
        Self {
            region_path: region_path.as_ref().to_path_buf(),
            mask_path: None,
        }
    }

    pub fn with_mask<P: AsRef<Path>>(mut self, mask_path: P) -> Self {
        self.mask_path = Some(mask_path.as_ref().to_path_buf());
        self
    }
}

impl DiagnosticsSink for ArtifactDiagnostics {
    fn emit(&mut self, diagnostic: &Diagnostic<'_>) -> Result<()> {
        let _span = tracing::debug_span!("artifacts").entered();

        tracing::info!(
            changed_pixels = diagnostic.changed_pixels,
            present = diagnostic.present,
            "Saving region to {}",
            self.region_path.display()
        );

        diagnostic
            .region
            .save(&self.region_path)
            .with_context(|| format!("Failed to save region to {}", self.region_path.display()))?;

        if let Some(mask_path) = &self.mask_path {
            diagnostic
                .mask
                .save(mask_path)
                .with_context(|| format!("Failed to save mask to {}", mask_path.display()))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    #[test]
    fn writes_region_and_mask() {
        let dir = std::env::temp_dir();
        let region_path = dir.join(format!("keywatch-diag-{}-region.png", std::process::id()));
        let mask_path = dir.join(format!("keywatch-diag-{}-mask.png", std::process::id()));

        let region = GrayImage::from_pixel(6, 4, Luma([42]));
        let mask = GrayImage::from_pixel(6, 4, Luma([255]));
        let mut sink = ArtifactDiagnostics::new(&region_path).with_mask(&mask_path);
        sink.emit(&Diagnostic {
            region: &region,
            mask: &mask,
            changed_pixels: 24,
            present: false,
        })
        .unwrap();

        let saved = image::open(&region_path).unwrap().to_luma8();
        assert_eq!(saved, region);
        let saved = image::open(&mask_path).unwrap().to_luma8();
        assert_eq!(saved, mask);

        std::fs::remove_file(region_path).unwrap();
        std::fs::remove_file(mask_path).unwrap();
    }

    #[test]
    fn unwritable_path_is_an_error() {
        let region = GrayImage::new(2, 2);
        let mut sink = ArtifactDiagnostics::new("/nonexistent-dir/keywatch/region.png");
        let result = sink.emit(&Diagnostic {
            region: &region,
            mask: &region,
            changed_pixels: 0,
            present: false,
        });
        assert!(result.is_err());
    }
}
