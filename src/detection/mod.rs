mod decision;
mod difference;
mod normalize;
pub mod types;

pub use decision::decide;
pub use difference::{diff, Difference};
pub use normalize::{to_luma, Normalizer};
pub use types::{Detection, Resample, Roi, Thresholds};

use crate::error::Result;
use crate::output::{report, Diagnostic, DiagnosticsSink};
use image::DynamicImage;

/// Compares a candidate frame against a token-free reference inside one region
#[derive(Debug, Clone, Copy)]
pub struct Detector {
    roi: Roi,
    thresholds: Thresholds,
    resample: Resample,
}

impl Detector {
    pub fn new(roi: Roi, thresholds: Thresholds) -> Self {
        Self {
            roi,
            thresholds,
            resample: Resample::default(),
        }
    }

    pub fn with_resample(mut self, resample: Resample) -> Self {
        self.resample = resample;
        self
    }

    pub fn roi(&self) -> Roi {
        self.roi
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    /// Run the comparison without a diagnostics side channel
    pub fn detect(&self, reference: &DynamicImage, candidate: &DynamicImage) -> Result<Detection> {
        self.run(reference, candidate, None)
    }

    /// Run the comparison and hand the intermediate results to `diagnostics`.
    /// A failing sink is logged and otherwise ignored.
    pub fn detect_with(
        &self,
        reference: &DynamicImage,
        candidate: &DynamicImage,
        diagnostics: &mut dyn DiagnosticsSink,
    ) -> Result<Detection> {
        self.run(reference, candidate, Some(diagnostics))
    }

    fn run(
        &self,
        reference: &DynamicImage,
        candidate: &DynamicImage,
        diagnostics: Option<&mut dyn DiagnosticsSink>,
    ) -> Result<Detection> {
        let _span = tracing::debug_span!("detect", roi = %self.roi).entered();

        let normalizer = Normalizer::for_reference(reference, self.roi, self.resample)?;
        let reference_region = normalizer.normalize(reference, self.roi)?;
        let candidate_region = normalizer.normalize(candidate, self.roi)?;

        let Difference {
            mask,
            changed_pixels,
        } = diff(
            &candidate_region,
            &reference_region,
            self.thresholds.pixel_threshold,
        )?;
        let present = decide(changed_pixels, self.thresholds.presence_threshold);

        tracing::info!(
            "Changes detected: {} (presence above {}), present={}",
            changed_pixels,
            self.thresholds.presence_threshold,
            present
        );

        if let Some(sink) = diagnostics {
            report(
                sink,
                &Diagnostic {
                    region: &candidate_region,
                    mask: &mask,
                    changed_pixels,
                    present,
                },
            );
        }

        Ok(Detection {
            present,
            changed_pixels,
            thresholds: self.thresholds,
            region_size: normalizer.target_size(),
            mask,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn gray(width: u32, height: u32, value: u8) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_pixel(width, height, Luma([value])))
    }

    #[test]
    fn image_against_itself_is_absent() {
        let image = DynamicImage::ImageLuma8(GrayImage::from_fn(40, 30, |x, y| {
            Luma([(x * 5 + y * 3) as u8])
        }));

        for roi in [Roi::full(40, 30), Roi::new(1, 2, 3, 4), Roi::new(10, 0, 40, 30)] {
            let detection = Detector::new(roi, Thresholds::default())
                .detect(&image, &image)
                .unwrap();
            assert_eq!(detection.changed_pixels, 0);
            assert!(!detection.present);
            assert_eq!(detection.region_size, roi.dimensions());
        }
    }

    #[test]
    fn changes_outside_the_region_are_ignored() {
        let reference = gray(50, 50, 100);
        let candidate = DynamicImage::ImageLuma8(GrayImage::from_fn(50, 50, |x, _| {
            Luma([if x >= 25 { 255 } else { 100 }])
        }));

        let detector = Detector::new(Roi::new(0, 0, 25, 50), Thresholds::default());
        assert_eq!(detector.detect(&reference, &candidate).unwrap().changed_pixels, 0);

        let detector = Detector::new(Roi::new(20, 0, 30, 50), Thresholds::default());
        assert_eq!(
            detector.detect(&reference, &candidate).unwrap().changed_pixels,
            250
        );
    }
}
