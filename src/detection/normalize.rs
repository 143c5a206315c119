use super::types::{Resample, Roi};
use crate::error::Result;
use image::{imageops, DynamicImage, GenericImageView, GrayImage, Luma, RgbImage};

/// Brings a region of a frame to a fixed size and to single-channel intensity
pub struct Normalizer {
    target_width: u32,
    target_height: u32,
    resample: Resample,
}

impl Normalizer {
    /// Size the normalizer after the reference frame's own region, so every
    /// candidate is rescaled to match the reference.
    pub fn for_reference(reference: &DynamicImage, roi: Roi, resample: Resample) -> Result<Self> {
        let (width, height) = reference.dimensions();
        roi.check(width, height)?;

        Ok(Self {
            target_width: roi.width(),
            target_height: roi.height(),
            resample,
        })
    }

    pub fn target_size(&self) -> (u32, u32) {
        (self.target_width, self.target_height)
    }

    /// Crop `image` to `roi`, resize to the target size, convert to luma
    ///
    /// Steps:
    /// 1. Validate the region against this image's bounds
    /// 2. Crop
    /// 3. Resize (skipped when the crop already has the target size)
    /// 4. BT.601 luma
    pub fn normalize(&self, image: &DynamicImage, roi: Roi) -> Result<GrayImage> {
        let _span = tracing::debug_span!("normalize").entered();

        let (width, height) = image.dimensions();
        roi.check(width, height)?;

        let crop = image
            .crop_imm(roi.x1, roi.y1, roi.width(), roi.height())
            .to_rgb8();

        let resized = if crop.dimensions() != self.target_size() {
            tracing::debug!(
                "Resizing {}x{} region to {}x{}",
                crop.width(),
                crop.height(),
                self.target_width,
                self.target_height
            );
            imageops::resize(
                &crop,
                self.target_width,
                self.target_height,
                self.resample.into(),
            )
        } else {
            crop
        };

        Ok(to_luma(&resized))
    }
}

/// ITU-R BT.601 luma, rounded to nearest
pub fn to_luma(image: &RgbImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let pixel = image.get_pixel(x, y);
        Luma([luma(pixel[0], pixel[1], pixel[2])])
    })
}

fn luma(r: u8, g: u8, b: u8) -> u8 {
    let weighted = 299 * r as u32 + 587 * g as u32 + 114 * b as u32;
    ((weighted + 500) / 1000) as u8
}
