use super::types::{MASK_CHANGED, MASK_UNCHANGED};
use crate::error::{DetectError, Result};
use image::{GrayImage, Luma};
use ndarray::{ArrayView1, ArrayViewMut1, Zip};

/// Binarized change map between two normalized regions
#[derive(Debug, Clone)]
pub struct Difference {
    pub mask: GrayImage,
    pub changed_pixels: u64,
}

/// Mark every pixel whose absolute intensity delta strictly exceeds
/// `pixel_threshold`, and count them.
///
/// Both regions must have the same dimensions.
pub fn diff(a: &GrayImage, b: &GrayImage, pixel_threshold: u8) -> Result<Difference> {
    let _span = tracing::debug_span!("diff").entered();

    if a.dimensions() != b.dimensions() {
        return Err(DetectError::DimensionMismatch {
            left: a.dimensions(),
            right: b.dimensions(),
        });
    }

    let (width, height) = a.dimensions();
    let len = width as usize * height as usize;
    let left = ArrayView1::from(&a.as_raw()[..len]);
    let right = ArrayView1::from(&b.as_raw()[..len]);

    let mut mask = GrayImage::from_pixel(width, height, Luma([MASK_UNCHANGED]));
    let mut cells = ArrayViewMut1::from(&mut *mask);
    Zip::from(&mut cells)
        .and(left)
        .and(right)
        .for_each(|m, &l, &r| {
            if l.abs_diff(r) > pixel_threshold {
                *m = MASK_CHANGED;
            }
        });

    let changed_pixels = cells.iter().filter(|&&m| m == MASK_CHANGED).count() as u64;
    tracing::debug!(
        "{} of {} pixels changed by more than {}",
        changed_pixels,
        len,
        pixel_threshold
    );

    Ok(Difference {
        mask,
        changed_pixels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(width: u32, height: u32, value: u8) -> GrayImage {
        GrayImage::from_pixel(width, height, Luma([value]))
    }

    #[test]
    fn identical_regions_have_no_changes() {
        let region = GrayImage::from_fn(17, 9, |x, y| Luma([(x * 13 + y * 7) as u8]));
        let result = diff(&region, &region.clone(), 0).unwrap();

        assert_eq!(result.changed_pixels, 0);
        assert!(result.mask.pixels().all(|p| p[0] == MASK_UNCHANGED));
    }

    #[test]
    fn threshold_is_strict() {
        let a = flat(4, 1, 100);
        let mut b = a.clone();
        b.put_pixel(0, 0, Luma([130])); // delta 30
        b.put_pixel(1, 0, Luma([131])); // delta 31
        b.put_pixel(2, 0, Luma([69])); // delta 31, negative direction
        b.put_pixel(3, 0, Luma([70])); // delta 30

        let result = diff(&a, &b, 30).unwrap();
        assert_eq!(result.changed_pixels, 2);
        assert_eq!(
            result.mask.as_raw(),
            &vec![MASK_UNCHANGED, MASK_CHANGED, MASK_CHANGED, MASK_UNCHANGED]
        );
    }

    #[test]
    fn mask_is_two_valued_and_positioned() {
        let a = flat(5, 4, 10);
        let mut b = a.clone();
        b.put_pixel(3, 2, Luma([250]));
        b.put_pixel(0, 1, Luma([25]));

        let result = diff(&a, &b, 10).unwrap();
        assert_eq!(result.changed_pixels, 2);
        assert_eq!(result.mask.get_pixel(3, 2)[0], MASK_CHANGED);
        assert_eq!(result.mask.get_pixel(0, 1)[0], MASK_CHANGED);
        assert!(result
            .mask
            .pixels()
            .all(|p| p[0] == MASK_CHANGED || p[0] == MASK_UNCHANGED));
    }

    #[test]
    fn raising_pixel_threshold_never_adds_changes() {
        let a = GrayImage::from_fn(32, 32, |x, y| Luma([(x * 8) as u8 ^ (y * 3) as u8]));
        let b = GrayImage::from_fn(32, 32, |x, y| Luma([(y * 8) as u8 ^ (x * 5) as u8]));

        let mut previous = u64::MAX;
        for threshold in (0..=255u16).step_by(5) {
            let count = diff(&a, &b, threshold as u8).unwrap().changed_pixels;
            assert!(count <= previous, "threshold {threshold}");
            previous = count;
        }
        assert_eq!(diff(&a, &b, 255).unwrap().changed_pixels, 0);
    }

    #[test]
    fn trailing_buffer_bytes_are_ignored() {
        // from_raw accepts containers longer than width * height
        let a = GrayImage::from_raw(2, 2, vec![0, 0, 0, 0, 0]).unwrap();
        let b = GrayImage::from_raw(2, 2, vec![0, 200, 0, 0, 200]).unwrap();

        let result = diff(&a, &b, 30).unwrap();
        assert_eq!(result.changed_pixels, 1);
        assert_eq!(result.mask.dimensions(), (2, 2));
        assert_eq!(result.mask.get_pixel(1, 0)[0], MASK_CHANGED);
    }

    #[test]
    fn mismatched_sizes_are_an_error() {
        let err = diff(&flat(3, 3, 0), &flat(3, 4, 0), 30).unwrap_err();
        assert!(matches!(
            err,
            DetectError::DimensionMismatch {
                left: (3, 3),
                right: (3, 4)
            }
        ));
        assert!(err.to_string().contains("(3, 3)") && err.to_string().contains("(3, 4)"));
    }
}
