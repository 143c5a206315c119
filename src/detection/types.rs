use crate::error::{DetectError, Result};
use image::imageops::FilterType;
use image::GrayImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Mask value for a pixel whose intensity moved past the pixel threshold
pub const MASK_CHANGED: u8 = u8::MAX;
/// Mask value for a pixel considered unchanged
pub const MASK_UNCHANGED: u8 = 0;

pub const DEFAULT_PIXEL_THRESHOLD: u8 = 30;
pub const DEFAULT_PRESENCE_THRESHOLD: u64 = 100;

/// Axis-aligned rectangle in full-image coordinates, `x2`/`y2` exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Roi {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl Roi {
    pub fn new(x1: u32, y1: u32, x2: u32, y2: u32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// The whole frame of a `width` x `height` image
    pub fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    pub fn width(&self) -> u32 {
        self.x2.saturating_sub(self.x1)
    }

    pub fn height(&self) -> u32 {
        self.y2.saturating_sub(self.y1)
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    /// Reject degenerate rectangles and rectangles that leave the image.
    /// Nothing is ever clamped.
    pub fn check(&self, width: u32, height: u32) -> Result<()> {
        let reason = if self.x1 >= self.x2 {
            Some("x1 must be less than x2")
        } else if self.y1 >= self.y2 {
            Some("y1 must be less than y2")
        } else if self.x2 > width {
            Some("extends past the right edge")
        } else if self.y2 > height {
            Some("extends past the bottom edge")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(DetectError::InvalidRegion {
                roi: *self,
                width,
                height,
                reason,
            }),
            None => Ok(()),
        }
    }
}

impl fmt::Display for Roi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})-({},{})", self.x1, self.y1, self.x2, self.y2)
    }
}

/// Parses `x1,y1,x2,y2`
impl FromStr for Roi {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let coords = s
            .split(',')
            .map(|part| part.trim().parse::<u32>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|err| format!("bad coordinate in {:?}: {}", s, err))?;

        match coords.as_slice() {
            &[x1, y1, x2, y2] => Ok(Roi::new(x1, y1, x2, y2)),
            _ => Err(format!(
                "expected four coordinates x1,y1,x2,y2, got {}",
                coords.len()
            )),
        }
    }
}

/// The two sensitivity knobs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    /// Minimum intensity delta (exclusive) for a pixel to count as changed
    pub pixel_threshold: u8,
    /// Minimum changed-pixel count (exclusive) for a presence verdict
    pub presence_threshold: u64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            pixel_threshold: DEFAULT_PIXEL_THRESHOLD,
            presence_threshold: DEFAULT_PRESENCE_THRESHOLD,
        }
    }
}

/// Resampling filter used when the candidate region has to be rescaled
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum Resample {
    Nearest,
    Triangle,
    #[default]
    CatmullRom,
    Lanczos3,
}

impl From<Resample> for FilterType {
    fn from(resample: Resample) -> Self {
        match resample {
            Resample::Nearest => FilterType::Nearest,
            Resample::Triangle => FilterType::Triangle,
            Resample::CatmullRom => FilterType::CatmullRom,
            Resample::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Outcome of one comparison
#[derive(Debug, Clone)]
pub struct Detection {
    /// Presence verdict
    pub present: bool,
    pub changed_pixels: u64,
    pub thresholds: Thresholds,
    /// Size both regions were normalized to before comparing
    pub region_size: (u32, u32),
    /// 0/255 difference mask at `region_size`
    pub mask: GrayImage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_frame_is_valid() {
        assert!(Roi::full(185, 190).check(185, 190).is_ok());
    }

    #[test]
    fn degenerate_and_oversized_regions_are_rejected() {
        let cases = [
            Roi::new(10, 10, 10, 20),
            Roi::new(10, 20, 30, 20),
            Roi::new(20, 10, 10, 30),
            Roi::new(0, 0, 186, 190),
            Roi::new(0, 0, 185, 191),
        ];

        for roi in cases {
            let err = roi.check(185, 190).unwrap_err();
            assert!(
                matches!(err, DetectError::InvalidRegion { width: 185, height: 190, .. }),
                "{roi}: {err:?}"
            );
        }
    }

    #[test]
    fn parses_coordinates() {
        assert_eq!(
            "1460, 280,1645,470".parse::<Roi>().unwrap(),
            Roi::new(1460, 280, 1645, 470)
        );
        assert!("1,2,3".parse::<Roi>().is_err());
        assert!("1,2,3,x".parse::<Roi>().is_err());
    }

    #[test]
    fn deserializes_from_json() {
        let roi: Roi = serde_json::from_str(r#"{"x1":1,"y1":2,"x2":3,"y2":4}"#).unwrap();
        assert_eq!(roi, Roi::new(1, 2, 3, 4));
        assert_eq!(roi.dimensions(), (2, 2));
    }
}
