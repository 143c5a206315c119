use crate::detection::Roi;

pub type Result<T> = std::result::Result<T, DetectError>;

/// Failures that prevent a verdict from being produced.
///
/// None of these are ever folded into an "absent" verdict: a caller that
/// gets an error has no information about the scene.
#[derive(Debug, thiserror::Error)]
pub enum DetectError {
    /// The image resource is missing, unreadable, or did not answer in time.
    #[error("image source {location} not available: {reason}")]
    SourceNotFound { location: String, reason: String },

    /// The resource was read but is not a valid image encoding.
    #[error("failed to decode image from {location}")]
    Decode {
        location: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The region is degenerate or does not fit inside the image.
    #[error("invalid region {roi} for {width}x{height} image: {reason}")]
    InvalidRegion {
        roi: Roi,
        width: u32,
        height: u32,
        reason: &'static str,
    },

    #[error("cannot compare {left:?} region against {right:?} region")]
    DimensionMismatch { left: (u32, u32), right: (u32, u32) },
}

impl DetectError {
    pub(crate) fn not_found(location: impl Into<String>, reason: impl ToString) -> Self {
        DetectError::SourceNotFound {
            location: location.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn decode(
        location: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        DetectError::Decode {
            location: location.into(),
            source: Box::new(source),
        }
    }
}
