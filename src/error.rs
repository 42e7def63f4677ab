//! Error types for triple collocation.

/// Errors raised while validating inputs or reading configuration.
///
/// Numerically invalid intermediate results (a negative error variance, a vanishing covariance)
/// are not errors; they surface as missing values in [`crate::ErrorEstimate`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when the three collocated datasets do not share one shape.
    #[error("input datasets must have uniform dimensions, found {first:?}, {second:?} and {third:?}")]
    ShapeMismatch {
        first: (usize, usize),
        second: (usize, usize),
        third: (usize, usize),
    },

    /// Returned when an outlier filter flag is neither `0` nor `1`.
    #[error("filter flag must be 1 or 0, found {0}")]
    InvalidFlag(i64),

    /// Returned when a validity mask does not cover the values it describes.
    #[error("validity mask of shape {mask:?} does not match values of shape {values:?}")]
    MaskShape {
        values: (usize, usize),
        mask: (usize, usize),
    },

    #[error("failed to parse configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}
