//! Error types of the processing algorithms

/// Result type alias
pub type Result<T> = std::result::Result<T, ProcessingError>;

/// Reasons why an algorithm could not produce a result
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProcessingError {
    /// The input cloud has no points, but the algorithm needs neighbours or a plane
    #[error("point cloud is empty")]
    EmptyInput,

    /// A plane normal of (nearly) zero length, or a similar geometric degeneracy
    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),

    /// Fewer points than the minimal sample size of the model
    #[error("insufficient points: need at least {required}, got {available}")]
    InsufficientPoints {
        /// Minimal number of points required
        required: usize,
        /// Number of points in the input
        available: usize,
    },

    /// Every RANSAC trial drew a degenerate sample
    #[error("no valid plane found after {iterations} trials")]
    NoPlaneFound {
        /// Number of trials that were run
        iterations: usize,
    },

    /// A parameter is outside of its valid range
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}
