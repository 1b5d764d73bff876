use thiserror::Error;

/// Failures local to a single reset request. None of these are fatal and none
/// of them mutate calibration state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResetError {
    #[error("No raw orientation received for this tracker yet")]
    NoRawOrientationAvailable,

    #[error("Reference orientation is not a unit quaternion")]
    InvalidReferenceOrientation,

    #[error("Unknown tracker: {0}")]
    UnknownTracker(String),
}

/// Result type for reset operations
pub type ResetResult<T> = Result<T, ResetError>;
