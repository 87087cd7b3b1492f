use thiserror::Error;

/// A result type for surrogate model operations
pub type Result<T> = std::result::Result<T, ModelError>;

/// An error raised when fitting or querying a surrogate model
#[derive(Error, Debug)]
pub enum ModelError {
    /// When the interpolation/regression system is numerically degenerate
    /// (e.g. duplicate or collinear training points)
    #[error("Singular fit: {0}")]
    SingularFit(String),
    /// When linear algebra computation fails
    #[error(transparent)]
    LinalgError(#[from] linfa_linalg::LinalgError),
    /// When input data is malformed
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),
    /// When the model is queried before a first successful fit
    #[error("Model is not fitted: {0}")]
    NotFitted(String),
    /// When an invalid value is encountered
    #[error("Invalid value: {0}")]
    InvalidValue(String),
}
