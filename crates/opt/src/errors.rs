use thiserror::Error;

/// A result type for optimization errors
pub type Result<T> = std::result::Result<T, OptError>;

/// An error raised by the optimization driver or the acquisition layer
#[derive(Error, Debug)]
pub enum OptError {
    /// When the problem bounds are malformed
    #[error("Invalid bounds: {0}")]
    InvalidBounds(String),
    /// When the evaluation budget cannot fund a well-posed initial design
    #[error("Insufficient initial design: {0}")]
    InsufficientDesign(String),
    /// When a configuration value is rejected
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    /// When an acquisition step cannot produce a point
    #[error("Acquisition failure: {0}")]
    Acquisition(String),
    /// When a surrogate model operation fails
    #[error("Surrogate model error")]
    ModelError(#[from] sabo_model::ModelError),
}
