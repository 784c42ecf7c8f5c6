//! Error types for the smoke driver.

use gradprobe::TensorError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SmokeError {
    #[error(transparent)]
    Tensor(#[from] TensorError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),
}
