//! Application-wide error types.

use thiserror::Error;

use crate::mediator::MediatorError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("logger error: {0}")]
    Logger(String),

    #[error("comms error: {0}")]
    Comms(String),

    #[error("backend setup error: {0}")]
    Backend(String),

    #[error(transparent)]
    Mediator(#[from] MediatorError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
