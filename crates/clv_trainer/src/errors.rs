use clv_core::{ClvError, FitError};
use thiserror::Error;

/// Errors returned by the batch trainer.
#[derive(Debug, Error)]
pub enum TrainerError {
    #[error("frequency model fit failed: {0}")]
    Fit(#[from] FitError),

    #[error(transparent)]
    Clv(#[from] ClvError),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TrainerError>;
