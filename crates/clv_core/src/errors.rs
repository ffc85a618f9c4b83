//! Error types and non-fatal data warnings for the CLV engine

use crate::types::CustomerId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while summarizing, fitting or scoring
#[derive(Error, Debug)]
pub enum ClvError {
    /// Malformed or missing input. Not recoverable, the run must abort.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A model could not be fitted
    #[error("Fit failed: {0}")]
    Fit(#[from] FitError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Serialized model does not match its envelope
    #[error("Model integrity check failed: {0}")]
    ModelIntegrity(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Which model a fit failure refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Frequency,
    Monetary,
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelKind::Frequency => write!(f, "frequency model"),
            ModelKind::Monetary => write!(f, "monetary model"),
        }
    }
}

/// Structured reasons a fit returns no model.
///
/// A monetary-model `FitError` is recoverable: the scorer degrades to
/// frequency-only scores. A frequency-model `FitError` aborts scoring.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitError {
    #[error("{model}: no usable customers in the fitting population")]
    EmptyPopulation { model: ModelKind },

    #[error("{model}: {repeat_customers} customers with repeat purchases, need at least {required}")]
    InsufficientVariance {
        model: ModelKind,
        repeat_customers: usize,
        required: usize,
    },

    #[error("{model}: optimizer did not converge after {iterations} iterations")]
    NonConvergence { model: ModelKind, iterations: usize },

    #[error("{model}: invalid fitted parameters: {reason}")]
    InvalidParameters { model: ModelKind, reason: String },
}

impl FitError {
    /// Model the failure belongs to
    pub fn model(&self) -> ModelKind {
        match self {
            FitError::EmptyPopulation { model }
            | FitError::InsufficientVariance { model, .. }
            | FitError::NonConvergence { model, .. }
            | FitError::InvalidParameters { model, .. } => *model,
        }
    }
}

/// Non-fatal signal about degenerate input.
///
/// Rows that trigger a warning are excluded from fitting input; the run
/// continues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataWarning {
    /// Customer whose first purchase falls on the snapshot period (T = 0)
    ZeroObservationLength { customer_id: CustomerId },
    /// No customer in the population has a repeat purchase
    AllZeroFrequency { customers: usize },
    /// Monetary fit failed; scores are frequency-only
    MonetaryModelUnavailable { reason: String },
}

impl std::fmt::Display for DataWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataWarning::ZeroObservationLength { customer_id } => {
                write!(f, "customer {customer_id} has zero observation length and is excluded from fitting")
            }
            DataWarning::AllZeroFrequency { customers } => {
                write!(f, "all {customers} customers have frequency 0")
            }
            DataWarning::MonetaryModelUnavailable { reason } => {
                write!(f, "monetary model unavailable, scoring frequency-only: {reason}")
            }
        }
    }
}

/// Result type for CLV operations
pub type Result<T> = std::result::Result<T, ClvError>;
