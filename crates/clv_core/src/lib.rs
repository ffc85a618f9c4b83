//! Customer lifetime value engine
//!
//! Turns raw order histories into per-customer RFM summaries, fits a BG/NBD
//! purchase-frequency model and a Gamma-Gamma spend model, and ranks customers
//! by expected value over a horizon.
//!
//! Modules:
//! - `summary`: Transaction log to frequency / recency / T / monetary rows
//! - `preprocess`: Monetary fitting subset and quantile capping
//! - `frequency`: BG/NBD fit and conditional predictions
//! - `monetary`: Gamma-Gamma fit and expected order value
//! - `scorer`: Expected value per customer and tier assignment
//! - `churn`: Churn labels and pre-cutoff features
//! - `serialization`: Canonical JSON model blobs with BLAKE3 hashes
//! - `config`: TOML configuration with validation
//! - `simulation`: Seeded synthetic populations for tests and demos

pub mod churn;
pub mod config;
pub mod errors;
pub mod frequency;
pub mod monetary;
pub mod optimizer;
pub mod preprocess;
pub mod scorer;
pub mod serialization;
pub mod simulation;
pub mod special;
pub mod summary;
pub mod types;

pub use churn::{build_churn_dataset, build_churn_features, label_churn, ChurnExample, ChurnFeatures, ChurnLabel, ChurnLabels};
pub use config::ClvConfig;
pub use errors::{ClvError, DataWarning, FitError, ModelKind, Result};
pub use frequency::{BetaGeoParams, FitDiagnostics, FrequencyFitOptions, FrequencyModel};
pub use monetary::{GammaGammaParams, MonetaryFitOptions, MonetaryModel};
pub use preprocess::{cap_monetary_values, monetary_fitting_population};
pub use scorer::{assign_tiers, score, CustomerScore, ScoreBasis, ScoreTable, ValueScorer};
pub use serialization::{decode_model, encode_model, load_model, model_hash_hex, save_model, ModelBlob};
pub use summary::{summarize, SummaryOptions, SummaryTable};
pub use types::{CustomerId, CustomerSummary, Fitted, TimeUnit, Transaction};

/// Crate version string recorded alongside trained models
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
