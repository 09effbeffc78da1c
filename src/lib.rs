//! ChurnForge: retail churn analytics from transactional data
//!
//! This library derives RFM (Recency, Frequency, Monetary) features per
//! city from a flat transaction table, labels churn by recency, trains a
//! gradient-boosted classifier and scores customer profiles against the
//! persisted artifact bundle. Reporting helpers cover the business
//! overview, monthly analytics and per-product sales.

pub mod cli;
pub mod data;
pub mod features;
pub mod gen;
pub mod model;
pub mod report;
pub mod score;
pub mod viz;

// Re-export public items for easier access
pub use cli::{Cli, Command};
pub use data::{load_transactions, TableCache};
pub use features::{assign_churn_labels, build_city_features, CHURN_RECENCY_DAYS};
pub use model::{train_churn_model, ArtifactCache, BoostingParams, ModelArtifacts};
pub use score::{predict_profile, random_profiles, score_batch, CustomerProfile};

/// Common result type used throughout the application
pub type Result<T> = anyhow::Result<T>;
