//! Command-line interface definitions and argument parsing

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Retail churn analytics: RFM features, churn model and reporting
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate a synthetic retail transaction table for demos
    Generate {
        /// Output path for the transaction CSV
        #[arg(short, long, default_value = "data/retail_data.csv")]
        output: PathBuf,

        /// Number of transaction records (split evenly between active and
        /// churned cities)
        #[arg(short = 'n', long, default_value_t = 1000)]
        records: usize,

        /// RNG seed for reproducible fixtures
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },

    /// Summarize total sales per product
    Etl {
        /// Path to the transaction CSV file
        #[arg(short, long, default_value = "data/retail_data.csv")]
        input: PathBuf,

        /// Output path for the processed summary
        #[arg(short, long, default_value = "data/processed_retail_data.csv")]
        output: PathBuf,
    },

    /// Monthly revenue, profit and month-over-month growth
    Analytics {
        /// Path to the transaction CSV file
        #[arg(short, long, default_value = "data/retail_data.csv")]
        input: PathBuf,

        /// Output path for the monthly analysis
        #[arg(short, long, default_value = "data/monthly_analysis.csv")]
        output: PathBuf,
    },

    /// Train the churn model and persist its artifacts
    Train {
        /// Path to the transaction CSV file
        #[arg(short, long, default_value = "data/retail_data.csv")]
        input: PathBuf,

        /// Directory for the model, scaler and column-list artifacts
        #[arg(short, long, default_value = "artifacts")]
        artifacts: PathBuf,

        /// Output path for the feature importance chart
        #[arg(long, default_value = "artifacts/feature_importance.png")]
        plot: PathBuf,

        /// Number of boosting rounds
        #[arg(long, default_value_t = 100)]
        n_estimators: usize,

        /// Shrinkage applied to each tree
        #[arg(long, default_value_t = 0.1)]
        learning_rate: f64,

        /// Maximum depth of each tree
        #[arg(long, default_value_t = 3)]
        max_depth: usize,

        /// Seed for the train/test split and the ensemble
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },

    /// Predict churn for a single customer profile
    Predict {
        /// Directory holding the trained artifacts
        #[arg(short, long, default_value = "artifacts")]
        artifacts: PathBuf,

        /// Number of orders
        #[arg(long, default_value_t = 160)]
        frequency: u32,

        /// Total spend
        #[arg(long, default_value_t = 80000.0)]
        monetary: f64,

        /// Number of distinct products bought
        #[arg(long, default_value_t = 5)]
        product_variety: u32,

        /// Average customer age
        #[arg(long, default_value_t = 40.0)]
        average_age: f64,

        /// Customer gender
        #[arg(long, default_value = "Male", value_parser = ["Male", "Female"])]
        gender: String,

        /// Share of discounted orders, in [0, 1]
        #[arg(long, default_value_t = 0.1)]
        discount_rate: f64,

        /// Number of distinct product categories bought
        #[arg(long, default_value_t = 3)]
        product_category_variety: u32,
    },

    /// Batch-score randomly generated customer profiles
    Score {
        /// Directory holding the trained artifacts
        #[arg(short, long, default_value = "artifacts")]
        artifacts: PathBuf,

        /// Number of profiles to generate and score
        #[arg(short = 'n', long, default_value_t = 100)]
        profiles: usize,

        /// Output path for the scored profiles
        #[arg(short, long, default_value = "test_predictions.csv")]
        output: PathBuf,

        /// RNG seed for profile generation
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },

    /// Print the business overview metrics
    Report {
        /// Path to the transaction CSV file
        #[arg(short, long, default_value = "data/retail_data.csv")]
        input: PathBuf,
    },

    /// Write a product-filtered view of the raw table
    Export {
        /// Path to the transaction CSV file
        #[arg(short, long, default_value = "data/retail_data.csv")]
        input: PathBuf,

        /// Output path for the filtered rows
        #[arg(short, long, default_value = "filtered_retail_data.csv")]
        output: PathBuf,

        /// Products to keep; all products when omitted
        #[arg(short, long, num_args = 0..)]
        products: Vec<String>,
    },
}

impl Cli {
    /// Validate cross-field constraints the derive macro cannot express.
    pub fn validate(&self) -> crate::Result<()> {
        match &self.command {
            Command::Generate { records, .. } => {
                if *records < 2 {
                    anyhow::bail!("at least 2 records are needed to cover both cohorts");
                }
            }
            Command::Predict { discount_rate, .. } => {
                if !(0.0..=1.0).contains(discount_rate) {
                    anyhow::bail!("discount rate must be in [0, 1]");
                }
            }
            Command::Score { profiles, .. } => {
                if *profiles == 0 {
                    anyhow::bail!("at least one profile is needed for scoring");
                }
            }
            _ => {}
        }
        Ok(())
    }
}
