//! Churn scoring against the persisted artifact bundle.
//!
//! A single profile is encoded the way the prediction form did it, with the
//! gender dummy set directly; batches go through the same one-hot path the
//! trainer uses. Either way the input is reconciled against the trained
//! column list before scaling and scoring.

use ndarray::Array1;
use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::features::{self, GENDER};
use crate::model::ModelArtifacts;

/// Column carrying the scored probability in batch output
pub const PROBABILITY_COLUMN: &str = "Churn_Probability";

/// One customer profile in feature space, as entered in the prediction form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerProfile {
    pub frequency: u32,
    pub monetary: f64,
    pub product_variety: u32,
    pub average_age: f64,
    pub gender: String,
    pub discount_rate: f64,
    pub product_category_variety: u32,
}

/// Outcome of scoring one profile.
#[derive(Debug, Clone, PartialEq)]
pub struct ChurnPrediction {
    /// True when the churn probability crosses 0.5
    pub churn: bool,
    pub churn_probability: f64,
}

impl ChurnPrediction {
    pub fn stay_probability(&self) -> f64 {
        1.0 - self.churn_probability
    }
}

/// Score a single profile against the trained bundle.
pub fn predict_profile(
    artifacts: &ModelArtifacts,
    profile: &CustomerProfile,
) -> crate::Result<ChurnPrediction> {
    let frame = df!(
        "Frequency" => &[f64::from(profile.frequency)],
        "Monetary" => &[profile.monetary],
        "ProductVariety" => &[f64::from(profile.product_variety)],
        "AverageAge" => &[profile.average_age],
        "DiscountRate" => &[profile.discount_rate],
        "ProductCategoryVariety" => &[f64::from(profile.product_category_variety)],
        "Gender_Male" => &[if profile.gender == "Male" { 1.0 } else { 0.0 }],
    )?;

    let probabilities = score_frame(artifacts, &frame)?;
    let churn_probability = probabilities[0];
    Ok(ChurnPrediction {
        churn: churn_probability >= 0.5,
        churn_probability,
    })
}

/// Reconcile, scale and score an already numeric feature frame.
fn score_frame(artifacts: &ModelArtifacts, frame: &DataFrame) -> crate::Result<Array1<f64>> {
    let aligned = features::reindex_to_columns(frame, &artifacts.columns)?;
    let x = features::to_matrix(&aligned, &artifacts.columns)?;
    let scaled = artifacts.scaler.transform(&x)?;
    artifacts.model.predict_proba(&scaled)
}

/// Generate `count` random customer profiles over the documented ranges.
pub fn random_profiles(count: usize, seed: u64) -> Vec<CustomerProfile> {
    let genders = ["Male", "Female"];
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..count)
        .map(|_| CustomerProfile {
            frequency: rng.gen_range(10..250),
            monetary: (rng.gen_range(1000.0..120000.0) * 100.0f64).round() / 100.0,
            product_variety: rng.gen_range(1..9),
            average_age: f64::from(rng.gen_range(18..75)),
            gender: (*genders.choose(&mut rng).unwrap_or(&"Male")).to_string(),
            discount_rate: (rng.gen_range(0.0..1.0) * 100.0f64).round() / 100.0,
            product_category_variety: rng.gen_range(1..4),
        })
        .collect()
}

/// Result of scoring a batch of profiles.
#[derive(Debug)]
pub struct BatchOutcome {
    /// Input profiles with a [`PROBABILITY_COLUMN`] appended
    pub scored: DataFrame,
    pub highest: (CustomerProfile, f64),
    pub lowest: (CustomerProfile, f64),
}

/// Score a batch of profiles, returning the annotated frame and the
/// highest- and lowest-risk profiles.
pub fn score_batch(
    artifacts: &ModelArtifacts,
    profiles: &[CustomerProfile],
) -> crate::Result<BatchOutcome> {
    if profiles.is_empty() {
        anyhow::bail!("no profiles to score");
    }

    let frame = profile_frame(profiles)?;
    let encoded = features::encode_gender(&frame)?;
    let probabilities = score_frame(artifacts, &encoded)?;

    let mut scored = frame;
    scored.with_column(Series::new(
        PROBABILITY_COLUMN,
        probabilities.iter().copied().collect::<Vec<f64>>(),
    ))?;

    let mut high = 0;
    let mut low = 0;
    for (i, p) in probabilities.iter().enumerate() {
        if *p > probabilities[high] {
            high = i;
        }
        if *p < probabilities[low] {
            low = i;
        }
    }

    info!(profiles = profiles.len(), "batch scored");
    Ok(BatchOutcome {
        scored,
        highest: (profiles[high].clone(), probabilities[high]),
        lowest: (profiles[low].clone(), probabilities[low]),
    })
}

fn profile_frame(profiles: &[CustomerProfile]) -> crate::Result<DataFrame> {
    let frame = df!(
        "Frequency" => profiles.iter().map(|p| f64::from(p.frequency)).collect::<Vec<_>>(),
        "Monetary" => profiles.iter().map(|p| p.monetary).collect::<Vec<_>>(),
        "ProductVariety" => profiles.iter().map(|p| f64::from(p.product_variety)).collect::<Vec<_>>(),
        "AverageAge" => profiles.iter().map(|p| p.average_age).collect::<Vec<_>>(),
        GENDER => profiles.iter().map(|p| p.gender.clone()).collect::<Vec<_>>(),
        "DiscountRate" => profiles.iter().map(|p| p.discount_rate).collect::<Vec<_>>(),
        "ProductCategoryVariety" => profiles.iter().map(|p| f64::from(p.product_category_variety)).collect::<Vec<_>>(),
    )?;
    Ok(frame)
}
