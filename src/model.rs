//! Churn classifier: standard scaling, stratified splitting, gradient-boosted
//! trees on the logistic loss, and artifact persistence.

use std::fs;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use anyhow::Context;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use polars::prelude::DataFrame;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::features;

/// Share of labeled cities held out for evaluation
pub const TEST_FRACTION: f64 = 0.3;

/// Artifact file names within the artifact directory
pub const MODEL_FILE: &str = "churn_model.json";
pub const SCALER_FILE: &str = "scaler.json";
pub const COLUMNS_FILE: &str = "model_columns.txt";

/// Per-column standardization fitted on training data only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    pub means: Vec<f64>,
    pub stds: Vec<f64>,
}

impl StandardScaler {
    /// Fit column means and population standard deviations.
    /// Zero-variance columns get a unit scale so transforms stay finite.
    pub fn fit(data: &Array2<f64>) -> Self {
        let n = data.nrows().max(1) as f64;
        let mut means = Vec::with_capacity(data.ncols());
        let mut stds = Vec::with_capacity(data.ncols());
        for column in data.columns() {
            let mean = column.sum() / n;
            let variance = column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            let std = variance.sqrt();
            means.push(mean);
            stds.push(if std > 0.0 { std } else { 1.0 });
        }
        StandardScaler { means, stds }
    }

    /// Center and scale a matrix with the fitted parameters.
    pub fn transform(&self, data: &Array2<f64>) -> crate::Result<Array2<f64>> {
        if data.ncols() != self.means.len() {
            anyhow::bail!(
                "scaler was fitted on {} columns but received {}",
                self.means.len(),
                data.ncols()
            );
        }
        Ok(Array2::from_shape_fn(data.dim(), |(i, j)| {
            (data[[i, j]] - self.means[j]) / self.stds[j]
        }))
    }
}

/// Train/test partitions produced by [`stratified_split`].
#[derive(Debug)]
pub struct TrainTestSplit {
    pub x_train: Array2<f64>,
    pub y_train: Array1<f64>,
    pub x_test: Array2<f64>,
    pub y_test: Array1<f64>,
}

/// Split rows into train and test partitions, stratified by label.
///
/// Each class is shuffled with a seeded RNG and contributes its share of
/// test rows, so class proportions carry over to both partitions. Every
/// class needs at least two rows so both sides see it.
///
/// # Arguments
/// * `x` - Feature matrix
/// * `y` - Binary labels (0 or 1) aligned with the rows of `x`
/// * `test_fraction` - Share of each class held out, in (0, 1)
/// * `seed` - RNG seed for the per-class shuffle
pub fn stratified_split(
    x: &Array2<f64>,
    y: &Array1<f64>,
    test_fraction: f64,
    seed: u64,
) -> crate::Result<TrainTestSplit> {
    if x.nrows() != y.len() {
        anyhow::bail!(
            "feature rows ({}) and labels ({}) disagree",
            x.nrows(),
            y.len()
        );
    }
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        anyhow::bail!("test fraction must be in (0, 1)");
    }

    let mut class_indices: [Vec<usize>; 2] = [Vec::new(), Vec::new()];
    for (i, &label) in y.iter().enumerate() {
        class_indices[usize::from(label > 0.5)].push(i);
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut train_idx = Vec::new();
    let mut test_idx = Vec::new();
    for indices in class_indices.iter_mut() {
        if indices.len() < 2 {
            anyhow::bail!(
                "stratified split needs at least 2 rows per churn class, found {}",
                indices.len()
            );
        }
        indices.shuffle(&mut rng);
        let n_test = ((indices.len() as f64 * test_fraction).round() as usize)
            .clamp(1, indices.len() - 1);
        test_idx.extend_from_slice(&indices[..n_test]);
        train_idx.extend_from_slice(&indices[n_test..]);
    }
    train_idx.sort_unstable();
    test_idx.sort_unstable();

    Ok(TrainTestSplit {
        x_train: x.select(Axis(0), &train_idx),
        y_train: y.select(Axis(0), &train_idx),
        x_test: x.select(Axis(0), &test_idx),
        y_test: y.select(Axis(0), &test_idx),
    })
}

/// Hyperparameters of the boosted ensemble, defaulted to the stock
/// gradient-boosting classifier settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoostingParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub subsample: f64,
    pub seed: u64,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_split: 2,
            min_samples_leaf: 1,
            subsample: 1.0,
            seed: 42,
        }
    }
}

/// Binary tree node; a leaf when `feature` is `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TreeNode {
    feature: Option<usize>,
    threshold: f64,
    value: f64,
    left: Option<Box<TreeNode>>,
    right: Option<Box<TreeNode>>,
}

impl TreeNode {
    fn leaf(value: f64) -> Self {
        TreeNode {
            feature: None,
            threshold: 0.0,
            value,
            left: None,
            right: None,
        }
    }

    fn output(&self, row: ArrayView1<f64>) -> f64 {
        let mut node = self;
        loop {
            match (node.feature, &node.left, &node.right) {
                (Some(feature), Some(left), Some(right)) => {
                    node = if row[feature] <= node.threshold {
                        left
                    } else {
                        right
                    };
                }
                _ => return node.value,
            }
        }
    }
}

/// Gradient-boosted classifier over regression trees.
///
/// Trees are fitted to logistic residuals with squared-error splits and
/// Newton-step leaf values, then combined additively under shrinkage. The
/// decision function starts from the log-odds of the training base rate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostedClassifier {
    pub params: BoostingParams,
    init_score: f64,
    trees: Vec<TreeNode>,
    /// Normalized split-gain importance per feature
    pub feature_importances: Vec<f64>,
    pub n_features: usize,
}

impl GradientBoostedClassifier {
    /// Raw additive scores before the sigmoid.
    pub fn decision_function(&self, x: &Array2<f64>) -> crate::Result<Array1<f64>> {
        if x.ncols() != self.n_features {
            anyhow::bail!(
                "model expects {} features, got {}",
                self.n_features,
                x.ncols()
            );
        }
        let mut raw = Array1::from_elem(x.nrows(), self.init_score);
        for tree in &self.trees {
            for (i, row) in x.outer_iter().enumerate() {
                raw[i] += self.params.learning_rate * tree.output(row);
            }
        }
        Ok(raw)
    }

    /// Churn probability per row.
    pub fn predict_proba(&self, x: &Array2<f64>) -> crate::Result<Array1<f64>> {
        Ok(self.decision_function(x)?.mapv(sigmoid))
    }

    /// Hard 0/1 class per row at the 0.5 threshold.
    pub fn predict(&self, x: &Array2<f64>) -> crate::Result<Array1<f64>> {
        Ok(self
            .predict_proba(x)?
            .mapv(|p| if p >= 0.5 { 1.0 } else { 0.0 }))
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Fit a gradient-boosted classifier on binary labels.
///
/// # Arguments
/// * `x` - Feature matrix, typically standardized
/// * `y` - Labels, 0 or 1, aligned with the rows of `x`
/// * `params` - Ensemble hyperparameters
///
/// # Returns
/// * Fitted [`GradientBoostedClassifier`] with normalized feature importances
pub fn fit_classifier(
    x: &Array2<f64>,
    y: &Array1<f64>,
    params: &BoostingParams,
) -> crate::Result<GradientBoostedClassifier> {
    if x.nrows() == 0 || x.ncols() == 0 {
        anyhow::bail!("training data is empty");
    }
    if x.nrows() != y.len() {
        anyhow::bail!(
            "feature rows ({}) and labels ({}) disagree",
            x.nrows(),
            y.len()
        );
    }
    if y.iter().any(|v| *v != 0.0 && *v != 1.0) {
        anyhow::bail!("labels must be 0 or 1");
    }
    if params.n_estimators == 0 {
        anyhow::bail!("n_estimators must be positive");
    }
    if params.learning_rate <= 0.0 {
        anyhow::bail!("learning rate must be positive");
    }
    if params.max_depth == 0 {
        anyhow::bail!("max depth must be at least 1");
    }
    if !(params.subsample > 0.0 && params.subsample <= 1.0) {
        anyhow::bail!("subsample must be in (0, 1]");
    }

    let n = x.nrows();
    let positives = y.iter().filter(|v| **v > 0.5).count();
    if positives == 0 || positives == n {
        anyhow::bail!("training labels contain a single class; churn and non-churn rows are both required");
    }
    let prior = positives as f64 / n as f64;
    let init_score = (prior / (1.0 - prior)).ln();

    let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
    let mut raw = vec![init_score; n];
    let mut trees = Vec::with_capacity(params.n_estimators);
    let mut importances = vec![0.0f64; x.ncols()];
    let all_rows: Vec<usize> = (0..n).collect();

    for _ in 0..params.n_estimators {
        let mut residuals = Vec::with_capacity(n);
        let mut hessians = Vec::with_capacity(n);
        for i in 0..n {
            let p = sigmoid(raw[i]);
            residuals.push(y[i] - p);
            hessians.push(p * (1.0 - p));
        }

        let sample = if params.subsample < 1.0 {
            let mut rows = all_rows.clone();
            rows.shuffle(&mut rng);
            rows.truncate(((n as f64 * params.subsample).ceil() as usize).max(1));
            rows
        } else {
            all_rows.clone()
        };

        let tree = grow_tree(x, &residuals, &hessians, &sample, 0, params, &mut importances);
        for i in 0..n {
            raw[i] += params.learning_rate * tree.output(x.row(i));
        }
        trees.push(tree);
    }

    let total: f64 = importances.iter().sum();
    if total > 0.0 {
        for value in importances.iter_mut() {
            *value /= total;
        }
    }

    info!(
        trees = trees.len(),
        features = x.ncols(),
        "boosted classifier fitted"
    );
    Ok(GradientBoostedClassifier {
        params: params.clone(),
        init_score,
        trees,
        feature_importances: importances,
        n_features: x.ncols(),
    })
}

fn newton_leaf(residuals: &[f64], hessians: &[f64], indices: &[usize]) -> f64 {
    let sum_residuals: f64 = indices.iter().map(|&i| residuals[i]).sum();
    let sum_hessians: f64 = indices.iter().map(|&i| hessians[i]).sum();
    if sum_hessians.abs() < 1e-10 {
        0.0
    } else {
        sum_residuals / sum_hessians
    }
}

fn grow_tree(
    x: &Array2<f64>,
    residuals: &[f64],
    hessians: &[f64],
    indices: &[usize],
    depth: usize,
    params: &BoostingParams,
    importances: &mut [f64],
) -> TreeNode {
    if depth >= params.max_depth || indices.len() < params.min_samples_split {
        return TreeNode::leaf(newton_leaf(residuals, hessians, indices));
    }

    match best_split(x, residuals, indices, params.min_samples_leaf) {
        None => TreeNode::leaf(newton_leaf(residuals, hessians, indices)),
        Some((feature, threshold, gain)) => {
            importances[feature] += gain;
            let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
                .iter()
                .partition(|&&i| x[[i, feature]] <= threshold);
            let left = grow_tree(x, residuals, hessians, &left_idx, depth + 1, params, importances);
            let right = grow_tree(x, residuals, hessians, &right_idx, depth + 1, params, importances);
            TreeNode {
                feature: Some(feature),
                threshold,
                value: 0.0,
                left: Some(Box::new(left)),
                right: Some(Box::new(right)),
            }
        }
    }
}

/// Best (feature, threshold, gain) by squared-error reduction on the
/// residuals, or `None` when no split improves on the parent.
fn best_split(
    x: &Array2<f64>,
    residuals: &[f64],
    indices: &[usize],
    min_samples_leaf: usize,
) -> Option<(usize, f64, f64)> {
    let n = indices.len() as f64;
    let total_sum: f64 = indices.iter().map(|&i| residuals[i]).sum();
    let total_sq: f64 = indices.iter().map(|&i| residuals[i].powi(2)).sum();
    let parent_sse = total_sq - total_sum * total_sum / n;

    let mut best: Option<(usize, f64, f64)> = None;
    for feature in 0..x.ncols() {
        let mut order = indices.to_vec();
        order.sort_by(|&a, &b| {
            x[[a, feature]]
                .partial_cmp(&x[[b, feature]])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut left_sum = 0.0;
        let mut left_sq = 0.0;
        for k in 1..order.len() {
            let prev = order[k - 1];
            left_sum += residuals[prev];
            left_sq += residuals[prev].powi(2);

            let value_prev = x[[prev, feature]];
            let value_next = x[[order[k], feature]];
            if value_prev == value_next {
                continue;
            }
            if k < min_samples_leaf || order.len() - k < min_samples_leaf {
                continue;
            }

            let left_n = k as f64;
            let right_n = n - left_n;
            let right_sum = total_sum - left_sum;
            let right_sq = total_sq - left_sq;
            let gain = parent_sse
                - (left_sq - left_sum * left_sum / left_n)
                - (right_sq - right_sum * right_sum / right_n);

            if gain > best.map_or(1e-12, |(_, _, g)| g) {
                best = Some((feature, (value_prev + value_next) / 2.0, gain));
            }
        }
    }
    best
}

/// Share of predictions matching the labels.
pub fn accuracy(predictions: &Array1<f64>, labels: &Array1<f64>) -> f64 {
    if predictions.is_empty() || predictions.len() != labels.len() {
        return 0.0;
    }
    let hits = predictions
        .iter()
        .zip(labels.iter())
        .filter(|(p, y)| (**p > 0.5) == (**y > 0.5))
        .count();
    hits as f64 / predictions.len() as f64
}

/// Persisted training outputs: the classifier, its scaler and the ordered
/// column list scoring inputs are reconciled against.
#[derive(Debug, Clone)]
pub struct ModelArtifacts {
    pub model: GradientBoostedClassifier,
    pub scaler: StandardScaler,
    pub columns: Vec<String>,
}

impl ModelArtifacts {
    /// Write the model, scaler and column order under `dir`.
    pub fn save_to_dir(&self, dir: &Path) -> crate::Result<()> {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create artifact directory {}", dir.display()))?;
        write_json(&dir.join(MODEL_FILE), &self.model)?;
        write_json(&dir.join(SCALER_FILE), &self.scaler)?;
        let mut listing = self.columns.join("\n");
        listing.push('\n');
        fs::write(dir.join(COLUMNS_FILE), listing)
            .with_context(|| format!("failed to write column list in {}", dir.display()))?;
        info!(dir = %dir.display(), "model artifacts saved");
        Ok(())
    }

    /// Load a previously trained bundle from `dir`.
    pub fn load_from_dir(dir: &Path) -> crate::Result<Self> {
        let model = read_json(&dir.join(MODEL_FILE))?;
        let scaler = read_json(&dir.join(SCALER_FILE))?;
        let columns_path = dir.join(COLUMNS_FILE);
        let listing = fs::read_to_string(&columns_path)
            .with_context(|| format!("column list not found at {}", columns_path.display()))?;
        let columns: Vec<String> = listing
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect();
        if columns.is_empty() {
            anyhow::bail!("column list at {} is empty", columns_path.display());
        }
        Ok(Self {
            model,
            scaler,
            columns,
        })
    }
}

/// Process-local cache for the artifact bundle, keyed by directory and the
/// model file's modification time. Readers reload only when the trainer has
/// rewritten the bundle or after an explicit [`ArtifactCache::invalidate`].
#[derive(Debug, Default)]
pub struct ArtifactCache {
    entry: Option<ArtifactCacheEntry>,
}

#[derive(Debug)]
struct ArtifactCacheEntry {
    dir: std::path::PathBuf,
    modified: Option<std::time::SystemTime>,
    artifacts: ModelArtifacts,
}

impl ArtifactCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the bundle under `dir`, reusing the cached copy when the model
    /// file is unchanged.
    pub fn load(&mut self, dir: &Path) -> crate::Result<ModelArtifacts> {
        let modified = fs::metadata(dir.join(MODEL_FILE))
            .ok()
            .and_then(|meta| meta.modified().ok());

        if let Some(entry) = &self.entry {
            if entry.dir == dir && entry.modified == modified && modified.is_some() {
                return Ok(entry.artifacts.clone());
            }
        }

        let artifacts = ModelArtifacts::load_from_dir(dir)?;
        self.entry = Some(ArtifactCacheEntry {
            dir: dir.to_path_buf(),
            modified,
            artifacts: artifacts.clone(),
        });
        Ok(artifacts)
    }

    /// Drop the cached bundle; the next `load` rereads from disk.
    pub fn invalidate(&mut self) {
        self.entry = None;
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> crate::Result<()> {
    let file = fs::File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    serde_json::to_writer(BufWriter::new(file), value)?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> crate::Result<T> {
    let file =
        fs::File::open(path).with_context(|| format!("artifact not found at {}", path.display()))?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

/// Outcome of a full training run.
#[derive(Debug)]
pub struct TrainingOutcome {
    pub artifacts: ModelArtifacts,
    pub accuracy: f64,
    pub n_cities: usize,
    pub n_train: usize,
    pub n_test: usize,
}

/// Run the full training pipeline over a transaction table.
///
/// Builds per-city features, labels churn by recency, one-hot encodes
/// gender, splits 70/30 stratified, fits the scaler on the training
/// partition only, trains the boosted ensemble and evaluates holdout
/// accuracy.
///
/// # Arguments
/// * `transactions` - Loaded transaction table
/// * `params` - Ensemble hyperparameters; `params.seed` also seeds the split
///
/// # Returns
/// * [`TrainingOutcome`] with the artifact bundle and evaluation counts
pub fn train_churn_model(
    transactions: &DataFrame,
    params: &BoostingParams,
) -> crate::Result<TrainingOutcome> {
    let city_features = features::build_city_features(transactions)?;
    let labeled = features::assign_churn_labels(&city_features)?;
    let encoded = features::encode_gender(&labeled)?;
    let columns = features::feature_columns(&encoded);
    let x = features::to_matrix(&encoded, &columns)?;
    let y = features::labels_vector(&encoded)?;

    let split = stratified_split(&x, &y, TEST_FRACTION, params.seed)?;
    let scaler = StandardScaler::fit(&split.x_train);
    let x_train = scaler.transform(&split.x_train)?;
    let x_test = scaler.transform(&split.x_test)?;

    let model = fit_classifier(&x_train, &split.y_train, params)?;
    let predictions = model.predict(&x_test)?;
    let holdout_accuracy = accuracy(&predictions, &split.y_test);
    info!(
        accuracy = holdout_accuracy,
        cities = x.nrows(),
        "churn model trained"
    );

    Ok(TrainingOutcome {
        artifacts: ModelArtifacts {
            model,
            scaler,
            columns,
        },
        accuracy: holdout_accuracy,
        n_cities: x.nrows(),
        n_train: split.y_train.len(),
        n_test: split.y_test.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use tempfile::tempdir;

    fn separable_data() -> (Array2<f64>, Array1<f64>) {
        // Two well-separated blobs in two dimensions
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..15 {
            let offset = (i % 5) as f64 * 0.1;
            rows.extend_from_slice(&[offset, 1.0 + offset]);
            labels.push(0.0);
            rows.extend_from_slice(&[5.0 + offset, 6.0 - offset]);
            labels.push(1.0);
        }
        (
            Array2::from_shape_vec((30, 2), rows).unwrap(),
            Array1::from_vec(labels),
        )
    }

    #[test]
    fn test_scaler_centers_training_data() {
        let data = array![[1.0, 10.0], [3.0, 10.0], [5.0, 10.0]];
        let scaler = StandardScaler::fit(&data);

        assert!((scaler.means[0] - 3.0).abs() < 1e-12);
        // Zero-variance column falls back to unit scale
        assert!((scaler.stds[1] - 1.0).abs() < 1e-12);

        let transformed = scaler.transform(&data).unwrap();
        let col0_mean: f64 = transformed.column(0).sum() / 3.0;
        assert!(col0_mean.abs() < 1e-12);
        assert!(transformed.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_scaler_is_fitted_on_train_only() {
        let train = array![[0.0], [2.0]];
        let other = array![[10.0], [12.0]];
        let scaler = StandardScaler::fit(&train);

        let transformed = scaler.transform(&other).unwrap();
        // Data from another distribution does not recenter to zero
        let mean: f64 = transformed.column(0).sum() / 2.0;
        assert!(mean > 5.0);
    }

    #[test]
    fn test_scaler_rejects_width_mismatch() {
        let scaler = StandardScaler::fit(&array![[1.0, 2.0]]);
        assert!(scaler.transform(&array![[1.0]]).is_err());
    }

    #[test]
    fn test_stratified_split_preserves_proportions() {
        let x = Array2::from_shape_fn((20, 1), |(i, _)| i as f64);
        let y = Array1::from_shape_fn(20, |i| if i < 12 { 0.0 } else { 1.0 });

        let split = stratified_split(&x, &y, 0.3, 42).unwrap();
        assert_eq!(split.y_test.len(), 6);
        assert_eq!(split.y_train.len(), 14);

        let test_positives = split.y_test.iter().filter(|v| **v > 0.5).count();
        let train_positives = split.y_train.iter().filter(|v| **v > 0.5).count();
        assert_eq!(test_positives, 2);
        assert_eq!(train_positives, 6);
    }

    #[test]
    fn test_stratified_split_is_deterministic() {
        let x = Array2::from_shape_fn((10, 1), |(i, _)| i as f64);
        let y = Array1::from_shape_fn(10, |i| if i % 2 == 0 { 0.0 } else { 1.0 });

        let a = stratified_split(&x, &y, 0.3, 42).unwrap();
        let b = stratified_split(&x, &y, 0.3, 42).unwrap();
        assert_eq!(a.x_train, b.x_train);
        assert_eq!(a.y_test, b.y_test);
    }

    #[test]
    fn test_stratified_split_needs_both_classes() {
        let x = Array2::from_shape_fn((4, 1), |(i, _)| i as f64);
        let y = Array1::from_vec(vec![0.0, 0.0, 0.0, 0.0]);

        assert!(stratified_split(&x, &y, 0.3, 42).is_err());
    }

    #[test]
    fn test_classifier_separates_blobs() {
        let (x, y) = separable_data();
        let params = BoostingParams {
            n_estimators: 50,
            max_depth: 2,
            ..BoostingParams::default()
        };
        let model = fit_classifier(&x, &y, &params).unwrap();

        let predictions = model.predict(&x).unwrap();
        assert!((accuracy(&predictions, &y) - 1.0).abs() < 1e-12);

        let proba = model.predict_proba(&x).unwrap();
        assert!(proba.iter().all(|p| *p > 0.0 && *p < 1.0));

        let importance_sum: f64 = model.feature_importances.iter().sum();
        assert!((importance_sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_classifier_rejects_single_class() {
        let x = array![[0.0], [1.0], [2.0]];
        let y = array![1.0, 1.0, 1.0];
        assert!(fit_classifier(&x, &y, &BoostingParams::default()).is_err());
    }

    #[test]
    fn test_classifier_rejects_width_mismatch_at_predict() {
        let (x, y) = separable_data();
        let model = fit_classifier(&x, &y, &BoostingParams::default()).unwrap();
        assert!(model.predict_proba(&array![[1.0]]).is_err());
    }

    #[test]
    fn test_classifier_is_deterministic() {
        let (x, y) = separable_data();
        let params = BoostingParams {
            n_estimators: 10,
            ..BoostingParams::default()
        };
        let a = fit_classifier(&x, &y, &params).unwrap();
        let b = fit_classifier(&x, &y, &params).unwrap();
        assert_eq!(
            a.predict_proba(&x).unwrap(),
            b.predict_proba(&x).unwrap()
        );
    }

    #[test]
    fn test_artifacts_roundtrip() {
        let (x, y) = separable_data();
        let params = BoostingParams {
            n_estimators: 10,
            ..BoostingParams::default()
        };
        let model = fit_classifier(&x, &y, &params).unwrap();
        let scaler = StandardScaler::fit(&x);
        let artifacts = ModelArtifacts {
            model,
            scaler,
            columns: vec!["a".to_string(), "b".to_string()],
        };

        let dir = tempdir().unwrap();
        artifacts.save_to_dir(dir.path()).unwrap();

        let restored = ModelArtifacts::load_from_dir(dir.path()).unwrap();
        assert_eq!(restored.columns, artifacts.columns);

        let before = artifacts.model.predict_proba(&x).unwrap();
        let after = restored.model.predict_proba(&x).unwrap();
        for (a, b) in before.iter().zip(after.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_load_from_missing_dir_fails() {
        let dir = tempdir().unwrap();
        assert!(ModelArtifacts::load_from_dir(dir.path()).is_err());
    }

    #[test]
    fn test_artifact_cache_reuses_bundle() {
        let (x, y) = separable_data();
        let params = BoostingParams {
            n_estimators: 5,
            ..BoostingParams::default()
        };
        let artifacts = ModelArtifacts {
            model: fit_classifier(&x, &y, &params).unwrap(),
            scaler: StandardScaler::fit(&x),
            columns: vec!["a".to_string(), "b".to_string()],
        };
        let dir = tempdir().unwrap();
        artifacts.save_to_dir(dir.path()).unwrap();

        let mut cache = ArtifactCache::new();
        let first = cache.load(dir.path()).unwrap();
        let second = cache.load(dir.path()).unwrap();
        assert_eq!(first.columns, second.columns);

        cache.invalidate();
        assert!(cache.load(dir.path()).is_ok());
    }
}
