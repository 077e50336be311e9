//! Classifiers trained on the wafer split
//!
//! Every model implements [`Classifier`]. Labels follow the source data:
//! `-1` is a passing wafer and `1` a failing one, and `predict_proba`
//! returns the probability of failure. [`TrainedModel`] is the persisted,
//! serde-tagged form of any fitted model.

pub mod boosting;
pub mod forest;
pub mod knn;
pub mod logistic;
pub mod training;
pub mod tree;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use faer::Mat;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::pipeline::PipelineError;

pub use boosting::GradientBoosting;
pub use forest::RandomForest;
pub use knn::KNearestNeighbors;
pub use logistic::LogisticRegression;
pub use training::*;

/// Label of a passing wafer
pub const PASS_LABEL: i32 = -1;
/// Label of a failing wafer
pub const FAIL_LABEL: i32 = 1;

/// Supported classifier families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    GradientBoosting,
    LogisticRegression,
    RandomForest,
    Knn,
}

impl ModelKind {
    /// Every kind, in training order
    pub fn all() -> &'static [ModelKind] {
        &[
            ModelKind::GradientBoosting,
            ModelKind::LogisticRegression,
            ModelKind::RandomForest,
            ModelKind::Knn,
        ]
    }

    /// Identifier used for artifact file names
    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::GradientBoosting => "gradient_boosting",
            ModelKind::LogisticRegression => "logistic_regression",
            ModelKind::RandomForest => "random_forest",
            ModelKind::Knn => "knn",
        }
    }

    /// Human-readable estimator type recorded in model info
    pub fn type_name(&self) -> &'static str {
        match self {
            ModelKind::GradientBoosting => "GradientBoostingClassifier",
            ModelKind::LogisticRegression => "LogisticRegression",
            ModelKind::RandomForest => "RandomForestClassifier",
            ModelKind::Knn => "KNeighborsClassifier",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ModelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "gradient_boosting" | "gb" => Ok(ModelKind::GradientBoosting),
            "logistic_regression" | "lr" => Ok(ModelKind::LogisticRegression),
            "random_forest" | "rf" => Ok(ModelKind::RandomForest),
            "knn" => Ok(ModelKind::Knn),
            _ => Err(format!(
                "Unknown model '{}'. Use 'gradient_boosting', 'logistic_regression', 'random_forest' or 'knn'",
                s
            )),
        }
    }
}

/// Per-class sample weights
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassWeights {
    pub pass: f64,
    pub fail: f64,
}

impl ClassWeights {
    /// Equal weights for both classes
    pub fn uniform() -> Self {
        Self { pass: 1.0, fail: 1.0 }
    }

    pub fn weight_for(&self, label: i32) -> f64 {
        if label == FAIL_LABEL {
            self.fail
        } else {
            self.pass
        }
    }
}

/// Training matrix with labels and class weights
#[derive(Debug, Clone, Copy)]
pub struct TrainingSet<'a> {
    pub x: &'a Mat<f64>,
    pub y: &'a [i32],
    pub class_weights: ClassWeights,
}

impl<'a> TrainingSet<'a> {
    pub fn new(x: &'a Mat<f64>, y: &'a [i32], class_weights: ClassWeights) -> Result<Self> {
        if x.nrows() != y.len() {
            anyhow::bail!(
                "Training matrix has {} rows but {} labels were given",
                x.nrows(),
                y.len()
            );
        }
        Ok(Self { x, y, class_weights })
    }

    pub fn n_samples(&self) -> usize {
        self.x.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.x.ncols()
    }

    /// 1.0 for a failing wafer, 0.0 otherwise
    pub fn target(&self, i: usize) -> f64 {
        if self.y[i] == FAIL_LABEL {
            1.0
        } else {
            0.0
        }
    }

    pub fn sample_weight(&self, i: usize) -> f64 {
        self.class_weights.weight_for(self.y[i])
    }

    /// Fail if either class is absent
    pub fn require_both_classes(&self) -> Result<(), PipelineError> {
        for label in [PASS_LABEL, FAIL_LABEL] {
            if !self.y.contains(&label) {
                return Err(PipelineError::MissingClass(label));
            }
        }
        Ok(())
    }
}

/// Common interface of all classifiers
pub trait Classifier: Send + Sync {
    fn kind(&self) -> ModelKind;

    /// Fit on a training set. Randomized models draw only from `rng`.
    fn fit(&mut self, data: &TrainingSet<'_>, rng: &mut dyn RngCore) -> Result<()>;

    /// Probability that each row is a failing wafer
    fn predict_proba(&self, x: &Mat<f64>) -> Result<Vec<f64>>;

    /// Class labels; ties at 0.5 resolve to a pass
    fn predict(&self, x: &Mat<f64>) -> Result<Vec<i32>> {
        Ok(self
            .predict_proba(x)?
            .into_iter()
            .map(|p| if p > 0.5 { FAIL_LABEL } else { PASS_LABEL })
            .collect())
    }

    /// Per-feature importance in training column order, if the model defines one
    fn feature_importance(&self) -> Option<Vec<f64>>;

    /// Hyper-parameters as recorded in model info
    fn parameters(&self) -> serde_json::Value;
}

/// Check a prediction matrix against the fitted width
pub(crate) fn check_features(
    kind: ModelKind,
    fitted: Option<usize>,
    x: &Mat<f64>,
) -> Result<(), PipelineError> {
    match fitted {
        None => Err(PipelineError::NotFitted(kind.to_string())),
        Some(expected) if expected != x.ncols() => Err(PipelineError::FeatureMismatch {
            expected,
            actual: x.ncols(),
        }),
        Some(_) => Ok(()),
    }
}

/// Persisted form of a fitted model
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrainedModel {
    GradientBoosting(GradientBoosting),
    LogisticRegression(LogisticRegression),
    RandomForest(RandomForest),
    Knn(KNearestNeighbors),
}

impl TrainedModel {
    /// Unfitted model of the given kind with the standard hyper-parameters
    pub fn new(kind: ModelKind, jobs: usize) -> Self {
        match kind {
            ModelKind::GradientBoosting => TrainedModel::GradientBoosting(GradientBoosting::default()),
            ModelKind::LogisticRegression => {
                TrainedModel::LogisticRegression(LogisticRegression::default())
            }
            ModelKind::RandomForest => {
                let mut forest = RandomForest::default();
                forest.jobs = jobs;
                TrainedModel::RandomForest(forest)
            }
            ModelKind::Knn => TrainedModel::Knn(KNearestNeighbors::default()),
        }
    }

    pub fn classifier(&self) -> &dyn Classifier {
        match self {
            TrainedModel::GradientBoosting(m) => m,
            TrainedModel::LogisticRegression(m) => m,
            TrainedModel::RandomForest(m) => m,
            TrainedModel::Knn(m) => m,
        }
    }

    pub fn classifier_mut(&mut self) -> &mut dyn Classifier {
        match self {
            TrainedModel::GradientBoosting(m) => m,
            TrainedModel::LogisticRegression(m) => m,
            TrainedModel::RandomForest(m) => m,
            TrainedModel::Knn(m) => m,
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create model file: {}", path.display()))?;
        serde_json::to_writer(std::io::BufWriter::new(file), self)
            .with_context(|| format!("Failed to serialize model to {}", path.display()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open model file: {}", path.display()))?;
        serde_json::from_reader(std::io::BufReader::new(file))
            .with_context(|| format!("Failed to parse model file: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_kind_from_str() {
        assert_eq!("knn".parse::<ModelKind>().unwrap(), ModelKind::Knn);
        assert_eq!(
            "Random-Forest".parse::<ModelKind>().unwrap(),
            ModelKind::RandomForest
        );
        assert_eq!("lr".parse::<ModelKind>().unwrap(), ModelKind::LogisticRegression);
        assert!("svm".parse::<ModelKind>().is_err());
    }

    #[test]
    fn test_model_kind_display_round_trip() {
        for kind in ModelKind::all() {
            assert_eq!(kind.to_string().parse::<ModelKind>().unwrap(), *kind);
        }
    }

    #[test]
    fn test_class_weights_lookup() {
        let weights = ClassWeights { pass: 0.5, fail: 6.0 };
        assert_eq!(weights.weight_for(PASS_LABEL), 0.5);
        assert_eq!(weights.weight_for(FAIL_LABEL), 6.0);
    }

    #[test]
    fn test_training_set_requires_both_classes() {
        let x = Mat::<f64>::zeros(3, 1);
        let y = [-1, -1, -1];
        let set = TrainingSet::new(&x, &y, ClassWeights::uniform()).unwrap();
        assert!(matches!(
            set.require_both_classes(),
            Err(PipelineError::MissingClass(1))
        ));
    }

    #[test]
    fn test_training_set_length_mismatch() {
        let x = Mat::<f64>::zeros(3, 1);
        assert!(TrainingSet::new(&x, &[1, -1], ClassWeights::uniform()).is_err());
    }
}
