//! Training stage: fit every selected classifier and persist it

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use faer::Mat;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::{ClassWeights, ModelKind, TrainedModel, TrainingSet, FAIL_LABEL, PASS_LABEL};
use crate::pipeline::PipelineError;
use crate::utils::{create_spinner, finish_with_success, finish_with_warning, print_error, print_info, print_warning};

/// File holding per-model metadata, skipped when loading models
pub const MODEL_INFO_FILE: &str = "model_info.json";

/// Extra weight on the failing class on top of balancing
pub const FAIL_WEIGHT_BOOST: f64 = 1.2;

/// Balanced class weights with failures boosted by [`FAIL_WEIGHT_BOOST`]:
/// `pass = n / (2 n_pass)`, `fail = 1.2 n / (2 n_fail)`.
pub fn class_weights(labels: &[i32]) -> Result<ClassWeights, PipelineError> {
    let n = labels.len() as f64;
    let n_pass = labels.iter().filter(|&&l| l == PASS_LABEL).count();
    let n_fail = labels.iter().filter(|&&l| l == FAIL_LABEL).count();
    if n_pass == 0 {
        return Err(PipelineError::MissingClass(PASS_LABEL));
    }
    if n_fail == 0 {
        return Err(PipelineError::MissingClass(FAIL_LABEL));
    }

    Ok(ClassWeights {
        pass: (1.0 / n_pass as f64) * (n / 2.0),
        fail: (1.0 / n_fail as f64) * (n / 2.0) * FAIL_WEIGHT_BOOST,
    })
}

/// Metadata recorded for each trained model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub path: PathBuf,
    #[serde(rename = "type")]
    pub model_type: String,
    pub parameters: serde_json::Value,
    pub feature_importance: Option<BTreeMap<String, f64>>,
}

/// Result of a training run
#[derive(Debug, Default)]
pub struct TrainingOutcome {
    /// Persisted models in training order
    pub trained: Vec<(ModelKind, PathBuf)>,
    pub info: BTreeMap<String, ModelInfo>,
    /// Models that failed to fit or persist, with the rendered error
    pub failures: Vec<(ModelKind, String)>,
}

fn train_one(
    kind: ModelKind,
    data: &TrainingSet<'_>,
    feature_names: &[String],
    models_dir: &Path,
    jobs: usize,
    rng: &mut dyn RngCore,
) -> Result<(PathBuf, ModelInfo)> {
    let mut model = TrainedModel::new(kind, jobs);
    model
        .classifier_mut()
        .fit(data, rng)
        .with_context(|| format!("Failed to fit {}", kind))?;

    let path = models_dir.join(format!("{}.json", kind.name()));
    model.save(&path)?;

    let classifier = model.classifier();
    let feature_importance = classifier.feature_importance().map(|values| {
        feature_names
            .iter()
            .cloned()
            .zip(values)
            .collect::<BTreeMap<String, f64>>()
    });

    let info = ModelInfo {
        path: path.clone(),
        model_type: kind.type_name().to_string(),
        parameters: classifier.parameters(),
        feature_importance,
    };
    Ok((path, info))
}

/// Fit each model kind on the training split and persist it under `models_dir`.
///
/// A model that fails to fit or save is reported and skipped. Failure to
/// write `model_info.json` is only a warning.
pub fn train_classification_models(
    x_train: &Mat<f64>,
    y_train: &[i32],
    feature_names: &[String],
    kinds: &[ModelKind],
    models_dir: &Path,
    jobs: usize,
    rng: &mut dyn RngCore,
) -> Result<TrainingOutcome> {
    let weights = class_weights(y_train)?;
    let data = TrainingSet::new(x_train, y_train, weights)?;

    let n_pass = y_train.iter().filter(|&&l| l == PASS_LABEL).count();
    let n_fail = y_train.len() - n_pass;
    print_info(&format!(
        "Class distribution - Passed (-1): {}, Failed (1): {}",
        n_pass, n_fail
    ));
    print_info(&format!(
        "Class weights - Passed: {:.2}, Failed: {:.2}",
        weights.pass, weights.fail
    ));

    std::fs::create_dir_all(models_dir)
        .with_context(|| format!("Failed to create directory: {}", models_dir.display()))?;

    let mut outcome = TrainingOutcome::default();
    for &kind in kinds {
        let spinner = create_spinner(&format!("Training {}...", kind));
        match train_one(kind, &data, feature_names, models_dir, jobs, rng) {
            Ok((path, info)) => {
                finish_with_success(&spinner, &format!("Completed training {}", kind));
                outcome.info.insert(kind.name().to_string(), info);
                outcome.trained.push((kind, path));
            }
            Err(err) => {
                finish_with_warning(&spinner, &format!("Skipped {}", kind));
                print_error(&format!("Error training {}: {:#}", kind, err));
                outcome.failures.push((kind, format!("{:#}", err)));
            }
        }
    }

    let info_path = models_dir.join(MODEL_INFO_FILE);
    if let Err(err) = write_model_info(&outcome.info, &info_path) {
        print_warning(&format!("Could not save model info: {:#}", err));
    }

    Ok(outcome)
}

fn write_model_info(info: &BTreeMap<String, ModelInfo>, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(info).context("Failed to serialize model info")?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

/// Read `model_info.json` back
pub fn load_model_info(models_dir: &Path) -> Result<BTreeMap<String, ModelInfo>> {
    let path = models_dir.join(MODEL_INFO_FILE);
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}
