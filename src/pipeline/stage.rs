//! Stage execution with an explicit failure policy

use std::fmt;
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::pipeline::{FailurePolicy, WarningPolicy};
use crate::utils::{print_error, print_warning};

/// Top-level pipeline stages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Mung,
    Visualize,
    Evaluate,
    Experiment,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Mung => write!(f, "Data Munging"),
            Stage::Visualize => write!(f, "Visualization"),
            Stage::Evaluate => write!(f, "Model Evaluation"),
            Stage::Experiment => write!(f, "Feature Experiment"),
        }
    }
}

/// Result of running one stage
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
    Completed,
    /// Stage failed and the run continued; holds the rendered error chain
    Failed(String),
}

impl StageOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, StageOutcome::Failed(_))
    }
}

/// Outcome and timing of a stage
#[derive(Debug, Clone)]
pub struct StageReport {
    pub stage: Stage,
    pub outcome: StageOutcome,
    pub elapsed: Duration,
}

/// Run a stage body under the given failure policy.
///
/// With [`FailurePolicy::BestEffort`] an error is printed and recorded in the
/// returned report, and the caller moves on to the next stage. With
/// [`FailurePolicy::Strict`] the error is returned.
pub fn run_stage<F>(stage: Stage, policy: FailurePolicy, body: F) -> Result<StageReport>
where
    F: FnOnce() -> Result<()>,
{
    let start = Instant::now();
    let result = body();
    let elapsed = start.elapsed();

    match result {
        Ok(()) => Ok(StageReport {
            stage,
            outcome: StageOutcome::Completed,
            elapsed,
        }),
        Err(err) => match policy {
            FailurePolicy::Strict => Err(err.context(format!("{} stage failed", stage))),
            FailurePolicy::BestEffort => {
                log::debug!("{} stage error: {:?}", stage, err);
                print_error(&format!("{} failed: {:#}", stage, err));
                Ok(StageReport {
                    stage,
                    outcome: StageOutcome::Failed(format!("{:#}", err)),
                    elapsed,
                })
            }
        },
    }
}

/// Emit a stage warning according to the warning policy
pub fn warn(policy: WarningPolicy, message: &str) {
    log::debug!("warning: {}", message);
    if policy == WarningPolicy::Show {
        print_warning(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_best_effort_records_failure() {
        let report = run_stage(Stage::Visualize, FailurePolicy::BestEffort, || {
            anyhow::bail!("artifact missing")
        })
        .unwrap();

        assert_eq!(report.stage, Stage::Visualize);
        assert!(report.outcome.is_failed());
        match report.outcome {
            StageOutcome::Failed(msg) => assert!(msg.contains("artifact missing")),
            StageOutcome::Completed => unreachable!(),
        }
    }

    #[test]
    fn test_strict_propagates_failure() {
        let err = run_stage(Stage::Mung, FailurePolicy::Strict, || {
            anyhow::bail!("bad row")
        })
        .unwrap_err();

        let rendered = format!("{:#}", err);
        assert!(rendered.contains("Data Munging stage failed"));
        assert!(rendered.contains("bad row"));
    }

    #[test]
    fn test_successful_stage() {
        let report = run_stage(Stage::Evaluate, FailurePolicy::Strict, || Ok(())).unwrap();
        assert_eq!(report.outcome, StageOutcome::Completed);
    }
}
