//! Pipeline module - loading, imputation, statistics, splitting and stage orchestration

pub mod artifact;
pub mod config;
pub mod error;
pub mod imputer;
pub mod loader;
pub mod scaler;
pub mod split;
pub mod stage;
pub mod stages;
pub mod statistics;
pub mod table;

pub use artifact::*;
pub use config::*;
pub use error::PipelineError;
pub use imputer::{ClassConditionalImputer, ImputationSummary, UnresolvedSlice};
pub use loader::*;
pub use scaler::StandardScaler;
pub use split::*;
pub use stage::{run_stage, Stage, StageOutcome, StageReport};
pub use stages::*;
pub use statistics::*;
