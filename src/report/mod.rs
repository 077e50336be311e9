//! Report module - text summaries, evaluation metrics, experiments and charts

pub mod evaluation;
pub mod experiment;
pub mod plots;
pub mod summary;
pub mod visualization;

pub use evaluation::*;
pub use experiment::*;
pub use summary::*;
pub use visualization::*;
