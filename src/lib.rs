//! Waferflow: wafer yield analytics
//!
//! Loads the SECOM label and measurement files, fills missing measurements
//! with class-conditional Gaussian draws, summarises the imputed table and
//! trains and evaluates pass/fail classifiers.

pub mod cli;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod utils;
