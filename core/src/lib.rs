//! Salary-sacrifice pension cap analysis.
//!
//! Runs a 2x2 matrix of behavioural assumptions (employer cost response ×
//! employee response) for a cap on salary-sacrificed pension contributions
//! against a microsimulation engine, and reports revenue and
//! distributional effects.

pub mod analysis;
pub mod config;
pub mod dataset;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod matrix;
pub mod population;
pub mod reform;
pub mod report;
pub mod rng;
pub mod scenario;
pub mod simulation;
pub mod types;
