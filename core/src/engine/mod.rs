//! Simulation backends.
//!
//!   frame   in-process linearised engine over a household dataset
//!   bridge  external engine process over newline-delimited JSON

pub mod bridge;
pub mod frame;

use crate::{
    config::EngineSpec,
    dataset::Dataset,
    error::CapResult,
    simulation::SimulationBackend,
};
use bridge::BridgeBackend;
use frame::{FrameBackend, FrameOptions};

/// Build the backend described by `spec`.
pub fn build_backend(
    spec: &EngineSpec,
    options: FrameOptions,
) -> CapResult<Box<dyn SimulationBackend>> {
    let backend: Box<dyn SimulationBackend> = match spec {
        EngineSpec::Frame { dataset } => {
            Box::new(FrameBackend::new(Dataset::load(dataset)?, options))
        }
        EngineSpec::Synthetic { households, seed } => {
            log::info!("Generating synthetic dataset: {households} households, seed {seed}");
            Box::new(FrameBackend::new(Dataset::synthetic(*households, *seed), options))
        }
        EngineSpec::Bridge(command) => Box::new(BridgeBackend::new(command.clone())),
    };
    Ok(backend)
}
