use thiserror::Error;

use super::config::ConfigError;
use super::locks::LockError;
use super::pool::PoolError;
use super::sampling::SamplingError;
use crate::core::forcefield::potential_map::PotentialMapError;
use crate::core::models::configuration::ModelError;
use crate::core::space::{CellIndex, SpaceError};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Cell lock discipline violated: {0}")]
    Lock(#[from] LockError),

    #[error("Process pool operation failed: {0}")]
    Pool(#[from] PoolError),

    #[error("Spatial index error: {0}")]
    Space(#[from] SpaceError),

    #[error("Configuration model error: {0}")]
    Model(#[from] ModelError),

    #[error("Potential map error: {0}")]
    PotentialMap(#[from] PotentialMapError),

    #[error("Invalid stage configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Sampling error: {0}")]
    Sampling(#[from] SamplingError),

    #[error("Object {index} is out of range for a distributor over {n_objects} objects")]
    ObjectOutOfRange { index: usize, n_objects: usize },

    #[error("Region for object {object} lists cell {cell}, but only {n_cells} cells exist")]
    RegionCellOutOfRange {
        object: usize,
        cell: CellIndex,
        n_cells: usize,
    },

    #[error("Internal logic error: {0}")]
    Internal(String),
}
