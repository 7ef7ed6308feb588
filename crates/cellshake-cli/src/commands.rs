pub mod check;
pub mod shake;

use crate::config::AppConfig;
use crate::error::{CliError, Result};
use cellshake::core::forcefield::params::ForcefieldParams;
use cellshake::core::forcefield::potential_map::PotentialMap;
use cellshake::core::models::configuration::Configuration;
use cellshake::engine::error::EngineError;
use tracing::info;

/// A populated configuration together with the forcefield it was built against.
pub struct LoadedSystem {
    pub params: ForcefieldParams,
    pub map: PotentialMap,
    pub configuration: Configuration,
}

pub fn load_system(config: &AppConfig) -> Result<LoadedSystem> {
    info!("Loading forcefield parameters from {:?}", &config.forcefield_path);
    let params =
        ForcefieldParams::load(&config.forcefield_path).map_err(|e| CliError::FileParsing {
            path: config.forcefield_path.clone(),
            source: e.into(),
        })?;
    let map = PotentialMap::from_params(&params).map_err(EngineError::from)?;

    let cutoff = config.shake.cutoff.unwrap_or(params.range);
    let configuration = config.system.build(&params, cutoff)?;
    info!(
        n_molecules = configuration.n_molecules(),
        n_atoms = configuration.n_atoms(),
        n_cells = configuration.cells().n_cells(),
        "System populated."
    );

    Ok(LoadedSystem {
        params,
        map,
        configuration,
    })
}
