use crate::cli::ShakeModule;
use crate::error::{CliError, Result};
use cellshake::core::forcefield::params::ForcefieldParams;
use cellshake::core::models::builder::ConfigurationBuilder;
use cellshake::core::models::configuration::Configuration;
use cellshake::core::models::species::Species;
use cellshake::core::space::cell_array::CellArray;
use cellshake::core::space::periodic_box::PeriodicBox;
use cellshake::engine::config::ShakeConfig;
use cellshake::engine::error::EngineError;
use nalgebra::Point3;
use std::path::PathBuf;

pub struct AppConfig {
    pub forcefield_path: PathBuf,
    pub system: SystemSpec,
    pub module: ShakeModule,
    pub cycles: usize,
    pub seed: u64,
    pub shake: ShakeConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AtomSpec {
    pub type_name: String,
    pub position: [f64; 3],
}

#[derive(Debug, Clone, PartialEq)]
pub struct BondSpec {
    pub i: usize,
    pub j: usize,
    pub force_constant: f64,
    pub equilibrium: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpeciesSpec {
    pub name: String,
    pub count: usize,
    pub atoms: Vec<AtomSpec>,
    pub bonds: Vec<BondSpec>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SystemSpec {
    pub box_lengths: [f64; 3],
    pub temperature: f64,
    pub cell_size: f64,
    pub species: Vec<SpeciesSpec>,
}

impl SpeciesSpec {
    fn to_species(&self, params: &ForcefieldParams) -> Result<Species> {
        let mut species = Species::new(&self.name);
        for atom in &self.atoms {
            let type_index = params.type_index(&atom.type_name).ok_or_else(|| {
                CliError::Config(format!(
                    "Species '{}' uses atom type '{}', which the forcefield does not define.",
                    self.name, atom.type_name
                ))
            })?;
            let [x, y, z] = atom.position;
            species.add_atom(type_index, Point3::new(x, y, z));
        }
        for bond in &self.bonds {
            species
                .add_bond(bond.i, bond.j, bond.force_constant, bond.equilibrium)
                .map_err(|e| CliError::Config(e.to_string()))?;
        }
        Ok(species)
    }
}

impl SystemSpec {
    pub fn n_molecules(&self) -> usize {
        self.species.iter().map(|s| s.count).sum()
    }

    /// Populates a configuration whose cells are at least `cell_size` wide and whose
    /// neighbour lists reach `cutoff`.
    pub fn build(&self, params: &ForcefieldParams, cutoff: f64) -> Result<Configuration> {
        let periodic_box = PeriodicBox::new(self.box_lengths).map_err(EngineError::from)?;
        let cells = CellArray::for_cutoff(&periodic_box, self.cell_size, cutoff)
            .map_err(EngineError::from)?;

        let mut builder =
            ConfigurationBuilder::new(periodic_box, cells).temperature(self.temperature);
        for spec in &self.species {
            builder = builder.species(spec.to_species(params)?, spec.count);
        }
        Ok(builder.build().map_err(EngineError::from)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellshake::core::forcefield::params::AtomTypeParams;

    fn params() -> ForcefieldParams {
        ForcefieldParams {
            range: 8.0,
            table_delta: 0.01,
            dielectric: 1.0,
            atom_types: vec![AtomTypeParams {
                name: "N".to_string(),
                radius: 3.3,
                well_depth: 0.6,
                charge: 0.0,
            }],
        }
    }

    fn dimer(type_name: &str) -> SpeciesSpec {
        SpeciesSpec {
            name: "dinitrogen".to_string(),
            count: 5,
            atoms: vec![
                AtomSpec {
                    type_name: type_name.to_string(),
                    position: [0.0, 0.0, 0.0],
                },
                AtomSpec {
                    type_name: type_name.to_string(),
                    position: [1.1, 0.0, 0.0],
                },
            ],
            bonds: vec![BondSpec {
                i: 0,
                j: 1,
                force_constant: 1000.0,
                equilibrium: 1.1,
            }],
        }
    }

    #[test]
    fn build_populates_the_configuration() {
        let spec = SystemSpec {
            box_lengths: [20.0, 20.0, 20.0],
            temperature: 77.0,
            cell_size: 5.0,
            species: vec![dimer("N")],
        };
        let cfg = spec.build(&params(), 8.0).unwrap();
        assert_eq!(spec.n_molecules(), 5);
        assert_eq!(cfg.n_molecules(), 5);
        assert_eq!(cfg.n_atoms(), 10);
        assert_eq!(cfg.temperature(), 77.0);
        assert_eq!(cfg.cells().n_cells(), 64);
    }

    #[test]
    fn unknown_atom_type_is_a_config_error() {
        let spec = SystemSpec {
            box_lengths: [20.0, 20.0, 20.0],
            temperature: 77.0,
            cell_size: 5.0,
            species: vec![dimer("O")],
        };
        assert!(matches!(spec.build(&params(), 8.0), Err(CliError::Config(_))));
    }

    #[test]
    fn invalid_box_is_a_core_error() {
        let spec = SystemSpec {
            box_lengths: [20.0, -1.0, 20.0],
            temperature: 77.0,
            cell_size: 5.0,
            species: vec![dimer("N")],
        };
        assert!(matches!(spec.build(&params(), 8.0), Err(CliError::Core(_))));
    }
}
