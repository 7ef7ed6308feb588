use super::configuration::{Configuration, ModelError};
use super::species::Species;
use crate::core::space::cell_array::CellArray;
use crate::core::space::periodic_box::PeriodicBox;
use nalgebra::{Point3, Vector3};

/// Populates a configuration by placing copies of species templates on a simple cubic
/// lattice that fills the box.
pub struct ConfigurationBuilder {
    periodic_box: PeriodicBox,
    cells: CellArray,
    temperature: f64,
    populations: Vec<(Species, usize)>,
}

impl ConfigurationBuilder {
    pub fn new(periodic_box: PeriodicBox, cells: CellArray) -> Self {
        Self {
            periodic_box,
            cells,
            temperature: 300.0,
            populations: Vec::new(),
        }
    }

    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn species(mut self, species: Species, count: usize) -> Self {
        self.populations.push((species, count));
        self
    }

    pub fn build(self) -> Result<Configuration, ModelError> {
        let mut cfg = Configuration::new(self.periodic_box, self.cells, self.temperature)?;

        let total: usize = self.populations.iter().map(|(_, n)| n).sum();
        let mut n_side = 1usize;
        while n_side.pow(3) < total {
            n_side += 1;
        }
        let spacing = self.periodic_box.lengths() / n_side as f64;

        let mut site = 0usize;
        for (species, count) in self.populations {
            let centre = species.centre();
            let offsets: Vec<Vector3<f64>> =
                species.atoms().iter().map(|a| a.position - centre).collect();
            let species_index = cfg.add_species(species);

            for _ in 0..count {
                let grid = [site / (n_side * n_side), (site / n_side) % n_side, site % n_side];
                let origin = Point3::new(
                    (grid[0] as f64 + 0.5) * spacing.x,
                    (grid[1] as f64 + 0.5) * spacing.y,
                    (grid[2] as f64 + 0.5) * spacing.z,
                );
                let positions: Vec<Point3<f64>> = offsets.iter().map(|o| origin + *o).collect();
                cfg.add_molecule(species_index, &positions)?;
                site += 1;
            }
        }

        Ok(cfg)
    }
}
