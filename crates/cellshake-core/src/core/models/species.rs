use nalgebra::Point3;
use std::collections::VecDeque;
use thiserror::Error;

/// Scale applied to non-bonded pairs separated by three bonds.
pub const ONE_FOUR_SCALE: f64 = 0.5;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum SpeciesError {
    #[error("Species '{species}' has no atom with index {index}")]
    UnknownAtom { species: String, index: usize },

    #[error("Species '{species}' cannot bond atom {index} to itself")]
    SelfBond { species: String, index: usize },
}

/// An atom of a species template.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeciesAtom {
    pub type_index: usize,
    pub position: Point3<f64>,
}

/// A harmonic bond between two template atoms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeciesBond {
    pub i: usize,
    pub j: usize,
    /// Force constant in kJ/mol/Å².
    pub force_constant: f64,
    /// Equilibrium length in Å.
    pub equilibrium: f64,
}

/// A molecule template: atom types, reference geometry and intramolecular terms.
///
/// Non-bonded interactions between atoms of the same molecule are weighted by a scaling
/// matrix derived from the bond graph: pairs one or two bonds apart are excluded, pairs
/// three bonds apart are scaled by [`ONE_FOUR_SCALE`] and everything else counts fully.
#[derive(Debug, Clone, PartialEq)]
pub struct Species {
    name: String,
    atoms: Vec<SpeciesAtom>,
    bonds: Vec<SpeciesBond>,
    scaling: Vec<f64>,
}

impl Species {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            atoms: Vec::new(),
            bonds: Vec::new(),
            scaling: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn atoms(&self) -> &[SpeciesAtom] {
        &self.atoms
    }

    pub fn bonds(&self) -> &[SpeciesBond] {
        &self.bonds
    }

    pub fn n_atoms(&self) -> usize {
        self.atoms.len()
    }

    /// Adds a template atom and returns its index within the species.
    pub fn add_atom(&mut self, type_index: usize, position: Point3<f64>) -> usize {
        self.atoms.push(SpeciesAtom {
            type_index,
            position,
        });
        self.rebuild_scaling();
        self.atoms.len() - 1
    }

    pub fn add_bond(
        &mut self,
        i: usize,
        j: usize,
        force_constant: f64,
        equilibrium: f64,
    ) -> Result<(), SpeciesError> {
        for index in [i, j] {
            if index >= self.atoms.len() {
                return Err(SpeciesError::UnknownAtom {
                    species: self.name.clone(),
                    index,
                });
            }
        }
        if i == j {
            return Err(SpeciesError::SelfBond {
                species: self.name.clone(),
                index: i,
            });
        }
        self.bonds.push(SpeciesBond {
            i,
            j,
            force_constant,
            equilibrium,
        });
        self.rebuild_scaling();
        Ok(())
    }

    /// Weight of the non-bonded interaction between template atoms `i` and `j`.
    #[inline]
    pub fn pair_scaling(&self, i: usize, j: usize) -> f64 {
        let n = self.atoms.len();
        if i >= n || j >= n {
            return 0.0;
        }
        self.scaling[i * n + j]
    }

    /// Geometric centre of the template coordinates.
    pub fn centre(&self) -> Point3<f64> {
        if self.atoms.is_empty() {
            return Point3::origin();
        }
        let sum = self
            .atoms
            .iter()
            .fold(nalgebra::Vector3::zeros(), |acc, a| acc + a.position.coords);
        Point3::from(sum / self.atoms.len() as f64)
    }

    fn rebuild_scaling(&mut self) {
        let n = self.atoms.len();
        let mut adjacency = vec![Vec::new(); n];
        for bond in &self.bonds {
            adjacency[bond.i].push(bond.j);
            adjacency[bond.j].push(bond.i);
        }

        self.scaling = vec![1.0; n * n];
        for start in 0..n {
            let mut depth = vec![usize::MAX; n];
            depth[start] = 0;
            let mut queue = VecDeque::from([start]);
            while let Some(current) = queue.pop_front() {
                if depth[current] >= 3 {
                    continue;
                }
                for &next in &adjacency[current] {
                    if depth[next] == usize::MAX {
                        depth[next] = depth[current] + 1;
                        queue.push_back(next);
                    }
                }
            }
            for (other, d) in depth.into_iter().enumerate() {
                self.scaling[start * n + other] = match d {
                    0..=2 => 0.0,
                    3 => ONE_FOUR_SCALE,
                    _ => 1.0,
                };
            }
        }
    }
}
