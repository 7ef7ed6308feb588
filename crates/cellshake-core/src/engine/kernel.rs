use crate::core::forcefield::potential_map::PotentialMap;
use crate::core::forcefield::potentials;
use crate::core::models::atom::Atom;
use crate::core::models::configuration::{Configuration, ModelError};
use crate::core::models::ids::{AtomId, MoleculeId};
use crate::core::space::CellIndex;
use nalgebra::Point3;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Intramolecular pairs weighted below this are skipped entirely.
const MIN_PAIR_SCALE: f64 = 1e-3;

/// Rescaling applied by [`EnergyKernel::scaled`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KernelScaling {
    /// Factor applied to the separation of atoms in different molecules before lookup.
    pub inter_distance_scale: f64,
    /// Factor applied to the energy of atoms in the same molecule.
    pub intra_energy_scale: f64,
}

/// Pair-energy evaluator over the cell array of a configuration.
///
/// Separations at or beyond the cutoff contribute nothing.
#[derive(Debug, Clone, Copy)]
pub struct EnergyKernel<'a> {
    map: &'a PotentialMap,
    cutoff: f64,
    scaling: Option<KernelScaling>,
}

impl<'a> EnergyKernel<'a> {
    /// A missing or non-positive cutoff falls back to the range of the potential map.
    pub fn new(map: &'a PotentialMap, cutoff: Option<f64>) -> Self {
        let cutoff = cutoff.filter(|c| *c > 0.0).unwrap_or(map.range());
        Self {
            map,
            cutoff,
            scaling: None,
        }
    }

    pub fn scaled(map: &'a PotentialMap, cutoff: Option<f64>, scaling: KernelScaling) -> Self {
        Self {
            scaling: Some(scaling),
            ..Self::new(map, cutoff)
        }
    }

    #[inline]
    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    #[inline]
    pub fn scaling(&self) -> Option<KernelScaling> {
        self.scaling
    }

    /// Energy of two atoms at separation `r`.
    #[inline]
    pub fn pair_energy(&self, i: &Atom, j: &Atom, r: f64) -> f64 {
        if r >= self.cutoff {
            return 0.0;
        }
        match self.scaling {
            None => self.map.energy(i.type_index, j.type_index, r),
            Some(s) if i.molecule_id == j.molecule_id => {
                self.map.energy(i.type_index, j.type_index, r) * s.intra_energy_scale
            }
            Some(s) => self
                .map
                .energy(i.type_index, j.type_index, r * s.inter_distance_scale),
        }
    }

    /// Intermolecular energy of one atom with every atom in its own and neighbouring cells.
    pub fn atom_energy(&self, cfg: &Configuration, id: AtomId) -> Result<f64, ModelError> {
        let atom = cfg.atom(id).ok_or(ModelError::AtomNotFound(id))?;
        let cells = cfg.cells();
        let mut energy =
            self.atom_cell_energy(cfg, atom, atom.cell(), cells.own_cell_requires_mim());
        for neighbour in cells.neighbours(atom.cell()) {
            energy += self.atom_cell_energy(cfg, atom, neighbour.index, neighbour.requires_mim);
        }
        Ok(energy)
    }

    /// Intermolecular energy of a molecule, optionally including its intramolecular terms.
    pub fn molecule_energy(
        &self,
        cfg: &Configuration,
        id: MoleculeId,
        include_intramolecular: bool,
    ) -> Result<f64, ModelError> {
        let atoms = cfg
            .molecule(id)
            .ok_or(ModelError::MoleculeNotFound(id))?
            .atoms();
        let mut energy = sum_terms(atoms, |&a| self.atom_energy(cfg, a))?;
        if include_intramolecular {
            energy += self.intramolecular_energy(cfg, id)?;
        }
        Ok(energy)
    }

    /// Harmonic bond energy plus the scaled non-bonded energy of every atom pair.
    pub fn intramolecular_energy(
        &self,
        cfg: &Configuration,
        id: MoleculeId,
    ) -> Result<f64, ModelError> {
        let molecule = cfg.molecule(id).ok_or(ModelError::MoleculeNotFound(id))?;
        let species = cfg
            .species(molecule.species_index())
            .ok_or(ModelError::SpeciesNotFound(molecule.species_index()))?;
        let atoms: Vec<&Atom> = molecule
            .atoms()
            .iter()
            .map(|&a| cfg.atom(a).ok_or(ModelError::AtomNotFound(a)))
            .collect::<Result<_, _>>()?;
        let pbox = cfg.periodic_box();

        let mut energy = 0.0;
        for bond in species.bonds() {
            let (Some(a), Some(b)) = (atoms.get(bond.i), atoms.get(bond.j)) else {
                continue;
            };
            let r = pbox.minimum_image_distance(a.position(), b.position());
            energy += potentials::harmonic(r, bond.force_constant, bond.equilibrium);
        }

        for (i, a) in atoms.iter().enumerate() {
            for (j, b) in atoms.iter().enumerate().skip(i + 1) {
                let scale = species.pair_scaling(i, j);
                if scale < MIN_PAIR_SCALE {
                    continue;
                }
                let r = pbox.minimum_image_distance(a.position(), b.position());
                energy += scale * self.pair_energy(a, b, r);
            }
        }
        Ok(energy)
    }

    /// Total energy of the configuration, counting every intermolecular pair once.
    pub fn total_energy(&self, cfg: &Configuration) -> Result<f64, ModelError> {
        let molecules = cfg.molecule_ids();
        let inter = sum_terms(molecules, |&m| self.molecule_energy(cfg, m, false))?;
        let intra = sum_terms(molecules, |&m| self.intramolecular_energy(cfg, m))?;
        Ok(0.5 * inter + intra)
    }

    fn atom_cell_energy(
        &self,
        cfg: &Configuration,
        atom: &Atom,
        cell: CellIndex,
        use_mim: bool,
    ) -> f64 {
        let pbox = cfg.periodic_box();
        let origin: &Point3<f64> = atom.position();
        cfg.atoms_in_cell(cell)
            .iter()
            .filter_map(|&other| cfg.atom(other))
            .filter(|other| other.molecule_id != atom.molecule_id)
            .map(|other| {
                let r = if use_mim {
                    pbox.minimum_image_distance(origin, other.position())
                } else {
                    (*other.position() - *origin).norm()
                };
                self.pair_energy(atom, other, r)
            })
            .sum()
    }
}

// Terms are evaluated in parallel where enabled but always summed in input order, so
// every process arrives at the same floating-point result.
fn sum_terms<T, F>(items: &[T], term: F) -> Result<f64, ModelError>
where
    T: Sync,
    F: Fn(&T) -> Result<f64, ModelError> + Sync + Send,
{
    #[cfg(not(feature = "parallel"))]
    let iterator = items.iter();

    #[cfg(feature = "parallel")]
    let iterator = items.par_iter();

    let terms: Vec<Result<f64, ModelError>> = iterator.map(term).collect();
    terms.into_iter().sum()
}
