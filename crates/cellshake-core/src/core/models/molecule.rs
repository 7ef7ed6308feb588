use super::ids::AtomId;

/// One instance of a species inside a configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Molecule {
    species_index: usize,
    /// Position of the molecule in the configuration's stable ordering.
    array_index: usize,
    atoms: Vec<AtomId>,
}

impl Molecule {
    pub(crate) fn new(species_index: usize, array_index: usize) -> Self {
        Self {
            species_index,
            array_index,
            atoms: Vec::new(),
        }
    }

    pub(crate) fn push_atom(&mut self, atom: AtomId) {
        self.atoms.push(atom);
    }

    #[inline]
    pub fn species_index(&self) -> usize {
        self.species_index
    }

    #[inline]
    pub fn array_index(&self) -> usize {
        self.array_index
    }

    /// Atoms in species-template order.
    #[inline]
    pub fn atoms(&self) -> &[AtomId] {
        &self.atoms
    }

    #[inline]
    pub fn n_atoms(&self) -> usize {
        self.atoms.len()
    }
}
