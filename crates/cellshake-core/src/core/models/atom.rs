use super::ids::MoleculeId;
use crate::core::space::CellIndex;
use nalgebra::Point3;

/// An interaction site belonging to a molecule inside a configuration.
///
/// Atoms are owned by a [`Configuration`](super::configuration::Configuration), which keeps
/// the `cell` field consistent with `position`; both are therefore read-only outside the
/// models module.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// Index of the atom type in the potential map.
    pub type_index: usize,
    /// The molecule this atom belongs to.
    pub molecule_id: MoleculeId,
    /// Position of the atom within its species template.
    pub index_in_molecule: usize,
    /// Folded Cartesian coordinates in Angstroms.
    pub(crate) position: Point3<f64>,
    /// The cell whose volume contains `position`.
    pub(crate) cell: CellIndex,
}

impl Atom {
    pub(crate) fn new(
        type_index: usize,
        molecule_id: MoleculeId,
        index_in_molecule: usize,
        position: Point3<f64>,
        cell: CellIndex,
    ) -> Self {
        Self {
            type_index,
            molecule_id,
            index_in_molecule,
            position,
            cell,
        }
    }

    #[inline]
    pub fn position(&self) -> &Point3<f64> {
        &self.position
    }

    #[inline]
    pub fn cell(&self) -> CellIndex {
        self.cell
    }
}
