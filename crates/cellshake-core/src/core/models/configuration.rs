use super::atom::Atom;
use super::ids::{AtomId, MoleculeId};
use super::molecule::Molecule;
use super::species::Species;
use crate::core::space::CellIndex;
use crate::core::space::cell_array::CellArray;
use crate::core::space::periodic_box::PeriodicBox;
use nalgebra::{Point3, Rotation3, Vector3};
use slotmap::SlotMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ModelError {
    #[error("Atom {0:?} does not exist in the configuration")]
    AtomNotFound(AtomId),

    #[error("Molecule {0:?} does not exist in the configuration")]
    MoleculeNotFound(MoleculeId),

    #[error("Species index {0} does not exist in the configuration")]
    SpeciesNotFound(usize),

    #[error("Species '{species}' has {expected} atoms but {provided} positions were provided")]
    PositionCountMismatch {
        species: String,
        expected: usize,
        provided: usize,
    },

    #[error("Species '{0}' has no atoms")]
    EmptySpecies(String),

    #[error("Temperature must be positive and finite, got {0}")]
    InvalidTemperature(f64),
}

/// A periodic particle system together with its cell array spatial index.
///
/// The configuration owns every atom and molecule and is the single authority on which
/// atoms occupy which cell. Molecules receive a stable array index in insertion order; this
/// is the object index used by the distributors.
#[derive(Debug, Clone)]
pub struct Configuration {
    periodic_box: PeriodicBox,
    cells: CellArray,
    species: Vec<Species>,
    atoms: SlotMap<AtomId, Atom>,
    molecules: SlotMap<MoleculeId, Molecule>,
    molecule_order: Vec<MoleculeId>,
    cell_contents: Vec<Vec<AtomId>>,
    temperature: f64,
    coordinate_index: u64,
}

impl Configuration {
    pub fn new(
        periodic_box: PeriodicBox,
        cells: CellArray,
        temperature: f64,
    ) -> Result<Self, ModelError> {
        if !temperature.is_finite() || temperature <= 0.0 {
            return Err(ModelError::InvalidTemperature(temperature));
        }
        let n_cells = cells.n_cells();
        Ok(Self {
            periodic_box,
            cells,
            species: Vec::new(),
            atoms: SlotMap::with_key(),
            molecules: SlotMap::with_key(),
            molecule_order: Vec::new(),
            cell_contents: vec![Vec::new(); n_cells],
            temperature,
            coordinate_index: 0,
        })
    }

    // --- Accessors ---

    #[inline]
    pub fn periodic_box(&self) -> &PeriodicBox {
        &self.periodic_box
    }

    #[inline]
    pub fn cells(&self) -> &CellArray {
        &self.cells
    }

    #[inline]
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Counter bumped whenever accepted coordinate changes are registered.
    #[inline]
    pub fn coordinate_index(&self) -> u64 {
        self.coordinate_index
    }

    pub fn increment_coordinate_index(&mut self) {
        self.coordinate_index += 1;
    }

    pub fn species(&self, index: usize) -> Option<&Species> {
        self.species.get(index)
    }

    pub fn n_species(&self) -> usize {
        self.species.len()
    }

    #[inline]
    pub fn atom(&self, id: AtomId) -> Option<&Atom> {
        self.atoms.get(id)
    }

    pub fn atoms_iter(&self) -> impl Iterator<Item = (AtomId, &Atom)> {
        self.atoms.iter()
    }

    #[inline]
    pub fn n_atoms(&self) -> usize {
        self.atoms.len()
    }

    #[inline]
    pub fn molecule(&self, id: MoleculeId) -> Option<&Molecule> {
        self.molecules.get(id)
    }

    /// Molecule with the given stable array index.
    #[inline]
    pub fn molecule_id(&self, array_index: usize) -> Option<MoleculeId> {
        self.molecule_order.get(array_index).copied()
    }

    #[inline]
    pub fn molecule_ids(&self) -> &[MoleculeId] {
        &self.molecule_order
    }

    #[inline]
    pub fn n_molecules(&self) -> usize {
        self.molecule_order.len()
    }

    /// Atoms currently inside a cell, in a canonical order.
    pub fn atoms_in_cell(&self, cell: CellIndex) -> &[AtomId] {
        self.cell_contents
            .get(cell)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    // --- Construction ---

    pub fn add_species(&mut self, species: Species) -> usize {
        self.species.push(species);
        self.species.len() - 1
    }

    /// Adds a molecule of an existing species with explicit atom positions.
    pub fn add_molecule(
        &mut self,
        species_index: usize,
        positions: &[Point3<f64>],
    ) -> Result<MoleculeId, ModelError> {
        let species = self
            .species
            .get(species_index)
            .ok_or(ModelError::SpeciesNotFound(species_index))?;
        // Molecules are located through the atoms in each cell.
        if species.n_atoms() == 0 {
            return Err(ModelError::EmptySpecies(species.name().to_string()));
        }
        if species.n_atoms() != positions.len() {
            return Err(ModelError::PositionCountMismatch {
                species: species.name().to_string(),
                expected: species.n_atoms(),
                provided: positions.len(),
            });
        }
        let types: Vec<usize> = species.atoms().iter().map(|a| a.type_index).collect();

        let array_index = self.molecule_order.len();
        let mol_id = self
            .molecules
            .insert(Molecule::new(species_index, array_index));
        self.molecule_order.push(mol_id);

        for (k, (type_index, position)) in types.into_iter().zip(positions).enumerate() {
            let folded = self.periodic_box.fold(position);
            let cell = self.cells.cell_index_for(&self.periodic_box, &folded);
            let atom_id = self
                .atoms
                .insert(Atom::new(type_index, mol_id, k, folded, cell));
            self.insert_into_cell(cell, atom_id);
            self.molecules[mol_id].push_atom(atom_id);
        }

        Ok(mol_id)
    }

    // --- Coordinate updates ---

    /// Moves an atom, folding the position into the box and updating its cell membership.
    pub fn set_atom_position(
        &mut self,
        id: AtomId,
        position: Point3<f64>,
    ) -> Result<(), ModelError> {
        let folded = self.periodic_box.fold(&position);
        let new_cell = self.cells.cell_index_for(&self.periodic_box, &folded);
        let atom = self.atoms.get_mut(id).ok_or(ModelError::AtomNotFound(id))?;
        let old_cell = atom.cell;
        atom.position = folded;
        atom.cell = new_cell;
        if old_cell != new_cell {
            self.remove_from_cell(old_cell, id);
            self.insert_into_cell(new_cell, id);
        }
        Ok(())
    }

    pub fn translate_atom(&mut self, id: AtomId, delta: &Vector3<f64>) -> Result<(), ModelError> {
        let position = self.atoms.get(id).ok_or(ModelError::AtomNotFound(id))?.position + *delta;
        self.set_atom_position(id, position)
    }

    pub fn translate_molecule(
        &mut self,
        id: MoleculeId,
        delta: &Vector3<f64>,
    ) -> Result<(), ModelError> {
        let atoms = self.molecule_atoms(id)?;
        for atom in atoms {
            self.translate_atom(atom, delta)?;
        }
        Ok(())
    }

    /// Rotates a molecule rigidly about its centre of geometry.
    pub fn rotate_molecule(
        &mut self,
        id: MoleculeId,
        rotation: &Rotation3<f64>,
    ) -> Result<(), ModelError> {
        let centre = self.centre_of_geometry(id)?;
        let atoms = self.molecule_atoms(id)?;
        for atom in atoms {
            let current = self.atoms[atom].position;
            let unfolded = self.periodic_box.minimum_image_point(&centre, &current);
            let rotated = centre + rotation * (unfolded - centre);
            self.set_atom_position(atom, rotated)?;
        }
        Ok(())
    }

    /// Centre of geometry under the minimum-image convention, folded into the box.
    pub fn centre_of_geometry(&self, id: MoleculeId) -> Result<Point3<f64>, ModelError> {
        let molecule = self.molecules.get(id).ok_or(ModelError::MoleculeNotFound(id))?;
        let Some(&first) = molecule.atoms().first() else {
            return Ok(Point3::origin());
        };
        let reference = self.atoms[first].position;
        let sum = molecule.atoms().iter().fold(Vector3::zeros(), |acc, &a| {
            acc + self
                .periodic_box
                .minimum_image_point(&reference, &self.atoms[a].position)
                .coords
        });
        let centre = Point3::from(sum / molecule.n_atoms() as f64);
        Ok(self.periodic_box.fold(&centre))
    }

    /// Distinct cells holding any atom of the molecule, in first-seen order.
    pub fn cells_of_molecule(&self, id: MoleculeId) -> Result<Vec<CellIndex>, ModelError> {
        let molecule = self.molecules.get(id).ok_or(ModelError::MoleculeNotFound(id))?;
        let mut cells = Vec::with_capacity(molecule.n_atoms());
        for &atom in molecule.atoms() {
            let cell = self.atoms[atom].cell;
            if !cells.contains(&cell) {
                cells.push(cell);
            }
        }
        Ok(cells)
    }

    fn molecule_atoms(&self, id: MoleculeId) -> Result<Vec<AtomId>, ModelError> {
        Ok(self
            .molecules
            .get(id)
            .ok_or(ModelError::MoleculeNotFound(id))?
            .atoms()
            .to_vec())
    }

    // Cell contents are kept sorted so every replica iterates them in the same order,
    // independent of the move history that produced the current positions.
    fn insert_into_cell(&mut self, cell: CellIndex, atom: AtomId) {
        let contents = &mut self.cell_contents[cell];
        if let Err(pos) = contents.binary_search(&atom) {
            contents.insert(pos, atom);
        }
    }

    fn remove_from_cell(&mut self, cell: CellIndex, atom: AtomId) {
        let contents = &mut self.cell_contents[cell];
        if let Ok(pos) = contents.binary_search(&atom) {
            contents.remove(pos);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-9;

    fn diatomic() -> Species {
        let mut s = Species::new("diatomic");
        s.add_atom(0, Point3::new(0.0, 0.0, 0.0));
        s.add_atom(0, Point3::new(1.0, 0.0, 0.0));
        s.add_bond(0, 1, 500.0, 1.0).unwrap();
        s
    }

    fn empty_config() -> Configuration {
        let b = PeriodicBox::cubic(12.0).unwrap();
        let cells = CellArray::generate([3, 3, 3], [1, 1, 1]).unwrap();
        Configuration::new(b, cells, 300.0).unwrap()
    }

    #[test]
    fn new_rejects_invalid_temperature() {
        let b = PeriodicBox::cubic(12.0).unwrap();
        let cells = CellArray::generate([3, 3, 3], [1, 1, 1]).unwrap();
        assert_eq!(
            Configuration::new(b, cells, 0.0).unwrap_err(),
            ModelError::InvalidTemperature(0.0)
        );
    }

    #[test]
    fn add_molecule_folds_positions_and_fills_cells() {
        let mut cfg = empty_config();
        let sp = cfg.add_species(diatomic());
        let mol = cfg
            .add_molecule(sp, &[Point3::new(-0.5, 1.0, 1.0), Point3::new(0.5, 1.0, 1.0)])
            .unwrap();

        assert_eq!(cfg.n_molecules(), 1);
        assert_eq!(cfg.n_atoms(), 2);
        assert_eq!(cfg.molecule_id(0), Some(mol));

        let atoms = cfg.molecule(mol).unwrap().atoms().to_vec();
        let first = cfg.atom(atoms[0]).unwrap();
        assert!((first.position().x - 11.5).abs() < TOLERANCE);
        assert!(cfg.atoms_in_cell(first.cell()).contains(&atoms[0]));

        let cells = cfg.cells_of_molecule(mol).unwrap();
        assert_eq!(cells.len(), 2);
    }

    #[test]
    fn add_molecule_rejects_wrong_position_count() {
        let mut cfg = empty_config();
        let sp = cfg.add_species(diatomic());
        assert!(matches!(
            cfg.add_molecule(sp, &[Point3::origin()]),
            Err(ModelError::PositionCountMismatch { .. })
        ));
        assert_eq!(
            cfg.add_molecule(5, &[]).unwrap_err(),
            ModelError::SpeciesNotFound(5)
        );
    }

    #[test]
    fn add_molecule_rejects_species_without_atoms() {
        let mut cfg = empty_config();
        let sp = cfg.add_species(Species::new("ghost"));
        assert_eq!(
            cfg.add_molecule(sp, &[]).unwrap_err(),
            ModelError::EmptySpecies("ghost".to_string())
        );
        assert_eq!(cfg.n_molecules(), 0);
    }

    #[test]
    fn set_atom_position_moves_atom_between_cells() {
        let mut cfg = empty_config();
        let sp = cfg.add_species(diatomic());
        let mol = cfg
            .add_molecule(sp, &[Point3::new(1.0, 1.0, 1.0), Point3::new(2.0, 1.0, 1.0)])
            .unwrap();
        let atom = cfg.molecule(mol).unwrap().atoms()[0];
        let old_cell = cfg.atom(atom).unwrap().cell();

        cfg.set_atom_position(atom, Point3::new(6.0, 6.0, 6.0)).unwrap();
        let new_cell = cfg.atom(atom).unwrap().cell();

        assert_ne!(old_cell, new_cell);
        assert!(!cfg.atoms_in_cell(old_cell).contains(&atom));
        assert!(cfg.atoms_in_cell(new_cell).contains(&atom));
    }

    #[test]
    fn centre_of_geometry_respects_periodicity() {
        let mut cfg = empty_config();
        let sp = cfg.add_species(diatomic());
        let mol = cfg
            .add_molecule(sp, &[Point3::new(11.5, 3.0, 3.0), Point3::new(0.5, 3.0, 3.0)])
            .unwrap();
        let centre = cfg.centre_of_geometry(mol).unwrap();
        assert!(centre.x.abs() < TOLERANCE || (centre.x - 12.0).abs() < TOLERANCE);
        assert!((centre.y - 3.0).abs() < TOLERANCE);
    }

    #[test]
    fn rotate_molecule_preserves_bond_length_and_centre() {
        let mut cfg = empty_config();
        let sp = cfg.add_species(diatomic());
        let mol = cfg
            .add_molecule(sp, &[Point3::new(5.0, 5.0, 5.0), Point3::new(6.0, 5.0, 5.0)])
            .unwrap();
        let before = cfg.centre_of_geometry(mol).unwrap();

        let rotation = Rotation3::from_euler_angles(0.0, 0.0, std::f64::consts::FRAC_PI_2);
        cfg.rotate_molecule(mol, &rotation).unwrap();

        let after = cfg.centre_of_geometry(mol).unwrap();
        assert!((before - after).norm() < TOLERANCE);

        let atoms = cfg.molecule(mol).unwrap().atoms().to_vec();
        let a = cfg.atom(atoms[0]).unwrap().position();
        let b = cfg.atom(atoms[1]).unwrap().position();
        assert!((cfg.periodic_box().minimum_image_distance(a, b) - 1.0).abs() < TOLERANCE);
        assert!((a.y - 5.5).abs() < TOLERANCE || (a.y - 4.5).abs() < TOLERANCE);
    }

    #[test]
    fn translate_molecule_moves_every_atom() {
        let mut cfg = empty_config();
        let sp = cfg.add_species(diatomic());
        let mol = cfg
            .add_molecule(sp, &[Point3::new(5.0, 5.0, 5.0), Point3::new(6.0, 5.0, 5.0)])
            .unwrap();
        cfg.translate_molecule(mol, &Vector3::new(0.0, 0.0, 8.0)).unwrap();
        for &atom in cfg.molecule(mol).unwrap().atoms() {
            assert!((cfg.atom(atom).unwrap().position().z - 1.0).abs() < TOLERANCE);
        }
    }
}
