use super::error::EngineError;
use super::pool::{CommScope, ProcessPool};
use crate::core::models::configuration::{Configuration, ModelError};
use crate::core::models::ids::{AtomId, MoleculeId};
use crate::core::space::CellIndex;
use nalgebra::Point3;
use tracing::trace;

/// Final position of an atom after a committed move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AtomChange {
    pub atom: AtomId,
    pub position: Point3<f64>,
}

#[derive(Debug, Clone, Copy)]
struct WatchedAtom {
    atom: AtomId,
    original: Point3<f64>,
    reference: Point3<f64>,
}

/// Transactional buffer for trial moves.
///
/// Atoms are staged with one of the `add_*` methods, which records their current position
/// as the reference. After a trial move the caller either commits the new positions as
/// the reference ([`update_all`](Self::update_all)) or restores the reference
/// ([`revert_all`](Self::revert_all)). [`store_and_reset`](Self::store_and_reset) files
/// the net result for every atom that ended somewhere other than where it started, and
/// [`distribute_and_apply`](Self::distribute_and_apply) hands the filed changes of every
/// process to every other one.
///
/// Changes carry absolute positions rather than displacements, so replicas that apply them
/// end with identical coordinates.
#[derive(Debug, Clone, Default)]
pub struct ChangeStore {
    targets: Vec<WatchedAtom>,
    changes: Vec<AtomChange>,
}

impl ChangeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_atom(&mut self, cfg: &Configuration, atom: AtomId) -> Result<(), ModelError> {
        let position = *cfg.atom(atom).ok_or(ModelError::AtomNotFound(atom))?.position();
        self.targets.push(WatchedAtom {
            atom,
            original: position,
            reference: position,
        });
        Ok(())
    }

    pub fn add_molecule(
        &mut self,
        cfg: &Configuration,
        molecule: MoleculeId,
    ) -> Result<(), ModelError> {
        let atoms = cfg
            .molecule(molecule)
            .ok_or(ModelError::MoleculeNotFound(molecule))?
            .atoms();
        for &atom in atoms {
            self.add_atom(cfg, atom)?;
        }
        Ok(())
    }

    /// Stages every atom currently inside `cell`.
    pub fn add_cell(&mut self, cfg: &Configuration, cell: CellIndex) -> Result<(), ModelError> {
        for &atom in cfg.atoms_in_cell(cell) {
            self.add_atom(cfg, atom)?;
        }
        Ok(())
    }

    pub fn update_all(&mut self, cfg: &Configuration) -> Result<(), ModelError> {
        for target in &mut self.targets {
            target.reference = current_position(cfg, target.atom)?;
        }
        Ok(())
    }

    pub fn update_atom(&mut self, cfg: &Configuration, atom: AtomId) -> Result<(), ModelError> {
        let position = current_position(cfg, atom)?;
        for target in self.targets.iter_mut().filter(|t| t.atom == atom) {
            target.reference = position;
        }
        Ok(())
    }

    pub fn revert_all(&self, cfg: &mut Configuration) -> Result<(), ModelError> {
        for target in &self.targets {
            cfg.set_atom_position(target.atom, target.reference)?;
        }
        Ok(())
    }

    pub fn revert_atom(&self, cfg: &mut Configuration, atom: AtomId) -> Result<(), ModelError> {
        if let Some(target) = self.targets.iter().find(|t| t.atom == atom) {
            cfg.set_atom_position(atom, target.reference)?;
        }
        Ok(())
    }

    /// Files the committed position of every moved atom and forgets all staged atoms.
    pub fn store_and_reset(&mut self) {
        let moved = self
            .targets
            .drain(..)
            .filter(|t| t.reference != t.original)
            .map(|t| AtomChange {
                atom: t.atom,
                position: t.reference,
            });
        self.changes.extend(moved);
    }

    /// Gathers the filed changes of every process in `scope` and applies all of them.
    ///
    /// Returns the number of changes applied. The local change list is emptied.
    pub fn distribute_and_apply<P: ProcessPool>(
        &mut self,
        cfg: &mut Configuration,
        pool: &P,
        scope: CommScope,
    ) -> Result<usize, EngineError> {
        let local = std::mem::take(&mut self.changes);
        let n_local = local.len();
        let all = pool.all_gather(local, scope)?;
        for change in &all {
            cfg.set_atom_position(change.atom, change.position)?;
        }
        trace!(
            local = n_local,
            total = all.len(),
            "Applied distributed coordinate changes."
        );
        Ok(all.len())
    }

    pub fn reset(&mut self) {
        self.targets.clear();
        self.changes.clear();
    }

    #[inline]
    pub fn n_targets(&self) -> usize {
        self.targets.len()
    }

    /// Number of filed changes awaiting distribution.
    #[inline]
    pub fn n_changes(&self) -> usize {
        self.changes.len()
    }

    pub fn changes(&self) -> &[AtomChange] {
        &self.changes
    }
}

fn current_position(cfg: &Configuration, atom: AtomId) -> Result<Point3<f64>, ModelError> {
    Ok(*cfg.atom(atom).ok_or(ModelError::AtomNotFound(atom))?.position())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::species::Species;
    use crate::core::space::cell_array::CellArray;
    use crate::core::space::periodic_box::PeriodicBox;
    use crate::engine::pool::LocalPool;
    use nalgebra::Vector3;

    fn two_dimers() -> Configuration {
        let b = PeriodicBox::cubic(10.0).unwrap();
        let cells = CellArray::generate([2, 2, 2], [1, 1, 1]).unwrap();
        let mut cfg = Configuration::new(b, cells, 300.0).unwrap();
        let mut dimer = Species::new("dimer");
        dimer.add_atom(0, Point3::origin());
        dimer.add_atom(0, Point3::new(1.0, 0.0, 0.0));
        let sp = cfg.add_species(dimer);
        cfg.add_molecule(sp, &[Point3::new(1.0, 1.0, 1.0), Point3::new(2.0, 1.0, 1.0)])
            .unwrap();
        cfg.add_molecule(sp, &[Point3::new(6.0, 6.0, 6.0), Point3::new(7.0, 6.0, 6.0)])
            .unwrap();
        cfg
    }

    fn positions(cfg: &Configuration) -> Vec<Point3<f64>> {
        cfg.molecule_ids()
            .iter()
            .flat_map(|&m| cfg.molecule(m).unwrap().atoms().to_vec())
            .map(|a| *cfg.atom(a).unwrap().position())
            .collect()
    }

    #[test]
    fn revert_restores_staged_positions() {
        let mut cfg = two_dimers();
        let before = positions(&cfg);
        let mol = cfg.molecule_id(0).unwrap();

        let mut store = ChangeStore::new();
        store.add_molecule(&cfg, mol).unwrap();
        assert_eq!(store.n_targets(), 2);

        cfg.translate_molecule(mol, &Vector3::new(0.5, 0.0, 0.0)).unwrap();
        store.revert_all(&mut cfg).unwrap();
        assert_eq!(positions(&cfg), before);

        store.store_and_reset();
        assert_eq!(store.n_changes(), 0);
        assert_eq!(store.n_targets(), 0);
    }

    #[test]
    fn update_then_revert_keeps_committed_move() {
        let mut cfg = two_dimers();
        let mol = cfg.molecule_id(0).unwrap();
        let mut store = ChangeStore::new();
        store.add_molecule(&cfg, mol).unwrap();

        cfg.translate_molecule(mol, &Vector3::new(0.5, 0.0, 0.0)).unwrap();
        store.update_all(&cfg).unwrap();
        let committed = positions(&cfg);

        cfg.translate_molecule(mol, &Vector3::new(0.0, 3.0, 0.0)).unwrap();
        store.revert_all(&mut cfg).unwrap();
        assert_eq!(positions(&cfg), committed);

        store.store_and_reset();
        assert_eq!(store.n_changes(), 2);
    }

    #[test]
    fn single_atom_update_and_revert() {
        let mut cfg = two_dimers();
        let mol = cfg.molecule_id(1).unwrap();
        let atoms = cfg.molecule(mol).unwrap().atoms().to_vec();
        let mut store = ChangeStore::new();
        store.add_molecule(&cfg, mol).unwrap();

        cfg.translate_atom(atoms[0], &Vector3::new(0.2, 0.0, 0.0)).unwrap();
        cfg.translate_atom(atoms[1], &Vector3::new(0.2, 0.0, 0.0)).unwrap();
        store.update_atom(&cfg, atoms[0]).unwrap();
        store.revert_atom(&mut cfg, atoms[1]).unwrap();

        store.store_and_reset();
        assert_eq!(store.changes().len(), 1);
        assert_eq!(store.changes()[0].atom, atoms[0]);
        assert!((store.changes()[0].position.x - 6.2).abs() < 1e-12);
        assert!((cfg.atom(atoms[1]).unwrap().position().x - 7.0).abs() < 1e-12);
    }

    #[test]
    fn distributed_changes_make_replicas_identical() {
        let mut worker = two_dimers();
        let mut replica = two_dimers();
        let pool = LocalPool::new(0);

        let mut store = ChangeStore::new();
        store.add_cell(&worker, 0).unwrap();
        let staged = store.n_targets();
        assert!(staged > 0);

        let mol = worker.molecule_id(0).unwrap();
        worker
            .rotate_molecule(
                mol,
                &nalgebra::Rotation3::from_euler_angles(0.3, 0.1, 0.0),
            )
            .unwrap();
        store.update_all(&worker).unwrap();
        store.store_and_reset();

        let filed = store.changes().to_vec();
        let applied = store
            .distribute_and_apply(&mut worker, &pool, CommScope::Pool)
            .unwrap();
        assert_eq!(applied, filed.len());
        assert_eq!(store.n_changes(), 0);

        for change in &filed {
            replica.set_atom_position(change.atom, change.position).unwrap();
        }
        assert_eq!(positions(&worker), positions(&replica));
    }
}
