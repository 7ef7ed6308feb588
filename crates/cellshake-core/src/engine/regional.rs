//! Cycle-based distribution of whole batches of molecules to process groups.
//!
//! Where [`Distributor`](super::distributor::Distributor) hands out one object per group
//! per round, a [`RegionalDistributor`] grows a region of cells for each group in turn and
//! assigns every molecule that fits inside it. A cell a group edits is
//! [`CellStatus::LockedForEditing`]; the cells around it are marked as read by that group.
//! No group may edit a cell another group reads or edits, so the batches of one cycle can
//! be processed independently and their changes exchanged once at the end of the cycle.

use super::error::EngineError;
use super::pool::{DivisionStrategy, ProcessPool};
use crate::core::models::configuration::{Configuration, ModelError};
use crate::core::models::ids::MoleculeId;
use crate::core::space::CellIndex;
use std::collections::BTreeSet;
use tracing::{debug, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellStatus {
    Unused,
    LockedForEditing,
    ReadByOne,
    ReadByMany,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoleculeStatus {
    ToDo,
    Assigned,
    Completed,
}

#[derive(Debug, Clone)]
pub struct RegionalDistributor {
    original_strategy: DivisionStrategy,
    current_strategy: DivisionStrategy,
    original_limits: (usize, usize),
    pool_limits: (usize, usize),
    n_groups: usize,
    group_index: usize,
    is_master: bool,
    n_cycles: usize,
    cell_status: Vec<CellStatus>,
    lock_owners: Vec<Option<usize>>,
    locked_cells: Vec<BTreeSet<CellIndex>>,
    molecule_status: Vec<MoleculeStatus>,
    assigned: Vec<Vec<usize>>,
    n_to_distribute: usize,
    n_distributed: usize,
}

impl RegionalDistributor {
    pub fn new<P: ProcessPool>(
        cfg: &Configuration,
        pool: &P,
        strategy: DivisionStrategy,
    ) -> Result<Self, EngineError> {
        let original_limits = limits(pool, strategy)?;
        let pool_limits = limits(pool, DivisionStrategy::Pool)?;
        let n_cells = cfg.cells().n_cells();
        let n_molecules = cfg.n_molecules();
        let (n_groups, group_index) = original_limits;

        Ok(Self {
            original_strategy: strategy,
            current_strategy: strategy,
            original_limits,
            pool_limits,
            n_groups,
            group_index,
            is_master: pool.is_master(),
            n_cycles: 0,
            cell_status: vec![CellStatus::Unused; n_cells],
            lock_owners: vec![None; n_cells],
            locked_cells: vec![BTreeSet::new(); n_groups],
            molecule_status: vec![MoleculeStatus::ToDo; n_molecules],
            assigned: vec![Vec::new(); n_groups],
            n_to_distribute: n_molecules,
            n_distributed: 0,
        })
    }

    /// Restricts the work to the listed molecules; all others count as completed.
    pub fn set_target_molecules(&mut self, molecules: &[usize]) -> Result<(), EngineError> {
        let n_objects = self.molecule_status.len();
        if let Some(&index) = molecules.iter().find(|&&i| i >= n_objects) {
            return Err(EngineError::ObjectOutOfRange { index, n_objects });
        }
        self.molecule_status.fill(MoleculeStatus::Completed);
        for &i in molecules {
            self.molecule_status[i] = MoleculeStatus::ToDo;
        }
        self.n_to_distribute = self
            .molecule_status
            .iter()
            .filter(|s| **s == MoleculeStatus::ToDo)
            .count();
        self.n_distributed = 0;
        Ok(())
    }

    /// Builds the next set of molecule batches. Returns `false` once every target molecule
    /// has been handed out.
    ///
    /// If any group ends up without a molecule the cycle falls back to the pool strategy,
    /// and every process works on the full list of assigned molecules.
    #[instrument(level = "debug", skip_all, fields(cycle = self.n_cycles + 1))]
    pub fn cycle(&mut self, cfg: &Configuration) -> Result<bool, EngineError> {
        if self.n_distributed >= self.n_to_distribute {
            debug!("All target molecules distributed.");
            return Ok(false);
        }

        for group in 0..self.assigned.len() {
            self.assigned[group].clear();
            self.locked_cells[group].clear();
        }
        self.cell_status.fill(CellStatus::Unused);
        self.lock_owners.fill(None);
        self.current_strategy = self.original_strategy;
        (self.n_groups, self.group_index) = self.original_limits;

        if self.n_groups == 1 {
            for (index, status) in self.molecule_status.iter_mut().enumerate() {
                if *status == MoleculeStatus::ToDo {
                    *status = MoleculeStatus::Assigned;
                    self.assigned[0].push(index);
                    self.n_distributed += 1;
                }
            }
        } else {
            let mut exhausted = vec![false; self.n_groups];
            while exhausted.iter().any(|e| !e) {
                for group in 0..self.n_groups {
                    if exhausted[group] {
                        continue;
                    }
                    match self.assign_molecule(cfg, group)? {
                        Some(index) => {
                            self.assigned[group].push(index);
                            self.molecule_status[index] = MoleculeStatus::Assigned;
                            self.n_distributed += 1;
                        }
                        None => exhausted[group] = true,
                    }
                }

                if self.assigned.iter().any(Vec::is_empty) {
                    self.revert_to_pool();
                    break;
                }
            }
        }

        self.n_cycles += 1;
        for (group, molecules) in self.assigned.iter().enumerate().take(self.n_groups) {
            debug!(
                group,
                molecules = molecules.len(),
                locked_cells = self.locked_cells[group].len(),
                "Regional distribution cycle complete."
            );
        }
        for status in &mut self.molecule_status {
            if *status == MoleculeStatus::Assigned {
                *status = MoleculeStatus::Completed;
            }
        }
        Ok(true)
    }

    /// Molecules assigned to this process in the last cycle.
    pub fn assigned_molecules(&self) -> &[usize] {
        self.assigned_molecules_for(self.group_index)
    }

    pub fn assigned_molecules_for(&self, group: usize) -> &[usize] {
        self.assigned.get(group).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn current_strategy(&self) -> DivisionStrategy {
        self.current_strategy
    }

    pub fn n_groups(&self) -> usize {
        self.n_groups
    }

    pub fn n_cycles(&self) -> usize {
        self.n_cycles
    }

    pub fn n_molecules_distributed(&self) -> usize {
        self.n_distributed
    }

    pub fn cell_status(&self, cell: CellIndex) -> Option<CellStatus> {
        self.cell_status.get(cell).copied()
    }

    pub fn lock_owner(&self, cell: CellIndex) -> Option<usize> {
        self.lock_owners.get(cell).copied().flatten()
    }

    pub fn molecule_status(&self, index: usize) -> Option<MoleculeStatus> {
        self.molecule_status.get(index).copied()
    }

    /// Whether this process should accumulate statistics for the last cycle, so that each
    /// molecule is counted once across the pool.
    pub fn collect_statistics(&self) -> bool {
        self.current_strategy == DivisionStrategy::Pool || self.is_master
    }

    fn revert_to_pool(&mut self) {
        let all: Vec<usize> = self
            .molecule_status
            .iter()
            .enumerate()
            .filter(|(_, s)| **s == MoleculeStatus::Assigned)
            .map(|(i, _)| i)
            .collect();
        for list in &mut self.assigned {
            list.clone_from(&all);
        }
        self.current_strategy = DivisionStrategy::Pool;
        (self.n_groups, self.group_index) = self.pool_limits;
        debug!(
            molecules = all.len(),
            "Reverted to pool strategy; every process shares the same molecules."
        );
    }

    fn can_lock_for_editing(&self, group: usize, cell: CellIndex) -> bool {
        match self.cell_status[cell] {
            CellStatus::Unused => true,
            CellStatus::LockedForEditing | CellStatus::ReadByOne => {
                self.lock_owners[cell] == Some(group)
            }
            CellStatus::ReadByMany => false,
        }
    }

    fn assign_molecule(
        &mut self,
        cfg: &Configuration,
        group: usize,
    ) -> Result<Option<usize>, EngineError> {
        let locked: Vec<CellIndex> = self.locked_cells[group].iter().copied().collect();
        for cell in locked {
            if let Some(index) = self.assign_from_cell(cfg, cell, group)? {
                return Ok(Some(index));
            }
        }

        if !self.locked_cells[group].is_empty() {
            for cell in 0..self.cell_status.len() {
                if self.cell_status[cell] != CellStatus::ReadByOne
                    || self.lock_owners[cell] != Some(group)
                {
                    continue;
                }
                if let Some(index) = self.assign_from_cell(cfg, cell, group)? {
                    return Ok(Some(index));
                }
            }
        }

        for cell in 0..self.cell_status.len() {
            if self.cell_status[cell] != CellStatus::Unused {
                continue;
            }
            if let Some(index) = self.assign_from_cell(cfg, cell, group)? {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    fn assign_from_cell(
        &mut self,
        cfg: &Configuration,
        cell: CellIndex,
        group: usize,
    ) -> Result<Option<usize>, EngineError> {
        let mut checked: Vec<MoleculeId> = Vec::new();
        for &atom in cfg.atoms_in_cell(cell) {
            let molecule = cfg
                .atom(atom)
                .ok_or(ModelError::AtomNotFound(atom))?
                .molecule_id;
            if checked.contains(&molecule) {
                continue;
            }
            if let Some(index) = self.try_assign(cfg, molecule, group)? {
                return Ok(Some(index));
            }
            checked.push(molecule);
        }
        Ok(None)
    }

    fn try_assign(
        &mut self,
        cfg: &Configuration,
        id: MoleculeId,
        group: usize,
    ) -> Result<Option<usize>, EngineError> {
        let molecule = cfg.molecule(id).ok_or(ModelError::MoleculeNotFound(id))?;
        let index = molecule.array_index();
        if self.molecule_status.get(index) != Some(&MoleculeStatus::ToDo) {
            return Ok(None);
        }

        let mut primary: Vec<CellIndex> = Vec::new();
        for cell in cfg.cells_of_molecule(id)? {
            if self.lock_owners[cell] == Some(group)
                && self.cell_status[cell] == CellStatus::LockedForEditing
            {
                continue;
            }
            if !self.can_lock_for_editing(group, cell) {
                return Ok(None);
            }
            primary.push(cell);
        }

        let mut read_only = BTreeSet::new();
        for &cell in &primary {
            for neighbour in cfg.cells().neighbours(cell) {
                let n = neighbour.index;
                if self.cell_status[n] == CellStatus::LockedForEditing {
                    if self.lock_owners[n] == Some(group) {
                        continue;
                    }
                    return Ok(None);
                }
                read_only.insert(n);
            }
        }

        for &cell in &primary {
            match self.lock_owners[cell] {
                None => {}
                Some(owner) if owner == group => {}
                Some(owner) => {
                    return Err(EngineError::Internal(format!(
                        "cell {cell} is owned by group {owner} but group {group} tried to lock it"
                    )));
                }
            }
            self.locked_cells[group].insert(cell);
            self.lock_owners[cell] = Some(group);
            self.cell_status[cell] = CellStatus::LockedForEditing;
        }

        for cell in read_only {
            match self.cell_status[cell] {
                CellStatus::LockedForEditing => {
                    if self.lock_owners[cell] != Some(group) {
                        return Err(EngineError::Internal(format!(
                            "cell {cell} is locked for editing by another group and cannot be read by group {group}"
                        )));
                    }
                }
                CellStatus::Unused => {
                    self.cell_status[cell] = CellStatus::ReadByOne;
                    self.lock_owners[cell] = Some(group);
                }
                CellStatus::ReadByOne => {
                    if self.lock_owners[cell] != Some(group) {
                        self.cell_status[cell] = CellStatus::ReadByMany;
                        self.lock_owners[cell] = None;
                    }
                }
                CellStatus::ReadByMany => {}
            }
        }

        Ok(Some(index))
    }
}

fn limits<P: ProcessPool>(
    pool: &P,
    strategy: DivisionStrategy,
) -> Result<(usize, usize), EngineError> {
    let n = pool.n_divisions(strategy).max(1);
    let index = pool.division_index(strategy);
    if index >= n {
        return Err(EngineError::Internal(format!(
            "division index {index} is out of range for {n} divisions"
        )));
    }
    Ok((n, index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::species::Species;
    use crate::core::space::cell_array::CellArray;
    use crate::core::space::periodic_box::PeriodicBox;
    use crate::engine::pool::LocalPool;
    use nalgebra::Point3;

    fn line_with_monomers(n_cells: usize, xs: &[f64]) -> Configuration {
        let b = PeriodicBox::new([n_cells as f64, 1.0, 1.0]).unwrap();
        let cells = CellArray::generate([n_cells, 1, 1], [1, 0, 0]).unwrap();
        let mut cfg = Configuration::new(b, cells, 300.0).unwrap();
        let mut atom = Species::new("atom");
        atom.add_atom(0, Point3::origin());
        let sp = cfg.add_species(atom);
        for &x in xs {
            cfg.add_molecule(sp, &[Point3::new(x, 0.5, 0.5)]).unwrap();
        }
        cfg
    }

    fn distributor(cfg: &Configuration, n_groups: usize, group: usize) -> RegionalDistributor {
        let pool = LocalPool::as_group_member(n_groups, group, 0).unwrap();
        RegionalDistributor::new(cfg, &pool, DivisionStrategy::Groups).unwrap()
    }

    #[test]
    fn single_group_takes_every_molecule_in_one_cycle() {
        let cfg = line_with_monomers(8, &[0.5, 2.5, 4.5]);
        let mut d = distributor(&cfg, 1, 0);
        assert!(d.cycle(&cfg).unwrap());
        assert_eq!(d.assigned_molecules(), &[0, 1, 2]);
        assert_eq!(d.molecule_status(1), Some(MoleculeStatus::Completed));
        assert!(!d.cycle(&cfg).unwrap());
        assert_eq!(d.n_cycles(), 1);
    }

    #[test]
    fn separated_molecules_go_to_different_groups() {
        let cfg = line_with_monomers(8, &[0.5, 4.5]);
        let mut d = distributor(&cfg, 2, 1);
        assert!(d.cycle(&cfg).unwrap());

        assert_eq!(d.current_strategy(), DivisionStrategy::Groups);
        assert_eq!(d.assigned_molecules_for(0), &[0]);
        assert_eq!(d.assigned_molecules(), &[1]);
        assert_eq!(d.cell_status(0), Some(CellStatus::LockedForEditing));
        assert_eq!(d.lock_owner(0), Some(0));
        assert_eq!(d.cell_status(7), Some(CellStatus::ReadByOne));
        assert_eq!(d.cell_status(4), Some(CellStatus::LockedForEditing));
        assert_eq!(d.lock_owner(5), Some(1));
        assert!(!d.collect_statistics());
        assert!(!d.cycle(&cfg).unwrap());
    }

    #[test]
    fn cell_read_by_two_groups_is_shared() {
        let cfg = line_with_monomers(8, &[0.5, 2.5]);
        let mut d = distributor(&cfg, 2, 0);
        d.cycle(&cfg).unwrap();
        assert_eq!(d.assigned_molecules_for(1), &[1]);
        assert_eq!(d.cell_status(1), Some(CellStatus::ReadByMany));
        assert_eq!(d.lock_owner(1), None);
    }

    #[test]
    fn idle_group_forces_pool_strategy() {
        let cfg = line_with_monomers(8, &[0.5, 1.5]);
        let mut d = distributor(&cfg, 2, 1);

        let mut seen = Vec::new();
        while d.cycle(&cfg).unwrap() {
            assert_eq!(d.current_strategy(), DivisionStrategy::Pool);
            assert!(d.collect_statistics());
            assert_eq!(d.assigned_molecules_for(0), d.assigned_molecules_for(1));
            seen.extend_from_slice(d.assigned_molecules());
        }
        assert_eq!(seen, vec![0, 1]);
        assert_eq!(d.n_cycles(), 2);
    }

    #[test]
    fn cycles_end_once_every_placed_molecule_is_handed_out() {
        let mut cfg = line_with_monomers(8, &[0.5, 4.5]);
        let ghost = cfg.add_species(Species::new("ghost"));
        assert!(matches!(
            cfg.add_molecule(ghost, &[]),
            Err(ModelError::EmptySpecies(_))
        ));

        let mut d = distributor(&cfg, 2, 0);
        let mut cycles = 0;
        while d.cycle(&cfg).unwrap() {
            cycles += 1;
            assert!(cycles <= 4, "cycle() kept returning true");
        }
        assert_eq!(d.n_molecules_distributed(), 2);
    }

    #[test]
    fn target_molecules_restrict_the_work() {
        let cfg = line_with_monomers(8, &[0.5, 2.5, 4.5]);
        let mut d = distributor(&cfg, 1, 0);
        d.set_target_molecules(&[2]).unwrap();
        assert!(d.cycle(&cfg).unwrap());
        assert_eq!(d.assigned_molecules(), &[2]);
        assert!(!d.cycle(&cfg).unwrap());
        assert!(matches!(
            d.set_target_molecules(&[3]),
            Err(EngineError::ObjectOutOfRange { index: 3, .. })
        ));
    }
}
