use super::error::EngineError;
use super::locks::{CellLocks, LockState};
use super::pool::{DivisionStrategy, ProcessPool};
use crate::core::models::configuration::Configuration;
use crate::core::space::CellIndex;
use std::collections::HashSet;
use tracing::{debug, instrument, trace, warn};

/// Fixed grouping of object indices to the cells they modify.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionMap {
    regions: Vec<Vec<CellIndex>>,
}

impl RegionMap {
    /// Repeated cells inside one region are dropped.
    pub fn new(regions: Vec<Vec<CellIndex>>) -> Self {
        let regions = regions
            .into_iter()
            .map(|cells| {
                let mut seen = HashSet::with_capacity(cells.len());
                cells.into_iter().filter(|c| seen.insert(*c)).collect()
            })
            .collect();
        Self { regions }
    }

    pub fn n_regions(&self) -> usize {
        self.regions.len()
    }

    pub fn cells(&self, region: usize) -> Option<&[CellIndex]> {
        self.regions.get(region).map(Vec::as_slice)
    }
}

/// What the distributor hands out, and which cells an object needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectGranularity {
    /// One object per cell; the object needs only its own cell.
    Cell,
    /// One object per molecule; the object needs every cell holding one of its atoms.
    Molecule,
    /// One object per region of an externally supplied map.
    Region(RegionMap),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectStatus {
    Waiting,
    Distributed,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Object(usize),
    /// Nothing can be handed out to this group this round. Not an error.
    NoneAvailable,
    AllComplete,
}

/// Outcome of one distribution round, as seen by the calling process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Distribution {
    pub target: Target,
    /// Stored changes must be broadcast to every process before any group starts work.
    pub changes_broadcast_required: bool,
}

/// Hands out objects to process groups so that no two groups ever modify overlapping cells.
///
/// Every process runs the full decision for every group each round and keeps only its own
/// result. All inputs to that decision (object statuses, lock states and the modification
/// ledger) are replicated, so every process reaches the same assignment without exchanging
/// a single message. The ledger records which group last modified each cell. A group is
/// never given an object whose cells another group modified since the ledger was cleared,
/// and when a group is about to read such a cell as a neighbour the round reports that a
/// change broadcast is required and clears the whole ledger.
#[derive(Debug, Clone)]
pub struct Distributor {
    granularity: ObjectGranularity,
    locks: CellLocks,
    modified_by: Vec<Option<usize>>,
    status: Vec<ObjectStatus>,
    targeted: Vec<bool>,
    n_to_distribute: usize,
    n_distributed: usize,
    n_unavailable: usize,
    n_broadcasts: usize,
    n_groups: usize,
    group_index: usize,
    repeats_allowed: bool,
    last_object: Vec<Option<usize>>,
    hard_locked: Vec<Vec<CellIndex>>,
}

impl Distributor {
    pub fn new<P: ProcessPool>(
        cfg: &Configuration,
        granularity: ObjectGranularity,
        pool: &P,
        strategy: DivisionStrategy,
        repeats_allowed: bool,
    ) -> Result<Self, EngineError> {
        let n_cells = cfg.cells().n_cells();
        let n_objects = match &granularity {
            ObjectGranularity::Cell => n_cells,
            ObjectGranularity::Molecule => cfg.n_molecules(),
            ObjectGranularity::Region(map) => {
                for (object, cells) in map.regions.iter().enumerate() {
                    if let Some(&cell) = cells.iter().find(|&&c| c >= n_cells) {
                        return Err(EngineError::RegionCellOutOfRange {
                            object,
                            cell,
                            n_cells,
                        });
                    }
                }
                map.n_regions()
            }
        };

        let n_groups = pool.n_divisions(strategy).max(1);
        let group_index = pool.division_index(strategy);
        if group_index >= n_groups {
            return Err(EngineError::Internal(format!(
                "division index {group_index} is out of range for {n_groups} divisions"
            )));
        }

        debug!(
            n_objects,
            n_groups, group_index, repeats_allowed, "Created object distributor."
        );

        Ok(Self {
            granularity,
            locks: CellLocks::new(cfg.cells()),
            modified_by: vec![None; n_cells],
            status: vec![ObjectStatus::Waiting; n_objects],
            targeted: vec![true; n_objects],
            n_to_distribute: n_objects,
            n_distributed: 0,
            n_unavailable: 0,
            n_broadcasts: 0,
            n_groups,
            group_index,
            repeats_allowed,
            last_object: vec![None; n_groups],
            hard_locked: vec![Vec::new(); n_groups],
        })
    }

    /// Restricts the working set to `objects`; every other object starts out completed.
    pub fn set_target_objects(&mut self, objects: &[usize]) -> Result<(), EngineError> {
        let n_objects = self.status.len();
        if let Some(&index) = objects.iter().find(|&&i| i >= n_objects) {
            return Err(EngineError::ObjectOutOfRange { index, n_objects });
        }

        self.status.fill(ObjectStatus::Completed);
        self.targeted.fill(false);
        for &i in objects {
            self.status[i] = ObjectStatus::Waiting;
            self.targeted[i] = true;
        }
        self.n_to_distribute = self.targeted.iter().filter(|t| **t).count();
        self.n_distributed = 0;
        self.last_object.fill(None);
        Ok(())
    }

    /// Decides the next object for every group and returns the one for this process.
    ///
    /// Every process of the pool must call this together, followed by
    /// [`finished_with_object`](Self::finished_with_object) once the work is done.
    #[instrument(level = "debug", skip_all, fields(group = self.group_index, distributed = self.n_distributed))]
    pub fn next_available_object(
        &mut self,
        cfg: &Configuration,
    ) -> Result<Distribution, EngineError> {
        let mut changes_broadcast_required = false;

        if self.is_complete() {
            trace!("All objects distributed.");
            return Ok(Distribution {
                target: Target::AllComplete,
                changes_broadcast_required,
            });
        }

        let n_objects = self.status.len();
        for group in 0..self.n_groups {
            let start = match self.last_object[group] {
                Some(last) => last + 1,
                None => (n_objects / self.n_groups) * group,
            };

            let mut chosen = None;
            for n in 0..n_objects {
                let index = (start + n) % n_objects;
                if !self.is_distributable(index) {
                    continue;
                }
                let required = self.cells_for_object(cfg, index)?;

                if self.n_groups > 1 {
                    if required.iter().any(|&c| self.modified_by_other(c, group)) {
                        continue;
                    }
                    if !self.locks.can_hard_lock_all(&required) {
                        continue;
                    }
                    if !changes_broadcast_required {
                        let surrounding = self.locks.surrounding_cells(&required);
                        if let Some(&cell) =
                            surrounding.iter().find(|&&c| self.modified_by_other(c, group))
                        {
                            debug!(
                                cell,
                                group,
                                modified_by = ?self.modified_by[cell],
                                "Change broadcast required before the round can proceed."
                            );
                            changes_broadcast_required = true;
                            self.n_broadcasts += 1;
                            self.modified_by.fill(None);
                        }
                    }
                }

                chosen = Some((index, required));
                break;
            }

            match chosen {
                Some((index, required)) => {
                    trace!(group, object = index, cells = ?required, "Assigned object.");
                    if self.status[index] == ObjectStatus::Waiting {
                        self.n_distributed += 1;
                    }
                    self.status[index] = ObjectStatus::Distributed;
                    self.locks.add_hard_locks(&required)?;
                    self.last_object[group] = Some(index);
                    self.hard_locked[group] = required;
                }
                None => {
                    trace!(group, "No viable object this round.");
                    self.last_object[group] = None;
                    self.hard_locked[group].clear();
                    self.n_unavailable += 1;
                }
            }
        }

        if self.last_object.iter().all(Option::is_none) && !self.is_complete() {
            if self.modified_by.iter().any(Option::is_some) {
                // Only stale ledger entries can block every group at once.
                debug!("Every group is blocked by the modification ledger; forcing a broadcast.");
                if !changes_broadcast_required {
                    changes_broadcast_required = true;
                    self.n_broadcasts += 1;
                }
                self.modified_by.fill(None);
            } else if self.locks.all_unlocked() {
                return Err(EngineError::Internal(format!(
                    "{} objects remain but none can be distributed",
                    self.n_to_distribute - self.n_distributed
                )));
            }
        }

        let target = match self.last_object[self.group_index] {
            Some(index) => Target::Object(index),
            None => Target::NoneAvailable,
        };
        Ok(Distribution {
            target,
            changes_broadcast_required,
        })
    }

    /// Completes the objects handed out by the last round and releases their locks.
    ///
    /// Every cell a group hard-locked is recorded in the ledger as modified by that group,
    /// whether or not the group actually changed anything there.
    pub fn finished_with_object(&mut self) -> Result<(), EngineError> {
        for group in 0..self.n_groups {
            if let Some(index) = self.last_object[group] {
                self.status[index] = ObjectStatus::Completed;
            }

            let cells = std::mem::take(&mut self.hard_locked[group]);
            for &cell in &cells {
                match self.modified_by[cell] {
                    Some(owner) if owner == group => {}
                    Some(owner) => {
                        warn!(
                            cell,
                            previous = owner,
                            group,
                            "Cell contents modified by two groups without an intervening broadcast."
                        );
                        self.modified_by[cell] = Some(group);
                    }
                    None => self.modified_by[cell] = Some(group),
                }
            }
            self.locks.remove_hard_locks(&cells)?;
        }
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.n_distributed >= self.n_to_distribute
    }

    #[inline]
    pub fn n_objects(&self) -> usize {
        self.status.len()
    }

    #[inline]
    pub fn n_objects_distributed(&self) -> usize {
        self.n_distributed
    }

    /// Number of times a group found nothing to do in a round.
    #[inline]
    pub fn n_unavailable_instances(&self) -> usize {
        self.n_unavailable
    }

    #[inline]
    pub fn n_change_broadcasts_required(&self) -> usize {
        self.n_broadcasts
    }

    #[inline]
    pub fn n_groups(&self) -> usize {
        self.n_groups
    }

    #[inline]
    pub fn group_index(&self) -> usize {
        self.group_index
    }

    pub fn granularity(&self) -> &ObjectGranularity {
        &self.granularity
    }

    pub fn object_status(&self, index: usize) -> Option<ObjectStatus> {
        self.status.get(index).copied()
    }

    pub fn lock_state(&self, cell: CellIndex) -> Result<LockState, EngineError> {
        Ok(self.locks.lock_state(cell)?)
    }

    pub fn locks(&self) -> &CellLocks {
        &self.locks
    }

    /// Group that last modified the cell, if any since the ledger was cleared.
    pub fn modified_by(&self, cell: CellIndex) -> Option<usize> {
        self.modified_by.get(cell).copied().flatten()
    }

    pub fn ledger_is_clear(&self) -> bool {
        self.modified_by.iter().all(Option::is_none)
    }

    /// Object handed to `group` by the last round.
    pub fn current_object(&self, group: usize) -> Option<usize> {
        self.last_object.get(group).copied().flatten()
    }

    pub fn hard_locked_cells(&self, group: usize) -> &[CellIndex] {
        self.hard_locked.get(group).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Cells that must be hard-locked before `object` may be modified.
    pub fn cells_for_object(
        &self,
        cfg: &Configuration,
        object: usize,
    ) -> Result<Vec<CellIndex>, EngineError> {
        let n_objects = self.status.len();
        let out_of_range = EngineError::ObjectOutOfRange {
            index: object,
            n_objects,
        };
        if object >= n_objects {
            return Err(out_of_range);
        }
        match &self.granularity {
            ObjectGranularity::Cell => Ok(vec![object]),
            ObjectGranularity::Molecule => {
                let id = cfg.molecule_id(object).ok_or(out_of_range)?;
                Ok(cfg.cells_of_molecule(id)?)
            }
            ObjectGranularity::Region(map) => {
                map.cells(object).map(<[_]>::to_vec).ok_or(out_of_range)
            }
        }
    }

    fn is_distributable(&self, index: usize) -> bool {
        match self.status[index] {
            ObjectStatus::Waiting => true,
            ObjectStatus::Distributed => false,
            ObjectStatus::Completed => {
                self.repeats_allowed && self.targeted[index] && self.is_complete()
            }
        }
    }

    fn modified_by_other(&self, cell: CellIndex, group: usize) -> bool {
        matches!(self.modified_by[cell], Some(owner) if owner != group)
    }
}
