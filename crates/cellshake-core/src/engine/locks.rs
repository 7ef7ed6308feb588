use crate::core::space::CellIndex;
use crate::core::space::cell_array::CellArray;
use std::collections::HashSet;
use thiserror::Error;
use tracing::error;

/// Lock held on a single cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockState {
    #[default]
    Unlocked,
    /// Read as a neighbour by this many in-flight operations.
    SoftLocked(u32),
    /// Exclusively claimed for mutation.
    HardLocked,
}

impl LockState {
    /// Integer encoding: `0` unlocked, `n > 0` soft-lock count, `-1` hard-locked.
    pub fn count(&self) -> i64 {
        match self {
            LockState::Unlocked => 0,
            LockState::SoftLocked(n) => i64::from(*n),
            LockState::HardLocked => -1,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum LockError {
    #[error("Cell {cell} does not exist (array holds {n_cells} cells)")]
    UnknownCell { cell: CellIndex, n_cells: usize },

    #[error("Cannot soft-lock cell {cell}: it is hard-locked")]
    SoftLockOnHardLocked { cell: CellIndex },

    #[error("Cannot remove a soft lock from cell {cell}: it carries none")]
    SoftUnlockOfUnlocked { cell: CellIndex },

    #[error("Cannot remove a soft lock from cell {cell}: it is hard-locked")]
    SoftUnlockOfHardLocked { cell: CellIndex },

    #[error("Cannot hard-lock cell {cell}: it is already hard-locked")]
    AlreadyHardLocked { cell: CellIndex },

    #[error("Cannot hard-lock cell {cell}: it carries {count} soft lock(s)")]
    HardLockOnSoftLocked { cell: CellIndex, count: u32 },

    #[error("Cannot remove the hard lock from cell {cell}: it is not locked")]
    HardUnlockOfUnlocked { cell: CellIndex },

    #[error("Cannot remove the hard lock from cell {cell}: it carries {count} soft lock(s)")]
    HardUnlockOfSoftLocked { cell: CellIndex, count: u32 },
}

/// Hard/soft lock bookkeeping over a cell array.
///
/// No lock here is ever negotiated with another process. Every process holds its own copy
/// and applies the same sequence of operations, so all copies agree. A hard lock on a set
/// of central cells always comes with a soft lock on every surrounding cell, which is what
/// lets [`can_hard_lock`](Self::can_hard_lock) refuse two claims that would share a
/// boundary.
#[derive(Debug, Clone)]
pub struct CellLocks {
    cells: CellArray,
    states: Vec<LockState>,
}

impl CellLocks {
    pub fn new(cells: &CellArray) -> Self {
        Self {
            cells: cells.clone(),
            states: vec![LockState::Unlocked; cells.n_cells()],
        }
    }

    #[inline]
    pub fn n_cells(&self) -> usize {
        self.states.len()
    }

    pub fn lock_state(&self, cell: CellIndex) -> Result<LockState, LockError> {
        self.states
            .get(cell)
            .copied()
            .ok_or(LockError::UnknownCell {
                cell,
                n_cells: self.states.len(),
            })
    }

    pub fn all_unlocked(&self) -> bool {
        self.states.iter().all(|s| *s == LockState::Unlocked)
    }

    pub fn add_soft_lock(&mut self, cell: CellIndex) -> Result<(), LockError> {
        let next = Self::soft_locked(cell, self.lock_state(cell)?).inspect_err(report)?;
        self.states[cell] = next;
        Ok(())
    }

    pub fn remove_soft_lock(&mut self, cell: CellIndex) -> Result<(), LockError> {
        let next = Self::soft_unlocked(cell, self.lock_state(cell)?).inspect_err(report)?;
        self.states[cell] = next;
        Ok(())
    }

    /// Hard-locks every central cell and soft-locks their surrounding cells.
    ///
    /// All transitions are validated before any is applied, so a failing call leaves the
    /// lock state untouched.
    pub fn add_hard_locks(&mut self, central: &[CellIndex]) -> Result<(), LockError> {
        let central = unique(central);
        let surrounding = self.surrounding_cells(&central);

        let mut planned = Vec::with_capacity(central.len() + surrounding.len());
        for &cell in &central {
            let state = self.lock_state(cell).inspect_err(report)?;
            match state {
                LockState::Unlocked => planned.push((cell, LockState::HardLocked)),
                LockState::HardLocked => {
                    return Err(report_owned(LockError::AlreadyHardLocked { cell }));
                }
                LockState::SoftLocked(count) => {
                    return Err(report_owned(LockError::HardLockOnSoftLocked { cell, count }));
                }
            }
        }
        for &cell in &surrounding {
            let next = Self::soft_locked(cell, self.lock_state(cell)?).inspect_err(report)?;
            planned.push((cell, next));
        }

        for (cell, state) in planned {
            self.states[cell] = state;
        }
        Ok(())
    }

    /// Exact inverse of [`add_hard_locks`](Self::add_hard_locks) for the same central set.
    pub fn remove_hard_locks(&mut self, central: &[CellIndex]) -> Result<(), LockError> {
        let central = unique(central);
        let surrounding = self.surrounding_cells(&central);

        let mut planned = Vec::with_capacity(central.len() + surrounding.len());
        for &cell in &central {
            let state = self.lock_state(cell).inspect_err(report)?;
            match state {
                LockState::HardLocked => planned.push((cell, LockState::Unlocked)),
                LockState::Unlocked => {
                    return Err(report_owned(LockError::HardUnlockOfUnlocked { cell }));
                }
                LockState::SoftLocked(count) => {
                    return Err(report_owned(LockError::HardUnlockOfSoftLocked {
                        cell,
                        count,
                    }));
                }
            }
        }
        for &cell in &surrounding {
            let next = Self::soft_unlocked(cell, self.lock_state(cell)?).inspect_err(report)?;
            planned.push((cell, next));
        }

        for (cell, state) in planned {
            self.states[cell] = state;
        }
        Ok(())
    }

    /// True if the cell is unlocked and none of its neighbours is hard-locked.
    pub fn can_hard_lock(&self, cell: CellIndex) -> bool {
        if self.states.get(cell) != Some(&LockState::Unlocked) {
            return false;
        }
        self.cells
            .neighbours(cell)
            .iter()
            .all(|n| self.states[n.index] != LockState::HardLocked)
    }

    pub fn can_hard_lock_all(&self, cells: &[CellIndex]) -> bool {
        cells.iter().all(|&c| self.can_hard_lock(c))
    }

    /// Neighbours of the central cells that are not central themselves, without repeats.
    ///
    /// Neighbours reachable without minimum-image wraparound come first, followed by the
    /// wrapped ones; callers must only rely on set semantics.
    pub fn surrounding_cells(&self, central: &[CellIndex]) -> Vec<CellIndex> {
        let central_set: HashSet<CellIndex> = central.iter().copied().collect();
        let mut seen = HashSet::new();
        let mut local = Vec::new();
        let mut wrapped = Vec::new();

        for &cell in central {
            for neighbour in self.cells.neighbours(cell) {
                if central_set.contains(&neighbour.index) || !seen.insert(neighbour.index) {
                    continue;
                }
                if neighbour.requires_mim {
                    wrapped.push(neighbour.index);
                } else {
                    local.push(neighbour.index);
                }
            }
        }

        local.extend(wrapped);
        local
    }

    fn soft_locked(cell: CellIndex, state: LockState) -> Result<LockState, LockError> {
        match state {
            LockState::Unlocked => Ok(LockState::SoftLocked(1)),
            LockState::SoftLocked(n) => Ok(LockState::SoftLocked(n + 1)),
            LockState::HardLocked => Err(LockError::SoftLockOnHardLocked { cell }),
        }
    }

    fn soft_unlocked(cell: CellIndex, state: LockState) -> Result<LockState, LockError> {
        match state {
            LockState::SoftLocked(1) => Ok(LockState::Unlocked),
            LockState::SoftLocked(n) => Ok(LockState::SoftLocked(n - 1)),
            LockState::Unlocked => Err(LockError::SoftUnlockOfUnlocked { cell }),
            LockState::HardLocked => Err(LockError::SoftUnlockOfHardLocked { cell }),
        }
    }
}

fn unique(cells: &[CellIndex]) -> Vec<CellIndex> {
    let mut seen = HashSet::with_capacity(cells.len());
    cells.iter().copied().filter(|c| seen.insert(*c)).collect()
}

fn report(e: &LockError) {
    error!("{e}");
}

fn report_owned(e: LockError) -> LockError {
    report(&e);
    e
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: usize) -> CellLocks {
        CellLocks::new(&CellArray::generate([n, 1, 1], [1, 0, 0]).unwrap())
    }

    fn counts(locks: &CellLocks) -> Vec<i64> {
        (0..locks.n_cells())
            .map(|c| locks.lock_state(c).unwrap().count())
            .collect()
    }

    #[test]
    fn hard_lock_soft_locks_neighbours() {
        let mut locks = line(3);
        locks.add_hard_locks(&[1]).unwrap();
        assert_eq!(counts(&locks), vec![1, -1, 1]);
        locks.remove_hard_locks(&[1]).unwrap();
        assert_eq!(counts(&locks), vec![0, 0, 0]);
    }

    #[test]
    fn soft_lock_counts_accumulate() {
        let mut locks = line(5);
        locks.add_soft_lock(2).unwrap();
        locks.add_soft_lock(2).unwrap();
        assert_eq!(locks.lock_state(2).unwrap(), LockState::SoftLocked(2));
        locks.remove_soft_lock(2).unwrap();
        locks.remove_soft_lock(2).unwrap();
        assert_eq!(locks.lock_state(2).unwrap(), LockState::Unlocked);
        assert_eq!(
            locks.remove_soft_lock(2),
            Err(LockError::SoftUnlockOfUnlocked { cell: 2 })
        );
    }

    #[test]
    fn hard_locked_cell_rejects_every_other_lock() {
        let mut locks = line(6);
        locks.add_hard_locks(&[2]).unwrap();

        assert_eq!(
            locks.add_soft_lock(2),
            Err(LockError::SoftLockOnHardLocked { cell: 2 })
        );
        assert_eq!(
            locks.add_hard_locks(&[2, 4]),
            Err(LockError::AlreadyHardLocked { cell: 2 })
        );
        assert!(matches!(
            locks.add_hard_locks(&[3]),
            Err(LockError::HardLockOnSoftLocked { cell: 3, count: 1 })
        ));
        assert!(!locks.can_hard_lock(2));
        assert!(!locks.can_hard_lock(3));

        locks.remove_hard_locks(&[2]).unwrap();
        assert!(locks.all_unlocked());
        assert!(locks.can_hard_lock(2));
        assert!(locks.can_hard_lock(3));
    }

    #[test]
    fn failed_add_leaves_state_untouched() {
        let mut locks = line(8);
        locks.add_hard_locks(&[0]).unwrap();
        let before = counts(&locks);
        // Central cell 4 is fine, but 7 is soft-locked by the claim on 0.
        assert!(locks.add_hard_locks(&[4, 7]).is_err());
        assert_eq!(counts(&locks), before);
    }

    #[test]
    fn can_hard_lock_allows_shared_soft_boundary_only_between_non_adjacent_claims() {
        let mut locks = line(6);
        locks.add_hard_locks(&[1]).unwrap();
        // Cell 3 shares soft-locked neighbour 2 with the claim on 1, which is allowed.
        assert!(locks.can_hard_lock(3));
        locks.add_hard_locks(&[3]).unwrap();
        assert_eq!(locks.lock_state(2).unwrap(), LockState::SoftLocked(2));
        // Cell 2 is soft-locked, and cell 4 neighbours the hard lock on 3.
        assert!(!locks.can_hard_lock(2));
        assert!(!locks.can_hard_lock(4));
    }

    #[test]
    fn removing_unheld_hard_lock_fails() {
        let mut locks = line(4);
        assert_eq!(
            locks.remove_hard_locks(&[1]),
            Err(LockError::HardUnlockOfUnlocked { cell: 1 })
        );
        locks.add_soft_lock(1).unwrap();
        assert_eq!(
            locks.remove_hard_locks(&[1]),
            Err(LockError::HardUnlockOfSoftLocked { cell: 1, count: 1 })
        );
    }

    #[test]
    fn unknown_cells_are_reported() {
        let mut locks = line(3);
        assert_eq!(
            locks.add_soft_lock(9),
            Err(LockError::UnknownCell {
                cell: 9,
                n_cells: 3
            })
        );
        assert!(!locks.can_hard_lock(9));
    }

    #[test]
    fn surrounding_cells_excludes_central_and_duplicates() {
        let cells = CellArray::generate([4, 4, 4], [1, 1, 1]).unwrap();
        let locks = CellLocks::new(&cells);
        let central = vec![0, 1, 21];
        let surrounding = locks.surrounding_cells(&central);

        for c in &surrounding {
            assert!(!central.contains(c));
            assert!(central.iter().any(|&k| cells.cell(k).unwrap().is_neighbour(*c)));
        }
        let mut sorted = surrounding.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), surrounding.len());

        let mut expected: Vec<CellIndex> = central
            .iter()
            .flat_map(|&k| cells.neighbours(k).iter().map(|n| n.index))
            .filter(|c| !central.contains(c))
            .collect();
        expected.sort_unstable();
        expected.dedup();
        assert_eq!(sorted, expected);
    }

    #[test]
    fn lock_round_trip_restores_prior_counts() {
        let cells = CellArray::generate([4, 4, 1], [1, 1, 0]).unwrap();
        let mut locks = CellLocks::new(&cells);
        locks.add_soft_lock(10).unwrap();
        locks.add_soft_lock(15).unwrap();
        let before = counts(&locks);

        for set in [vec![0], vec![0, 5], vec![2, 3, 6]] {
            locks.add_hard_locks(&set).unwrap();
            locks.remove_hard_locks(&set).unwrap();
            assert_eq!(counts(&locks), before, "set {set:?}");
        }
    }
}
