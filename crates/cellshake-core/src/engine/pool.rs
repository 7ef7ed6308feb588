//! The process-pool contract.
//!
//! Work is split into divisions according to a [`DivisionStrategy`]. Distributors only need
//! to know how many divisions exist and which one this process belongs to; the change store
//! needs a collective gather; workflows need a random stream that is identical for every
//! process of a group. Real message passing lives behind this trait and is not part of the
//! library. [`LocalPool`] runs everything in the calling process and can stand in for any
//! single member of a larger virtual pool.

use rand::SeedableRng;
use rand::rngs::StdRng;
use thiserror::Error;

/// How the processes of the pool are divided into independent workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DivisionStrategy {
    /// All processes act as one worker.
    Pool,
    /// Each process group acts as one worker.
    Groups,
    /// Every process acts as its own worker.
    Processes,
}

/// Set of processes taking part in a collective operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommScope {
    /// The processes of this process's group.
    Group,
    /// Every process in the pool.
    Pool,
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum PoolError {
    #[error("Group index {index} is out of range for a pool of {n_groups} groups")]
    InvalidGroup { index: usize, n_groups: usize },

    #[error("Root {root} is not a member of a {scope:?} scope with {size} processes")]
    InvalidRoot {
        root: usize,
        scope: CommScope,
        size: usize,
    },

    #[error("Collective operation failed: {0}")]
    Collective(String),
}

pub trait ProcessPool {
    /// Random stream shared by every process of a group.
    type Rng: rand::Rng;

    fn n_processes(&self) -> usize;

    fn n_divisions(&self, strategy: DivisionStrategy) -> usize;

    fn division_index(&self, strategy: DivisionStrategy) -> usize;

    fn is_master(&self) -> bool;

    /// Number of processes participating in a collective over `scope`.
    fn scope_size(&self, scope: CommScope) -> usize;

    /// Overwrites `value` on every member of `scope` with the value held by `root`.
    fn broadcast<T: Clone>(&self, value: &mut T, root: usize, scope: CommScope)
    -> Result<(), PoolError>;

    /// Concatenates the local vectors of every member of `scope`, in rank order.
    fn all_gather<T: Clone>(&self, local: Vec<T>, scope: CommScope) -> Result<Vec<T>, PoolError>;

    /// True only if every member of `scope` passes true.
    fn decide(&self, local: bool, scope: CommScope) -> Result<bool, PoolError>;

    fn sum(&self, value: f64, scope: CommScope) -> Result<f64, PoolError>;

    fn random_stream(&mut self) -> &mut Self::Rng;
}

/// A pool consisting of the calling process only.
///
/// The pool may be told that it is one process of a larger virtual pool with `n_groups`
/// single-process groups. Collectives then only see local data, which is exactly what the
/// replicated distributor logic needs when it is exercised without real peers.
#[derive(Debug, Clone)]
pub struct LocalPool {
    n_groups: usize,
    group_index: usize,
    rng: StdRng,
}

impl LocalPool {
    pub fn new(seed: u64) -> Self {
        Self {
            n_groups: 1,
            group_index: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn as_group_member(
        n_groups: usize,
        group_index: usize,
        seed: u64,
    ) -> Result<Self, PoolError> {
        if group_index >= n_groups {
            return Err(PoolError::InvalidGroup {
                index: group_index,
                n_groups,
            });
        }
        Ok(Self {
            n_groups,
            group_index,
            rng: StdRng::seed_from_u64(group_seed(seed, group_index)),
        })
    }

    pub fn n_groups(&self) -> usize {
        self.n_groups
    }

    pub fn group_index(&self) -> usize {
        self.group_index
    }

    fn check_root(&self, root: usize, scope: CommScope) -> Result<(), PoolError> {
        let size = self.scope_size(scope);
        if root >= size {
            return Err(PoolError::InvalidRoot { root, scope, size });
        }
        Ok(())
    }
}

// Groups draw from distinct streams; processes inside a group share one.
fn group_seed(seed: u64, group_index: usize) -> u64 {
    seed ^ (group_index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

impl ProcessPool for LocalPool {
    type Rng = StdRng;

    fn n_processes(&self) -> usize {
        self.n_groups
    }

    fn n_divisions(&self, strategy: DivisionStrategy) -> usize {
        match strategy {
            DivisionStrategy::Pool => 1,
            DivisionStrategy::Groups | DivisionStrategy::Processes => self.n_groups,
        }
    }

    fn division_index(&self, strategy: DivisionStrategy) -> usize {
        match strategy {
            DivisionStrategy::Pool => 0,
            DivisionStrategy::Groups | DivisionStrategy::Processes => self.group_index,
        }
    }

    fn is_master(&self) -> bool {
        self.group_index == 0
    }

    fn scope_size(&self, scope: CommScope) -> usize {
        match scope {
            CommScope::Group => 1,
            CommScope::Pool => self.n_groups,
        }
    }

    fn broadcast<T: Clone>(
        &self,
        _value: &mut T,
        root: usize,
        scope: CommScope,
    ) -> Result<(), PoolError> {
        self.check_root(root, scope)
    }

    fn all_gather<T: Clone>(&self, local: Vec<T>, _scope: CommScope) -> Result<Vec<T>, PoolError> {
        Ok(local)
    }

    fn decide(&self, local: bool, _scope: CommScope) -> Result<bool, PoolError> {
        Ok(local)
    }

    fn sum(&self, value: f64, _scope: CommScope) -> Result<f64, PoolError> {
        Ok(value)
    }

    fn random_stream(&mut self) -> &mut StdRng {
        &mut self.rng
    }
}
