//! # Workflows Module
//!
//! Complete Monte-Carlo shake stages over a [`Configuration`], run in lock-step by every
//! process of a pool.
//!
//! ## Architecture
//!
//! - **Atom Shake** ([`atom_shake`]) - Cell by cell translation of individual atoms
//! - **Molecule Shake** ([`molecule_shake`]) - Rigid-body translation and rotation of whole
//!   molecules, handed out one per round or in regional batches
//!
//! Each stage builds its own distributor and change store, drives them until every object
//! has been visited, exchanges accepted coordinates at the points the distributor demands,
//! and finally adapts its step sizes from pool-wide acceptance statistics. A stage returns a
//! [`ShakeReport`](crate::engine::state::ShakeReport) and leaves every replica of the
//! configuration identical.

pub mod atom_shake;
pub mod molecule_shake;

use crate::core::forcefield::potential_map::PotentialMap;
use crate::core::models::configuration::Configuration;
use crate::engine::config::ShakeConfig;
use crate::engine::error::EngineError;
use crate::engine::kernel::EnergyKernel;
use crate::engine::pool::{CommScope, DivisionStrategy, ProcessPool};
use crate::engine::state::MoveStatistics;
use nalgebra::Vector3;
use rand::Rng;

fn kernel_for<'a>(map: &'a PotentialMap, config: &ShakeConfig) -> EnergyKernel<'a> {
    match config.kernel_scaling {
        Some(scaling) => EnergyKernel::scaled(map, config.cutoff, scaling),
        None => EnergyKernel::new(map, config.cutoff),
    }
}

/// Uniform displacement with every component in `[-step, step)`.
fn random_displacement<R: Rng>(rng: &mut R, step: f64) -> Vector3<f64> {
    Vector3::new(
        rng.gen_range(-1.0..1.0) * step,
        rng.gen_range(-1.0..1.0) * step,
        rng.gen_range(-1.0..1.0) * step,
    )
}

/// Move counts of this process, weighted so that a pool-wide sum counts the work of every
/// division once however many processes shared it.
#[derive(Debug, Default, Clone, Copy)]
struct WeightedTally {
    translations: [f64; 2],
    rotations: [f64; 2],
    energy_delta: f64,
}

struct PoolTotals {
    translations: MoveStatistics,
    rotations: MoveStatistics,
    energy_delta: f64,
}

impl WeightedTally {
    fn add<P: ProcessPool>(
        &mut self,
        pool: &P,
        strategy: DivisionStrategy,
        translations: MoveStatistics,
        rotations: MoveStatistics,
        energy_delta: f64,
    ) {
        let sharing = match strategy {
            DivisionStrategy::Pool => pool.scope_size(CommScope::Pool),
            DivisionStrategy::Groups => pool.scope_size(CommScope::Group),
            DivisionStrategy::Processes => 1,
        };
        let weight = 1.0 / sharing.max(1) as f64;
        self.translations[0] += translations.attempted as f64 * weight;
        self.translations[1] += translations.accepted as f64 * weight;
        self.rotations[0] += rotations.attempted as f64 * weight;
        self.rotations[1] += rotations.accepted as f64 * weight;
        self.energy_delta += energy_delta * weight;
    }

    /// Collective over the whole pool; every process must call it.
    fn pool_totals<P: ProcessPool>(&self, pool: &P) -> Result<PoolTotals, EngineError> {
        let sum = |v: f64| pool.sum(v, CommScope::Pool);
        let count = |v: f64| v.round().max(0.0) as u64;
        Ok(PoolTotals {
            translations: MoveStatistics {
                attempted: count(sum(self.translations[0])?),
                accepted: count(sum(self.translations[1])?),
            },
            rotations: MoveStatistics {
                attempted: count(sum(self.rotations[0])?),
                accepted: count(sum(self.rotations[1])?),
            },
            energy_delta: sum(self.energy_delta)?,
        })
    }
}

/// Marks a new set of coordinates when any trial move was accepted anywhere in the pool.
fn finish_coordinates(cfg: &mut Configuration, n_accepted: u64) {
    if n_accepted > 0 {
        cfg.increment_coordinate_index();
    }
}
