use super::{WeightedTally, finish_coordinates, kernel_for, random_displacement};
use crate::core::forcefield::potential_map::PotentialMap;
use crate::core::models::configuration::{Configuration, ModelError};
use crate::core::models::ids::AtomId;
use crate::engine::change_store::ChangeStore;
use crate::engine::config::ShakeConfig;
use crate::engine::distributor::{Distributor, ObjectGranularity, Target};
use crate::engine::error::EngineError;
use crate::engine::kernel::EnergyKernel;
use crate::engine::pool::{CommScope, ProcessPool};
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::sampling::{Metropolis, StepSize};
use crate::engine::state::{MoveStatistics, ShakeReport};
use rand::Rng;
use tracing::{debug, info, instrument};

/// Translates every atom of the configuration, one locked cell per group per round.
///
/// Each atom is given `shakes_per_object` trial displacements; a trial is judged on the
/// intermolecular energy of the atom plus the intramolecular energy of its molecule. After
/// the last cell the translation step is adapted toward the target acceptance rate.
#[instrument(skip_all, name = "atom_shake_workflow")]
pub fn run<P: ProcessPool>(
    cfg: &mut Configuration,
    map: &PotentialMap,
    pool: &mut P,
    config: &ShakeConfig,
    reporter: &ProgressReporter,
) -> Result<ShakeReport, EngineError> {
    let kernel = kernel_for(map, config);
    let metropolis = Metropolis::from_temperature(cfg.temperature())?;
    let mut step = StepSize::new(
        config.translation.initial,
        config.translation.min,
        config.translation.max,
        config.target_acceptance,
    )?;
    let mut distributor = Distributor::new(
        cfg,
        ObjectGranularity::Cell,
        &*pool,
        config.strategy,
        config.repeats_allowed,
    )?;
    let mut store = ChangeStore::new();

    info!(
        n_cells = distributor.n_objects(),
        n_groups = distributor.n_groups(),
        cutoff = kernel.cutoff(),
        step = step.value(),
        "Starting atom shake."
    );
    reporter.report(Progress::TaskStart {
        total_steps: distributor.n_objects() as u64,
    });

    let mut translations = MoveStatistics::default();
    let mut energy_delta = 0.0;
    loop {
        let distribution = distributor.next_available_object(cfg)?;
        if distribution.changes_broadcast_required {
            let changes = store.distribute_and_apply(cfg, &*pool, CommScope::Pool)?;
            reporter.report(Progress::Broadcast { changes });
        }

        let cell = match distribution.target {
            Target::AllComplete => break,
            Target::NoneAvailable => {
                distributor.finished_with_object()?;
                continue;
            }
            Target::Object(cell) => cell,
        };

        store.add_cell(cfg, cell)?;
        let atoms = cfg.atoms_in_cell(cell).to_vec();
        for atom in atoms {
            let trial = AtomTrial {
                kernel: &kernel,
                metropolis: &metropolis,
                step: step.value(),
                shakes: config.shakes_per_object,
            };
            let (stats, delta) = trial.shake(cfg, &mut store, pool.random_stream(), atom)?;
            translations += stats;
            energy_delta += delta;
        }
        debug!(cell, n_staged = store.n_targets(), "Finished shaking cell.");

        store.store_and_reset();
        distributor.finished_with_object()?;
        reporter.report(Progress::TaskIncrement);
    }

    let changes = store.distribute_and_apply(cfg, &*pool, CommScope::Pool)?;
    reporter.report(Progress::Broadcast { changes });
    reporter.report(Progress::TaskFinish);

    let mut tally = WeightedTally::default();
    tally.add(
        &*pool,
        config.strategy,
        translations,
        MoveStatistics::default(),
        energy_delta,
    );
    let totals = tally.pool_totals(&*pool)?;
    let old_step = step.value();
    step.adjust(totals.translations.accepted, totals.translations.attempted);
    finish_coordinates(cfg, totals.translations.accepted);

    info!(
        attempted = totals.translations.attempted,
        accepted = totals.translations.accepted,
        rate = totals.translations.acceptance_rate(),
        energy_delta = totals.energy_delta,
        old_step,
        new_step = step.value(),
        "Atom shake complete."
    );

    Ok(ShakeReport {
        translations: totals.translations,
        rotations: MoveStatistics::default(),
        energy_delta: totals.energy_delta,
        translation_step: step.value(),
        rotation_step: 0.0,
        n_objects: distributor.n_objects(),
        n_unavailable_instances: distributor.n_unavailable_instances(),
        n_change_broadcasts: distributor.n_change_broadcasts_required(),
    })
}

struct AtomTrial<'k, 'm> {
    kernel: &'k EnergyKernel<'m>,
    metropolis: &'k Metropolis,
    step: f64,
    shakes: usize,
}

impl AtomTrial<'_, '_> {
    fn energy(&self, cfg: &Configuration, atom: AtomId) -> Result<f64, ModelError> {
        let molecule = cfg.atom(atom).ok_or(ModelError::AtomNotFound(atom))?.molecule_id;
        Ok(self.kernel.atom_energy(cfg, atom)? + self.kernel.intramolecular_energy(cfg, molecule)?)
    }

    /// Returns the move statistics and the summed energy change of the accepted moves.
    fn shake<R: Rng>(
        &self,
        cfg: &mut Configuration,
        store: &mut ChangeStore,
        rng: &mut R,
        atom: AtomId,
    ) -> Result<(MoveStatistics, f64), ModelError> {
        let mut stats = MoveStatistics::default();
        let mut total_delta = 0.0;
        let mut current = self.energy(cfg, atom)?;

        for _ in 0..self.shakes {
            cfg.translate_atom(atom, &random_displacement(rng, self.step))?;
            let trial = self.energy(cfg, atom)?;
            let delta = trial - current;
            let accepted = self.metropolis.accept(delta, rng);
            if accepted {
                store.update_atom(cfg, atom)?;
                current = trial;
                total_delta += delta;
            } else {
                store.revert_atom(cfg, atom)?;
            }
            stats.record(accepted);
        }
        Ok((stats, total_delta))
    }
}
