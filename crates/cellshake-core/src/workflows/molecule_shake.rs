use super::{WeightedTally, finish_coordinates, kernel_for, random_displacement};
use crate::core::forcefield::potential_map::PotentialMap;
use crate::core::models::configuration::Configuration;
use crate::engine::change_store::ChangeStore;
use crate::engine::config::{DistributionMode, ShakeConfig};
use crate::engine::distributor::{Distributor, ObjectGranularity, Target};
use crate::engine::error::EngineError;
use crate::engine::kernel::EnergyKernel;
use crate::engine::pool::{CommScope, ProcessPool};
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::regional::RegionalDistributor;
use crate::engine::sampling::{Metropolis, StepSize};
use crate::engine::state::{MoveStatistics, ShakeReport};
use nalgebra::Rotation3;
use rand::Rng;
use tracing::{info, instrument, trace};

/// Length of the repeating move schedule. Step 0 only rotates, step 1 only translates and
/// every other step does both, so each step size still sees moves of its own kind.
const SCHEDULE_LENGTH: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MoveKind {
    Rotate,
    Translate,
    Both,
}

impl MoveKind {
    fn at(position: usize) -> Self {
        match position {
            0 => Self::Rotate,
            1 => Self::Translate,
            _ => Self::Both,
        }
    }

    fn rotates(self) -> bool {
        matches!(self, Self::Rotate | Self::Both)
    }

    fn translates(self) -> bool {
        matches!(self, Self::Translate | Self::Both)
    }
}

/// Rigid-body Monte Carlo over every molecule of the configuration.
///
/// With [`DistributionMode::Sequential`] each group receives one locked molecule per round;
/// with [`DistributionMode::Regional`] each group receives a batch of molecules per cycle
/// and changes are exchanged after every cycle. Trials are judged on the full energy of the
/// molecule including its intramolecular terms. Translation and rotation step sizes are
/// adapted independently once all molecules have been visited.
#[instrument(skip_all, name = "molecule_shake_workflow")]
pub fn run<P: ProcessPool>(
    cfg: &mut Configuration,
    map: &PotentialMap,
    pool: &mut P,
    config: &ShakeConfig,
    reporter: &ProgressReporter,
) -> Result<ShakeReport, EngineError> {
    let kernel = kernel_for(map, config);
    let mut translation_step = StepSize::new(
        config.translation.initial,
        config.translation.min,
        config.translation.max,
        config.target_acceptance,
    )?;
    let mut rotation_step = StepSize::new(
        config.rotation.initial,
        config.rotation.min,
        config.rotation.max,
        config.target_acceptance,
    )?;

    let schedule = (pool.random_stream().r#gen::<f64>() * SCHEDULE_LENGTH as f64) as usize;
    let mut shaker = MoleculeShaker {
        kernel: &kernel,
        metropolis: Metropolis::from_temperature(cfg.temperature())?,
        translation_step: translation_step.value(),
        rotation_step: rotation_step.value(),
        shakes: config.shakes_per_object,
        schedule: schedule % SCHEDULE_LENGTH,
        store: ChangeStore::new(),
        translations: MoveStatistics::default(),
        rotations: MoveStatistics::default(),
        energy_delta: 0.0,
    };

    info!(
        n_molecules = cfg.n_molecules(),
        mode = ?config.distribution,
        cutoff = kernel.cutoff(),
        translation_step = shaker.translation_step,
        rotation_step = shaker.rotation_step,
        "Starting molecule shake."
    );
    reporter.report(Progress::TaskStart {
        total_steps: cfg.n_molecules() as u64,
    });

    let outcome = match config.distribution {
        DistributionMode::Sequential => run_sequential(cfg, pool, config, &mut shaker, reporter)?,
        DistributionMode::Regional => run_regional(cfg, pool, config, &mut shaker, reporter)?,
    };
    reporter.report(Progress::TaskFinish);

    let totals = outcome.tally.pool_totals(&*pool)?;
    translation_step.adjust(totals.translations.accepted, totals.translations.attempted);
    rotation_step.adjust(totals.rotations.accepted, totals.rotations.attempted);
    finish_coordinates(cfg, totals.translations.accepted + totals.rotations.accepted);

    info!(
        translation_rate = totals.translations.acceptance_rate(),
        translations = totals.translations.attempted,
        rotation_rate = totals.rotations.acceptance_rate(),
        rotations = totals.rotations.attempted,
        energy_delta = totals.energy_delta,
        translation_step = translation_step.value(),
        rotation_step = rotation_step.value(),
        "Molecule shake complete."
    );

    Ok(ShakeReport {
        translations: totals.translations,
        rotations: totals.rotations,
        energy_delta: totals.energy_delta,
        translation_step: translation_step.value(),
        rotation_step: rotation_step.value(),
        n_objects: outcome.n_objects,
        n_unavailable_instances: outcome.n_unavailable,
        n_change_broadcasts: outcome.n_broadcasts,
    })
}

struct StageOutcome {
    tally: WeightedTally,
    n_objects: usize,
    n_unavailable: usize,
    n_broadcasts: usize,
}

fn run_sequential<P: ProcessPool>(
    cfg: &mut Configuration,
    pool: &mut P,
    config: &ShakeConfig,
    shaker: &mut MoleculeShaker,
    reporter: &ProgressReporter,
) -> Result<StageOutcome, EngineError> {
    let mut distributor = Distributor::new(
        cfg,
        ObjectGranularity::Molecule,
        &*pool,
        config.strategy,
        config.repeats_allowed,
    )?;

    loop {
        let distribution = distributor.next_available_object(cfg)?;
        if distribution.changes_broadcast_required {
            let changes = shaker.store.distribute_and_apply(cfg, &*pool, CommScope::Pool)?;
            reporter.report(Progress::Broadcast { changes });
        }

        match distribution.target {
            Target::AllComplete => break,
            Target::NoneAvailable => {}
            Target::Object(index) => {
                shaker.shake(cfg, pool.random_stream(), index)?;
                reporter.report(Progress::TaskIncrement);
            }
        }
        distributor.finished_with_object()?;
    }

    let changes = shaker.store.distribute_and_apply(cfg, &*pool, CommScope::Pool)?;
    reporter.report(Progress::Broadcast { changes });

    let mut tally = WeightedTally::default();
    let (translations, rotations, energy_delta) = shaker.take_counts();
    tally.add(&*pool, config.strategy, translations, rotations, energy_delta);
    Ok(StageOutcome {
        tally,
        n_objects: distributor.n_objects(),
        n_unavailable: distributor.n_unavailable_instances(),
        n_broadcasts: distributor.n_change_broadcasts_required(),
    })
}

fn run_regional<P: ProcessPool>(
    cfg: &mut Configuration,
    pool: &mut P,
    config: &ShakeConfig,
    shaker: &mut MoleculeShaker,
    reporter: &ProgressReporter,
) -> Result<StageOutcome, EngineError> {
    let mut distributor = RegionalDistributor::new(cfg, &*pool, config.strategy)?;
    let mut tally = WeightedTally::default();
    let mut n_broadcasts = 0;

    while distributor.cycle(cfg)? {
        let molecules = distributor.assigned_molecules().to_vec();
        let report_progress = distributor.collect_statistics();
        for index in molecules {
            shaker.shake(cfg, pool.random_stream(), index)?;
            if report_progress {
                reporter.report(Progress::TaskIncrement);
            }
        }

        let changes = shaker.store.distribute_and_apply(cfg, &*pool, CommScope::Pool)?;
        n_broadcasts += 1;
        reporter.report(Progress::Broadcast { changes });

        let (translations, rotations, energy_delta) = shaker.take_counts();
        tally.add(
            &*pool,
            distributor.current_strategy(),
            translations,
            rotations,
            energy_delta,
        );
    }

    Ok(StageOutcome {
        tally,
        n_objects: cfg.n_molecules(),
        n_unavailable: 0,
        n_broadcasts,
    })
}

struct MoleculeShaker<'k, 'm> {
    kernel: &'k EnergyKernel<'m>,
    metropolis: Metropolis,
    translation_step: f64,
    rotation_step: f64,
    shakes: usize,
    schedule: usize,
    store: ChangeStore,
    translations: MoveStatistics,
    rotations: MoveStatistics,
    energy_delta: f64,
}

impl MoleculeShaker<'_, '_> {
    /// Shakes the molecule at `index` and files its accepted coordinates in the store.
    fn shake<R: Rng>(
        &mut self,
        cfg: &mut Configuration,
        rng: &mut R,
        index: usize,
    ) -> Result<(), EngineError> {
        let id = cfg.molecule_id(index).ok_or(EngineError::ObjectOutOfRange {
            index,
            n_objects: cfg.n_molecules(),
        })?;
        self.store.add_molecule(cfg, id)?;
        let mut current = self.kernel.molecule_energy(cfg, id, true)?;

        for _ in 0..self.shakes {
            let kind = MoveKind::at(self.schedule);
            self.schedule = (self.schedule + 1) % SCHEDULE_LENGTH;

            if kind.translates() {
                cfg.translate_molecule(id, &random_displacement(rng, self.translation_step))?;
            }
            if kind.rotates() {
                let rx = rng.gen_range(-1.0..1.0) * self.rotation_step;
                let ry = rng.gen_range(-1.0..1.0) * self.rotation_step;
                let rotation = Rotation3::from_euler_angles(rx.to_radians(), ry.to_radians(), 0.0);
                cfg.rotate_molecule(id, &rotation)?;
            }

            let trial = self.kernel.molecule_energy(cfg, id, true)?;
            let delta = trial - current;
            let accepted = self.metropolis.accept(delta, rng);
            if accepted {
                self.store.update_all(cfg)?;
                current = trial;
                self.energy_delta += delta;
            } else {
                self.store.revert_all(cfg)?;
            }
            if kind.translates() {
                self.translations.record(accepted);
            }
            if kind.rotates() {
                self.rotations.record(accepted);
            }
        }

        trace!(molecule = index, energy = current, "Finished shaking molecule.");
        self.store.store_and_reset();
        Ok(())
    }

    fn take_counts(&mut self) -> (MoveStatistics, MoveStatistics, f64) {
        let counts = (self.translations, self.rotations, self.energy_delta);
        self.translations = MoveStatistics::default();
        self.rotations = MoveStatistics::default();
        self.energy_delta = 0.0;
        counts
    }
}
