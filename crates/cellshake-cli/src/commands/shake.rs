use super::load_system;
use crate::cli::{ShakeArgs, ShakeModule};
use crate::config::build_config;
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use crate::utils::xyz::write_xyz;
use cellshake::engine::error::EngineError;
use cellshake::engine::kernel::EnergyKernel;
use cellshake::engine::pool::LocalPool;
use cellshake::engine::progress::{Progress, ProgressReporter};
use cellshake::workflows;
use std::fs::File;
use std::io::{BufWriter, Write};
use tracing::info;

pub fn run(args: ShakeArgs, quiet: bool) -> Result<()> {
    info!("Merging configuration from file and CLI arguments...");
    let config = build_config(&args.system, Some(&args))?;
    let mut system = load_system(&config)?;
    let cfg = &mut system.configuration;

    let kernel = EnergyKernel::new(&system.map, config.shake.cutoff);
    let initial_energy = kernel.total_energy(cfg).map_err(EngineError::from)?;
    println!(
        "Shaking {} molecule(s) ({} atoms) for {} cycle(s), initial energy {:.4} kJ/mol.",
        cfg.n_molecules(),
        cfg.n_atoms(),
        config.cycles,
        initial_energy
    );

    let progress_handler = if quiet {
        CliProgressHandler::hidden()
    } else {
        CliProgressHandler::new()
    };
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());
    let mut pool = LocalPool::new(config.seed);
    let mut stage = config.shake.clone();

    let mut trajectory = match &args.output {
        Some(path) => {
            info!("Writing a trajectory frame per cycle to {:?}", path);
            Some(BufWriter::new(File::create(path)?))
        }
        None => None,
    };

    for cycle in 1..=config.cycles {
        reporter.report(Progress::PhaseStart { name: "Shake" });
        let report = match config.module {
            ShakeModule::Atom => {
                workflows::atom_shake::run(cfg, &system.map, &mut pool, &stage, &reporter)?
            }
            ShakeModule::Molecule => {
                workflows::molecule_shake::run(cfg, &system.map, &mut pool, &stage, &reporter)?
            }
        };
        reporter.report(Progress::PhaseFinish);

        stage.translation.initial = report.translation_step;
        if config.module == ShakeModule::Molecule {
            stage.rotation.initial = report.rotation_step;
        }

        info!(
            cycle,
            accepted = report.n_accepted(),
            energy_delta = report.energy_delta,
            broadcasts = report.n_change_broadcasts,
            "Shake cycle complete."
        );
        print!(
            "Cycle {}: translations {}/{} accepted (step {:.4} Å)",
            cycle,
            report.translations.accepted,
            report.translations.attempted,
            report.translation_step
        );
        if config.module == ShakeModule::Molecule {
            print!(
                ", rotations {}/{} accepted (step {:.3}°)",
                report.rotations.accepted, report.rotations.attempted, report.rotation_step
            );
        }
        println!(", energy change {:.4} kJ/mol", report.energy_delta);

        if let Some(writer) = trajectory.as_mut() {
            let energy = kernel.total_energy(cfg).map_err(EngineError::from)?;
            let comment = format!(
                "cellshake cycle {} coordinates {} energy {:.6}",
                cycle,
                cfg.coordinate_index(),
                energy
            );
            write_xyz(cfg, &system.params, &comment, writer).map_err(CliError::Io)?;
        }
    }

    let final_energy = kernel.total_energy(cfg).map_err(EngineError::from)?;
    println!(
        "Final energy {:.4} kJ/mol (change {:.4} kJ/mol).",
        final_energy,
        final_energy - initial_energy
    );

    if let (Some(mut writer), Some(path)) = (trajectory, &args.output) {
        writer.flush()?;
        println!(
            "{} trajectory frame(s) written to: {}",
            config.cycles,
            path.display()
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::fixtures::argon_system;

    fn args(system: std::path::PathBuf) -> ShakeArgs {
        ShakeArgs {
            system,
            output: None,
            cycles: Some(2),
            seed: Some(42),
            module: None,
            set_values: Vec::new(),
        }
    }

    #[test]
    fn molecule_shake_writes_a_frame_per_cycle() {
        let (dir, path) = argon_system();
        let output = dir.path().join("trajectory.xyz");
        let mut args = args(path);
        args.output = Some(output.clone());

        run(args, true).unwrap();

        let text = std::fs::read_to_string(output).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2 * (27 + 2));
        assert_eq!(lines[0], "27");
        assert!(lines[1].starts_with("cellshake cycle 1 coordinates 1"));
        assert_eq!(lines[29], "27");
        assert!(lines[30].starts_with("cellshake cycle 2 coordinates 2"));
    }

    #[test]
    fn atom_shake_runs_from_a_set_override() {
        let (_dir, path) = argon_system();
        let mut args = args(path);
        args.set_values = vec!["monte-carlo.module=atom".to_string()];
        run(args, true).unwrap();
    }

    #[test]
    fn missing_forcefield_file_is_reported() {
        let (_dir, path) = argon_system();
        let mut args = args(path);
        args.set_values = vec!["forcefield=absent.toml".to_string()];
        assert!(matches!(run(args, true), Err(CliError::FileParsing { .. })));
    }
}
