use super::load_system;
use crate::cli::CheckArgs;
use crate::config::build_config;
use crate::error::Result;
use cellshake::engine::error::EngineError;
use cellshake::engine::kernel::EnergyKernel;

pub fn run(args: CheckArgs) -> Result<()> {
    let config = build_config(&args.system, None)?;
    let system = load_system(&config)?;
    let cfg = &system.configuration;
    let kernel = EnergyKernel::new(&system.map, config.shake.cutoff);
    let energy = kernel.total_energy(cfg).map_err(EngineError::from)?;

    println!("System file: {}", args.system.display());
    println!("  Forcefield: {}", config.forcefield_path.display());
    let [x, y, z] = config.system.box_lengths;
    println!("  Box: {:.3} x {:.3} x {:.3} Å", x, y, z);
    println!("  Temperature: {:.2} K", cfg.temperature());
    for species in &config.system.species {
        println!(
            "  Species '{}': {} molecule(s) of {} atom(s), {} bond(s)",
            species.name,
            species.count,
            species.atoms.len(),
            species.bonds.len()
        );
    }
    let [nx, ny, nz] = cfg.cells().divisions();
    println!(
        "  Cells: {} ({} x {} x {}), cutoff {:.3} Å",
        cfg.cells().n_cells(),
        nx,
        ny,
        nz,
        kernel.cutoff()
    );
    println!(
        "  Molecules: {}, atoms: {}",
        config.system.n_molecules(),
        cfg.n_atoms()
    );
    println!("  Total energy: {:.4} kJ/mol", energy);
    println!(
        "  Monte Carlo: {:?} shake, {} cycle(s), seed {}",
        config.module, config.cycles, config.seed
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::fixtures::argon_system;
    use crate::error::CliError;

    #[test]
    fn valid_system_passes() {
        let (_dir, path) = argon_system();
        run(CheckArgs { system: path }).unwrap();
    }

    #[test]
    fn missing_system_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = run(CheckArgs {
            system: dir.path().join("absent.toml"),
        });
        assert!(matches!(result, Err(CliError::Io(_))));
    }
}
