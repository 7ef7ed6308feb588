use super::defaults::DefaultsConfig;
use super::file::{FileConfig, FileMonteCarloConfig, FileSpecies, FileSystemConfig};
use super::models::{AppConfig, AtomSpec, BondSpec, SpeciesSpec, SystemSpec};
use crate::cli::{ShakeArgs, ShakeModule};
use crate::error::{CliError, Result};
use cellshake::engine::config::{DistributionMode, ShakeConfigBuilder, StepConfig};
use cellshake::engine::kernel::KernelScaling;
use cellshake::engine::pool::DivisionStrategy;
use clap::ValueEnum;
use std::path::Path;
use std::str::FromStr;

/// Builds the application configuration for the system file at `system_path`.
///
/// Precedence, highest first: command-line flags, `--set` values, the file, defaults.
pub fn build_config(system_path: &Path, args: Option<&ShakeArgs>) -> Result<AppConfig> {
    let defaults = DefaultsConfig::default();

    let file_config = FileConfig::from_file(system_path)?;
    let set_values = args.map(|a| a.set_values.as_slice()).unwrap_or_default();
    let mut file_config = apply_set_values(file_config, set_values)?;

    let forcefield = file_config.forcefield.take().ok_or_else(|| {
        CliError::Config("`forcefield` (path to the parameter file) is required.".to_string())
    })?;
    let base = system_path.parent().unwrap_or_else(|| Path::new("."));
    let forcefield_path = base.join(forcefield);

    let system = build_system(
        file_config.system.take().unwrap_or_default(),
        std::mem::take(&mut file_config.species),
        &defaults,
    )?;

    let mc = file_config.monte_carlo.take().unwrap_or_default();
    let module = match args.and_then(|a| a.module) {
        Some(module) => module,
        None => parse_module(mc.module.as_deref().unwrap_or(defaults.module))?,
    };
    let cycles = args
        .and_then(|a| a.cycles)
        .or(mc.cycles)
        .unwrap_or(defaults.cycles);
    let seed = args.and_then(|a| a.seed).or(mc.seed).unwrap_or(defaults.seed);
    let shake = build_shake_config(&mc, &defaults)?;

    Ok(AppConfig {
        forcefield_path,
        system,
        module,
        cycles,
        seed,
        shake,
    })
}

fn build_system(
    file: FileSystemConfig,
    species: Vec<FileSpecies>,
    defaults: &DefaultsConfig,
) -> Result<SystemSpec> {
    let box_lengths = file
        .box_lengths
        .ok_or_else(|| CliError::Config("`system.box` is required.".to_string()))?;
    if species.is_empty() {
        return Err(CliError::Config(
            "At least one `[[species]]` entry is required.".to_string(),
        ));
    }
    if let Some(empty) = species.iter().find(|s| s.atoms.is_empty()) {
        return Err(CliError::Config(format!(
            "Species '{}' must list at least one atom.",
            empty.name
        )));
    }

    let species = species
        .into_iter()
        .map(|s| SpeciesSpec {
            name: s.name,
            count: s.count,
            atoms: s
                .atoms
                .into_iter()
                .map(|a| AtomSpec {
                    type_name: a.type_name,
                    position: a.position,
                })
                .collect(),
            bonds: s
                .bonds
                .into_iter()
                .map(|b| BondSpec {
                    i: b.i,
                    j: b.j,
                    force_constant: b.force_constant,
                    equilibrium: b.equilibrium,
                })
                .collect(),
        })
        .collect();

    Ok(SystemSpec {
        box_lengths,
        temperature: file.temperature.unwrap_or(defaults.temperature),
        cell_size: file.cell_size.unwrap_or(defaults.cell_size),
        species,
    })
}

fn build_shake_config(
    mc: &FileMonteCarloConfig,
    defaults: &DefaultsConfig,
) -> Result<cellshake::engine::config::ShakeConfig> {
    let d = &defaults.shake;
    let mut builder = ShakeConfigBuilder::new()
        .shakes_per_object(mc.shakes_per_object.unwrap_or(d.shakes_per_object))
        .target_acceptance(mc.target_acceptance.unwrap_or(d.target_acceptance))
        .translation(StepConfig {
            initial: mc.translation_step.unwrap_or(d.translation.initial),
            min: mc.translation_step_min.unwrap_or(d.translation.min),
            max: mc.translation_step_max.unwrap_or(d.translation.max),
        })
        .rotation(StepConfig {
            initial: mc.rotation_step.unwrap_or(d.rotation.initial),
            min: mc.rotation_step_min.unwrap_or(d.rotation.min),
            max: mc.rotation_step_max.unwrap_or(d.rotation.max),
        })
        .strategy(match mc.strategy.as_deref() {
            Some(s) => parse_strategy(s)?,
            None => d.strategy,
        })
        .distribution(match mc.distribution.as_deref() {
            Some(s) => parse_distribution(s)?,
            None => d.distribution,
        })
        .repeats_allowed(mc.repeats_allowed.unwrap_or(d.repeats_allowed));

    if let Some(cutoff) = mc.cutoff {
        builder = builder.cutoff(cutoff);
    }
    if mc.inter_distance_scale.is_some() || mc.intra_energy_scale.is_some() {
        builder = builder.kernel_scaling(KernelScaling {
            inter_distance_scale: mc.inter_distance_scale.unwrap_or(1.0),
            intra_energy_scale: mc.intra_energy_scale.unwrap_or(1.0),
        });
    }

    builder.build().map_err(|e| CliError::Config(e.to_string()))
}

fn parse_module(value: &str) -> Result<ShakeModule> {
    <ShakeModule as ValueEnum>::from_str(value, true).map_err(|_| {
        CliError::Config(format!(
            "Unknown shake module '{}'. Expected 'atom' or 'molecule'.",
            value
        ))
    })
}

fn parse_strategy(value: &str) -> Result<DivisionStrategy> {
    match value.to_ascii_lowercase().as_str() {
        "pool" => Ok(DivisionStrategy::Pool),
        "groups" => Ok(DivisionStrategy::Groups),
        "processes" => Ok(DivisionStrategy::Processes),
        _ => Err(CliError::Config(format!(
            "Unknown division strategy '{}'. Expected 'pool', 'groups' or 'processes'.",
            value
        ))),
    }
}

fn parse_distribution(value: &str) -> Result<DistributionMode> {
    match value.to_ascii_lowercase().as_str() {
        "sequential" => Ok(DistributionMode::Sequential),
        "regional" => Ok(DistributionMode::Regional),
        _ => Err(CliError::Config(format!(
            "Unknown distribution mode '{}'. Expected 'sequential' or 'regional'.",
            value
        ))),
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<Option<T>> {
    value
        .parse()
        .map(Some)
        .map_err(|_| CliError::Config(format!("Invalid value for {}: {}", key, value)))
}

fn apply_set_values(mut config: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    for kv_pair in set_values {
        let Some((key, value)) = kv_pair.split_once('=') else {
            return Err(CliError::Config(format!(
                "Invalid --set format: '{}'. Expected KEY=VALUE.",
                kv_pair
            )));
        };

        if key == "forcefield" {
            config.forcefield = Some(value.to_string());
            continue;
        }

        if let Some(field) = key.strip_prefix("system.") {
            let system = config.system.get_or_insert_with(Default::default);
            match field {
                "temperature" => system.temperature = parse_value(key, value)?,
                "cell-size" => system.cell_size = parse_value(key, value)?,
                _ => return Err(unsupported(key)),
            }
            continue;
        }

        let Some(field) = key.strip_prefix("monte-carlo.") else {
            return Err(unsupported(key));
        };
        let mc = config.monte_carlo.get_or_insert_with(Default::default);
        match field {
            "module" => mc.module = Some(value.to_string()),
            "cycles" => mc.cycles = parse_value(key, value)?,
            "seed" => mc.seed = parse_value(key, value)?,
            "cutoff" => mc.cutoff = parse_value(key, value)?,
            "shakes-per-object" => mc.shakes_per_object = parse_value(key, value)?,
            "target-acceptance" => mc.target_acceptance = parse_value(key, value)?,
            "translation-step" => mc.translation_step = parse_value(key, value)?,
            "translation-step-min" => mc.translation_step_min = parse_value(key, value)?,
            "translation-step-max" => mc.translation_step_max = parse_value(key, value)?,
            "rotation-step" => mc.rotation_step = parse_value(key, value)?,
            "rotation-step-min" => mc.rotation_step_min = parse_value(key, value)?,
            "rotation-step-max" => mc.rotation_step_max = parse_value(key, value)?,
            "strategy" => mc.strategy = Some(value.to_string()),
            "distribution" => mc.distribution = Some(value.to_string()),
            "repeats-allowed" => mc.repeats_allowed = parse_value(key, value)?,
            "inter-distance-scale" => mc.inter_distance_scale = parse_value(key, value)?,
            "intra-energy-scale" => mc.intra_energy_scale = parse_value(key, value)?,
            _ => return Err(unsupported(key)),
        }
    }
    Ok(config)
}

fn unsupported(key: &str) -> CliError {
    CliError::Config(format!("Unsupported configuration key for --set: '{}'", key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    const SYSTEM: &str = r#"
        forcefield = "nitrogen-ff.toml"

        [system]
        box = [20.0, 20.0, 20.0]
        temperature = 77.0

        [[species]]
        name = "dinitrogen"
        count = 8
        atoms = [
            { type = "N", position = [0.0, 0.0, 0.0] },
            { type = "N", position = [1.1, 0.0, 0.0] },
        ]
        bonds = [{ i = 0, j = 1, force-constant = 1000.0, equilibrium = 1.1 }]

        [monte-carlo]
        shakes-per-object = 4
        distribution = "regional"
    "#;

    fn write_system(content: &str) -> (TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("system.toml");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    fn shake_args(system: &Path, set_values: &[&str]) -> ShakeArgs {
        ShakeArgs {
            system: system.to_path_buf(),
            output: None,
            cycles: None,
            seed: None,
            module: None,
            set_values: set_values.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn file_values_are_merged_over_defaults() {
        let (dir, path) = write_system(SYSTEM);
        let config = build_config(&path, None).unwrap();

        assert_eq!(config.forcefield_path, dir.path().join("nitrogen-ff.toml"));
        assert_eq!(config.module, ShakeModule::Molecule);
        assert_eq!(config.cycles, 1);
        assert_eq!(config.system.temperature, 77.0);
        assert_eq!(config.system.cell_size, 7.0);
        assert_eq!(config.system.species[0].bonds.len(), 1);
        assert_eq!(config.shake.shakes_per_object, 4);
        assert_eq!(config.shake.distribution, DistributionMode::Regional);
        assert_eq!(config.shake.strategy, DivisionStrategy::Groups);
        assert_eq!(config.shake.translation.initial, 0.05);
    }

    #[test]
    fn cli_flags_take_precedence_over_set_values() {
        let (_dir, path) = write_system(SYSTEM);
        let mut args = shake_args(
            &path,
            &[
                "monte-carlo.cycles=3",
                "monte-carlo.module=atom",
                "monte-carlo.translation-step=0.2",
                "system.temperature=90",
            ],
        );
        args.cycles = Some(7);

        let config = build_config(&path, Some(&args)).unwrap();
        assert_eq!(config.cycles, 7);
        assert_eq!(config.module, ShakeModule::Atom);
        assert_eq!(config.shake.translation.initial, 0.2);
        assert_eq!(config.system.temperature, 90.0);
    }

    #[test]
    fn kernel_scaling_is_enabled_by_either_scale() {
        let (_dir, path) = write_system(SYSTEM);
        let args = shake_args(&path, &["monte-carlo.intra-energy-scale=0.5"]);
        let config = build_config(&path, Some(&args)).unwrap();
        assert_eq!(
            config.shake.kernel_scaling,
            Some(KernelScaling {
                inter_distance_scale: 1.0,
                intra_energy_scale: 0.5,
            })
        );
    }

    #[test]
    fn bad_set_values_are_rejected() {
        let (_dir, path) = write_system(SYSTEM);
        for bad in [
            "monte-carlo.shakes-per-object",
            "monte-carlo.shakes=4",
            "monte-carlo.cycles=many",
            "monte-carlo.strategy=threads",
            "monte-carlo.shakes-per-object=0",
        ] {
            let args = shake_args(&path, &[bad]);
            assert!(
                matches!(build_config(&path, Some(&args)), Err(CliError::Config(_))),
                "'{bad}' should be rejected"
            );
        }
    }

    #[test]
    fn missing_box_is_reported() {
        let (_dir, path) = write_system(
            r#"
            forcefield = "ff.toml"
            [[species]]
            name = "argon"
            count = 1
            atoms = [{ type = "Ar", position = [0.0, 0.0, 0.0] }]
            "#,
        );
        match build_config(&path, None) {
            Err(CliError::Config(msg)) => assert!(msg.contains("system.box")),
            other => panic!("unexpected result: {:?}", other.err()),
        }
    }

    #[test]
    fn species_without_atoms_is_reported() {
        let (_dir, path) = write_system(
            r#"
            forcefield = "ff.toml"
            [system]
            box = [10.0, 10.0, 10.0]
            [[species]]
            name = "ghost"
            count = 2
            atoms = []
            "#,
        );
        match build_config(&path, None) {
            Err(CliError::Config(msg)) => assert!(msg.contains("ghost")),
            other => panic!("unexpected result: {:?}", other.err()),
        }
    }
}
