use crate::error::{CliError, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileSystemConfig {
    #[serde(rename = "box")]
    pub box_lengths: Option<[f64; 3]>,
    pub temperature: Option<f64>,
    /// Smallest permitted cell width, in Å.
    pub cell_size: Option<f64>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileAtom {
    #[serde(rename = "type")]
    pub type_name: String,
    pub position: [f64; 3],
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileBond {
    pub i: usize,
    pub j: usize,
    pub force_constant: f64,
    pub equilibrium: f64,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileSpecies {
    pub name: String,
    pub count: usize,
    pub atoms: Vec<FileAtom>,
    #[serde(default)]
    pub bonds: Vec<FileBond>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileMonteCarloConfig {
    pub module: Option<String>,
    pub cycles: Option<usize>,
    pub seed: Option<u64>,
    pub cutoff: Option<f64>,
    pub shakes_per_object: Option<usize>,
    pub target_acceptance: Option<f64>,
    pub translation_step: Option<f64>,
    pub translation_step_min: Option<f64>,
    pub translation_step_max: Option<f64>,
    pub rotation_step: Option<f64>,
    pub rotation_step_min: Option<f64>,
    pub rotation_step_max: Option<f64>,
    pub strategy: Option<String>,
    pub distribution: Option<String>,
    pub repeats_allowed: Option<bool>,
    pub inter_distance_scale: Option<f64>,
    pub intra_energy_scale: Option<f64>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileConfig {
    /// Forcefield parameter file, relative to the system file.
    pub forcefield: Option<String>,
    pub system: Option<FileSystemConfig>,
    #[serde(default)]
    pub species: Vec<FileSpecies>,
    pub monte_carlo: Option<FileMonteCarloConfig>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading system description from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    fn parse(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARGON: &str = r#"
        forcefield = "argon-ff.toml"

        [system]
        box = [24.0, 24.0, 24.0]
        temperature = 120.0

        [[species]]
        name = "argon"
        count = 27
        atoms = [{ type = "Ar", position = [0.0, 0.0, 0.0] }]

        [monte-carlo]
        module = "atom"
        shakes-per-object = 3
        translation-step-max = 1.5
    "#;

    #[test]
    fn parses_a_complete_description() {
        let config = FileConfig::parse(ARGON).unwrap();
        assert_eq!(config.forcefield.as_deref(), Some("argon-ff.toml"));
        let system = config.system.unwrap();
        assert_eq!(system.box_lengths, Some([24.0, 24.0, 24.0]));
        assert_eq!(system.cell_size, None);
        assert_eq!(config.species.len(), 1);
        assert_eq!(config.species[0].atoms[0].type_name, "Ar");
        assert!(config.species[0].bonds.is_empty());
        let mc = config.monte_carlo.unwrap();
        assert_eq!(mc.module.as_deref(), Some("atom"));
        assert_eq!(mc.shakes_per_object, Some(3));
        assert_eq!(mc.translation_step_max, Some(1.5));
    }

    #[test]
    fn rejects_unknown_keys() {
        let content = "[monte-carlo]\nshakes = 3\n";
        assert!(FileConfig::parse(content).is_err());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = FileConfig::from_file(&dir.path().join("absent.toml"));
        assert!(matches!(result, Err(CliError::Io(_))));
    }

    #[test]
    fn malformed_file_reports_its_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[system\nbox = 1").unwrap();
        match FileConfig::from_file(&path) {
            Err(CliError::FileParsing { path: p, .. }) => assert_eq!(p, path),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
