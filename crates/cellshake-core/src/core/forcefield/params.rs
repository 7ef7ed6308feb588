use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

fn default_dielectric() -> f64 {
    1.0
}

fn default_table_delta() -> f64 {
    0.005
}

/// Lennard-Jones and charge parameters of one atom type.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AtomTypeParams {
    pub name: String,
    /// Position of the potential minimum, in Å.
    pub radius: f64,
    /// Depth of the potential well, in kJ/mol.
    pub well_depth: f64,
    #[serde(default)]
    pub charge: f64,
}

/// A complete non-bonded parameter set.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ForcefieldParams {
    /// Distance beyond which every pair potential is zero, in Å.
    pub range: f64,
    #[serde(default = "default_table_delta")]
    pub table_delta: f64,
    #[serde(default = "default_dielectric")]
    pub dielectric: f64,
    pub atom_types: Vec<AtomTypeParams>,
}

#[derive(Debug, Error)]
pub enum ParamLoadError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
}

impl ForcefieldParams {
    pub fn load(path: &Path) -> Result<Self, ParamLoadError> {
        let content = std::fs::read_to_string(path).map_err(|e| ParamLoadError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ParamLoadError::Toml {
            path: path.to_string_lossy().to_string(),
            source: e,
        })
    }

    /// Index of the named atom type.
    pub fn type_index(&self, name: &str) -> Option<usize> {
        self.atom_types.iter().position(|t| t.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn load_succeeds_with_valid_toml() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("argon.toml");
        let mut file = File::create(&file_path).unwrap();
        writeln!(
            file,
            r#"
            range = 12.0
            dielectric = 2.0

            [[atom_types]]
            name = "Ar"
            radius = 3.82
            well_depth = 0.996

            [[atom_types]]
            name = "Na"
            radius = 2.9
            well_depth = 0.5
            charge = 1.0
            "#
        )
        .unwrap();

        let params = ForcefieldParams::load(&file_path).unwrap();
        assert_eq!(params.range, 12.0);
        assert_eq!(params.dielectric, 2.0);
        assert_eq!(params.table_delta, 0.005);
        assert_eq!(params.atom_types.len(), 2);
        assert_eq!(params.atom_types[0].charge, 0.0);
        assert_eq!(params.type_index("Na"), Some(1));
        assert_eq!(params.type_index("Cl"), None);
    }

    #[test]
    fn load_fails_for_missing_file() {
        let dir = tempdir().unwrap();
        let result = ForcefieldParams::load(&dir.path().join("non_existent.toml"));
        assert!(matches!(result, Err(ParamLoadError::Io { .. })));
    }

    #[test]
    fn load_fails_for_malformed_toml() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("malformed.toml");
        fs::write(&file_path, "this is not toml").unwrap();
        let result = ForcefieldParams::load(&file_path);
        assert!(matches!(result, Err(ParamLoadError::Toml { .. })));
    }

    #[test]
    fn load_rejects_unknown_keys() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("extra.toml");
        fs::write(&file_path, "range = 10.0\natom_types = []\nflavour = \"x\"\n").unwrap();
        assert!(matches!(
            ForcefieldParams::load(&file_path),
            Err(ParamLoadError::Toml { .. })
        ));
    }
}
