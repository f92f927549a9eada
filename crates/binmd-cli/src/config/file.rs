use crate::error::{CliError, Result};
use binmd::core::neighbor::ListingMode;
use binmd::engine::scheduler::RebuildPolicy;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileSystemConfig {
    pub cells: Option<usize>,
    pub lattice_constant: Option<f64>,
    pub temperature: Option<f64>,
    pub seed: Option<u64>,
    pub mass: Option<f64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileNeighborConfig {
    pub skin: Option<f64>,
    pub bins_per_cutoff: Option<usize>,
    pub listing: Option<ListingMode>,
    pub policy: Option<RebuildPolicy>,
    pub one_atom: Option<usize>,
    pub max_build_retries: Option<usize>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileRunConfig {
    pub timestep: Option<f64>,
    pub steps: Option<usize>,
    pub thermo_every: Option<usize>,
    pub per_atom: Option<bool>,
}

/// Either a parameter file or uniform single-type coefficients.
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileForcefieldConfig {
    pub params_path: Option<PathBuf>,
    pub epsilon: Option<f64>,
    pub sigma: Option<f64>,
    pub cutoff: Option<f64>,
    pub shift: Option<bool>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub system: Option<FileSystemConfig>,
    pub neighbor: Option<FileNeighborConfig>,
    pub run: Option<FileRunConfig>,
    pub forcefield: Option<FileForcefieldConfig>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content).map_err(|e| match e {
            CliError::Other(source) => CliError::FileParsing {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| CliError::Other(e.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_file_parses_every_section() {
        let config = FileConfig::from_toml_str(
            r#"
            [system]
            cells = 4
            lattice-constant = 1.6
            temperature = 0.8
            seed = 7

            [neighbor]
            skin = 0.4
            bins-per-cutoff = 2
            listing = "half-newton-off"
            one-atom = 500
            policy = { type = "displacement", delay = 2 }

            [run]
            timestep = 0.002
            steps = 50
            thermo-every = 10
            per-atom = true

            [forcefield]
            epsilon = 1.0
            sigma = 1.0
            cutoff = 2.5
            shift = true
            "#,
        )
        .unwrap();

        let system = config.system.unwrap();
        assert_eq!(system.cells, Some(4));
        assert_eq!(system.seed, Some(7));
        let neighbor = config.neighbor.unwrap();
        assert_eq!(neighbor.listing, Some(ListingMode::HalfNewtonOff));
        assert_eq!(neighbor.policy, Some(RebuildPolicy::Displacement { delay: 2 }));
        assert_eq!(config.run.unwrap().per_atom, Some(true));
        assert_eq!(config.forcefield.unwrap().shift, Some(true));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(FileConfig::from_toml_str("[neighbor]\nskni = 0.3").is_err());
        assert!(FileConfig::from_toml_str("[thermostat]\nt = 1.0").is_err());
    }

    #[test]
    fn parse_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[run]\nsteps = \"many\"").unwrap();
        let err = FileConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, CliError::FileParsing { .. }));
        assert!(err.to_string().contains("bad.toml"));
    }
}
