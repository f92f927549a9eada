use super::contract::{ForceError, non_negative};
use crate::core::neighbor::cutoffs::CutoffTable;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum MixingRule {
    #[default]
    Geometric,
    Arithmetic,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct GlobalParams {
    pub ntypes: usize,
    pub cutoff: f64,
    #[serde(default)]
    pub mixing: MixingRule,
    #[serde(default)]
    pub shift: bool,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PairParam {
    pub epsilon: f64,
    pub sigma: f64,
    pub cutoff: Option<f64>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct PairParamsFile {
    pub globals: GlobalParams,
    #[serde(default)]
    pub pair: HashMap<String, PairParam>,
}

/// Resolved Lennard-Jones coefficients for every type pair.
#[derive(Debug, Clone, PartialEq)]
pub struct PairCoeffs {
    epsilon: CutoffTable,
    sigma: CutoffTable,
    cutoff: CutoffTable,
    shift: bool,
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
    #[error("Invalid type-pair key '{key}': expected \"i-j\" with 1 <= i, j <= {ntypes}")]
    InvalidKey { key: String, ntypes: usize },
    #[error(transparent)]
    Coefficients(#[from] ForceError),
}

impl PairCoeffs {
    pub fn load(path: &Path) -> Result<Self, ParamLoadError> {
        let content = std::fs::read_to_string(path).map_err(|e| ParamLoadError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            ParamLoadError::Toml { source, .. } => ParamLoadError::Toml {
                path: path.to_string_lossy().to_string(),
                source,
            },
            other => other,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ParamLoadError> {
        let file: PairParamsFile = toml::from_str(content).map_err(|e| ParamLoadError::Toml {
            path: "<inline>".to_string(),
            source: e,
        })?;
        Self::resolve(&file)
    }

    /// Turns explicit pair entries into full tables, mixing unspecified cross pairs
    /// from the self terms. Every type needs an `"i-i"` entry.
    pub fn resolve(file: &PairParamsFile) -> Result<Self, ParamLoadError> {
        let g = &file.globals;
        let n = g.ntypes;
        non_negative("globals.cutoff", g.cutoff)?;

        let mut explicit: HashMap<(usize, usize), PairParam> = HashMap::new();
        for (key, param) in &file.pair {
            let (i, j) = parse_pair_key(key, n)?;
            non_negative("epsilon", param.epsilon)?;
            non_negative("sigma", param.sigma)?;
            if let Some(cut) = param.cutoff {
                non_negative("cutoff", cut)?;
            }
            explicit.insert((i.min(j), i.max(j)), *param);
        }

        if let Some(i) = (1..=n).find(|&i| !explicit.contains_key(&(i, i))) {
            return Err(ForceError::MissingCoefficients { itype: i, jtype: i }.into());
        }

        let mut coeffs = Self {
            epsilon: CutoffTable::uniform(n, 0.0),
            sigma: CutoffTable::uniform(n, 0.0),
            cutoff: CutoffTable::uniform(n, 0.0),
            shift: g.shift,
        };
        for i in 1..=n {
            for j in i..=n {
                let own = explicit.get(&(i, j));
                let param = match (own, explicit.get(&(i, i)), explicit.get(&(j, j))) {
                    (Some(p), _, _) => *p,
                    (None, Some(a), Some(b)) => mix(g.mixing, a, b),
                    _ => {
                        return Err(ForceError::MissingCoefficients { itype: i, jtype: j }.into());
                    }
                };
                coeffs.epsilon.set(i, j, param.epsilon);
                coeffs.sigma.set(i, j, param.sigma);
                coeffs.cutoff.set(i, j, param.cutoff.unwrap_or(g.cutoff));
            }
        }
        Ok(coeffs)
    }

    pub fn uniform(ntypes: usize, epsilon: f64, sigma: f64, cutoff: f64) -> Self {
        Self {
            epsilon: CutoffTable::uniform(ntypes, epsilon),
            sigma: CutoffTable::uniform(ntypes, sigma),
            cutoff: CutoffTable::uniform(ntypes, cutoff),
            shift: false,
        }
    }

    pub fn with_shift(mut self, shift: bool) -> Self {
        self.shift = shift;
        self
    }

    pub fn ntypes(&self) -> usize {
        self.cutoff.ntypes()
    }

    #[inline]
    pub fn epsilon(&self, itype: usize, jtype: usize) -> f64 {
        self.epsilon.get(itype, jtype)
    }

    #[inline]
    pub fn sigma(&self, itype: usize, jtype: usize) -> f64 {
        self.sigma.get(itype, jtype)
    }

    pub fn cutoffs(&self) -> &CutoffTable {
        &self.cutoff
    }

    pub fn shift(&self) -> bool {
        self.shift
    }
}

fn mix(rule: MixingRule, a: &PairParam, b: &PairParam) -> PairParam {
    let epsilon = (a.epsilon * b.epsilon).sqrt();
    let sigma = match rule {
        MixingRule::Geometric => (a.sigma * b.sigma).sqrt(),
        MixingRule::Arithmetic => 0.5 * (a.sigma + b.sigma),
    };
    let cutoff = match (a.cutoff, b.cutoff) {
        (Some(ca), Some(cb)) => Some(match rule {
            MixingRule::Geometric => (ca * cb).sqrt(),
            MixingRule::Arithmetic => 0.5 * (ca + cb),
        }),
        _ => None,
    };
    PairParam {
        epsilon,
        sigma,
        cutoff,
    }
}

fn parse_pair_key(key: &str, ntypes: usize) -> Result<(usize, usize), ParamLoadError> {
    let invalid = || ParamLoadError::InvalidKey {
        key: key.to_string(),
        ntypes,
    };
    let (a, b) = key.split_once('-').ok_or_else(invalid)?;
    let i: usize = a.trim().parse().map_err(|_| invalid())?;
    let j: usize = b.trim().parse().map_err(|_| invalid())?;
    if i == 0 || j == 0 || i > ntypes || j > ntypes {
        return Err(invalid());
    }
    Ok((i, j))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const TWO_TYPES: &str = r#"
        [globals]
        ntypes = 2
        cutoff = 2.5
        mixing = "arithmetic"

        [pair."1-1"]
        epsilon = 1.0
        sigma = 1.0

        [pair."2-2"]
        epsilon = 4.0
        sigma = 2.0
        cutoff = 3.0
    "#;

    #[test]
    fn load_succeeds_with_valid_toml() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("pair.toml");
        fs::write(&file_path, TWO_TYPES).unwrap();

        let coeffs = PairCoeffs::load(&file_path).unwrap();
        assert_eq!(coeffs.ntypes(), 2);
        assert_eq!(coeffs.epsilon(2, 2), 4.0);
        assert_eq!(coeffs.cutoffs().get(1, 1), 2.5);
        assert_eq!(coeffs.cutoffs().get(2, 2), 3.0);
    }

    #[test]
    fn unspecified_cross_pairs_are_mixed() {
        let coeffs = PairCoeffs::from_toml_str(TWO_TYPES).unwrap();
        assert_eq!(coeffs.epsilon(1, 2), 2.0);
        assert_eq!(coeffs.sigma(2, 1), 1.5);
        // only one self term carries an explicit cutoff, so the global applies
        assert_eq!(coeffs.cutoffs().get(1, 2), 2.5);
    }

    #[test]
    fn explicit_cross_pair_overrides_mixing() {
        let content = format!(
            "{TWO_TYPES}\n[pair.\"2-1\"]\nepsilon = 0.5\nsigma = 1.1\ncutoff = 0.0\n"
        );
        let coeffs = PairCoeffs::from_toml_str(&content).unwrap();
        assert_eq!(coeffs.epsilon(1, 2), 0.5);
        assert_eq!(coeffs.cutoffs().get(1, 2), 0.0);
    }

    #[test]
    fn missing_self_term_is_reported() {
        let content = r#"
            [globals]
            ntypes = 2
            cutoff = 2.5
            [pair."1-1"]
            epsilon = 1.0
            sigma = 1.0
        "#;
        assert!(matches!(
            PairCoeffs::from_toml_str(content),
            Err(ParamLoadError::Coefficients(ForceError::MissingCoefficients {
                itype: 2,
                jtype: 2
            }))
        ));
    }

    #[test]
    fn missing_later_self_term_is_named_even_with_cross_pairs_to_mix() {
        let content = r#"
            [globals]
            ntypes = 3
            cutoff = 2.5
            [pair."1-1"]
            epsilon = 1.0
            sigma = 1.0
            [pair."2-2"]
            epsilon = 0.5
            sigma = 1.2
            [pair."1-3"]
            epsilon = 0.7
            sigma = 1.1
        "#;
        assert!(matches!(
            PairCoeffs::from_toml_str(content),
            Err(ParamLoadError::Coefficients(ForceError::MissingCoefficients {
                itype: 3,
                jtype: 3
            }))
        ));
    }

    #[test]
    fn out_of_range_key_is_rejected() {
        let content = r#"
            [globals]
            ntypes = 1
            cutoff = 2.5
            [pair."1-3"]
            epsilon = 1.0
            sigma = 1.0
        "#;
        assert!(matches!(
            PairCoeffs::from_toml_str(content),
            Err(ParamLoadError::InvalidKey { .. })
        ));
    }

    #[test]
    fn negative_epsilon_is_rejected() {
        let content = r#"
            [globals]
            ntypes = 1
            cutoff = 2.5
            [pair."1-1"]
            epsilon = -1.0
            sigma = 1.0
        "#;
        assert!(matches!(
            PairCoeffs::from_toml_str(content),
            Err(ParamLoadError::Coefficients(ForceError::InvalidCoefficient { .. }))
        ));
    }

    #[test]
    fn load_fails_for_missing_file() {
        let dir = tempdir().unwrap();
        let result = PairCoeffs::load(&dir.path().join("absent.toml"));
        assert!(matches!(result, Err(ParamLoadError::Io { .. })));
    }

    #[test]
    fn load_fails_for_malformed_toml() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("malformed.toml");
        fs::write(&file_path, "this is not toml").unwrap();
        let result = PairCoeffs::load(&file_path);
        assert!(matches!(result, Err(ParamLoadError::Toml { path, .. }) if path.ends_with("malformed.toml")));
    }
}
