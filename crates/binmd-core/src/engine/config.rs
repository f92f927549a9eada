use super::scheduler::RebuildPolicy;
use crate::core::forcefield::tally::TallyFlags;
use crate::core::neighbor::ListingMode;
use crate::core::neighbor::bins::MAX_BINS_PER_CUTOFF;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

pub const DEFAULT_BINS_PER_CUTOFF: usize = 2;
pub const DEFAULT_ONE_ATOM: usize = 2000;
pub const DEFAULT_MAX_BUILD_RETRIES: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub struct NeighborConfig {
    pub skin: f64,
    pub bins_per_cutoff: usize,
    pub listing: ListingMode,
    pub policy: RebuildPolicy,
    /// Initial neighbor capacity per atom; grown on demand.
    pub one_atom: usize,
    pub max_build_retries: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub timestep: f64,
    pub num_steps: usize,
    /// Thermodynamic output interval in steps; 0 reports only the final step.
    pub thermo_every: usize,
    pub neighbor: NeighborConfig,
    pub tally: TallyFlags,
}

#[derive(Default)]
pub struct NeighborConfigBuilder {
    skin: Option<f64>,
    bins_per_cutoff: Option<usize>,
    listing: Option<ListingMode>,
    policy: Option<RebuildPolicy>,
    one_atom: Option<usize>,
    max_build_retries: Option<usize>,
}

impl NeighborConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn skin(mut self, skin: f64) -> Self {
        self.skin = Some(skin);
        self
    }
    pub fn bins_per_cutoff(mut self, n: usize) -> Self {
        self.bins_per_cutoff = Some(n);
        self
    }
    pub fn listing(mut self, mode: ListingMode) -> Self {
        self.listing = Some(mode);
        self
    }
    pub fn policy(mut self, policy: RebuildPolicy) -> Self {
        self.policy = Some(policy);
        self
    }
    pub fn one_atom(mut self, capacity: usize) -> Self {
        self.one_atom = Some(capacity);
        self
    }
    pub fn max_build_retries(mut self, retries: usize) -> Self {
        self.max_build_retries = Some(retries);
        self
    }

    pub fn build(self) -> Result<NeighborConfig, ConfigError> {
        let skin = self.skin.ok_or(ConfigError::MissingParameter("skin"))?;
        if !(skin.is_finite() && skin >= 0.0) {
            return Err(ConfigError::InvalidParameter {
                name: "skin",
                reason: format!("must be finite and non-negative, got {skin}"),
            });
        }
        let bins_per_cutoff = self.bins_per_cutoff.unwrap_or(DEFAULT_BINS_PER_CUTOFF);
        if bins_per_cutoff == 0 || bins_per_cutoff > MAX_BINS_PER_CUTOFF {
            return Err(ConfigError::InvalidParameter {
                name: "bins_per_cutoff",
                reason: format!("must lie in 1..={MAX_BINS_PER_CUTOFF}, got {bins_per_cutoff}"),
            });
        }
        let policy = self.policy.unwrap_or_default();
        if let RebuildPolicy::FixedInterval { every: 0 } = policy {
            return Err(ConfigError::InvalidParameter {
                name: "policy.every",
                reason: "rebuild interval must be at least one step".to_string(),
            });
        }
        let one_atom = self.one_atom.unwrap_or(DEFAULT_ONE_ATOM);
        if one_atom == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "one_atom",
                reason: "per-atom capacity must be positive".to_string(),
            });
        }
        Ok(NeighborConfig {
            skin,
            bins_per_cutoff,
            listing: self.listing.unwrap_or_default(),
            policy,
            one_atom,
            max_build_retries: self.max_build_retries.unwrap_or(DEFAULT_MAX_BUILD_RETRIES),
        })
    }
}

#[derive(Default)]
pub struct RunConfigBuilder {
    timestep: Option<f64>,
    num_steps: Option<usize>,
    thermo_every: Option<usize>,
    neighbor: Option<NeighborConfig>,
    tally: Option<TallyFlags>,
}

impl RunConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timestep(mut self, dt: f64) -> Self {
        self.timestep = Some(dt);
        self
    }
    pub fn num_steps(mut self, n: usize) -> Self {
        self.num_steps = Some(n);
        self
    }
    pub fn thermo_every(mut self, n: usize) -> Self {
        self.thermo_every = Some(n);
        self
    }
    pub fn neighbor(mut self, config: NeighborConfig) -> Self {
        self.neighbor = Some(config);
        self
    }
    pub fn tally(mut self, flags: TallyFlags) -> Self {
        self.tally = Some(flags);
        self
    }

    pub fn build(self) -> Result<RunConfig, ConfigError> {
        let timestep = self
            .timestep
            .ok_or(ConfigError::MissingParameter("timestep"))?;
        if !(timestep.is_finite() && timestep > 0.0) {
            return Err(ConfigError::InvalidParameter {
                name: "timestep",
                reason: format!("must be positive, got {timestep}"),
            });
        }
        Ok(RunConfig {
            timestep,
            num_steps: self
                .num_steps
                .ok_or(ConfigError::MissingParameter("num_steps"))?,
            thermo_every: self.thermo_every.unwrap_or(0),
            neighbor: self
                .neighbor
                .ok_or(ConfigError::MissingParameter("neighbor"))?,
            tally: self.tally.unwrap_or_else(TallyFlags::global),
        })
    }
}
