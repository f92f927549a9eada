use thiserror::Error;

use super::comm::CommError;
use super::config::ConfigError;
use crate::core::forcefield::contract::ForceError;
use crate::core::forcefield::history::HistoryError;
use crate::core::forcefield::params::ParamLoadError;
use crate::core::models::atoms::AtomError;
use crate::core::neighbor::NeighborError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid atom data: {source}")]
    Atom {
        #[from]
        source: AtomError,
    },

    #[error("Neighbor list failure: {source}")]
    Neighbor {
        #[from]
        source: NeighborError,
    },

    #[error("Ghost communication failed: {source}")]
    Comm {
        #[from]
        source: CommError,
    },

    #[error("Invalid configuration: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Failed to load parameters: {source}")]
    Params {
        #[from]
        source: ParamLoadError,
    },

    #[error("Force evaluation failed: {source}")]
    Force {
        #[from]
        source: ForceError,
    },

    #[error("Contact history error: {source}")]
    History {
        #[from]
        source: HistoryError,
    },

    #[error("Neighbor build still over capacity after {retries} retries (capacity {capacity})")]
    CapacityRetriesExhausted { retries: usize, capacity: usize },

    #[error("Internal logic error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Errors the user must act on, as opposed to internal faults.
    pub fn is_user_facing(&self) -> bool {
        match self {
            EngineError::Neighbor { source } => !matches!(source, NeighborError::StaleListUsed { .. }),
            EngineError::Internal(_) => false,
            _ => true,
        }
    }
}
