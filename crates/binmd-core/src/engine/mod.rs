//! Step-to-step machinery around the neighbor core.
//!
//! This layer decides *when* lists are rebuilt ([`scheduler`]), keeps ghost atoms in
//! sync with their owners ([`comm`]) and drives binning, stencil caching and list
//! construction with capacity retries ([`manager`]). It also carries the run
//! configuration, the engine error type, progress reporting and stage timings.

pub mod comm;
pub mod config;
pub mod error;
pub mod manager;
pub mod metrics;
pub mod progress;
pub mod scheduler;
