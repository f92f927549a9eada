//! # Models Module
//!
//! Plain data describing the simulated system: the [`domain::Domain`] box with its
//! periodicity flags, the [`atoms::AtomSet`] holding local atoms followed by their
//! ghost replicas, and the persistent [`ids::AtomTag`] identity.
//!
//! Nothing in this module knows about bins or neighbor lists; the neighbor
//! machinery reads these types and never mutates them except through the explicit
//! remap and ghost operations the engine performs at a rebuild.

pub mod atoms;
pub mod domain;
pub mod ids;
