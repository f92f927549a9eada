//! # Core Module
//!
//! Stateless building blocks of the engine.
//!
//! ## Architecture
//!
//! - **System Description** ([`models`]) - the simulation box, the atom set with its
//!   local/ghost split, and persistent atom tags
//! - **Neighbor Machinery** ([`neighbor`]) - binning, stencils and list construction
//! - **Interactions** ([`forcefield`]) - the force accumulation contract, reference
//!   potentials and keyed per-contact history
//!
//! Every function here is a pure transformation of its inputs. Anything that has to
//! remember state between steps (the rebuild scheduler, the cached stencil, ghost
//! bookkeeping) lives in [`crate::engine`].

pub mod forcefield;
pub mod models;
pub mod neighbor;
