//! # Workflows Module
//!
//! Top-level entry points that drive a complete simulation over the engine.
//!
//! - **Run Workflow** ([`run`]) - a velocity-Verlet step loop: neighbor maintenance
//!   through the [`NeighborManager`](crate::engine::manager::NeighborManager), pair
//!   and angle forces through the force contract, reverse ghost reduction, and
//!   thermodynamic output through the progress reporter.

pub mod run;
