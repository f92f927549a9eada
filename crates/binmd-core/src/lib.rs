//! # binmd Core Library
//!
//! Binned neighbor lists and the force accumulation contract of a short-range
//! particle dynamics engine.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict three-layer architecture:
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Domain`, `AtomSet`), the
//!   bin grid, stencil and neighbor-list builder, and the force contract with its
//!   reference potentials. Every operation is a pure function of its inputs.
//!
//! - **[`engine`]: The Logic Core.** The stateful layer. It decides when a list is
//!   stale, caches the stencil, regenerates ghost atoms through the
//!   [`engine::comm::GhostExchange`] collaborator, and retries builds whose
//!   per-atom capacity was exceeded.
//!
//! - **[`workflows`]: The Public API.** Ties `engine` and `core` together into a
//!   complete step loop with a velocity-Verlet integrator.
//!
//! ## Features
//!
//! - `parallel` (default): list construction and pair kernels run on the rayon
//!   thread pool. Without it the same code paths run sequentially.

pub mod core;
pub mod engine;
pub mod workflows;
