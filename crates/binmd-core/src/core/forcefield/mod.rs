//! # Force Field Module
//!
//! Interaction terms and the contract that decides how their results reach the
//! per-atom force, energy and virial accumulators.
//!
//! ## Overview
//!
//! A pair potential only answers one question: given the squared separation and
//! the two types of a listed pair, what are `fpair` and the pair energy
//! ([`contract::PairPotential`]). Everything else is fixed here:
//!
//! - [`kernel::compute_pairwise`] walks a neighbor list, applies the strict
//!   `rsq < cut^2` test and hands each interacting pair to the accumulator.
//! - [`tally::ForceTally`] applies the result according to the list's
//!   [`ListingMode`](crate::core::neighbor::ListingMode): equal and opposite
//!   reactions under Newton-on, owner-only updates with halved energy otherwise.
//!
//! ## Key Components
//!
//! - [`params`] - Lennard-Jones coefficients loaded from TOML, with mixing rules
//! - [`lj`] - the Lennard-Jones 12-6 pair style
//! - [`angle`] - the quartic angle term over an explicit topology
//! - [`granular`] - pluggable granular contact sub-models
//! - [`history`] - per-contact history keyed by persistent atom tags
//!
//! Multi-atom terms key their auxiliary state by atom tags ([`history::ContactKey`],
//! [`angle::AngleKey`]) rather than by list slots, since slots are reassigned at
//! every rebuild.

pub mod angle;
pub mod contract;
pub mod granular;
pub mod history;
pub mod kernel;
pub mod lj;
pub mod params;
pub(crate) mod potentials;
pub mod tally;
