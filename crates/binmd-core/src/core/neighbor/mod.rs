//! # Neighbor Module
//!
//! Uniform binning, bin stencils and neighbor-list construction.
//!
//! ## Overview
//!
//! A neighbor list is produced in three stages, each a pure function of its inputs:
//!
//! 1. [`bins::BinGrid::rebin`] partitions the box, extended by the ghost cutoff on
//!    every side, into a regular grid and sorts every atom (local and ghost) into it.
//! 2. [`stencil::Stencil::build`] enumerates the relative bin offsets that can hold a
//!    neighbor, together with a lower bound on the squared distance between any two
//!    points of the paired bins. The stencil depends only on bin geometry, the cutoff
//!    table and the [`ListingMode`], so it is cached and compared structurally.
//! 3. [`list::NeighborList::build`] walks the stencil around every local atom and keeps
//!    the candidates closer than the per-type neighbor cutoff (interaction cutoff
//!    plus skin), applying the half/full and Newton conventions.
//!
//! When to rebuild is not decided here; see `engine::scheduler`.

pub mod bins;
pub mod cutoffs;
pub mod list;
pub mod stencil;

use crate::core::models::domain::GeometryError;
use crate::core::models::ids::AtomTag;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Pair enumeration convention of a neighbor list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ListingMode {
    /// Every pair once; the reaction force is applied to `j` even when it is a ghost,
    /// and ghost forces are reduced back to their owners.
    #[default]
    HalfNewtonOn,
    /// Every pair once among local atoms; a local/ghost pair is listed by both owners
    /// and each side only updates its own atom.
    HalfNewtonOff,
    /// Both directions of every pair; only atom `i` is ever updated.
    Full,
}

impl ListingMode {
    #[inline]
    pub fn is_half(self) -> bool {
        !matches!(self, ListingMode::Full)
    }

    #[inline]
    pub fn newton(self) -> bool {
        matches!(self, ListingMode::HalfNewtonOn)
    }
}

impl FromStr for ListingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "half" | "half-newton-on" | "half-newton" => Ok(ListingMode::HalfNewtonOn),
            "half-newton-off" | "half-newtoff" => Ok(ListingMode::HalfNewtonOff),
            "full" => Ok(ListingMode::Full),
            other => Err(format!("unknown listing mode '{other}'")),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum NeighborError {
    #[error("Invalid geometry: {0}")]
    Geometry(#[from] GeometryError),

    #[error(
        "Neighbor capacity exceeded: atom {tag} needs {needed} slots but only {capacity} are allocated"
    )]
    CapacityExceeded {
        tag: AtomTag,
        needed: usize,
        capacity: usize,
    },

    #[error(
        "Neighbor list used {steps_since_build} step(s) after its build while an atom moved {max_displacement:.6} (> half skin {half_skin:.6})"
    )]
    StaleListUsed {
        steps_since_build: usize,
        max_displacement: f64,
        half_skin: f64,
    },

    #[error(
        "Lost atom {tag} at ({x:.6}, {y:.6}, {z:.6}): outside the binned region; the timestep is likely too large"
    )]
    LostAtom { tag: AtomTag, x: f64, y: f64, z: f64 },

    #[error("Neighbor cutoff table covers {found} types but the atoms use {expected}")]
    TypeCount { expected: usize, found: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_mode_parses_common_spellings() {
        assert_eq!("half".parse(), Ok(ListingMode::HalfNewtonOn));
        assert_eq!("Half_Newton_Off".parse(), Ok(ListingMode::HalfNewtonOff));
        assert_eq!("full".parse(), Ok(ListingMode::Full));
        assert!("quarter".parse::<ListingMode>().is_err());
    }

    #[test]
    fn only_half_newton_on_applies_reactions_to_ghosts() {
        assert!(ListingMode::HalfNewtonOn.newton());
        assert!(!ListingMode::HalfNewtonOff.newton());
        assert!(!ListingMode::Full.newton());
        assert!(!ListingMode::Full.is_half());
    }
}
