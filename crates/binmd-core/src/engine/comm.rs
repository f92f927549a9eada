use crate::core::models::atoms::{AtomError, AtomSet};
use crate::core::models::domain::{Domain, GeometryError};
use nalgebra::Vector3;
use std::ops::AddAssign;
use thiserror::Error;
use tracing::{debug, instrument};

const AXES: [char; 3] = ['x', 'y', 'z'];

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CommError {
    #[error(
        "Ghost cutoff {cutghost} exceeds the periodic box length {length} along {axis}; the box is too small for this cutoff"
    )]
    GhostRangeExceedsBox { axis: char, cutghost: f64, length: f64 },

    #[error("Per-atom array has {found} entries, but {expected} atoms (locals and ghosts) exist")]
    ArrayMismatch { expected: usize, found: usize },

    #[error("Ghost table describes {expected} ghosts but the atom set holds {found}")]
    StaleGhostTable { expected: usize, found: usize },

    #[error("Failed to create ghost atom: {0}")]
    Atom(#[from] AtomError),

    #[error("Invalid geometry: {0}")]
    Geometry(#[from] GeometryError),
}

/// The halo-exchange collaborator.
///
/// At a rebuild [`exchange`](Self::exchange) discards the old ghosts and creates new
/// ones from the (already remapped) local atoms. Between rebuilds ghost coordinates
/// are refreshed from their owners with [`forward_positions`](Self::forward_positions).
/// After a force evaluation [`reverse_forces`](Self::reverse_forces) folds every ghost
/// contribution onto its owner; only then are local forces final.
pub trait GhostExchange {
    fn exchange(
        &mut self,
        domain: &Domain,
        atoms: &mut AtomSet,
        cutghost: f64,
    ) -> Result<(), CommError>;

    /// Local atom owning `index`: itself for a local atom, its source for a ghost.
    fn owner(&self, nlocal: usize, index: usize) -> Option<usize>;

    fn nghost(&self) -> usize;

    /// Refreshes ghost positions and velocities from their owners.
    fn forward_positions(&self, atoms: &mut AtomSet) -> Result<(), CommError>;

    /// Copies owner values onto ghost slots of an arbitrary per-atom array.
    fn forward<T: Copy>(&self, nlocal: usize, values: &mut [T]) -> Result<(), CommError>
    where
        Self: Sized,
    {
        self.check_len(nlocal, values.len())?;
        for g in nlocal..values.len() {
            if let Some(owner) = self.owner(nlocal, g) {
                values[g] = values[owner];
            }
        }
        Ok(())
    }

    /// Adds every ghost slot onto its owner and resets the ghost slot to `zero`.
    fn reverse<T>(&self, nlocal: usize, values: &mut [T], zero: T) -> Result<(), CommError>
    where
        Self: Sized,
        T: Copy + AddAssign,
    {
        self.check_len(nlocal, values.len())?;
        for g in nlocal..values.len() {
            if let Some(owner) = self.owner(nlocal, g) {
                let v = values[g];
                values[owner] += v;
                values[g] = zero;
            }
        }
        Ok(())
    }

    fn reverse_forces(&self, atoms: &AtomSet, forces: &mut [Vector3<f64>]) -> Result<(), CommError>
    where
        Self: Sized,
    {
        self.reverse(atoms.nlocal(), forces, Vector3::zeros())
    }

    fn check_len(&self, nlocal: usize, found: usize) -> Result<(), CommError> {
        let expected = nlocal + self.nghost();
        if found != expected {
            return Err(CommError::ArrayMismatch { expected, found });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct GhostImage {
    owner: usize,
    shift: Vector3<f64>,
}

/// Single-process ghost exchange: periodic images of atoms near each periodic face.
///
/// Axes are processed in order, and images made for earlier axes are themselves
/// replicated along later ones, which produces the edge and corner images.
#[derive(Debug, Clone, Default)]
pub struct PeriodicImages {
    ghosts: Vec<GhostImage>,
}

impl PeriodicImages {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_image(
        &mut self,
        atoms: &mut AtomSet,
        source: usize,
        axis: usize,
        delta: f64,
    ) -> Result<(), CommError> {
        let nlocal = atoms.nlocal();
        let (owner, mut shift) = if source < nlocal {
            (source, Vector3::zeros())
        } else {
            let image = self.ghosts[source - nlocal];
            (image.owner, image.shift)
        };
        shift[axis] += delta;
        let position = atoms.positions()[owner] + shift;
        let velocity = atoms.velocities()[owner];
        atoms.push_ghost(atoms.tag(owner), atoms.itype(owner), position, velocity)?;
        self.ghosts.push(GhostImage { owner, shift });
        Ok(())
    }
}

impl GhostExchange for PeriodicImages {
    #[instrument(skip_all, name = "ghost_exchange", fields(cutghost = cutghost))]
    fn exchange(
        &mut self,
        domain: &Domain,
        atoms: &mut AtomSet,
        cutghost: f64,
    ) -> Result<(), CommError> {
        domain.validate()?;
        atoms.clear_ghosts();
        self.ghosts.clear();

        for axis in 0..domain.dimension() {
            if !domain.is_periodic(axis) {
                continue;
            }
            let length = domain.length(axis);
            if cutghost > length {
                return Err(CommError::GhostRangeExceedsBox {
                    axis: AXES[axis],
                    cutghost,
                    length,
                });
            }
            let lo = domain.lo()[axis];
            let hi = domain.hi()[axis];
            let n = atoms.len();
            for i in 0..n {
                let x = atoms.positions()[i][axis];
                if x < lo + cutghost {
                    self.push_image(atoms, i, axis, length)?;
                }
                if x >= hi - cutghost {
                    self.push_image(atoms, i, axis, -length)?;
                }
            }
        }

        debug!(
            locals = atoms.nlocal(),
            ghosts = atoms.nghost(),
            "Ghost atoms regenerated."
        );
        Ok(())
    }

    #[inline]
    fn owner(&self, nlocal: usize, index: usize) -> Option<usize> {
        if index < nlocal {
            Some(index)
        } else {
            self.ghosts.get(index - nlocal).map(|g| g.owner)
        }
    }

    fn nghost(&self) -> usize {
        self.ghosts.len()
    }

    fn forward_positions(&self, atoms: &mut AtomSet) -> Result<(), CommError> {
        if atoms.nghost() != self.ghosts.len() {
            return Err(CommError::StaleGhostTable {
                expected: self.ghosts.len(),
                found: atoms.nghost(),
            });
        }
        let nlocal = atoms.nlocal();
        let (positions, velocities) = atoms.kinematics_mut();
        for (k, image) in self.ghosts.iter().enumerate() {
            positions[nlocal + k] = positions[image.owner] + image.shift;
            velocities[nlocal + k] = velocities[image.owner];
        }
        Ok(())
    }
}
