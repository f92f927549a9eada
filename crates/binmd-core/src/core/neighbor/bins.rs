use super::NeighborError;
use crate::core::models::atoms::AtomSet;
use crate::core::models::domain::{Domain, GeometryError};
use nalgebra::{Point3, Vector3};
use tracing::trace;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Upper bound on bins per neighbor cutoff; keeps the stencil radius bounded.
pub const MAX_BINS_PER_CUTOFF: usize = 4;

/// Upper bound on the total bin count of one grid.
pub const MAX_BINS: usize = 1 << 24;

/// Shape of a bin grid: the part of it a stencil depends on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinGeometry {
    pub dims: [usize; 3],
    pub bin_size: [f64; 3],
    pub dimension: usize,
}

/// Atoms sorted into a regular grid covering the box plus the ghost cutoff.
///
/// Storage is a counting sort: `bin_atoms[bin_start[b]..bin_start[b + 1]]` lists the
/// atoms of bin `b` in ascending index order, so within any bin local atoms come
/// before ghosts.
#[derive(Debug, Clone)]
pub struct BinGrid {
    origin: Point3<f64>,
    extent: Vector3<f64>,
    geometry: BinGeometry,
    atom_bin: Vec<usize>,
    bin_start: Vec<usize>,
    bin_atoms: Vec<usize>,
}

impl BinGrid {
    /// Bins every atom of `atoms` (locals and ghosts).
    ///
    /// `max_cutoff` is the largest neighbor cutoff (interaction cutoff plus skin); it
    /// is also the width of the ghost shell around the box. The target bin edge is
    /// `max_cutoff / bins_per_cutoff`. Bins tile the box itself exactly, so a periodic
    /// image shift moves an atom by a whole number of bins; the grid is then padded
    /// by whole bins on each side until it covers the ghost shell.
    ///
    /// Fails with [`GeometryError::TooManyBins`] when the grid would exceed
    /// [`MAX_BINS`].
    pub fn rebin(
        domain: &Domain,
        atoms: &AtomSet,
        max_cutoff: f64,
        bins_per_cutoff: usize,
    ) -> Result<Self, NeighborError> {
        domain.validate()?;
        if !(max_cutoff.is_finite() && max_cutoff > 0.0) {
            return Err(GeometryError::NonPositiveCutoff(max_cutoff).into());
        }
        if bins_per_cutoff == 0 || bins_per_cutoff > MAX_BINS_PER_CUTOFF {
            return Err(GeometryError::BinsPerCutoff {
                value: bins_per_cutoff,
                max: MAX_BINS_PER_CUTOFF,
            }
            .into());
        }

        let dimension = domain.dimension();
        let target = max_cutoff / bins_per_cutoff as f64;
        let mut origin = Point3::origin();
        let mut extent = Vector3::zeros();
        let mut dims = [1usize; 3];
        let mut bin_size = [1.0f64; 3];

        for axis in 0..dimension {
            let length = domain.length(axis);
            let inner = (length / target).floor().max(1.0);
            let size = length / inner;
            let pad = (max_cutoff / size).ceil();
            let count = inner + 2.0 * pad;
            if !(count <= MAX_BINS as f64) {
                return Err(too_many_bins(dims, axis, count));
            }
            dims[axis] = count as usize;
            bin_size[axis] = size;
            origin[axis] = domain.lo()[axis] - pad * size;
            extent[axis] = dims[axis] as f64 * size;
        }
        let total = dims
            .iter()
            .try_fold(1usize, |acc, &n| acc.checked_mul(n))
            .filter(|&total| total <= MAX_BINS);
        if total.is_none() {
            return Err(GeometryError::TooManyBins {
                dims,
                max: MAX_BINS,
            }
            .into());
        }

        let geometry = BinGeometry {
            dims,
            bin_size,
            dimension,
        };
        let mut grid = Self {
            origin,
            extent,
            geometry,
            atom_bin: Vec::new(),
            bin_start: Vec::new(),
            bin_atoms: Vec::new(),
        };
        grid.assign(atoms)?;

        trace!(
            dims = ?grid.geometry.dims,
            bin_size = ?grid.geometry.bin_size,
            atoms = atoms.len(),
            "Binned atoms."
        );
        Ok(grid)
    }

    fn assign(&mut self, atoms: &AtomSet) -> Result<(), NeighborError> {
        let positions = atoms.positions();

        #[cfg(not(feature = "parallel"))]
        let iterator = positions.iter().enumerate();

        #[cfg(feature = "parallel")]
        let iterator = positions.par_iter().enumerate();

        let atom_bin: Vec<usize> = iterator
            .map(|(i, x)| self.locate(x).ok_or_else(|| lost(atoms, i)))
            .collect::<Result<_, _>>()?;

        let nbins = self.nbins();
        let mut bin_start = vec![0usize; nbins + 1];
        for &b in &atom_bin {
            bin_start[b + 1] += 1;
        }
        for b in 0..nbins {
            bin_start[b + 1] += bin_start[b];
        }
        let mut cursor = bin_start.clone();
        let mut bin_atoms = vec![0usize; atom_bin.len()];
        for (i, &b) in atom_bin.iter().enumerate() {
            bin_atoms[cursor[b]] = i;
            cursor[b] += 1;
        }

        self.atom_bin = atom_bin;
        self.bin_start = bin_start;
        self.bin_atoms = bin_atoms;
        Ok(())
    }

    /// Flat bin index of a position, or `None` outside the extended box.
    pub fn locate(&self, x: &Point3<f64>) -> Option<usize> {
        let mut coords = [0usize; 3];
        for axis in 0..self.geometry.dimension {
            let rel = x[axis] - self.origin[axis];
            if !(rel >= 0.0 && rel <= self.extent[axis]) {
                return None;
            }
            let c = (rel / self.geometry.bin_size[axis]).floor() as usize;
            coords[axis] = c.min(self.geometry.dims[axis] - 1);
        }
        Some(self.flat(coords))
    }

    #[inline]
    pub fn flat(&self, coords: [usize; 3]) -> usize {
        let [nx, ny, _] = self.geometry.dims;
        (coords[2] * ny + coords[1]) * nx + coords[0]
    }

    #[inline]
    pub fn coords(&self, bin: usize) -> [usize; 3] {
        let [nx, ny, _] = self.geometry.dims;
        [bin % nx, (bin / nx) % ny, bin / (nx * ny)]
    }

    /// Bin reached from `coords` by a stencil offset, if it lies on the grid.
    #[inline]
    pub fn offset_bin(&self, coords: [usize; 3], offset: [isize; 3]) -> Option<usize> {
        let mut target = [0usize; 3];
        for axis in 0..3 {
            let c = coords[axis] as isize + offset[axis];
            if c < 0 || c >= self.geometry.dims[axis] as isize {
                return None;
            }
            target[axis] = c as usize;
        }
        Some(self.flat(target))
    }

    #[inline]
    pub fn bin_of(&self, atom: usize) -> usize {
        self.atom_bin[atom]
    }

    #[inline]
    pub fn atoms_in(&self, bin: usize) -> &[usize] {
        &self.bin_atoms[self.bin_start[bin]..self.bin_start[bin + 1]]
    }

    pub fn nbins(&self) -> usize {
        self.geometry.dims.iter().product()
    }

    pub fn natoms(&self) -> usize {
        self.atom_bin.len()
    }

    pub fn geometry(&self) -> BinGeometry {
        self.geometry
    }
}

fn too_many_bins(mut dims: [usize; 3], axis: usize, count: f64) -> NeighborError {
    // saturating cast; NaN maps to zero
    dims[axis] = count as usize;
    GeometryError::TooManyBins {
        dims,
        max: MAX_BINS,
    }
    .into()
}

fn lost(atoms: &AtomSet, i: usize) -> NeighborError {
    let x = atoms.positions()[i];
    NeighborError::LostAtom {
        tag: atoms.tag(i),
        x: x.x,
        y: x.y,
        z: x.z,
    }
}
