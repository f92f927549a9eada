use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const AXES: [char; 3] = ['x', 'y', 'z'];

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeometryError {
    #[error("Box extent along {axis} is {extent} (must be positive and finite)")]
    NonPositiveExtent { axis: char, extent: f64 },
    #[error("Unsupported dimension {0} (expected 2 or 3)")]
    Dimension(usize),
    #[error("Maximum interaction cutoff must be positive and finite, got {0}")]
    NonPositiveCutoff(f64),
    #[error("Neighbor skin must be non-negative and finite, got {0}")]
    InvalidSkin(f64),
    #[error("Bins per cutoff must lie in 1..={max}, got {value}")]
    BinsPerCutoff { value: usize, max: usize },
    #[error("Too many neighbor bins: grid {dims:?} exceeds {max} bins")]
    TooManyBins { dims: [usize; 3], max: usize },
}

/// Orthogonal simulation box.
///
/// Each axis below `dimension` carries its own periodicity flag. For 2-D systems the
/// z axis is ignored entirely: atoms are never remapped, binned or replicated along it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    lo: Point3<f64>,
    hi: Point3<f64>,
    periodic: [bool; 3],
    dimension: usize,
}

impl Domain {
    pub fn new(lo: [f64; 3], hi: [f64; 3], periodic: [bool; 3], dimension: usize) -> Self {
        Self {
            lo: Point3::from(lo),
            hi: Point3::from(hi),
            periodic,
            dimension,
        }
    }

    /// Fully periodic cube `[0, length)^3`.
    pub fn cubic(length: f64) -> Self {
        Self::new([0.0; 3], [length; 3], [true; 3], 3)
    }

    #[inline]
    pub fn lo(&self) -> &Point3<f64> {
        &self.lo
    }

    #[inline]
    pub fn hi(&self) -> &Point3<f64> {
        &self.hi
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn is_periodic(&self, axis: usize) -> bool {
        axis < self.dimension && self.periodic[axis]
    }

    #[inline]
    pub fn length(&self, axis: usize) -> f64 {
        self.hi[axis] - self.lo[axis]
    }

    pub fn lengths(&self) -> Vector3<f64> {
        self.hi - self.lo
    }

    pub fn volume(&self) -> f64 {
        (0..self.dimension).map(|axis| self.length(axis)).product()
    }

    /// Replaces the box bounds, e.g. after a barostat step.
    pub fn set_bounds(&mut self, lo: [f64; 3], hi: [f64; 3]) {
        self.lo = Point3::from(lo);
        self.hi = Point3::from(hi);
    }

    pub fn validate(&self) -> Result<(), GeometryError> {
        if self.dimension != 2 && self.dimension != 3 {
            return Err(GeometryError::Dimension(self.dimension));
        }
        for axis in 0..self.dimension {
            let extent = self.length(axis);
            if !(extent.is_finite() && extent > 0.0) {
                return Err(GeometryError::NonPositiveExtent {
                    axis: AXES[axis],
                    extent,
                });
            }
        }
        Ok(())
    }

    /// Wraps a position back into `[lo, hi)` along every periodic axis.
    pub fn remap(&self, position: &mut Point3<f64>) {
        for axis in 0..self.dimension {
            if !self.periodic[axis] {
                continue;
            }
            let length = self.length(axis);
            let lo = self.lo[axis];
            let mut wrapped = lo + (position[axis] - lo).rem_euclid(length);
            // rem_euclid can round up to exactly `length`
            if wrapped >= self.hi[axis] {
                wrapped = lo;
            }
            position[axis] = wrapped;
        }
    }

    /// Shortest periodic image of a separation vector.
    pub fn minimum_image(&self, mut delta: Vector3<f64>) -> Vector3<f64> {
        for axis in 0..self.dimension {
            if !self.periodic[axis] {
                continue;
            }
            let length = self.length(axis);
            delta[axis] -= length * (delta[axis] / length).round();
        }
        delta
    }
}
