use super::ListingMode;
use super::bins::BinGeometry;
use super::cutoffs::CutoffTable;
use itertools::iproduct;

/// One relative bin offset and the smallest squared distance between any point of
/// the reference bin and any point of the offset bin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StencilEntry {
    pub offset: [isize; 3],
    pub distsq: f64,
}

/// Everything a stencil is derived from. Two stencils built from equal keys are
/// identical, so a cached stencil is reused exactly when its key compares equal.
#[derive(Debug, Clone, PartialEq)]
pub struct StencilKey {
    pub geometry: BinGeometry,
    pub cutneighsq: CutoffTable,
    pub mode: ListingMode,
}

#[derive(Debug, Clone)]
pub struct Stencil {
    key: StencilKey,
    radius: [isize; 3],
    entries: Vec<StencilEntry>,
    ghost_entries: Vec<StencilEntry>,
}

impl Stencil {
    /// Enumerates the bin offsets within the largest neighbor cutoff.
    ///
    /// `cutneighsq` holds squared neighbor cutoffs (interaction cutoff plus skin).
    /// For [`ListingMode::HalfNewtonOn`] only the canonical upper half-space is kept:
    /// `dz > 0`, or `dz == 0 && dy > 0`, or `dz == 0 && dy == 0 && dx >= 0`. The
    /// zero offset is therefore always present and always first among the entries
    /// with `dz == 0 && dy == 0`. The mirrored lower half goes to
    /// [`Stencil::ghost_entries`]: a periodic image need not sit a whole number of bins
    /// from its owner after rounding, so local-ghost pairs are searched over both
    /// halves and decided by position instead.
    pub fn build(geometry: BinGeometry, cutneighsq: &CutoffTable, mode: ListingMode) -> Self {
        let cutmaxsq = cutneighsq.max();
        let cutmax = cutmaxsq.sqrt();

        let mut radius = [0isize; 3];
        for axis in 0..geometry.dimension {
            radius[axis] = (cutmax / geometry.bin_size[axis]).ceil() as isize;
        }
        let [sx, sy, sz] = radius;

        let offsets = iproduct!(-sz..=sz, -sy..=sy, -sx..=sx).map(|(k, j, i)| [i, j, k]);
        let (entries, ghost_entries): (Vec<_>, Vec<_>) = offsets
            .filter_map(|offset| {
                let distsq = (0..3)
                    .map(|axis| bin_distance(offset[axis], geometry.bin_size[axis]).powi(2))
                    .sum::<f64>();
                (distsq < cutmaxsq).then_some(StencilEntry { offset, distsq })
            })
            .partition(|entry| mode != ListingMode::HalfNewtonOn || in_upper_half(entry.offset));

        Self {
            key: StencilKey {
                geometry,
                cutneighsq: cutneighsq.clone(),
                mode,
            },
            radius,
            entries,
            ghost_entries,
        }
    }

    pub fn is_valid_for(&self, key: &StencilKey) -> bool {
        self.key == *key
    }

    pub fn key(&self) -> &StencilKey {
        &self.key
    }

    pub fn entries(&self) -> &[StencilEntry] {
        &self.entries
    }

    /// Offsets outside the half-space, searched for ghost neighbors only. Empty
    /// unless the mode is [`ListingMode::HalfNewtonOn`].
    pub fn ghost_entries(&self) -> &[StencilEntry] {
        &self.ghost_entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn radius(&self) -> [isize; 3] {
        self.radius
    }

    pub fn mode(&self) -> ListingMode {
        self.key.mode
    }
}

#[inline]
fn in_upper_half([i, j, k]: [isize; 3]) -> bool {
    k > 0 || (k == 0 && j > 0) || (k == 0 && j == 0 && i >= 0)
}

/// Closest approach along one axis between a bin and the bin `offset` away.
#[inline]
fn bin_distance(offset: isize, bin_size: f64) -> f64 {
    if offset > 0 {
        (offset - 1) as f64 * bin_size
    } else if offset == 0 {
        0.0
    } else {
        (offset + 1) as f64 * bin_size
    }
}
