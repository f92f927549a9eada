use crate::core::models::ids::AtomTag;
use crate::core::neighbor::ListingMode;
use crate::core::neighbor::cutoffs::CutoffTable;
use thiserror::Error;

/// Result of one pair evaluation.
///
/// The force on `i` is `del * fpair` with `del = x_i - x_j`; `energy` is the full
/// pair energy. How both are tallied depends on the listing mode, see
/// [`super::tally::ForceTally::apply_pair`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PairTerm {
    pub fpair: f64,
    pub energy: f64,
}

/// A pairwise force law over a per-type cutoff table.
///
/// Implementations are evaluated concurrently from many threads and must be pure
/// functions of their arguments.
pub trait PairPotential: Sync {
    fn name(&self) -> &str;

    fn ntypes(&self) -> usize;

    /// Interaction cutoffs per type pair (not squared, no skin).
    fn cutoffs(&self) -> &CutoffTable;

    /// Evaluates the pair at squared separation `rsq`, which the caller guarantees to
    /// be strictly below the squared cutoff of `(itype, jtype)`.
    fn compute_pair(&self, rsq: f64, itype: usize, jtype: usize) -> PairTerm;

    /// Listing conventions this potential can consume.
    fn supports(&self, _mode: ListingMode) -> bool {
        true
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ForceError {
    #[error("No pair coefficients for type pair ({itype}, {jtype})")]
    MissingCoefficients { itype: usize, jtype: usize },

    #[error("Invalid coefficient '{name}' = {value}: {reason}")]
    InvalidCoefficient {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },

    #[error("Potential '{potential}' cannot use a {mode:?} neighbor list")]
    UnsupportedListing {
        potential: String,
        mode: ListingMode,
    },

    #[error("Per-atom array '{name}' has {found} entries; expected {expected}")]
    ArrayLength {
        name: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Angle references atom {tag}, which is not owned here")]
    MissingAngleAtom { tag: AtomTag },

    #[error("Unknown angle type {angle_type} (have {ntypes})")]
    UnknownAngleType { angle_type: usize, ntypes: usize },
}

/// Rejects negative (or non-finite) coefficients.
pub(crate) fn non_negative(name: &'static str, value: f64) -> Result<f64, ForceError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ForceError::InvalidCoefficient {
            name,
            value,
            reason: "must be a finite, non-negative number",
        })
    }
}
