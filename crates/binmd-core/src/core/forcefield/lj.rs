use super::contract::{PairPotential, PairTerm};
use super::params::PairCoeffs;
use super::potentials::{lennard_jones_12_6, lennard_jones_offset};
use crate::core::neighbor::cutoffs::CutoffTable;

/// Lennard-Jones 12-6 pair style, optionally shifted to zero energy at the cutoff.
#[derive(Debug, Clone)]
pub struct LennardJones {
    coeffs: PairCoeffs,
    offsets: CutoffTable,
}

impl LennardJones {
    pub fn new(coeffs: PairCoeffs) -> Self {
        let n = coeffs.ntypes();
        let offsets = if coeffs.shift() {
            CutoffTable::from_fn(n, |i, j| {
                lennard_jones_offset(
                    coeffs.epsilon(i, j),
                    coeffs.sigma(i, j),
                    coeffs.cutoffs().get(i, j),
                )
            })
        } else {
            CutoffTable::uniform(n, 0.0)
        };
        Self { coeffs, offsets }
    }

    pub fn coeffs(&self) -> &PairCoeffs {
        &self.coeffs
    }
}

impl PairPotential for LennardJones {
    fn name(&self) -> &str {
        "lj/cut"
    }

    fn ntypes(&self) -> usize {
        self.coeffs.ntypes()
    }

    fn cutoffs(&self) -> &CutoffTable {
        self.coeffs.cutoffs()
    }

    #[inline]
    fn compute_pair(&self, rsq: f64, itype: usize, jtype: usize) -> PairTerm {
        let (energy, fpair) = lennard_jones_12_6(
            rsq,
            self.coeffs.epsilon(itype, jtype),
            self.coeffs.sigma(itype, jtype),
        );
        PairTerm {
            fpair,
            energy: energy - self.offsets.get(itype, jtype),
        }
    }
}
