use super::contract::{ForceError, PairPotential};
use super::tally::{ForceTally, TallyFlags};
use crate::core::models::atoms::AtomSet;
use crate::core::neighbor::list::NeighborList;
use tracing::instrument;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Evaluates `potential` over every listed pair and returns the accumulated tally.
///
/// A candidate interacts only when its squared separation is strictly below the
/// squared interaction cutoff of its type pair; the skin margin the list was built
/// with is not part of the force law. With the `parallel` feature each worker
/// accumulates into a private tally which are summed afterwards, so Newton-on
/// reactions on shared neighbors never race. Summation order, and therefore the
/// last bits of the result, may vary between runs.
#[instrument(skip_all, name = "pair_forces", fields(potential = potential.name()))]
pub fn compute_pairwise<P>(
    potential: &P,
    list: &NeighborList,
    atoms: &AtomSet,
    flags: TallyFlags,
) -> Result<ForceTally, ForceError>
where
    P: PairPotential + ?Sized,
{
    let mode = list.mode();
    if !potential.supports(mode) {
        return Err(ForceError::UnsupportedListing {
            potential: potential.name().to_string(),
            mode,
        });
    }
    if list.inum() > atoms.nlocal() {
        return Err(ForceError::ArrayLength {
            name: "neighbor list",
            expected: atoms.nlocal(),
            found: list.inum(),
        });
    }

    let cutsq = potential.cutoffs().squared();
    let positions = atoms.positions();
    let types = atoms.types();
    let nlocal = atoms.nlocal();
    let natoms = atoms.len();

    let accumulate = |mut tally: ForceTally, i: usize| {
        let xi = positions[i];
        let itype = types[i];
        for &j in list.neighbors_of(i) {
            let del = xi - positions[j];
            let rsq = del.norm_squared();
            let jtype = types[j];
            if rsq < cutsq.get(itype, jtype) {
                let term = potential.compute_pair(rsq, itype, jtype);
                tally.apply_pair(i, j, nlocal, mode, &del, term);
            }
        }
        tally
    };

    #[cfg(not(feature = "parallel"))]
    let tally = (0..list.inum()).fold(ForceTally::new(natoms, flags), accumulate);

    #[cfg(feature = "parallel")]
    let tally = (0..list.inum())
        .into_par_iter()
        .fold(|| ForceTally::new(natoms, flags), accumulate)
        .reduce(|| ForceTally::new(natoms, flags), ForceTally::merge);

    Ok(tally)
}
