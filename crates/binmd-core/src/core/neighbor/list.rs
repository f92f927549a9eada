use super::bins::BinGrid;
use super::cutoffs::CutoffTable;
use super::stencil::Stencil;
use super::{ListingMode, NeighborError};
use crate::core::models::atoms::AtomSet;
use nalgebra::Point3;
use tracing::{debug, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Per-local-atom candidate neighbors in compressed row form.
///
/// Neighbors of local atom `i` are `neighbors[offsets[i]..offsets[i + 1]]`, in bin
/// traversal order. That order is not stable across rebuilds; consumers may rely on
/// completeness and on the absence of duplicates only. Ghost atoms own no list.
#[derive(Debug, Clone, PartialEq)]
pub struct NeighborList {
    mode: ListingMode,
    capacity: usize,
    offsets: Vec<usize>,
    neighbors: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NeighborStats {
    pub total: usize,
    pub min: usize,
    pub max: usize,
    pub mean: f64,
}

struct BuildContext<'a> {
    grid: &'a BinGrid,
    stencil: &'a Stencil,
    positions: &'a [Point3<f64>],
    types: &'a [usize],
    cutneighsq: &'a CutoffTable,
    nlocal: usize,
    capacity: usize,
}

/// Neighbors found for one atom; `needed` keeps counting past `capacity`.
struct AtomNeighbors {
    list: Vec<usize>,
    needed: usize,
}

impl NeighborList {
    pub fn empty(mode: ListingMode) -> Self {
        Self {
            mode,
            capacity: 0,
            offsets: vec![0],
            neighbors: Vec::new(),
        }
    }

    /// Builds the list for every local atom of `atoms`.
    ///
    /// `cutneighsq` holds squared neighbor cutoffs; a candidate is kept only when its
    /// squared distance is strictly below the entry for its type pair. `capacity`
    /// bounds the neighbors stored per atom: if any atom needs more, the build fails
    /// with [`NeighborError::CapacityExceeded`] naming the atom that needs the most,
    /// and nothing is kept, so retrying with a larger capacity starts from scratch.
    #[instrument(skip_all, name = "neighbor_build", fields(mode = ?stencil.mode()))]
    pub fn build(
        grid: &BinGrid,
        stencil: &Stencil,
        atoms: &AtomSet,
        cutneighsq: &CutoffTable,
        capacity: usize,
    ) -> Result<Self, NeighborError> {
        if cutneighsq.ntypes() != atoms.ntypes() {
            return Err(NeighborError::TypeCount {
                expected: atoms.ntypes(),
                found: cutneighsq.ntypes(),
            });
        }

        let context = BuildContext {
            grid,
            stencil,
            positions: atoms.positions(),
            types: atoms.types(),
            cutneighsq,
            nlocal: atoms.nlocal(),
            capacity,
        };

        #[cfg(not(feature = "parallel"))]
        let iterator = 0..atoms.nlocal();

        #[cfg(feature = "parallel")]
        let iterator = (0..atoms.nlocal()).into_par_iter();

        let per_atom: Vec<AtomNeighbors> = iterator.map(|i| context.collect(i)).collect();

        if let Some((i, worst)) = per_atom
            .iter()
            .enumerate()
            .filter(|(_, n)| n.needed > capacity)
            .max_by(|(ia, a), (ib, b)| a.needed.cmp(&b.needed).then(ib.cmp(ia)))
        {
            return Err(NeighborError::CapacityExceeded {
                tag: atoms.tag(i),
                needed: worst.needed,
                capacity,
            });
        }

        let mut offsets = Vec::with_capacity(per_atom.len() + 1);
        offsets.push(0);
        let total: usize = per_atom.iter().map(|n| n.list.len()).sum();
        let mut neighbors = Vec::with_capacity(total);
        for atom in per_atom {
            neighbors.extend_from_slice(&atom.list);
            offsets.push(neighbors.len());
        }

        debug!(
            atoms = offsets.len() - 1,
            pairs = neighbors.len(),
            "Neighbor list built."
        );

        Ok(Self {
            mode: stencil.mode(),
            capacity,
            offsets,
            neighbors,
        })
    }

    #[inline]
    pub fn mode(&self) -> ListingMode {
        self.mode
    }

    /// Number of atoms owning a list (the local atom count at build time).
    #[inline]
    pub fn inum(&self) -> usize {
        self.offsets.len() - 1
    }

    #[inline]
    pub fn neighbors_of(&self, i: usize) -> &[usize] {
        &self.neighbors[self.offsets[i]..self.offsets[i + 1]]
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &[usize])> + '_ {
        (0..self.inum()).map(move |i| (i, self.neighbors_of(i)))
    }

    pub fn total_pairs(&self) -> usize {
        self.neighbors.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> NeighborStats {
        let counts = (0..self.inum()).map(|i| self.offsets[i + 1] - self.offsets[i]);
        let (min, max) = counts.fold((usize::MAX, 0), |(lo, hi), n| (lo.min(n), hi.max(n)));
        if self.inum() == 0 {
            return NeighborStats::default();
        }
        NeighborStats {
            total: self.total_pairs(),
            min,
            max,
            mean: self.total_pairs() as f64 / self.inum() as f64,
        }
    }
}

impl BuildContext<'_> {
    fn collect(&self, i: usize) -> AtomNeighbors {
        let xi = self.positions[i];
        let coords = self.grid.coords(self.grid.bin_of(i));
        let mode = self.stencil.mode();

        let mut found = AtomNeighbors {
            list: Vec::new(),
            needed: 0,
        };

        for entry in self.stencil.entries() {
            let Some(jbin) = self.grid.offset_bin(coords, entry.offset) else {
                continue;
            };
            let own_bin = entry.offset == [0, 0, 0];

            for &j in self.grid.atoms_in(jbin) {
                let admitted = match mode {
                    ListingMode::Full => j != i,
                    ListingMode::HalfNewtonOff => j > i,
                    // a ghost pair is kept by whichever side sees the other above it
                    ListingMode::HalfNewtonOn if j >= self.nlocal => {
                        is_above(&self.positions[j], &xi)
                    }
                    ListingMode::HalfNewtonOn => !own_bin || j > i,
                };
                if admitted {
                    self.consider(i, j, entry.distsq, &mut found);
                }
            }
        }

        // ghosts behind the half-space; bins list locals first
        for entry in self.stencil.ghost_entries() {
            let Some(jbin) = self.grid.offset_bin(coords, entry.offset) else {
                continue;
            };
            let atoms = self.grid.atoms_in(jbin);
            let first_ghost = atoms.partition_point(|&j| j < self.nlocal);
            for &j in &atoms[first_ghost..] {
                if is_above(&self.positions[j], &xi) {
                    self.consider(i, j, entry.distsq, &mut found);
                }
            }
        }

        found
    }

    #[inline]
    fn consider(&self, i: usize, j: usize, distsq: f64, found: &mut AtomNeighbors) {
        let cutsq = self.cutneighsq.get(self.types[i], self.types[j]);
        if distsq >= cutsq {
            return;
        }
        if (self.positions[i] - self.positions[j]).norm_squared() < cutsq {
            found.needed += 1;
            if found.list.len() < self.capacity {
                found.list.push(j);
            }
        }
    }
}

#[inline]
fn is_above(xj: &Point3<f64>, xi: &Point3<f64>) -> bool {
    if xj.z != xi.z {
        return xj.z > xi.z;
    }
    if xj.y != xi.y {
        return xj.y > xi.y;
    }
    xj.x > xi.x
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::domain::Domain;
    use crate::core::models::ids::AtomTag;
    use nalgebra::Vector3;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::HashSet;

    const SKIN: f64 = 0.3;

    fn open_box() -> Domain {
        Domain::new([0.0; 3], [10.0; 3], [false; 3], 3)
    }

    fn random_atoms(n: usize, ntypes: usize, seed: u64) -> AtomSet {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut atoms = AtomSet::new(vec![1.0; ntypes]).unwrap();
        for i in 0..n {
            let p = Point3::new(
                rng.gen_range(0.0..10.0),
                rng.gen_range(0.0..10.0),
                rng.gen_range(0.0..10.0),
            );
            let itype = rng.gen_range(1..=ntypes);
            atoms
                .push_local(AtomTag(i as u64 + 1), itype, p, Vector3::zeros())
                .unwrap();
        }
        atoms
    }

    fn build(
        domain: &Domain,
        atoms: &AtomSet,
        cutoffs: &CutoffTable,
        mode: ListingMode,
        bins_per_cutoff: usize,
    ) -> NeighborList {
        let cutneighsq = cutoffs.neighbor_squared(SKIN);
        let grid =
            BinGrid::rebin(domain, atoms, cutoffs.max() + SKIN, bins_per_cutoff).unwrap();
        let stencil = Stencil::build(grid.geometry(), &cutneighsq, mode);
        NeighborList::build(&grid, &stencil, atoms, &cutneighsq, usize::MAX).unwrap()
    }

    fn brute_force_pairs(atoms: &AtomSet, cutneighsq: &CutoffTable) -> HashSet<(usize, usize)> {
        let x = atoms.positions();
        let mut pairs = HashSet::new();
        for i in 0..atoms.len() {
            for j in (i + 1)..atoms.len() {
                let cutsq = cutneighsq.get(atoms.itype(i), atoms.itype(j));
                if (x[i] - x[j]).norm_squared() < cutsq {
                    pairs.insert((i, j));
                }
            }
        }
        pairs
    }

    fn listed_unordered(list: &NeighborList) -> Vec<(usize, usize)> {
        list.iter()
            .flat_map(|(i, js)| js.iter().map(move |&j| (i.min(j), i.max(j))))
            .collect()
    }

    #[test]
    fn half_lists_match_brute_force_without_duplicates() {
        let cutoffs = CutoffTable::uniform(1, 2.0);
        let atoms = random_atoms(300, 1, 11);
        let expected = brute_force_pairs(&atoms, &cutoffs.neighbor_squared(SKIN));
        for mode in [ListingMode::HalfNewtonOn, ListingMode::HalfNewtonOff] {
            for bins_per_cutoff in 1..=3 {
                let list = build(&open_box(), &atoms, &cutoffs, mode, bins_per_cutoff);
                let listed = listed_unordered(&list);
                let unique: HashSet<_> = listed.iter().copied().collect();
                assert_eq!(unique.len(), listed.len(), "duplicate pair in {mode:?}");
                assert_eq!(unique, expected, "{mode:?} with {bins_per_cutoff} bins");
            }
        }
    }

    #[test]
    fn full_list_mirrors_every_pair_exactly_once() {
        let cutoffs = CutoffTable::uniform(1, 2.0);
        let atoms = random_atoms(250, 1, 5);
        let list = build(&open_box(), &atoms, &cutoffs, ListingMode::Full, 2);
        let directed: Vec<(usize, usize)> = list
            .iter()
            .flat_map(|(i, js)| js.iter().map(move |&j| (i, j)))
            .collect();
        let unique: HashSet<_> = directed.iter().copied().collect();
        assert_eq!(unique.len(), directed.len());
        let x = atoms.positions();
        for &(i, j) in &directed {
            assert!(unique.contains(&(j, i)), "({i}, {j}) not mirrored");
            let forward = (x[i] - x[j]).norm_squared();
            let backward = (x[j] - x[i]).norm_squared();
            assert_eq!(forward, backward);
        }
        let expected = brute_force_pairs(&atoms, &cutoffs.neighbor_squared(SKIN));
        assert_eq!(directed.len(), 2 * expected.len());
    }

    #[test]
    fn per_type_cutoffs_share_one_stencil() {
        let cutoffs = CutoffTable::from_fn(3, |i, j| match (i, j) {
            (1, 1) => 1.0,
            (3, 3) => 3.0,
            (2, 3) => 0.0,
            _ => 1.8,
        });
        let atoms = random_atoms(300, 3, 99);
        let expected = brute_force_pairs(&atoms, &cutoffs.neighbor_squared(SKIN));
        for mode in [ListingMode::HalfNewtonOn, ListingMode::HalfNewtonOff] {
            let list = build(&open_box(), &atoms, &cutoffs, mode, 2);
            let listed: HashSet<_> = listed_unordered(&list).into_iter().collect();
            assert_eq!(listed, expected);
        }
        let list = build(&open_box(), &atoms, &cutoffs, ListingMode::Full, 2);
        for (i, js) in list.iter() {
            for &j in js {
                assert_ne!((atoms.itype(i), atoms.itype(j)), (2, 3));
                assert_ne!((atoms.itype(i), atoms.itype(j)), (3, 2));
            }
        }
    }

    #[test]
    fn periodic_pair_is_kept_by_exactly_one_side() {
        let mut atoms = AtomSet::new(vec![1.0]).unwrap();
        for (tag, x) in [(1, 0.5), (2, 9.7)] {
            atoms
                .push_local(AtomTag(tag), 1, Point3::new(x, 5.0, 5.0), Vector3::zeros())
                .unwrap();
        }
        // images across the x faces, as the ghost exchange would make them
        atoms
            .push_ghost(AtomTag(2), 1, Point3::new(-0.3, 5.0, 5.0), Vector3::zeros())
            .unwrap();
        atoms
            .push_ghost(AtomTag(1), 1, Point3::new(10.5, 5.0, 5.0), Vector3::zeros())
            .unwrap();
        let cutoffs = CutoffTable::uniform(1, 2.0);
        for bins_per_cutoff in 1..=3 {
            let list = build(
                &Domain::cubic(10.0),
                &atoms,
                &cutoffs,
                ListingMode::HalfNewtonOn,
                bins_per_cutoff,
            );
            assert!(list.neighbors_of(0).is_empty());
            assert_eq!(list.neighbors_of(1), &[3]);
        }
    }

    #[test]
    fn pair_exactly_at_neighbor_cutoff_is_excluded() {
        let mut atoms = AtomSet::new(vec![1.0]).unwrap();
        atoms
            .push_local(AtomTag(1), 1, Point3::new(4.0, 4.0, 4.0), Vector3::zeros())
            .unwrap();
        atoms
            .push_local(AtomTag(2), 1, Point3::new(4.0, 4.0, 6.0), Vector3::zeros())
            .unwrap();
        atoms
            .push_local(AtomTag(3), 1, Point3::new(4.0, 7.0, 4.0), Vector3::zeros())
            .unwrap();
        let cutneighsq = CutoffTable::uniform(1, 4.0);
        let grid = BinGrid::rebin(&open_box(), &atoms, 2.0, 1).unwrap();
        let stencil = Stencil::build(grid.geometry(), &cutneighsq, ListingMode::Full);
        let list = NeighborList::build(&grid, &stencil, &atoms, &cutneighsq, 16).unwrap();
        assert!(list.neighbors_of(0).is_empty());

        let cutneighsq = CutoffTable::uniform(1, 4.0 + 1e-9);
        let stencil = Stencil::build(grid.geometry(), &cutneighsq, ListingMode::Full);
        let list = NeighborList::build(&grid, &stencil, &atoms, &cutneighsq, 16).unwrap();
        assert_eq!(list.neighbors_of(0), &[1]);
    }

    #[test]
    fn capacity_overflow_is_reported_and_retry_is_identical() {
        let cutoffs = CutoffTable::uniform(1, 2.5);
        let atoms = random_atoms(400, 1, 3);
        let cutneighsq = cutoffs.neighbor_squared(SKIN);
        let grid = BinGrid::rebin(&open_box(), &atoms, cutoffs.max() + SKIN, 2).unwrap();
        let stencil = Stencil::build(grid.geometry(), &cutneighsq, ListingMode::HalfNewtonOn);

        let reference =
            NeighborList::build(&grid, &stencil, &atoms, &cutneighsq, usize::MAX).unwrap();
        let busiest = reference.stats().max;
        assert!(busiest > 2);

        let err = NeighborList::build(&grid, &stencil, &atoms, &cutneighsq, 2).unwrap_err();
        let NeighborError::CapacityExceeded { needed, capacity, .. } = err else {
            panic!("unexpected error {err:?}");
        };
        assert_eq!(capacity, 2);
        assert_eq!(needed, busiest);

        let retried = NeighborList::build(&grid, &stencil, &atoms, &cutneighsq, needed).unwrap();
        assert_eq!(retried.total_pairs(), reference.total_pairs());
        for i in 0..reference.inum() {
            assert_eq!(retried.neighbors_of(i), reference.neighbors_of(i));
        }
    }

    #[test]
    fn rebuilding_with_unchanged_positions_is_idempotent() {
        let cutoffs = CutoffTable::uniform(1, 2.0);
        let atoms = random_atoms(200, 1, 21);
        let a = build(&open_box(), &atoms, &cutoffs, ListingMode::HalfNewtonOn, 2);
        let b = build(&open_box(), &atoms, &cutoffs, ListingMode::HalfNewtonOn, 2);
        for i in 0..a.inum() {
            let sa: HashSet<_> = a.neighbors_of(i).iter().collect();
            let sb: HashSet<_> = b.neighbors_of(i).iter().collect();
            assert_eq!(sa, sb);
        }
    }

    #[test]
    fn same_bin_ghost_is_kept_only_when_above() {
        let mut atoms = AtomSet::new(vec![1.0]).unwrap();
        atoms
            .push_local(AtomTag(1), 1, Point3::new(5.0, 5.0, 5.0), Vector3::zeros())
            .unwrap();
        atoms
            .push_ghost(AtomTag(8), 1, Point3::new(5.0, 5.0, 5.5), Vector3::zeros())
            .unwrap();
        atoms
            .push_ghost(AtomTag(9), 1, Point3::new(5.0, 5.0, 4.5), Vector3::zeros())
            .unwrap();
        let cutneighsq = CutoffTable::uniform(1, 4.0);
        // all three atoms share one bin
        let grid = BinGrid::rebin(&open_box(), &atoms, 2.0, 1).unwrap();
        assert_eq!(grid.bin_of(0), grid.bin_of(1));
        assert_eq!(grid.bin_of(0), grid.bin_of(2));
        let stencil = Stencil::build(grid.geometry(), &cutneighsq, ListingMode::HalfNewtonOn);
        let list = NeighborList::build(&grid, &stencil, &atoms, &cutneighsq, 16).unwrap();
        assert_eq!(list.neighbors_of(0), &[1]);
        assert_eq!(list.inum(), 1);
    }

    #[test]
    fn newton_off_lists_local_ghost_pairs_from_the_local_side() {
        let mut atoms = AtomSet::new(vec![1.0]).unwrap();
        atoms
            .push_local(AtomTag(1), 1, Point3::new(5.0, 5.0, 5.0), Vector3::zeros())
            .unwrap();
        atoms
            .push_ghost(AtomTag(9), 1, Point3::new(5.0, 5.0, 4.5), Vector3::zeros())
            .unwrap();
        let cutneighsq = CutoffTable::uniform(1, 4.0);
        let grid = BinGrid::rebin(&open_box(), &atoms, 2.0, 2).unwrap();
        let stencil = Stencil::build(grid.geometry(), &cutneighsq, ListingMode::HalfNewtonOff);
        let list = NeighborList::build(&grid, &stencil, &atoms, &cutneighsq, 16).unwrap();
        assert_eq!(list.neighbors_of(0), &[1]);
    }

    #[test]
    fn two_dimensional_lists_match_brute_force() {
        let domain = Domain::new([0.0; 3], [10.0, 10.0, 1.0], [false; 3], 2);
        let mut rng = StdRng::seed_from_u64(8);
        let mut atoms = AtomSet::new(vec![1.0]).unwrap();
        for i in 0..200 {
            let p = Point3::new(rng.gen_range(0.0..10.0), rng.gen_range(0.0..10.0), 0.0);
            atoms
                .push_local(AtomTag(i + 1), 1, p, Vector3::zeros())
                .unwrap();
        }
        let cutoffs = CutoffTable::uniform(1, 1.5);
        let expected = brute_force_pairs(&atoms, &cutoffs.neighbor_squared(SKIN));
        let list = build(&domain, &atoms, &cutoffs, ListingMode::HalfNewtonOn, 2);
        let listed: HashSet<_> = listed_unordered(&list).into_iter().collect();
        assert_eq!(listed, expected);
    }

    #[test]
    fn mismatched_type_table_is_rejected() {
        let atoms = random_atoms(10, 2, 1);
        let cutneighsq = CutoffTable::uniform(1, 4.0);
        let grid = BinGrid::rebin(&open_box(), &atoms, 2.0, 1).unwrap();
        let stencil = Stencil::build(grid.geometry(), &cutneighsq, ListingMode::Full);
        let result = NeighborList::build(&grid, &stencil, &atoms, &cutneighsq, 16);
        assert_eq!(
            result,
            Err(NeighborError::TypeCount {
                expected: 2,
                found: 1
            })
        );
    }

    #[test]
    fn stats_summarise_list_lengths() {
        let cutoffs = CutoffTable::uniform(1, 2.0);
        let atoms = random_atoms(100, 1, 2);
        let list = build(&open_box(), &atoms, &cutoffs, ListingMode::Full, 1);
        let stats = list.stats();
        assert_eq!(stats.total, list.total_pairs());
        assert!(stats.min <= stats.max);
        assert!((stats.mean - stats.total as f64 / 100.0).abs() < 1e-12);
    }
}
