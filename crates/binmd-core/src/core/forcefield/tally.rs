use super::contract::PairTerm;
use crate::core::neighbor::ListingMode;
use nalgebra::Vector3;
use std::ops::AddAssign;

/// Which optional quantities a force evaluation accumulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TallyFlags {
    pub energy: bool,
    pub virial: bool,
    pub per_atom_energy: bool,
    pub per_atom_virial: bool,
}

impl TallyFlags {
    pub fn global() -> Self {
        Self {
            energy: true,
            virial: true,
            ..Self::default()
        }
    }

    pub fn all() -> Self {
        Self {
            energy: true,
            virial: true,
            per_atom_energy: true,
            per_atom_virial: true,
        }
    }
}

/// Virial components in `xx, yy, zz, xy, xz, yz` order.
pub type Virial = [f64; 6];

/// Forces, energy and virial accumulated by one or more interaction terms.
///
/// Arrays span every atom, ghosts included: under Newton-on listing a reaction lands
/// on the ghost slot and must be reduced onto the owner by the ghost exchange before
/// the forces are final.
#[derive(Debug, Clone, PartialEq)]
pub struct ForceTally {
    flags: TallyFlags,
    pub forces: Vec<Vector3<f64>>,
    pub energy: f64,
    pub virial: Virial,
    pub per_atom_energy: Vec<f64>,
    pub per_atom_virial: Vec<Virial>,
}

impl ForceTally {
    pub fn new(natoms: usize, flags: TallyFlags) -> Self {
        Self {
            flags,
            forces: vec![Vector3::zeros(); natoms],
            energy: 0.0,
            virial: [0.0; 6],
            per_atom_energy: if flags.per_atom_energy {
                vec![0.0; natoms]
            } else {
                Vec::new()
            },
            per_atom_virial: if flags.per_atom_virial {
                vec![[0.0; 6]; natoms]
            } else {
                Vec::new()
            },
        }
    }

    #[inline]
    pub fn flags(&self) -> TallyFlags {
        self.flags
    }

    pub fn natoms(&self) -> usize {
        self.forces.len()
    }

    /// Applies one pair evaluation under the conventions of `mode`.
    ///
    /// `del = x_i - x_j` and the force on `i` is `del * fpair`.
    /// - Half, Newton on: `j` receives the reaction and the full energy/virial is
    ///   tallied once.
    /// - Half, Newton off: `j` receives the reaction only when it is local; a
    ///   local/ghost pair is also visited by the ghost's owner, so only half of its
    ///   energy and virial is tallied here.
    /// - Full: only `i` is updated and half of the energy/virial is tallied, since
    ///   the mirrored visit supplies the other half.
    #[inline]
    pub fn apply_pair(
        &mut self,
        i: usize,
        j: usize,
        nlocal: usize,
        mode: ListingMode,
        del: &Vector3<f64>,
        term: PairTerm,
    ) {
        let f = del * term.fpair;
        self.forces[i] += f;

        let (weight, reaction) = match mode {
            ListingMode::HalfNewtonOn => (1.0, true),
            ListingMode::HalfNewtonOff if j < nlocal => (1.0, true),
            ListingMode::HalfNewtonOff => (0.5, false),
            ListingMode::Full => (0.5, false),
        };
        if reaction {
            self.forces[j] -= f;
        }

        if self.flags.energy {
            self.energy += weight * term.energy;
        }
        let v = if self.flags.virial || self.flags.per_atom_virial {
            pair_virial(del, term.fpair)
        } else {
            [0.0; 6]
        };
        if self.flags.virial {
            for (acc, vk) in self.virial.iter_mut().zip(v) {
                *acc += weight * vk;
            }
        }

        // per-atom shares: each listed endpoint this side owns gets half
        if self.flags.per_atom_energy {
            self.per_atom_energy[i] += 0.5 * term.energy;
            if reaction {
                self.per_atom_energy[j] += 0.5 * term.energy;
            }
        }
        if self.flags.per_atom_virial {
            for k in 0..6 {
                self.per_atom_virial[i][k] += 0.5 * v[k];
                if reaction {
                    self.per_atom_virial[j][k] += 0.5 * v[k];
                }
            }
        }
    }

    /// Tallies a multi-atom term whose forces were computed elsewhere.
    ///
    /// `forces[k]` acts on `atoms[k]`; `relative[k]` is the position of `atoms[k]`
    /// relative to a common reference, which gives the virial `sum_k r_k (x) f_k`.
    /// Energy and per-atom shares are split evenly over the participating atoms.
    pub fn apply_group(
        &mut self,
        atoms: &[usize],
        forces: &[Vector3<f64>],
        relative: &[Vector3<f64>],
        energy: f64,
    ) {
        let share = 1.0 / atoms.len() as f64;
        let mut v = [0.0; 6];
        for ((&a, f), r) in atoms.iter().zip(forces).zip(relative) {
            self.forces[a] += f;
            let vk = outer_virial(r, f);
            for k in 0..6 {
                v[k] += vk[k];
            }
        }
        if self.flags.energy {
            self.energy += energy;
        }
        if self.flags.virial {
            for k in 0..6 {
                self.virial[k] += v[k];
            }
        }
        for &a in atoms {
            if self.flags.per_atom_energy {
                self.per_atom_energy[a] += share * energy;
            }
            if self.flags.per_atom_virial {
                for k in 0..6 {
                    self.per_atom_virial[a][k] += share * v[k];
                }
            }
        }
    }

    /// Combines two partial tallies over the same atoms, e.g. per-thread partials.
    pub fn merge(mut self, other: ForceTally) -> ForceTally {
        self += other;
        self
    }

    /// Scalar pressure-style trace `xx + yy + zz`.
    pub fn virial_trace(&self) -> f64 {
        self.virial[0] + self.virial[1] + self.virial[2]
    }
}

impl AddAssign for ForceTally {
    fn add_assign(&mut self, rhs: Self) {
        for (a, b) in self.forces.iter_mut().zip(rhs.forces) {
            *a += b;
        }
        self.energy += rhs.energy;
        for k in 0..6 {
            self.virial[k] += rhs.virial[k];
        }
        for (a, b) in self.per_atom_energy.iter_mut().zip(rhs.per_atom_energy) {
            *a += b;
        }
        for (a, b) in self.per_atom_virial.iter_mut().zip(rhs.per_atom_virial) {
            for k in 0..6 {
                a[k] += b[k];
            }
        }
    }
}

#[inline]
fn pair_virial(del: &Vector3<f64>, fpair: f64) -> Virial {
    [
        del.x * del.x * fpair,
        del.y * del.y * fpair,
        del.z * del.z * fpair,
        del.x * del.y * fpair,
        del.x * del.z * fpair,
        del.y * del.z * fpair,
    ]
}

#[inline]
fn outer_virial(r: &Vector3<f64>, f: &Vector3<f64>) -> Virial {
    [
        r.x * f.x,
        r.y * f.y,
        r.z * f.z,
        r.x * f.y,
        r.x * f.z,
        r.y * f.z,
    ]
}
