use super::contract::{ForceError, non_negative};
use super::potentials::quartic_angle;
use super::tally::ForceTally;
use crate::core::models::atoms::AtomSet;
use crate::core::models::domain::Domain;
use crate::core::models::ids::AtomTag;
use nalgebra::Vector3;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::instrument;

/// Coefficients of one quartic angle type; `theta0` in radians.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuarticCoeff {
    pub theta0: f64,
    pub k2: f64,
    pub k3: f64,
    pub k4: f64,
}

/// An angle `end - center - end` between three atoms, by persistent tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Angle {
    pub tags: [AtomTag; 3],
    pub angle_type: usize,
}

/// Order-independent identity of an angle: the two end tags sorted around the
/// center tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AngleKey(pub AtomTag, pub AtomTag, pub AtomTag);

impl Angle {
    pub fn key(&self) -> AngleKey {
        let [a, center, b] = self.tags;
        AngleKey(a.min(b), center, a.max(b))
    }
}

/// Angle topology with duplicates (same key) collapsed onto the last definition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AngleTopology {
    angles: BTreeMap<AngleKey, Angle>,
}

impl AngleTopology {
    pub fn new(angles: impl IntoIterator<Item = Angle>) -> Self {
        Self {
            angles: angles.into_iter().map(|a| (a.key(), a)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.angles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.angles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Angle> {
        self.angles.values()
    }
}

/// `E = K2 d^2 + K3 d^3 + K4 d^4`, `d = theta - theta0`.
#[derive(Debug, Clone, PartialEq)]
pub struct AngleQuartic {
    coeffs: Vec<QuarticCoeff>,
}

impl AngleQuartic {
    /// `coeffs[t - 1]` belongs to angle type `t`.
    pub fn new(coeffs: Vec<QuarticCoeff>) -> Result<Self, ForceError> {
        for c in &coeffs {
            if !(c.theta0.is_finite() && (0.0..=std::f64::consts::PI).contains(&c.theta0)) {
                return Err(ForceError::InvalidCoefficient {
                    name: "theta0",
                    value: c.theta0,
                    reason: "must lie in [0, pi]",
                });
            }
            non_negative("k2", c.k2)?;
        }
        Ok(Self { coeffs })
    }

    pub fn ntypes(&self) -> usize {
        self.coeffs.len()
    }

    /// Adds the forces of every angle to `tally` and returns the energy of each angle
    /// by key. All three atoms of an angle must be local; separations use the minimum
    /// image of `domain`.
    #[instrument(skip_all, name = "angle_forces", fields(angles = topology.len()))]
    pub fn compute(
        &self,
        topology: &AngleTopology,
        atoms: &AtomSet,
        domain: &Domain,
        tally: &mut ForceTally,
    ) -> Result<Vec<(AngleKey, f64)>, ForceError> {
        let x = atoms.positions();
        let mut energies = Vec::with_capacity(topology.len());

        for angle in topology.iter() {
            let coeff = angle
                .angle_type
                .checked_sub(1)
                .and_then(|t| self.coeffs.get(t))
                .ok_or(ForceError::UnknownAngleType {
                    angle_type: angle.angle_type,
                    ntypes: self.ntypes(),
                })?;
            let mut idx = [0usize; 3];
            for (slot, &tag) in idx.iter_mut().zip(&angle.tags) {
                *slot = atoms
                    .local_index(tag)
                    .ok_or(ForceError::MissingAngleAtom { tag })?;
            }
            let [i1, i2, i3] = idx;

            let del1 = domain.minimum_image(x[i1] - x[i2]);
            let del2 = domain.minimum_image(x[i3] - x[i2]);
            let (energy, f1, f3) = quartic_forces(coeff, &del1, &del2);
            let f2 = -(f1 + f3);

            tally.apply_group(&idx, &[f1, f2, f3], &[del1, Vector3::zeros(), del2], energy);
            energies.push((angle.key(), energy));
        }
        Ok(energies)
    }
}

/// Energy and the forces on the two end atoms of one angle, from the end vectors
/// relative to the center atom.
fn quartic_forces(
    c: &QuarticCoeff,
    del1: &Vector3<f64>,
    del2: &Vector3<f64>,
) -> (f64, Vector3<f64>, Vector3<f64>) {
    let rsq1 = del1.norm_squared();
    let rsq2 = del2.norm_squared();
    let r1 = rsq1.sqrt();
    let r2 = rsq2.sqrt();

    let cos = (del1.dot(del2) / (r1 * r2)).clamp(-1.0, 1.0);
    // near-linear angles: bound 1/sin
    let sin_inv = 1.0 / (1.0 - cos * cos).sqrt().max(0.001);

    let (energy, de_dtheta) = quartic_angle(cos.acos(), c.theta0, c.k2, c.k3, c.k4);
    let a = -de_dtheta * sin_inv;
    let a11 = a * cos / rsq1;
    let a12 = -a / (r1 * r2);
    let a22 = a * cos / rsq2;

    let f1 = a11 * del1 + a12 * del2;
    let f3 = a22 * del2 + a12 * del1;
    (energy, f1, f3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::forcefield::tally::TallyFlags;
    use nalgebra::Point3;
    use std::f64::consts::FRAC_PI_2;

    fn coeff() -> QuarticCoeff {
        QuarticCoeff {
            theta0: FRAC_PI_2,
            k2: 10.0,
            k3: -2.0,
            k4: 1.0,
        }
    }

    fn three_atoms(end: Point3<f64>) -> AtomSet {
        let mut atoms = AtomSet::new(vec![1.0]).unwrap();
        for (tag, p) in [
            (1, Point3::new(6.0, 5.0, 5.0)),
            (2, Point3::new(5.0, 5.0, 5.0)),
            (3, end),
        ] {
            atoms
                .push_local(AtomTag(tag), 1, p, Vector3::zeros())
                .unwrap();
        }
        atoms
    }

    fn topology() -> AngleTopology {
        AngleTopology::new([Angle {
            tags: [AtomTag(1), AtomTag(2), AtomTag(3)],
            angle_type: 1,
        }])
    }

    fn energy_at(c: &QuarticCoeff, del1: Vector3<f64>, del2: Vector3<f64>) -> f64 {
        quartic_forces(c, &del1, &del2).0
    }

    #[test]
    fn angle_key_is_independent_of_end_order() {
        let forward = Angle {
            tags: [AtomTag(9), AtomTag(4), AtomTag(1)],
            angle_type: 1,
        };
        let backward = Angle {
            tags: [AtomTag(1), AtomTag(4), AtomTag(9)],
            angle_type: 2,
        };
        assert_eq!(forward.key(), backward.key());
        assert_eq!(AngleTopology::new([forward, backward]).len(), 1);
    }

    #[test]
    fn equilibrium_angle_has_no_energy_or_force() {
        let atoms = three_atoms(Point3::new(5.0, 6.0, 5.0));
        let mut tally = ForceTally::new(3, TallyFlags::global());
        let quartic = AngleQuartic::new(vec![coeff()]).unwrap();
        let energies = quartic
            .compute(&topology(), &atoms, &Domain::cubic(10.0), &mut tally)
            .unwrap();
        assert!(energies[0].1.abs() < 1e-12);
        assert!(tally.forces.iter().all(|f| f.norm() < 1e-9));
    }

    #[test]
    fn forces_match_numerical_gradient_and_sum_to_zero() {
        let c = coeff();
        let del1 = Vector3::new(1.0, 0.2, -0.1);
        let del2 = Vector3::new(0.3, 1.1, 0.4);
        let (_, f1, f3) = quartic_forces(&c, &del1, &del2);

        let h = 1e-6;
        for axis in 0..3 {
            let mut step = Vector3::zeros();
            step[axis] = h;
            let g1 = (energy_at(&c, del1 + step, del2) - energy_at(&c, del1 - step, del2)) / (2.0 * h);
            let g3 = (energy_at(&c, del1, del2 + step) - energy_at(&c, del1, del2 - step)) / (2.0 * h);
            assert!((f1[axis] + g1).abs() < 1e-5);
            assert!((f3[axis] + g3).abs() < 1e-5);
        }

        let atoms = three_atoms(Point3::new(5.3, 6.1, 5.4));
        let mut tally = ForceTally::new(3, TallyFlags::global());
        AngleQuartic::new(vec![c])
            .unwrap()
            .compute(&topology(), &atoms, &Domain::cubic(10.0), &mut tally)
            .unwrap();
        let net: Vector3<f64> = tally.forces.iter().sum();
        assert!(net.norm() < 1e-9);
        assert!(tally.energy > 0.0);
    }

    #[test]
    fn angle_across_periodic_boundary_uses_minimum_image() {
        let mut atoms = AtomSet::new(vec![1.0]).unwrap();
        for (tag, p) in [
            (1, Point3::new(0.5, 5.0, 5.0)),
            (2, Point3::new(9.5, 5.0, 5.0)),
            (3, Point3::new(9.5, 6.0, 5.0)),
        ] {
            atoms
                .push_local(AtomTag(tag), 1, p, Vector3::zeros())
                .unwrap();
        }
        let mut tally = ForceTally::new(3, TallyFlags::global());
        let energies = AngleQuartic::new(vec![coeff()])
            .unwrap()
            .compute(&topology(), &atoms, &Domain::cubic(10.0), &mut tally)
            .unwrap();
        assert!(energies[0].1.abs() < 1e-12);
    }

    #[test]
    fn missing_atom_and_unknown_type_are_reported() {
        let atoms = three_atoms(Point3::new(5.0, 6.0, 5.0));
        let quartic = AngleQuartic::new(vec![coeff()]).unwrap();
        let mut tally = ForceTally::new(3, TallyFlags::global());

        let missing = AngleTopology::new([Angle {
            tags: [AtomTag(1), AtomTag(2), AtomTag(42)],
            angle_type: 1,
        }]);
        assert!(matches!(
            quartic.compute(&missing, &atoms, &Domain::cubic(10.0), &mut tally),
            Err(ForceError::MissingAngleAtom { tag: AtomTag(42) })
        ));

        let unknown = AngleTopology::new([Angle {
            tags: [AtomTag(1), AtomTag(2), AtomTag(3)],
            angle_type: 2,
        }]);
        assert!(matches!(
            quartic.compute(&unknown, &atoms, &Domain::cubic(10.0), &mut tally),
            Err(ForceError::UnknownAngleType { angle_type: 2, .. })
        ));
    }

    #[test]
    fn invalid_theta0_is_rejected() {
        let bad = QuarticCoeff {
            theta0: 4.0,
            ..coeff()
        };
        assert!(AngleQuartic::new(vec![bad]).is_err());
    }
}
