use crate::error::{CliError, Result};
use binmd::core::models::atoms::AtomSet;
use binmd::core::models::domain::Domain;
use binmd::core::models::ids::AtomTag;
use binmd::engine::error::EngineError;
use binmd::workflows::run::System;
use nalgebra::{Point3, Vector3};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use tracing::debug;

const FCC_BASIS: [[f64; 3]; 4] = [
    [0.0, 0.0, 0.0],
    [0.5, 0.5, 0.0],
    [0.5, 0.0, 0.5],
    [0.0, 0.5, 0.5],
];

#[derive(Debug, Clone, PartialEq)]
pub struct LatticeSpec {
    pub cells: usize,
    pub lattice_constant: f64,
    pub temperature: f64,
    pub seed: u64,
    pub mass: f64,
}

/// A periodic cube of `cells^3` FCC unit cells of a single atom type.
///
/// Velocities are drawn from a Maxwell-Boltzmann distribution, stripped of net
/// momentum and rescaled so the instantaneous temperature equals the target.
pub fn build_fcc(spec: &LatticeSpec) -> Result<System> {
    if spec.cells == 0 || !(spec.lattice_constant > 0.0) {
        return Err(CliError::Config(format!(
            "lattice needs at least one cell and a positive lattice constant (got {} cells, a = {})",
            spec.cells, spec.lattice_constant
        )));
    }
    let sigma = (spec.temperature.max(0.0) / spec.mass).sqrt();
    let normal = Normal::new(0.0, sigma)
        .map_err(|e| CliError::Config(format!("invalid velocity distribution: {e}")))?;
    let mut rng = StdRng::seed_from_u64(spec.seed);

    let n = spec.cells;
    let a = spec.lattice_constant;
    let mut positions = Vec::with_capacity(4 * n * n * n);
    let mut velocities = Vec::with_capacity(4 * n * n * n);
    for i in 0..n {
        for j in 0..n {
            for k in 0..n {
                for b in &FCC_BASIS {
                    positions.push(Point3::new(
                        (i as f64 + b[0]) * a,
                        (j as f64 + b[1]) * a,
                        (k as f64 + b[2]) * a,
                    ));
                    velocities.push(Vector3::from_fn(|_, _| normal.sample(&mut rng)));
                }
            }
        }
    }

    let natoms = velocities.len() as f64;
    let drift = velocities.iter().sum::<Vector3<f64>>() / natoms;
    for v in &mut velocities {
        *v -= drift;
    }
    let dof = 3.0 * natoms - 3.0;
    let kinetic: f64 = velocities.iter().map(|v| 0.5 * spec.mass * v.norm_squared()).sum();
    if kinetic > 0.0 && dof > 0.0 {
        let scale = (spec.temperature * dof / (2.0 * kinetic)).sqrt();
        for v in &mut velocities {
            *v *= scale;
        }
    }

    let mut atoms = AtomSet::new(vec![spec.mass]).map_err(EngineError::from)?;
    for (index, (x, v)) in positions.into_iter().zip(velocities).enumerate() {
        atoms
            .push_local(AtomTag(index as u64 + 1), 1, x, v)
            .map_err(EngineError::from)?;
    }
    debug!(atoms = atoms.nlocal(), length = n as f64 * a, "Built FCC lattice.");
    Ok(System::new(Domain::cubic(n as f64 * a), atoms))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> LatticeSpec {
        LatticeSpec {
            cells: 3,
            lattice_constant: 1.6,
            temperature: 1.5,
            seed: 42,
            mass: 2.0,
        }
    }

    #[test]
    fn lattice_has_four_atoms_per_cell_inside_the_box() {
        let system = build_fcc(&spec()).unwrap();
        assert_eq!(system.atoms.nlocal(), 108);
        assert!((system.domain.length(0) - 4.8).abs() < 1e-12);
        for x in system.atoms.local_positions() {
            for axis in 0..3 {
                assert!(x[axis] >= 0.0 && x[axis] < 4.8);
            }
        }
    }

    #[test]
    fn velocities_hit_the_target_temperature_with_zero_momentum() {
        let spec = spec();
        let system = build_fcc(&spec).unwrap();
        let v = system.atoms.velocities();
        let momentum: Vector3<f64> = v.iter().map(|v| v * spec.mass).sum();
        assert!(momentum.norm() < 1e-10);
        let kinetic: f64 = v.iter().map(|v| 0.5 * spec.mass * v.norm_squared()).sum();
        let temperature = 2.0 * kinetic / (3.0 * v.len() as f64 - 3.0);
        assert!((temperature - spec.temperature).abs() < 1e-10);
    }

    #[test]
    fn same_seed_gives_same_velocities() {
        let a = build_fcc(&spec()).unwrap();
        let b = build_fcc(&spec()).unwrap();
        assert_eq!(a.atoms.velocities(), b.atoms.velocities());
    }

    #[test]
    fn empty_lattice_is_rejected() {
        let mut spec = spec();
        spec.cells = 0;
        assert!(matches!(build_fcc(&spec), Err(CliError::Config(_))));
    }
}
