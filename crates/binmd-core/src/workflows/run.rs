use crate::core::forcefield::angle::{AngleQuartic, AngleTopology};
use crate::core::forcefield::contract::PairPotential;
use crate::core::forcefield::kernel::compute_pairwise;
use crate::core::forcefield::tally::{ForceTally, TallyFlags};
use crate::core::models::atoms::AtomSet;
use crate::core::models::domain::Domain;
use crate::core::neighbor::NeighborError;
use crate::engine::comm::{CommError, GhostExchange};
use crate::engine::config::RunConfig;
use crate::engine::error::EngineError;
use crate::engine::manager::{ManagerStats, NeighborManager, UpdateOutcome};
use crate::engine::metrics::{MetricsSink, Stage, timed};
use crate::engine::progress::{Progress, ProgressReporter, ThermoSample};
use nalgebra::Vector3;
use tracing::{debug, info, instrument};

/// Bonded angle term: the explicit topology and its coefficients.
#[derive(Debug, Clone)]
pub struct AngleTerm {
    pub topology: AngleTopology,
    pub coeffs: AngleQuartic,
}

/// Everything the run integrates: the box, the atoms and optional bonded terms.
#[derive(Debug, Clone)]
pub struct System {
    pub domain: Domain,
    pub atoms: AtomSet,
    pub angles: Option<AngleTerm>,
}

impl System {
    pub fn new(domain: Domain, atoms: AtomSet) -> Self {
        Self {
            domain,
            atoms,
            angles: None,
        }
    }

    pub fn with_angles(mut self, topology: AngleTopology, coeffs: AngleQuartic) -> Self {
        self.angles = Some(AngleTerm { topology, coeffs });
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub steps: usize,
    /// Thermodynamic samples in step order; always holds step 0 and the last step.
    pub thermo: Vec<ThermoSample>,
    pub neighbors: ManagerStats,
}

impl RunSummary {
    pub fn final_thermo(&self) -> Option<&ThermoSample> {
        self.thermo.last()
    }
}

/// Runs `config.num_steps` velocity-Verlet steps of `system` under `potential` and
/// the system's bonded terms.
///
/// Per step: half kick, drift, neighbor update (rebuild or ghost refresh), force
/// evaluation, reverse ghost reduction, half kick. Quantities are in reduced units
/// with `k_B = 1`.
#[instrument(skip_all, name = "run_workflow", fields(steps = config.num_steps))]
pub fn run<P, G, M>(
    system: &mut System,
    potential: &P,
    comm: &mut G,
    config: &RunConfig,
    metrics: &M,
    reporter: &ProgressReporter,
) -> Result<RunSummary, EngineError>
where
    P: PairPotential + ?Sized,
    G: GhostExchange,
    M: MetricsSink + ?Sized,
{
    if potential.ntypes() != system.atoms.ntypes() {
        return Err(NeighborError::TypeCount {
            expected: system.atoms.ntypes(),
            found: potential.ntypes(),
        }
        .into());
    }
    let dt = config.timestep;
    let mut manager = NeighborManager::new(config.neighbor.clone(), potential.cutoffs())?;

    reporter.report(Progress::RunStart {
        total_steps: config.num_steps as u64,
    });
    info!(
        atoms = system.atoms.nlocal(),
        potential = potential.name(),
        listing = ?config.neighbor.listing,
        timestep = dt,
        "Starting run."
    );

    manager.setup(&system.domain, &mut system.atoms, comm, metrics)?;
    let inv_mass: Vec<f64> = (0..system.atoms.nlocal())
        .map(|i| 1.0 / system.atoms.mass(system.atoms.itype(i)))
        .collect();

    let mut tally = compute_forces(system, potential, &manager, &*comm, config.tally, metrics)?;
    let mut samples = Vec::new();
    record_thermo(0, system, &tally, &inv_mass, reporter, &mut samples);

    for step in 1..=config.num_steps {
        timed(metrics, Stage::Integrate, || {
            half_kick(&mut system.atoms, &tally.forces, &inv_mass, 0.5 * dt);
            drift(&mut system.atoms, dt);
        });

        let outcome = manager.update(&system.domain, &mut system.atoms, comm, metrics)?;
        if outcome == UpdateOutcome::Rebuilt {
            reporter.report(Progress::Rebuild { step: step as u64 });
        }

        tally = compute_forces(system, potential, &manager, &*comm, config.tally, metrics)?;
        timed(metrics, Stage::Integrate, || {
            half_kick(&mut system.atoms, &tally.forces, &inv_mass, 0.5 * dt);
        });

        reporter.report(Progress::StepComplete { step: step as u64 });
        let thermo_step = config.thermo_every > 0 && step % config.thermo_every == 0;
        if thermo_step || step == config.num_steps {
            record_thermo(step, system, &tally, &inv_mass, reporter, &mut samples);
        }
    }

    manager.log_summary();
    reporter.report(Progress::RunFinish);
    Ok(RunSummary {
        steps: config.num_steps,
        thermo: samples,
        neighbors: manager.stats(),
    })
}

/// Evaluates every force term on the current list and reduces ghost contributions
/// onto their owners. Only the local slots of the returned tally are meaningful.
fn compute_forces<P, G, M>(
    system: &System,
    potential: &P,
    manager: &NeighborManager,
    comm: &G,
    flags: TallyFlags,
    metrics: &M,
) -> Result<ForceTally, EngineError>
where
    P: PairPotential + ?Sized,
    G: GhostExchange,
    M: MetricsSink + ?Sized,
{
    let atoms = &system.atoms;
    let mut tally = timed(metrics, Stage::Pair, || {
        compute_pairwise(potential, manager.list(), atoms, flags)
    })?;

    if let Some(angles) = &system.angles {
        timed(metrics, Stage::Angle, || {
            angles
                .coeffs
                .compute(&angles.topology, atoms, &system.domain, &mut tally)
        })?;
    }

    timed(metrics, Stage::Comm, || reverse_tally(comm, atoms, &mut tally))?;
    Ok(tally)
}

fn reverse_tally<G: GhostExchange>(
    comm: &G,
    atoms: &AtomSet,
    tally: &mut ForceTally,
) -> Result<(), CommError> {
    let nlocal = atoms.nlocal();
    comm.reverse_forces(atoms, &mut tally.forces)?;
    if tally.flags().per_atom_energy {
        comm.reverse(nlocal, &mut tally.per_atom_energy, 0.0)?;
    }
    if tally.flags().per_atom_virial {
        let rows = &mut tally.per_atom_virial;
        comm.check_len(nlocal, rows.len())?;
        for g in nlocal..rows.len() {
            if let Some(owner) = comm.owner(nlocal, g) {
                let row = std::mem::replace(&mut rows[g], [0.0; 6]);
                for (k, v) in row.into_iter().enumerate() {
                    rows[owner][k] += v;
                }
            }
        }
    }
    Ok(())
}

fn half_kick(atoms: &mut AtomSet, forces: &[Vector3<f64>], inv_mass: &[f64], dt_half: f64) {
    for ((v, f), im) in atoms
        .local_velocities_mut()
        .iter_mut()
        .zip(forces)
        .zip(inv_mass)
    {
        *v += f * (dt_half * im);
    }
}

fn drift(atoms: &mut AtomSet, dt: f64) {
    let nlocal = atoms.nlocal();
    let (positions, velocities) = atoms.kinematics_mut();
    for (x, v) in positions[..nlocal].iter_mut().zip(&velocities[..nlocal]) {
        *x += v * dt;
    }
}

fn record_thermo(
    step: usize,
    system: &System,
    tally: &ForceTally,
    inv_mass: &[f64],
    reporter: &ProgressReporter,
    samples: &mut Vec<ThermoSample>,
) {
    let sample = thermo_sample(step, system, tally, inv_mass);
    debug!(
        step,
        temperature = sample.temperature,
        pe = sample.potential_energy,
        ke = sample.kinetic_energy,
        pressure = sample.pressure,
        "Thermo."
    );
    reporter.report(Progress::Thermo(sample));
    samples.push(sample);
}

/// Temperature from `dim * N - dim` degrees of freedom; pressure from the kinetic
/// term plus the virial trace over `dim * V`.
fn thermo_sample(step: usize, system: &System, tally: &ForceTally, inv_mass: &[f64]) -> ThermoSample {
    let atoms = &system.atoms;
    let dim = system.domain.dimension();
    let kinetic_energy: f64 = atoms.velocities()[..atoms.nlocal()]
        .iter()
        .zip(inv_mass)
        .map(|(v, im)| 0.5 * v.norm_squared() / im)
        .sum();
    let dof = (dim * atoms.nlocal()).saturating_sub(dim);
    let temperature = if dof > 0 {
        2.0 * kinetic_energy / dof as f64
    } else {
        0.0
    };
    let pressure = (2.0 * kinetic_energy + tally.virial_trace())
        / (dim as f64 * system.domain.volume());

    ThermoSample {
        step: step as u64,
        temperature,
        potential_energy: tally.energy,
        kinetic_energy,
        pressure,
    }
}
