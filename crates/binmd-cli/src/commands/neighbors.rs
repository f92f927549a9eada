use crate::cli::{RunArgs, SystemArgs};
use crate::config::build_config;
use crate::error::{CliError, Result};
use crate::lattice::build_fcc;
use binmd::engine::comm::PeriodicImages;
use binmd::engine::error::EngineError;
use binmd::engine::manager::NeighborManager;
use binmd::engine::metrics::{Stage, TimingTable};
use tracing::info;

pub fn run(args: SystemArgs) -> Result<()> {
    let config = build_config(&RunArgs {
        system: args,
        ..Default::default()
    })?;
    let mut system = build_fcc(&config.lattice)?;

    let mut manager = NeighborManager::new(config.run.neighbor.clone(), config.coeffs.cutoffs())?;
    let timings = TimingTable::new();
    info!("Building neighbor list for {} atoms.", system.atoms.nlocal());
    manager.setup(
        &system.domain,
        &mut system.atoms,
        &mut PeriodicImages::new(),
        &timings,
    )?;

    let list = manager
        .checked_list(&system.atoms)
        .map_err(|e| CliError::Engine(EngineError::from(e)))?;
    let stats = manager.stats();
    println!(
        "{} local atoms, {} ghosts, cutghost {:.4}",
        system.atoms.nlocal(),
        system.atoms.nghost(),
        manager.cutghost()
    );
    println!(
        "Stencil: {} bin offsets ({:?})",
        manager.stencil().map_or(0, |s| s.len()),
        list.mode()
    );
    println!(
        "Pairs listed: {} (min {} / max {} / mean {:.2} per atom, capacity {})",
        list.total_pairs(),
        stats.neighbors.min,
        stats.neighbors.max,
        stats.neighbors.mean,
        stats.capacity
    );
    if let Some(build) = timings.get(Stage::Build) {
        println!("Build time: {:.6} s", build.total.as_secs_f64());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neighbors_command_builds_a_list_for_a_small_lattice() {
        let args = SystemArgs {
            cells: Some(3),
            ..Default::default()
        };
        assert!(run(args).is_ok());
    }

    #[test]
    fn box_smaller_than_ghost_shell_is_reported() {
        let args = SystemArgs {
            cells: Some(1),
            ..Default::default()
        };
        assert!(matches!(run(args), Err(CliError::Engine(_))));
    }
}
