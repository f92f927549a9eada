use crate::cli::RunArgs;
use crate::config::build_config;
use crate::error::Result;
use crate::lattice::build_fcc;
use crate::utils::progress::{CliProgressHandler, format_thermo, thermo_header};
use binmd::core::forcefield::lj::LennardJones;
use binmd::engine::comm::PeriodicImages;
use binmd::engine::metrics::TimingTable;
use binmd::engine::progress::ProgressReporter;
use binmd::workflows;
use tracing::info;

pub fn run(args: RunArgs) -> Result<()> {
    info!("Merging configuration from file and CLI arguments...");
    let config = build_config(&args)?;

    let mut system = build_fcc(&config.lattice)?;
    let potential = LennardJones::new(config.coeffs);
    let mut comm = PeriodicImages::new();
    let timings = TimingTable::new();

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!(
        "Running {} steps of {} atoms (box {:.4}, listing {:?})...",
        config.run.num_steps,
        system.atoms.nlocal(),
        system.domain.length(0),
        config.run.neighbor.listing
    );
    println!("{}", thermo_header());

    let summary = workflows::run::run(
        &mut system,
        &potential,
        &mut comm,
        &config.run,
        &timings,
        &reporter,
    )?;

    if let Some(last) = summary.final_thermo() {
        println!("{}", format_thermo(last));
    }
    let stats = summary.neighbors;
    println!(
        "Neighbor lists: {} builds ({} dangerous), {} stencil builds, {} capacity retries.",
        stats.builds, stats.dangerous_builds, stats.stencil_builds, stats.capacity_retries
    );
    println!(
        "Neighbors per atom: min {} / max {} / mean {:.2} ({} total).",
        stats.neighbors.min, stats.neighbors.max, stats.neighbors.mean, stats.neighbors.total
    );

    if args.timings {
        println!("{:<10} {:>10} {:>12}", "Stage", "Calls", "Seconds");
        for (stage, timing) in timings.snapshot() {
            println!(
                "{:<10} {:>10} {:>12.6}",
                stage.to_string(),
                timing.calls,
                timing.total.as_secs_f64()
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::SystemArgs;

    #[test]
    fn short_run_completes_with_timings() {
        let args = RunArgs {
            system: SystemArgs {
                cells: Some(3),
                set_values: vec!["system.temperature=0.5".to_string()],
                ..Default::default()
            },
            steps: Some(10),
            thermo_every: Some(5),
            timings: true,
            ..Default::default()
        };
        assert!(run(args).is_ok());
    }
}
