use super::defaults::DefaultsConfig;
use super::file::{FileConfig, FileForcefieldConfig};
use super::models::AppConfig;
use crate::cli::RunArgs;
use crate::error::{CliError, Result};
use crate::lattice::LatticeSpec;
use binmd::core::forcefield::params::PairCoeffs;
use binmd::core::forcefield::tally::TallyFlags;
use binmd::engine::config::{NeighborConfigBuilder, RunConfigBuilder};
use binmd::engine::scheduler::RebuildPolicy;
use std::str::FromStr;
use tracing::debug;

/// Merges built-in defaults < configuration file < `--set` values < dedicated flags.
pub fn build_config(args: &RunArgs) -> Result<AppConfig> {
    let defaults = DefaultsConfig::default();

    let file_config = match &args.system.config {
        Some(path) => FileConfig::from_file(path)?,
        None => FileConfig::default(),
    };
    let mut file_config = apply_set_values(file_config, &args.system.set_values)?;

    let system = file_config.system.take().unwrap_or_default();
    let lattice = LatticeSpec {
        cells: args
            .system
            .cells
            .or(system.cells)
            .unwrap_or(defaults.cells),
        lattice_constant: system
            .lattice_constant
            .unwrap_or(defaults.lattice_constant),
        temperature: system.temperature.unwrap_or(defaults.temperature),
        seed: system.seed.unwrap_or(defaults.seed),
        mass: system.mass.unwrap_or(defaults.mass),
    };

    let forcefield = file_config.forcefield.take().unwrap_or_default();
    let coeffs = resolve_coefficients(args, forcefield, &defaults)?;

    let neighbor_file = file_config.neighbor.take().unwrap_or_default();
    let mut neighbor = NeighborConfigBuilder::new().skin(
        args.system
            .skin
            .or(neighbor_file.skin)
            .unwrap_or(defaults.skin),
    );
    if let Some(listing) = args.system.listing.or(neighbor_file.listing) {
        neighbor = neighbor.listing(listing);
    }
    if let Some(n) = neighbor_file.bins_per_cutoff {
        neighbor = neighbor.bins_per_cutoff(n);
    }
    if let Some(policy) = neighbor_file.policy {
        neighbor = neighbor.policy(policy);
    }
    if let Some(n) = neighbor_file.one_atom {
        neighbor = neighbor.one_atom(n);
    }
    if let Some(n) = neighbor_file.max_build_retries {
        neighbor = neighbor.max_build_retries(n);
    }
    let neighbor = neighbor
        .build()
        .map_err(|e| CliError::Config(e.to_string()))?;

    let run_file = file_config.run.take().unwrap_or_default();
    let tally = if run_file.per_atom.unwrap_or(false) {
        TallyFlags::all()
    } else {
        TallyFlags::global()
    };
    let run = RunConfigBuilder::new()
        .timestep(
            args.timestep
                .or(run_file.timestep)
                .unwrap_or(defaults.timestep),
        )
        .num_steps(args.steps.or(run_file.steps).unwrap_or(defaults.steps))
        .thermo_every(
            args.thermo_every
                .or(run_file.thermo_every)
                .unwrap_or(defaults.thermo_every),
        )
        .neighbor(neighbor)
        .tally(tally)
        .build()
        .map_err(|e| CliError::Config(e.to_string()))?;

    debug!(?lattice, ?run, "Configuration resolved.");
    Ok(AppConfig {
        lattice,
        coeffs,
        run,
    })
}

fn resolve_coefficients(
    args: &RunArgs,
    file: FileForcefieldConfig,
    defaults: &DefaultsConfig,
) -> Result<PairCoeffs> {
    let coeffs = match args.system.params.as_ref().or(file.params_path.as_ref()) {
        Some(path) => PairCoeffs::load(path)?,
        None => PairCoeffs::uniform(
            1,
            file.epsilon.unwrap_or(defaults.epsilon),
            file.sigma.unwrap_or(defaults.sigma),
            file.cutoff.unwrap_or(defaults.cutoff),
        )
        .with_shift(defaults.shift),
    };
    Ok(match file.shift {
        Some(shift) => coeffs.with_shift(shift),
        None => coeffs,
    })
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid value for {}: {}", key, value)))
}

fn apply_set_values(mut config: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    for kv_pair in set_values {
        let (key, value) = kv_pair.split_once('=').ok_or_else(|| {
            CliError::Config(format!(
                "Invalid --set format: '{}'. Expected KEY=VALUE.",
                kv_pair
            ))
        })?;
        match key {
            "system.cells" => {
                config.system.get_or_insert_with(Default::default).cells =
                    Some(parse_value(key, value)?);
            }
            "system.lattice-constant" => {
                config
                    .system
                    .get_or_insert_with(Default::default)
                    .lattice_constant = Some(parse_value(key, value)?);
            }
            "system.temperature" => {
                config.system.get_or_insert_with(Default::default).temperature =
                    Some(parse_value(key, value)?);
            }
            "system.seed" => {
                config.system.get_or_insert_with(Default::default).seed =
                    Some(parse_value(key, value)?);
            }
            "neighbor.skin" => {
                config.neighbor.get_or_insert_with(Default::default).skin =
                    Some(parse_value(key, value)?);
            }
            "neighbor.bins-per-cutoff" => {
                config
                    .neighbor
                    .get_or_insert_with(Default::default)
                    .bins_per_cutoff = Some(parse_value(key, value)?);
            }
            "neighbor.listing" => {
                config.neighbor.get_or_insert_with(Default::default).listing =
                    Some(parse_value(key, value)?);
            }
            "neighbor.one-atom" => {
                config.neighbor.get_or_insert_with(Default::default).one_atom =
                    Some(parse_value(key, value)?);
            }
            "neighbor.every" => {
                config.neighbor.get_or_insert_with(Default::default).policy =
                    Some(RebuildPolicy::FixedInterval {
                        every: parse_value(key, value)?,
                    });
            }
            "neighbor.delay" => {
                config.neighbor.get_or_insert_with(Default::default).policy =
                    Some(RebuildPolicy::Displacement {
                        delay: parse_value(key, value)?,
                    });
            }
            "run.timestep" => {
                config.run.get_or_insert_with(Default::default).timestep =
                    Some(parse_value(key, value)?);
            }
            "run.steps" => {
                config.run.get_or_insert_with(Default::default).steps =
                    Some(parse_value(key, value)?);
            }
            "run.thermo-every" => {
                config.run.get_or_insert_with(Default::default).thermo_every =
                    Some(parse_value(key, value)?);
            }
            "forcefield.cutoff" => {
                config.forcefield.get_or_insert_with(Default::default).cutoff =
                    Some(parse_value(key, value)?);
            }
            "forcefield.shift" => {
                config.forcefield.get_or_insert_with(Default::default).shift =
                    Some(parse_value(key, value)?);
            }
            _ => {
                return Err(CliError::Config(format!(
                    "Unsupported configuration key for --set: '{}'",
                    key
                )));
            }
        }
    }
    Ok(config)
}
