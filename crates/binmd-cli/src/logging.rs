use crate::error::{CliError, Result};
use std::fs::File;
use std::path::PathBuf;
use tracing_subscriber::{
    filter::LevelFilter,
    fmt::{self},
    prelude::*,
};

/// `-q` silences everything; otherwise each `-v` lowers the threshold by one level,
/// starting from warnings.
pub fn level_filter(verbosity: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::OFF;
    }
    match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Installs the global subscriber: a compact stderr layer and, when `log_file` is
/// given, a plain-text file layer that also records thread ids.
pub fn setup_logging(verbosity: u8, quiet: bool, log_file: Option<PathBuf>) -> Result<()> {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(false)
        .compact();

    let subscriber = tracing_subscriber::registry()
        .with(level_filter(verbosity, quiet))
        .with(stderr_layer);

    if let Some(path) = log_file {
        let file = File::create(&path).map_err(CliError::Io)?;
        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_thread_ids(true)
            .with_target(true);
        subscriber.with(file_layer).init();
    } else {
        subscriber.init();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tracing::{debug, info, warn};

    #[test]
    fn verbosity_maps_onto_levels() {
        assert_eq!(level_filter(0, false), LevelFilter::WARN);
        assert_eq!(level_filter(1, false), LevelFilter::INFO);
        assert_eq!(level_filter(2, false), LevelFilter::DEBUG);
        assert_eq!(level_filter(7, false), LevelFilter::TRACE);
        assert_eq!(level_filter(3, true), LevelFilter::OFF);
    }

    #[test]
    #[serial]
    fn file_layer_records_engine_events() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log_path = temp_dir.path().join("run.log");

        let file = File::create(&log_path).unwrap();
        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_thread_ids(true);
        let subscriber = tracing_subscriber::registry()
            .with(level_filter(2, false))
            .with(file_layer);

        tracing::subscriber::with_default(subscriber, || {
            debug!(builds = 3, "Neighbor statistics.");
            tracing::trace!("filtered out");
        });

        let content = std::fs::read_to_string(log_path).unwrap();
        assert!(content.contains("Neighbor statistics."));
        assert!(content.contains("builds=3"));
        assert!(content.contains("ThreadId"));
        assert!(!content.contains("filtered out"));
    }

    #[test]
    #[serial]
    fn global_logger_installs_once_and_accepts_events() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log_path = temp_dir.path().join("global.log");
        if setup_logging(1, false, Some(log_path.clone())).is_ok() {
            info!("Starting run.");
            warn!("Neighbor capacity exceeded; growing storage and rebuilding.");
            let content = std::fs::read_to_string(&log_path).unwrap();
            assert!(content.contains("Starting run."));
        }
    }

    #[test]
    #[serial]
    fn unwritable_log_path_is_an_io_error() {
        let invalid_path = PathBuf::from("/");
        if cfg!(unix) && invalid_path.is_dir() {
            let result = setup_logging(0, false, Some(invalid_path));
            assert!(matches!(result, Err(CliError::Io(_))));
        }
    }
}
