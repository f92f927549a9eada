use binmd::engine::progress::{Progress, ProgressCallback, ThermoSample};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::{Arc, Mutex};
use tracing::warn;

struct BarState {
    pb: ProgressBar,
    rebuilds: u64,
}

/// Renders run progress as a step bar with thermo lines printed above it.
#[derive(Clone)]
pub struct CliProgressHandler {
    state: Arc<Mutex<BarState>>,
}

impl CliProgressHandler {
    pub fn new() -> Self {
        Self::with_target(ProgressDrawTarget::stderr())
    }

    fn with_target(target: ProgressDrawTarget) -> Self {
        let pb = ProgressBar::new(0).with_message("Initializing...");
        pb.set_draw_target(target);
        Self {
            state: Arc::new(Mutex::new(BarState { pb, rebuilds: 0 })),
        }
    }

    pub fn get_callback(&self) -> ProgressCallback<'static> {
        let state = self.state.clone();

        Box::new(move |progress: Progress| {
            let Ok(mut state) = state.lock() else {
                warn!("Progress bar mutex was poisoned. Cannot update progress.");
                return;
            };

            match progress {
                Progress::RunStart { total_steps } => {
                    state.rebuilds = 0;
                    state.pb.reset();
                    state.pb.set_length(total_steps);
                    state.pb.set_position(0);
                    state.pb.set_style(Self::bar_style());
                    state.pb.set_message("rebuilds: 0");
                }
                Progress::StepComplete { step } => {
                    state.pb.set_position(step);
                }
                Progress::Rebuild { .. } => {
                    state.rebuilds += 1;
                    let message = format!("rebuilds: {}", state.rebuilds);
                    state.pb.set_message(message);
                }
                Progress::Thermo(sample) => {
                    state.pb.println(format_thermo(&sample));
                }
                Progress::RunFinish => {
                    let length = state.pb.length().unwrap_or(0);
                    state.pb.set_position(length);
                    state.pb.finish_with_message("✓ Done");
                }
                Progress::Message(msg) => {
                    state.pb.println(format!("  {}", msg));
                }
            }
        })
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template("{msg:<16} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .map(|style| style.progress_chars("##-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
    }
}

impl Default for CliProgressHandler {
    fn default() -> Self {
        Self::new()
    }
}

pub fn thermo_header() -> String {
    format!(
        "{:>8} {:>12} {:>14} {:>14} {:>14} {:>12}",
        "Step", "Temp", "PotEng", "KinEng", "TotEng", "Press"
    )
}

pub fn format_thermo(sample: &ThermoSample) -> String {
    format!(
        "{:>8} {:>12.6} {:>14.6} {:>14.6} {:>14.6} {:>12.6}",
        sample.step,
        sample.temperature,
        sample.potential_energy,
        sample.kinetic_energy,
        sample.total_energy(),
        sample.pressure
    )
}
