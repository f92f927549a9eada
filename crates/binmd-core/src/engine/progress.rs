#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    RunStart { total_steps: u64 },
    StepComplete { step: u64 },
    Rebuild { step: u64 },
    Thermo(ThermoSample),
    RunFinish,

    Message(String),
}

/// Thermodynamic state reported at thermo steps.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ThermoSample {
    pub step: u64,
    pub temperature: f64,
    pub potential_energy: f64,
    pub kinetic_energy: f64,
    pub pressure: f64,
}

impl ThermoSample {
    pub fn total_energy(&self) -> f64 {
        self.potential_energy + self.kinetic_energy
    }
}

pub type ProgressCallback<'a> = Box<dyn Fn(Progress) + Send + Sync + 'a>;

#[derive(Default)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }
}
