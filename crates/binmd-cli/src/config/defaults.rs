pub struct DefaultsConfig {
    pub cells: usize,
    pub lattice_constant: f64,
    pub temperature: f64,
    pub seed: u64,
    pub mass: f64,
    pub epsilon: f64,
    pub sigma: f64,
    pub cutoff: f64,
    pub shift: bool,
    pub skin: f64,
    pub timestep: f64,
    pub steps: usize,
    pub thermo_every: usize,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            cells: 5,
            lattice_constant: 1.6796,
            temperature: 1.0,
            seed: 12345,
            mass: 1.0,
            epsilon: 1.0,
            sigma: 1.0,
            cutoff: 2.5,
            shift: false,
            skin: 0.3,
            timestep: 0.005,
            steps: 1000,
            thermo_every: 100,
        }
    }
}
