use crate::lattice::LatticeSpec;
use binmd::core::forcefield::params::PairCoeffs;
use binmd::engine::config::RunConfig;

pub struct AppConfig {
    pub lattice: LatticeSpec,
    pub coeffs: PairCoeffs,
    pub run: RunConfig,
}
