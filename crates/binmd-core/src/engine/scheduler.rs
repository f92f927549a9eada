use crate::core::neighbor::NeighborError;
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// When a neighbor list must be rebuilt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RebuildPolicy {
    /// Unconditionally every `every` steps.
    FixedInterval { every: usize },
    /// As soon as any atom moved more than half the skin since the last build, but
    /// never within `delay` steps of it.
    Displacement {
        #[serde(default)]
        delay: usize,
    },
}

impl Default for RebuildPolicy {
    fn default() -> Self {
        RebuildPolicy::Displacement { delay: 0 }
    }
}

/// Decides whether the list built from `reference` can still serve `current`.
///
/// A pair outside the list at build time was at least `cut + skin` apart; it can only
/// close to within `cut` if the two atoms together moved `skin`, i.e. one of them
/// moved at least `skin / 2`. The test is strict (`> (skin/2)^2`), which errs towards
/// rebuilding. A changed atom count always forces a rebuild.
pub fn should_rebuild(
    current: &[Point3<f64>],
    reference: &[Point3<f64>],
    skin: f64,
    steps_since_last: usize,
    policy: RebuildPolicy,
) -> bool {
    if current.len() != reference.len() {
        return true;
    }
    match policy {
        RebuildPolicy::FixedInterval { every } => steps_since_last >= every,
        RebuildPolicy::Displacement { delay } => {
            steps_since_last >= delay && exceeds_half_skin(current, reference, skin)
        }
    }
}

fn exceeds_half_skin(current: &[Point3<f64>], reference: &[Point3<f64>], skin: f64) -> bool {
    let trigger = 0.25 * skin * skin;

    #[cfg(not(feature = "parallel"))]
    let mut pairs = current.iter().zip(reference);

    #[cfg(feature = "parallel")]
    let pairs = current.par_iter().zip(reference);

    pairs.any(|(x, x0)| (x - x0).norm_squared() > trigger)
}

/// Largest displacement of any atom since `reference`.
pub fn max_displacement(current: &[Point3<f64>], reference: &[Point3<f64>]) -> f64 {
    current
        .iter()
        .zip(reference)
        .map(|(x, x0)| (x - x0).norm_squared())
        .fold(0.0, f64::max)
        .sqrt()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListState {
    Fresh,
    Stale,
}

/// Rebuild bookkeeping kept between steps: the reference snapshot, the step counter
/// and the `Fresh -> Stale -> (rebuild) -> Fresh` state.
#[derive(Debug, Clone)]
pub struct RebuildScheduler {
    policy: RebuildPolicy,
    skin: f64,
    reference: Vec<Point3<f64>>,
    steps_since_build: usize,
    state: ListState,
    builds: usize,
    dangerous: usize,
}

impl RebuildScheduler {
    /// A scheduler with no build yet; the first [`check`](Self::check) requests one.
    pub fn new(policy: RebuildPolicy, skin: f64) -> Self {
        Self {
            policy,
            skin,
            reference: Vec::new(),
            steps_since_build: 0,
            state: ListState::Stale,
            builds: 0,
            dangerous: 0,
        }
    }

    /// Consults the policy once for this step.
    #[instrument(skip_all, level = "trace", fields(steps = self.steps_since_build))]
    pub fn check(&mut self, current: &[Point3<f64>]) -> bool {
        if self.builds == 0 || self.state == ListState::Stale {
            self.state = ListState::Stale;
            return true;
        }
        let rebuild = should_rebuild(
            current,
            &self.reference,
            self.skin,
            self.steps_since_build,
            self.policy,
        );
        if rebuild {
            self.state = ListState::Stale;
            if let RebuildPolicy::Displacement { delay } = self.policy {
                if self.steps_since_build == delay.max(1) {
                    self.dangerous += 1;
                    debug!(
                        steps = self.steps_since_build,
                        "Dangerous rebuild: displacement limit reached on the first permitted check."
                    );
                }
            }
        }
        rebuild
    }

    /// Forces the next check to request a rebuild (e.g. after a box change).
    pub fn invalidate(&mut self) {
        self.state = ListState::Stale;
    }

    pub fn record_rebuild(&mut self, current: &[Point3<f64>]) {
        self.reference.clear();
        self.reference.extend_from_slice(current);
        self.steps_since_build = 0;
        self.state = ListState::Fresh;
        self.builds += 1;
    }

    pub fn advance(&mut self) {
        self.steps_since_build += 1;
    }

    /// Fails when the list in use may miss pairs: it was never built, it was marked
    /// stale, or some atom moved more than half the skin since it was built.
    pub fn ensure_fresh(&self, current: &[Point3<f64>]) -> Result<(), NeighborError> {
        let max_displacement = if current.len() == self.reference.len() {
            max_displacement(current, &self.reference)
        } else {
            f64::INFINITY
        };
        let half_skin = 0.5 * self.skin;
        if self.state == ListState::Stale || max_displacement > half_skin {
            return Err(NeighborError::StaleListUsed {
                steps_since_build: self.steps_since_build,
                max_displacement,
                half_skin,
            });
        }
        Ok(())
    }

    pub fn state(&self) -> ListState {
        self.state
    }

    pub fn steps_since_build(&self) -> usize {
        self.steps_since_build
    }

    pub fn builds(&self) -> usize {
        self.builds
    }

    pub fn dangerous_builds(&self) -> usize {
        self.dangerous
    }

    pub fn policy(&self) -> RebuildPolicy {
        self.policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(zs: &[f64]) -> Vec<Point3<f64>> {
        zs.iter().map(|&z| Point3::new(0.0, 0.0, z)).collect()
    }

    #[test]
    fn displacement_policy_triggers_only_beyond_half_skin() {
        let reference = points(&[0.0, 1.0, 5.0]);
        let policy = RebuildPolicy::default();
        assert!(!should_rebuild(&points(&[0.15, 1.0, 5.0]), &reference, 0.3, 1, policy));
        assert!(should_rebuild(&points(&[0.1500001, 1.0, 5.0]), &reference, 0.3, 1, policy));
    }

    #[test]
    fn displacement_policy_honors_delay() {
        let reference = points(&[0.0]);
        let moved = points(&[1.0]);
        let policy = RebuildPolicy::Displacement { delay: 3 };
        assert!(!should_rebuild(&moved, &reference, 0.3, 2, policy));
        assert!(should_rebuild(&moved, &reference, 0.3, 3, policy));
    }

    #[test]
    fn fixed_interval_ignores_motion() {
        let reference = points(&[0.0]);
        let policy = RebuildPolicy::FixedInterval { every: 5 };
        assert!(!should_rebuild(&points(&[9.0]), &reference, 0.3, 4, policy));
        assert!(should_rebuild(&reference, &reference, 0.3, 5, policy));
    }

    #[test]
    fn changed_atom_count_forces_rebuild() {
        assert!(should_rebuild(
            &points(&[0.0, 1.0]),
            &points(&[0.0]),
            0.3,
            0,
            RebuildPolicy::FixedInterval { every: 100 }
        ));
    }

    #[test]
    fn zero_skin_rebuilds_on_any_motion() {
        let reference = points(&[0.0]);
        assert!(should_rebuild(&points(&[1e-12]), &reference, 0.0, 1, RebuildPolicy::default()));
        assert!(!should_rebuild(&reference, &reference, 0.0, 1, RebuildPolicy::default()));
    }

    #[test]
    fn scheduler_walks_fresh_stale_fresh() {
        let mut scheduler = RebuildScheduler::new(RebuildPolicy::default(), 0.3);
        let start = points(&[0.0, 1.0]);
        assert!(scheduler.check(&start));
        assert!(scheduler.ensure_fresh(&start).is_err());

        scheduler.record_rebuild(&start);
        assert_eq!(scheduler.state(), ListState::Fresh);
        assert!(scheduler.ensure_fresh(&start).is_ok());

        scheduler.advance();
        scheduler.advance();
        let small = points(&[0.1, 1.0]);
        assert!(!scheduler.check(&small));
        assert!(scheduler.ensure_fresh(&small).is_ok());

        let large = points(&[0.2, 1.0]);
        assert!(scheduler.check(&large));
        assert_eq!(scheduler.state(), ListState::Stale);
        assert!(matches!(
            scheduler.ensure_fresh(&large),
            Err(NeighborError::StaleListUsed { steps_since_build: 2, .. })
        ));

        scheduler.record_rebuild(&large);
        assert_eq!(scheduler.steps_since_build(), 0);
        assert_eq!(scheduler.builds(), 2);
        assert_eq!(scheduler.dangerous_builds(), 0);
    }

    #[test]
    fn rebuild_on_first_permitted_check_is_counted_dangerous() {
        let mut scheduler = RebuildScheduler::new(RebuildPolicy::Displacement { delay: 2 }, 0.3);
        scheduler.record_rebuild(&points(&[0.0]));
        scheduler.advance();
        assert!(!scheduler.check(&points(&[1.0])));
        scheduler.advance();
        assert!(scheduler.check(&points(&[1.0])));
        assert_eq!(scheduler.dangerous_builds(), 1);
    }

    #[test]
    fn invalidate_forces_rebuild() {
        let mut scheduler = RebuildScheduler::new(RebuildPolicy::FixedInterval { every: 10 }, 0.3);
        let x = points(&[0.0]);
        scheduler.record_rebuild(&x);
        assert!(!scheduler.check(&x));
        scheduler.invalidate();
        assert!(scheduler.check(&x));
    }

    #[test]
    fn policy_deserializes_from_tagged_toml() {
        let policy: RebuildPolicy = toml::from_str("type = \"fixed-interval\"\nevery = 10").unwrap();
        assert_eq!(policy, RebuildPolicy::FixedInterval { every: 10 });
        let policy: RebuildPolicy = toml::from_str("type = \"displacement\"").unwrap();
        assert_eq!(policy, RebuildPolicy::Displacement { delay: 0 });
    }
}
