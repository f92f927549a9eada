use super::comm::GhostExchange;
use super::config::NeighborConfig;
use super::error::EngineError;
use super::metrics::{MetricsSink, Stage, timed};
use super::scheduler::{ListState, RebuildScheduler};
use crate::core::models::atoms::AtomSet;
use crate::core::models::domain::{Domain, GeometryError};
use crate::core::neighbor::bins::BinGrid;
use crate::core::neighbor::cutoffs::CutoffTable;
use crate::core::neighbor::list::{NeighborList, NeighborStats};
use crate::core::neighbor::stencil::{Stencil, StencilKey};
use crate::core::neighbor::NeighborError;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Ghosts were refreshed in place and the previous list still applies.
    Reused,
    Rebuilt,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ManagerStats {
    pub builds: usize,
    pub capacity_retries: usize,
    pub stencil_builds: usize,
    pub dangerous_builds: usize,
    pub capacity: usize,
    pub neighbors: NeighborStats,
}

/// Owns everything a neighbor list depends on between steps: the rebuild scheduler,
/// the cached stencil, the current list and its per-atom capacity.
#[derive(Debug)]
pub struct NeighborManager {
    config: NeighborConfig,
    cutneighsq: CutoffTable,
    cutghost: f64,
    scheduler: RebuildScheduler,
    stencil: Option<Stencil>,
    list: NeighborList,
    capacity: usize,
    last_domain: Option<Domain>,
    builds: usize,
    capacity_retries: usize,
    stencil_builds: usize,
}

impl NeighborManager {
    /// `cutoffs` are the interaction cutoffs per type pair, without skin.
    pub fn new(config: NeighborConfig, cutoffs: &CutoffTable) -> Result<Self, EngineError> {
        let max_cut = cutoffs.max();
        if !(max_cut.is_finite() && max_cut > 0.0) {
            return Err(NeighborError::from(GeometryError::NonPositiveCutoff(max_cut)).into());
        }
        if !(config.skin.is_finite() && config.skin >= 0.0) {
            return Err(NeighborError::from(GeometryError::InvalidSkin(config.skin)).into());
        }
        Ok(Self {
            cutneighsq: cutoffs.neighbor_squared(config.skin),
            cutghost: max_cut + config.skin,
            scheduler: RebuildScheduler::new(config.policy, config.skin),
            stencil: None,
            list: NeighborList::empty(config.listing),
            capacity: config.one_atom,
            last_domain: None,
            builds: 0,
            capacity_retries: 0,
            stencil_builds: 0,
            config,
        })
    }

    /// Width of the ghost shell: the largest interaction cutoff plus the skin.
    pub fn cutghost(&self) -> f64 {
        self.cutghost
    }

    pub fn config(&self) -> &NeighborConfig {
        &self.config
    }

    /// Builds the first list unconditionally.
    pub fn setup<G, M>(
        &mut self,
        domain: &Domain,
        atoms: &mut AtomSet,
        comm: &mut G,
        metrics: &M,
    ) -> Result<(), EngineError>
    where
        G: GhostExchange,
        M: MetricsSink + ?Sized,
    {
        self.scheduler.invalidate();
        self.update(domain, atoms, comm, metrics).map(|_| ())
    }

    /// Per-step neighbor maintenance, called once per step after atoms moved.
    ///
    /// A rebuild happens when the box changed since the last build or the scheduler
    /// asks for one; otherwise only ghost positions are refreshed.
    #[instrument(skip_all, name = "neighbor_update")]
    pub fn update<G, M>(
        &mut self,
        domain: &Domain,
        atoms: &mut AtomSet,
        comm: &mut G,
        metrics: &M,
    ) -> Result<UpdateOutcome, EngineError>
    where
        G: GhostExchange,
        M: MetricsSink + ?Sized,
    {
        self.scheduler.advance();
        if self.last_domain.as_ref() != Some(domain) {
            self.scheduler.invalidate();
        }
        if !self.scheduler.check(atoms.local_positions()) {
            timed(metrics, Stage::Comm, || comm.forward_positions(atoms))?;
            return Ok(UpdateOutcome::Reused);
        }
        self.rebuild(domain, atoms, comm, metrics)?;
        Ok(UpdateOutcome::Rebuilt)
    }

    fn rebuild<G, M>(
        &mut self,
        domain: &Domain,
        atoms: &mut AtomSet,
        comm: &mut G,
        metrics: &M,
    ) -> Result<(), EngineError>
    where
        G: GhostExchange,
        M: MetricsSink + ?Sized,
    {
        for x in atoms.local_positions_mut() {
            domain.remap(x);
        }
        timed(metrics, Stage::Comm, || {
            comm.exchange(domain, atoms, self.cutghost)
        })?;

        let grid = timed(metrics, Stage::Bin, || {
            BinGrid::rebin(domain, atoms, self.cutghost, self.config.bins_per_cutoff)
        })?;

        let key = StencilKey {
            geometry: grid.geometry(),
            cutneighsq: self.cutneighsq.clone(),
            mode: self.config.listing,
        };
        let stencil = match self.stencil.take() {
            Some(stencil) if stencil.is_valid_for(&key) => stencil,
            _ => {
                let stencil = timed(metrics, Stage::Stencil, || {
                    Stencil::build(key.geometry, &key.cutneighsq, key.mode)
                });
                self.stencil_builds += 1;
                debug!(
                    offsets = stencil.len(),
                    dims = ?key.geometry.dims,
                    "Stencil rebuilt."
                );
                stencil
            }
        };

        let list = timed(metrics, Stage::Build, || self.build_with_retries(&grid, &stencil, atoms));
        self.stencil = Some(stencil);
        self.list = list?;

        self.scheduler.record_rebuild(atoms.local_positions());
        self.last_domain = Some(domain.clone());
        self.builds += 1;
        debug!(
            build = self.builds,
            pairs = self.list.total_pairs(),
            ghosts = atoms.nghost(),
            "Neighbor list rebuilt."
        );
        Ok(())
    }

    /// Builds the list, growing the per-atom capacity after every overflow. Each
    /// attempt starts from scratch, so a retry cannot duplicate entries.
    fn build_with_retries(
        &mut self,
        grid: &BinGrid,
        stencil: &Stencil,
        atoms: &AtomSet,
    ) -> Result<NeighborList, EngineError> {
        let mut retries = 0;
        loop {
            match NeighborList::build(grid, stencil, atoms, &self.cutneighsq, self.capacity) {
                Ok(list) => return Ok(list),
                Err(NeighborError::CapacityExceeded {
                    tag,
                    needed,
                    capacity,
                }) if retries < self.config.max_build_retries => {
                    let grown = needed.max(capacity.saturating_mul(2));
                    warn!(
                        %tag,
                        needed,
                        capacity,
                        grown,
                        "Neighbor capacity exceeded; growing storage and rebuilding."
                    );
                    self.capacity = grown;
                    self.capacity_retries += 1;
                    retries += 1;
                }
                Err(NeighborError::CapacityExceeded { capacity, .. }) => {
                    return Err(EngineError::CapacityRetriesExhausted { retries, capacity });
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// The current list. Callers must have run [`update`](Self::update) this step.
    pub fn list(&self) -> &NeighborList {
        debug_assert!(
            self.scheduler.state() == ListState::Fresh,
            "neighbor list used while stale"
        );
        &self.list
    }

    /// The current list, after verifying that no atom moved more than half the skin
    /// since it was built.
    pub fn checked_list(&self, atoms: &AtomSet) -> Result<&NeighborList, NeighborError> {
        self.scheduler.ensure_fresh(atoms.local_positions())?;
        Ok(&self.list)
    }

    pub fn stencil(&self) -> Option<&Stencil> {
        self.stencil.as_ref()
    }

    pub fn stats(&self) -> ManagerStats {
        ManagerStats {
            builds: self.builds,
            capacity_retries: self.capacity_retries,
            stencil_builds: self.stencil_builds,
            dangerous_builds: self.scheduler.dangerous_builds(),
            capacity: self.capacity,
            neighbors: self.list.stats(),
        }
    }

    pub fn log_summary(&self) {
        let stats = self.stats();
        info!(
            builds = stats.builds,
            dangerous = stats.dangerous_builds,
            stencil_builds = stats.stencil_builds,
            capacity_retries = stats.capacity_retries,
            total_neighbors = stats.neighbors.total,
            min = stats.neighbors.min,
            max = stats.neighbors.max,
            mean = format_args!("{:.3}", stats.neighbors.mean),
            "Neighbor statistics."
        );
    }
}
