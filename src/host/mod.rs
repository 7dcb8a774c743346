//! Host state module.
//!
//! Provides per-pool capacity snapshots, host identifier parsing and the
//! thread-safe in-memory registry that feeds the scheduler.

mod error;
mod id;
mod pools;
mod refresher;
mod state;
#[cfg(test)]
mod tests;

pub use error::*;
pub use id::*;
pub use pools::*;
pub use refresher::*;
pub use state::*;

use crate::config::HostsConfig;
use crate::scheduler::RequestContext;
use chrono::{Duration, Utc};
use dashmap::DashMap;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Source of host snapshots for the scheduler.
///
/// Every call returns freshly cloned states. The scheduler mutates them
/// without locking, so implementations must never hand out shared references.
pub trait HostStateProvider: Send + Sync {
    /// All known hosts; disabled ones only when `consider_disabled` is set.
    fn get_all_host_states(&self, context: &RequestContext, consider_disabled: bool)
        -> Vec<HostState>;

    /// Pools matching `filters`. With `cached == false` the provider refreshes
    /// its source before answering.
    fn get_pools(
        &self,
        context: &RequestContext,
        filters: &PoolFilters,
        cached: bool,
    ) -> Result<Vec<PoolInfo>, HostError>;
}

/// The Host Registry stores the latest capability report of every pool.
///
/// Uses a lock-free concurrent map (DashMap) so the refresher can upsert
/// reports while scheduling calls take snapshots.
///
/// # Examples
///
/// ```
/// use berth::host::{Capacity, HostRegistry, HostState, HostStateProvider};
/// use berth::scheduler::RequestContext;
///
/// let registry = HostRegistry::new();
/// registry.update_host_capabilities(
///     HostState::new("node1@lvm#pool").with_capacity(Capacity::Finite(100), Capacity::Finite(60)),
/// );
///
/// let hosts = registry.get_all_host_states(&RequestContext::admin(), false);
/// assert_eq!(hosts.len(), 1);
/// ```
pub struct HostRegistry {
    hosts: DashMap<String, HostState>,
    source: Option<PathBuf>,
    service_down: Option<Duration>,
}

impl HostRegistry {
    /// Create a new empty registry with no backing source.
    pub fn new() -> Self {
        Self {
            hosts: DashMap::new(),
            source: None,
            service_down: None,
        }
    }

    /// Create a registry from the `[hosts]` configuration, loading the
    /// source file when one is configured.
    pub fn from_config(config: &HostsConfig) -> Result<Self, HostError> {
        let mut registry = Self::new();
        registry.source = config.source.clone();
        registry.service_down = config
            .service_down_seconds
            .map(|secs| Duration::seconds(secs as i64));

        if registry.source.is_some() {
            registry.reload()?;
        }
        Ok(registry)
    }

    /// Set the capability report file used by [`reload`](Self::reload).
    pub fn with_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = Some(path.into());
        self
    }

    /// Hosts whose last report is older than this are treated as down.
    pub fn with_service_down(mut self, window: Duration) -> Self {
        self.service_down = Some(window);
        self
    }

    /// Insert or replace the report for one pool.
    pub fn update_host_capabilities(&self, state: HostState) {
        tracing::trace!(host = %state.host, "Updating host capabilities");
        self.hosts.insert(state.host.clone(), state);
    }

    /// Remove a pool from the registry.
    ///
    /// # Errors
    ///
    /// Returns `HostError::HostNotFound` if no pool with the given id exists.
    pub fn remove_host(&self, host: &str) -> Result<HostState, HostError> {
        self.hosts
            .remove(host)
            .map(|(_, state)| state)
            .ok_or_else(|| HostError::HostNotFound(host.to_string()))
    }

    /// Enable or disable the service behind a pool.
    pub fn set_disabled(&self, host: &str, disabled: bool) -> Result<(), HostError> {
        let mut entry = self
            .hosts
            .get_mut(host)
            .ok_or_else(|| HostError::HostNotFound(host.to_string()))?;
        entry.disabled = disabled;
        Ok(())
    }

    /// Get a cloned snapshot of one pool.
    pub fn get_host(&self, host: &str) -> Option<HostState> {
        self.hosts.get(host).map(|entry| entry.value().clone())
    }

    /// Number of registered pools.
    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    /// Load a JSON array of host reports, replacing the registry contents.
    ///
    /// Pools absent from the file are pruned. Returns the number of pools loaded.
    pub fn load_reports(&self, path: &Path) -> Result<usize, HostError> {
        let content = std::fs::read_to_string(path).map_err(|source| HostError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let reports: Vec<HostState> =
            serde_json::from_str(&content).map_err(|source| HostError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let seen: HashSet<String> = reports.iter().map(|r| r.host.clone()).collect();
        self.hosts.retain(|id, _| seen.contains(id));

        let count = reports.len();
        for report in reports {
            self.update_host_capabilities(report);
        }

        tracing::debug!(path = %path.display(), hosts = count, "Loaded capability reports");
        Ok(count)
    }

    /// Re-read the configured source file.
    pub fn reload(&self) -> Result<usize, HostError> {
        let path = self.source.as_deref().ok_or(HostError::NoSource)?;
        self.load_reports(path)
    }

    fn is_up(&self, state: &HostState) -> bool {
        match self.service_down {
            Some(window) => Utc::now() - state.updated <= window,
            None => true,
        }
    }

    fn snapshot(&self, consider_disabled: bool) -> Vec<HostState> {
        let mut states: Vec<HostState> = self
            .hosts
            .iter()
            .filter(|entry| consider_disabled || !entry.disabled)
            .filter(|entry| {
                let up = self.is_up(entry.value());
                if !up {
                    tracing::debug!(host = %entry.host, "Skipping host with stale report");
                }
                up
            })
            .map(|entry| entry.value().clone())
            .collect();
        states.sort_by(|a, b| a.host.cmp(&b.host));
        states
    }
}

impl Default for HostRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HostStateProvider for HostRegistry {
    fn get_all_host_states(
        &self,
        _context: &RequestContext,
        consider_disabled: bool,
    ) -> Vec<HostState> {
        self.snapshot(consider_disabled)
    }

    fn get_pools(
        &self,
        _context: &RequestContext,
        filters: &PoolFilters,
        cached: bool,
    ) -> Result<Vec<PoolInfo>, HostError> {
        if !cached && self.source.is_some() {
            self.reload()?;
        }

        let compiled = filters.compile()?;
        Ok(self
            .snapshot(false)
            .into_iter()
            .map(PoolInfo::from)
            .filter(|info| compiled.matches(info))
            .collect())
    }
}
