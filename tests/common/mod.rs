//! Shared builders for Berth integration tests.
//!
//! Provides pools, share types, a fixed-fleet provider and scheduler
//! constructors so each test file only states what it checks.

#![allow(dead_code)]

use berth::config::SchedulerConfig;
use berth::host::{Capacity, HostError, HostState, HostStateProvider, PoolFilters, PoolInfo};
use berth::scheduler::message::MemoryMessageSink;
use berth::scheduler::{ExtraSpecs, FilterScheduler, RequestContext, RequestSpec, ResourceType};
use std::path::PathBuf;
use std::sync::Arc;

// =============================================================================
// Host Builders
// =============================================================================

/// Thick pool with 1000 GiB total exporting NFS and CIFS.
pub fn pool(id: &str, free: u64) -> HostState {
    let mut host =
        HostState::new(id).with_capacity(Capacity::Finite(1000), Capacity::Finite(free));
    host.storage_protocol = Some("NFS_CIFS".to_string());
    host
}

/// Pool advertising one capability.
pub fn pool_with(id: &str, free: u64, key: &str, value: &str) -> HostState {
    pool(id, free).with_capability(key, value)
}

// =============================================================================
// Request Builders
// =============================================================================

pub fn share_type(specs: &[(&str, &str)]) -> ResourceType {
    ResourceType::new("default", specs.iter().copied().collect::<ExtraSpecs>())
}

pub fn share_request(id: &str, size: u64) -> RequestSpec {
    RequestSpec::new(id, size, share_type(&[]))
}

pub fn tenant() -> RequestContext {
    RequestContext::new("user-1", "project-1")
}

// =============================================================================
// Providers and Schedulers
// =============================================================================

/// Provider returning clones of a fixed fleet.
pub struct FixedFleet {
    pub hosts: Vec<HostState>,
}

impl HostStateProvider for FixedFleet {
    fn get_all_host_states(
        &self,
        _context: &RequestContext,
        consider_disabled: bool,
    ) -> Vec<HostState> {
        self.hosts
            .iter()
            .filter(|h| consider_disabled || !h.disabled)
            .cloned()
            .collect()
    }

    fn get_pools(
        &self,
        _context: &RequestContext,
        filters: &PoolFilters,
        _cached: bool,
    ) -> Result<Vec<PoolInfo>, HostError> {
        let compiled = filters.compile()?;
        Ok(self
            .hosts
            .iter()
            .cloned()
            .map(PoolInfo::from)
            .filter(|p| compiled.matches(p))
            .collect())
    }
}

/// Scheduler over a fixed fleet with the given configuration.
pub fn scheduler_with(
    config: &SchedulerConfig,
    hosts: Vec<HostState>,
) -> (FilterScheduler, Arc<MemoryMessageSink>) {
    let sink = Arc::new(MemoryMessageSink::new());
    let scheduler =
        FilterScheduler::new(config, Arc::new(FixedFleet { hosts }), sink.clone()).unwrap();
    (scheduler, sink)
}

/// Scheduler over a fixed fleet with default configuration.
pub fn scheduler(hosts: Vec<HostState>) -> (FilterScheduler, Arc<MemoryMessageSink>) {
    scheduler_with(&SchedulerConfig::default(), hosts)
}

// =============================================================================
// Files
// =============================================================================

/// Write a host report file into `dir` and return its path.
pub fn write_hosts_file(dir: &tempfile::TempDir, hosts: &[HostState]) -> PathBuf {
    let path = dir.path().join("hosts.json");
    std::fs::write(&path, serde_json::to_string_pretty(hosts).unwrap()).unwrap();
    path
}

/// Write a JSON value into `dir` under `name` and return its path.
pub fn write_json(dir: &tempfile::TempDir, name: &str, value: &serde_json::Value) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, serde_json::to_string(value).unwrap()).unwrap();
    path
}
