//! Host filters.
//!
//! Each filter is a predicate over one host and the request's
//! [`FilterProperties`]. A chain runs filters in configured order; a host
//! survives only if every filter accepts it.

mod availability_zone;
mod capabilities;
mod capacity;
mod hosts;
mod replication;
mod retry;

pub use availability_zone::AvailabilityZoneFilter;
pub use capabilities::{CapabilitiesFilter, ConsistentSnapshotFilter};
pub use capacity::CapacityFilter;
pub use hosts::{AffinityFilter, AntiAffinityFilter, OnlyHostFilter};
pub use replication::{CreateFromSnapshotFilter, ShareReplicationFilter};
pub use retry::RetryFilter;

use super::{FilterProperties, SchedulerError};
use crate::host::{extract_host, HostLevel, HostState};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

/// Predicate deciding whether a host may receive the resource.
pub trait HostFilter: Send + Sync {
    /// Name used in configuration and diagnostics.
    fn name(&self) -> &'static str;

    /// Return true if the host passes.
    fn host_passes(&self, host: &HostState, props: &FilterProperties) -> bool;
}

/// Registration table of filters, keyed by name.
///
/// Custom filters are registered before the scheduler is built; names in
/// configuration are resolved against this table once, at construction.
#[derive(Clone, Default)]
pub struct FilterCatalog {
    filters: BTreeMap<&'static str, Arc<dyn HostFilter>>,
}

impl FilterCatalog {
    /// Empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog holding every built-in filter.
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        catalog.register(Arc::new(RetryFilter));
        catalog.register(Arc::new(OnlyHostFilter));
        catalog.register(Arc::new(AvailabilityZoneFilter));
        catalog.register(Arc::new(CapacityFilter));
        catalog.register(Arc::new(CapabilitiesFilter));
        catalog.register(Arc::new(ShareReplicationFilter));
        catalog.register(Arc::new(CreateFromSnapshotFilter));
        catalog.register(Arc::new(AffinityFilter));
        catalog.register(Arc::new(AntiAffinityFilter));
        catalog.register(Arc::new(ConsistentSnapshotFilter));
        catalog
    }

    /// Add or replace a filter under its own name.
    pub fn register(&mut self, filter: Arc<dyn HostFilter>) {
        self.filters.insert(filter.name(), filter);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn HostFilter>> {
        self.filters.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.filters.keys().copied().collect()
    }

    /// Resolve names in order.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidConfiguration` naming the first unknown filter.
    pub fn resolve<S: AsRef<str>>(
        &self,
        names: &[S],
    ) -> Result<Vec<Arc<dyn HostFilter>>, SchedulerError> {
        names
            .iter()
            .map(|name| {
                self.get(name.as_ref()).ok_or_else(|| {
                    SchedulerError::invalid_configuration(format!(
                        "unknown filter '{}'",
                        name.as_ref()
                    ))
                })
            })
            .collect()
    }
}

/// Ordered filter chain with a default filter list.
#[derive(Clone)]
pub struct FilterChain {
    catalog: Arc<FilterCatalog>,
    defaults: Vec<Arc<dyn HostFilter>>,
}

impl FilterChain {
    /// Build a chain whose default list is `names`, resolved in `catalog`.
    pub fn new<S: AsRef<str>>(
        catalog: Arc<FilterCatalog>,
        names: &[S],
    ) -> Result<Self, SchedulerError> {
        let defaults = catalog.resolve(names)?;
        Ok(Self { catalog, defaults })
    }

    /// Names of the default filters, in order.
    pub fn default_names(&self) -> Vec<&'static str> {
        self.defaults.iter().map(|f| f.name()).collect()
    }

    /// Run the filters over `hosts`.
    ///
    /// `filter_names` replaces the default list for this call. Returns the
    /// survivors in input order and the name of the last filter executed;
    /// the chain stops as soon as no host is left.
    pub fn get_filtered_hosts<'a>(
        &self,
        hosts: Vec<&'a HostState>,
        props: &FilterProperties,
        filter_names: Option<&[String]>,
    ) -> Result<(Vec<&'a HostState>, Option<&'static str>), SchedulerError> {
        let resolved;
        let filters = match filter_names {
            Some(names) => {
                resolved = self.catalog.resolve(names)?;
                &resolved
            }
            None => &self.defaults,
        };

        let mut hosts = hosts;
        let mut last_filter = None;

        for filter in filters {
            let start = Instant::now();
            let before = hosts.len();

            hosts.retain(|host| filter.host_passes(host, props));
            last_filter = Some(filter.name());

            let rejected = before - hosts.len();
            metrics::histogram!(
                "berth_filter_duration_seconds",
                "filter" => filter.name(),
            )
            .record(start.elapsed().as_secs_f64());
            if rejected > 0 {
                metrics::counter!(
                    "berth_filter_rejections_total",
                    "filter" => filter.name(),
                )
                .increment(rejected as u64);
            }

            tracing::trace!(
                filter = filter.name(),
                hosts_remaining = hosts.len(),
                rejected,
                "Filter completed"
            );

            if hosts.is_empty() {
                tracing::info!(filter = filter.name(), "Filter returned 0 hosts");
                break;
            }
        }

        Ok((hosts, last_filter))
    }
}

/// Whether `host` is the target named by a hint.
///
/// A target with a `#pool` segment must match exactly; otherwise any pool of
/// the named backend matches.
pub(crate) fn host_matches(target: &str, host: &str) -> bool {
    let target = target.trim();
    if target.contains('#') {
        target == host
    } else {
        extract_host(host, HostLevel::Backend, false).as_deref() == Some(target)
    }
}

/// Split a comma-separated hint into its non-empty entries.
pub(crate) fn hint_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty())
}
