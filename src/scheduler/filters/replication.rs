//! Filters that tie placement to an existing replica or snapshot.

use super::HostFilter;
use crate::host::{same_backend, HostState};
use crate::scheduler::FilterProperties;

/// Type spec marking a replicated share type.
pub const REPLICATION_TYPE_SPEC: &str = "replication_type";

/// Keeps hosts in the active replica's replication domain that do not
/// already hold a replica.
pub struct ShareReplicationFilter;

impl HostFilter for ShareReplicationFilter {
    fn name(&self) -> &'static str {
        "ShareReplicationFilter"
    }

    fn host_passes(&self, host: &HostState, props: &FilterProperties) -> bool {
        let spec = &props.request_spec;
        let replicated = props
            .extra_specs()
            .is_some_and(|specs| specs.contains_key(REPLICATION_TYPE_SPEC));

        if !replicated {
            return true;
        }
        let Some(host_domain) = host.replication_domain.as_deref() else {
            tracing::debug!(host = %host.host, "Replication is not enabled on host");
            return false;
        };
        let Some(active_replica_host) = spec.active_replica_host.as_deref() else {
            // Creating the first instance; type matching is the capabilities filter's job
            return true;
        };

        if props.replication_domain.as_deref() != Some(host_domain) {
            tracing::debug!(
                host = %host.host,
                host_domain,
                active_replica_host,
                active_domain = props.replication_domain.as_deref().unwrap_or_default(),
                "Replication domain does not match the active replica's"
            );
            return false;
        }

        if spec.all_replica_hosts.iter().any(|h| h == &host.host) {
            tracing::debug!(host = %host.host, "Host already holds a replica of this share");
            return false;
        }
        true
    }
}

/// Keeps hosts able to create a share from the requested snapshot: the
/// snapshot's own backend or a backend in the same replication domain.
pub struct CreateFromSnapshotFilter;

impl HostFilter for CreateFromSnapshotFilter {
    fn name(&self) -> &'static str {
        "CreateFromSnapshotFilter"
    }

    fn host_passes(&self, host: &HostState, props: &FilterProperties) -> bool {
        let (Some(_), Some(snapshot_host)) = (
            props.snapshot_id.as_deref(),
            props.request_spec.snapshot_host.as_deref(),
        ) else {
            return true;
        };

        if same_backend(snapshot_host, &host.host) {
            return true;
        }

        match (props.replication_domain.as_deref(), host.replication_domain.as_deref()) {
            (Some(wanted), Some(have)) => wanted == have,
            _ => false,
        }
    }
}
