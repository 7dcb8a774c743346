use super::HostFilter;
use crate::host::HostState;
use crate::scheduler::FilterProperties;

/// Group-type spec naming the required consistent snapshot level.
pub const CONSISTENT_SNAPSHOT_SPEC: &str = "consistent_snapshot_support";
/// Host capability advertising the consistent snapshot level.
pub const CONSISTENT_SNAPSHOT_CAPABILITY: &str = "sg_consistent_snapshot_support";

/// Matches the resolved type's extra-specs against host capabilities.
pub struct CapabilitiesFilter;

impl HostFilter for CapabilitiesFilter {
    fn name(&self) -> &'static str {
        "CapabilitiesFilter"
    }

    fn host_passes(&self, host: &HostState, props: &FilterProperties) -> bool {
        let Some(specs) = props.extra_specs() else {
            return true;
        };

        let passes = specs.satisfied_by(host);
        if !passes {
            tracing::debug!(host = %host.host, "Host fails resource type capabilities");
        }
        passes
    }
}

/// Keeps hosts that offer the consistent snapshot level a group type asks for.
pub struct ConsistentSnapshotFilter;

impl HostFilter for ConsistentSnapshotFilter {
    fn name(&self) -> &'static str {
        "ConsistentSnapshotFilter"
    }

    fn host_passes(&self, host: &HostState, props: &FilterProperties) -> bool {
        let required = props
            .group_type
            .as_ref()
            .and_then(|t| t.extra_specs.get(CONSISTENT_SNAPSHOT_SPEC));

        match required {
            Some(predicate) => {
                predicate.matches(host.capability(CONSISTENT_SNAPSHOT_CAPABILITY).as_deref())
            }
            None => true,
        }
    }
}
