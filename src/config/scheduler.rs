//! Scheduler configuration

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// Filter-and-weigh scheduler settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Attempts per logical request, including the first (1 disables retries)
    pub max_attempts: u32,
    /// Filters run for every placement, in order
    pub default_filters: Vec<String>,
    pub default_weighers: Vec<String>,
    /// Filters used instead of the defaults when validating an extend
    pub extend_filters: Vec<String>,
    /// Filters applied to the group type of a share group
    pub group_filters: Vec<String>,
    /// Extra-specs rewritten into `<is>` form before filtering
    pub boolean_extra_specs: Vec<String>,
    /// Extra-specs rewritten into `<is>` form for share group members
    pub required_extra_specs: Vec<String>,
    pub capacity_weight_multiplier: f64,
    pub allocated_capacity_weight_multiplier: f64,
    /// Free-form options exposed to filters as `config_options`
    pub options: BTreeMap<String, String>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            default_filters: names(&[
                "RetryFilter",
                "OnlyHostFilter",
                "AvailabilityZoneFilter",
                "CapacityFilter",
                "CapabilitiesFilter",
                "ShareReplicationFilter",
                "CreateFromSnapshotFilter",
                "AffinityFilter",
                "AntiAffinityFilter",
            ]),
            default_weighers: names(&["CapacityWeigher"]),
            extend_filters: names(&["CapacityFilter"]),
            group_filters: names(&["AvailabilityZoneFilter", "ConsistentSnapshotFilter"]),
            boolean_extra_specs: names(&[
                "driver_handles_share_servers",
                "snapshot_support",
                "create_share_from_snapshot_support",
                "revert_to_snapshot_support",
                "mount_snapshot_support",
            ]),
            required_extra_specs: names(&["driver_handles_share_servers"]),
            capacity_weight_multiplier: 1.0,
            allocated_capacity_weight_multiplier: -1.0,
            options: BTreeMap::new(),
        }
    }
}
