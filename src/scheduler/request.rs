use super::ExtraSpecs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metadata key requesting placement on the same backend as other resources.
pub const AFFINITY_KEY: &str = "__affinity_same_host";
/// Metadata key requesting placement away from other resources' backends.
pub const ANTI_AFFINITY_KEY: &str = "__affinity_different_host";

/// A share type or share group type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceType {
    pub id: Option<String>,
    pub name: Option<String>,
    pub extra_specs: ExtraSpecs,
}

impl ResourceType {
    pub fn new(name: impl Into<String>, extra_specs: ExtraSpecs) -> Self {
        Self {
            id: None,
            name: Some(name.into()),
            extra_specs,
        }
    }
}

/// Properties of the resource being placed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceProperties {
    /// Requested size in GiB
    pub size: u64,
    pub user_id: Option<String>,
    pub project_id: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub snapshot_id: Option<String>,
    /// Wire protocol (NFS, CIFS, ...)
    pub protocol: Option<String>,
}

impl ResourceProperties {
    pub fn with_size(size: u64) -> Self {
        Self {
            size,
            ..Default::default()
        }
    }
}

/// Per-instance properties (one replica or instance of a resource).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceProperties {
    pub id: Option<String>,
    pub availability_zone_id: Option<String>,
}

/// Caller-supplied description of what to provision.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestSpec {
    /// Logical resource id (share id)
    pub resource_id: Option<String>,
    pub resource_properties: ResourceProperties,
    pub instance_properties: InstanceProperties,
    /// Protocol override; falls back to `resource_properties.protocol`
    pub protocol: Option<String>,
    /// Type of a single resource, or the group type in group flows
    pub resource_type: Option<ResourceType>,
    pub group_id: Option<String>,
    /// One type per group member
    pub member_types: Vec<ResourceType>,
    pub active_replica_host: Option<String>,
    pub snapshot_host: Option<String>,
    /// Hosts of every existing replica
    pub all_replica_hosts: Vec<String>,
    pub is_extend: bool,
}

impl RequestSpec {
    /// Spec for a new resource of `size` GiB with the given type.
    pub fn new(resource_id: impl Into<String>, size: u64, resource_type: ResourceType) -> Self {
        Self {
            resource_id: Some(resource_id.into()),
            resource_properties: ResourceProperties::with_size(size),
            resource_type: Some(resource_type),
            ..Default::default()
        }
    }

    /// Protocol declared by the request, if any.
    pub fn effective_protocol(&self) -> Option<&str> {
        self.protocol
            .as_deref()
            .or(self.resource_properties.protocol.as_deref())
    }
}
