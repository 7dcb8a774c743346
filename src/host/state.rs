use crate::scheduler::ResourceProperties;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Capacity figure reported by a backend, in GiB.
///
/// Backends that cannot (or will not) report a number say `"infinite"` or
/// `"unknown"`; both are accepted on the wire alongside plain integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "CapacityRepr", into = "CapacityRepr")]
pub enum Capacity {
    /// A concrete amount of GiB
    Finite(u64),
    /// No upper bound
    Infinite,
    /// Backend did not report a value
    #[default]
    Unknown,
}

impl Capacity {
    /// Returns the finite value, if any.
    pub fn finite(self) -> Option<u64> {
        match self {
            Capacity::Finite(gb) => Some(gb),
            Capacity::Infinite | Capacity::Unknown => None,
        }
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capacity::Finite(gb) => write!(f, "{}", gb),
            Capacity::Infinite => write!(f, "infinite"),
            Capacity::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum CapacityRepr {
    Gb(u64),
    Word(String),
}

impl TryFrom<CapacityRepr> for Capacity {
    type Error = String;

    fn try_from(repr: CapacityRepr) -> Result<Self, Self::Error> {
        match repr {
            CapacityRepr::Gb(gb) => Ok(Capacity::Finite(gb)),
            CapacityRepr::Word(word) => match word.to_lowercase().as_str() {
                "infinite" => Ok(Capacity::Infinite),
                "unknown" => Ok(Capacity::Unknown),
                other => other
                    .parse::<u64>()
                    .map(Capacity::Finite)
                    .map_err(|_| format!("invalid capacity value: {}", word)),
            },
        }
    }
}

impl From<Capacity> for CapacityRepr {
    fn from(capacity: Capacity) -> Self {
        match capacity {
            Capacity::Finite(gb) => CapacityRepr::Gb(gb),
            other => CapacityRepr::Word(other.to_string()),
        }
    }
}

fn default_over_subscription_ratio() -> f64 {
    20.0
}

/// Snapshot of one backend pool's capacity and capabilities.
///
/// Host states are handed out as independent copies for each scheduling
/// pass. [`HostState::consume_from_resource`] mutates only that copy.
///
/// # Examples
///
/// ```
/// use berth::host::{Capacity, HostState};
/// use berth::scheduler::ResourceProperties;
///
/// let mut host = HostState::new("node1@lvm#pool")
///     .with_capacity(Capacity::Finite(100), Capacity::Finite(80));
/// host.consume_from_resource(&ResourceProperties::with_size(10));
/// assert_eq!(host.free_capacity_gb, Capacity::Finite(70));
/// assert_eq!(host.allocated_capacity_gb, 10);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostState {
    /// Identifier in `host@backend#pool` form
    pub host: String,
    /// Availability zone the backend serves
    #[serde(default)]
    pub availability_zone: Option<String>,
    /// Configured backend name
    #[serde(default)]
    pub share_backend_name: Option<String>,
    /// Protocols the backend exports (e.g. `NFS_CIFS`)
    #[serde(default)]
    pub storage_protocol: Option<String>,
    #[serde(default)]
    pub total_capacity_gb: Capacity,
    #[serde(default)]
    pub free_capacity_gb: Capacity,
    #[serde(default)]
    pub allocated_capacity_gb: u64,
    #[serde(default)]
    pub provisioned_capacity_gb: Option<u64>,
    /// Percentage of total capacity held back from placement
    #[serde(default)]
    pub reserved_percentage: u8,
    #[serde(default)]
    pub thin_provisioning: bool,
    #[serde(default = "default_over_subscription_ratio")]
    pub max_over_subscription_ratio: f64,
    /// Opaque tag shared by hosts that can replicate to each other
    #[serde(default)]
    pub replication_domain: Option<String>,
    /// Free-form capabilities matched against extra-specs
    #[serde(default)]
    pub capabilities: BTreeMap<String, String>,
    /// Service disabled by an operator
    #[serde(default)]
    pub disabled: bool,
    /// Time of the last capability report (or virtual consumption)
    #[serde(default = "Utc::now")]
    pub updated: DateTime<Utc>,
}

impl HostState {
    /// Create a host state with unknown capacity and no capabilities.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            availability_zone: None,
            share_backend_name: None,
            storage_protocol: None,
            total_capacity_gb: Capacity::Unknown,
            free_capacity_gb: Capacity::Unknown,
            allocated_capacity_gb: 0,
            provisioned_capacity_gb: None,
            reserved_percentage: 0,
            thin_provisioning: false,
            max_over_subscription_ratio: default_over_subscription_ratio(),
            replication_domain: None,
            capabilities: BTreeMap::new(),
            disabled: false,
            updated: Utc::now(),
        }
    }

    /// Set total and free capacity.
    pub fn with_capacity(mut self, total: Capacity, free: Capacity) -> Self {
        self.total_capacity_gb = total;
        self.free_capacity_gb = free;
        self
    }

    /// Add a free-form capability.
    pub fn with_capability(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.capabilities.insert(key.into(), value.into());
        self
    }

    /// Reserved GiB derived from `reserved_percentage` of a finite total.
    pub fn reserved_gb(&self) -> f64 {
        match self.total_capacity_gb {
            Capacity::Finite(total) => {
                (total as f64 * f64::from(self.reserved_percentage) / 100.0).floor()
            }
            Capacity::Infinite | Capacity::Unknown => 0.0,
        }
    }

    /// Look up a capability by name.
    ///
    /// The free-form map wins; well-known report fields are consulted after it.
    pub fn capability(&self, key: &str) -> Option<String> {
        if let Some(value) = self.capabilities.get(key) {
            return Some(value.clone());
        }
        match key {
            "storage_protocol" => self.storage_protocol.clone(),
            "share_backend_name" => self.share_backend_name.clone(),
            "availability_zone" => self.availability_zone.clone(),
            "replication_domain" => self.replication_domain.clone(),
            "thin_provisioning" => Some(self.thin_provisioning.to_string()),
            "reserved_percentage" => Some(self.reserved_percentage.to_string()),
            "total_capacity_gb" => Some(self.total_capacity_gb.to_string()),
            "free_capacity_gb" => Some(self.free_capacity_gb.to_string()),
            _ => None,
        }
    }

    /// Virtually debit the resource from this snapshot.
    ///
    /// Free capacity shrinks only when it is a finite figure; allocated and
    /// provisioned capacity always grow. Calling this twice for the same
    /// resource double-counts it.
    pub fn consume_from_resource(&mut self, resource: &ResourceProperties) {
        let size = resource.size;

        if let Capacity::Finite(free) = self.free_capacity_gb {
            self.free_capacity_gb = Capacity::Finite(free.saturating_sub(size));
        }
        self.allocated_capacity_gb = self.allocated_capacity_gb.saturating_add(size);
        self.provisioned_capacity_gb = Some(
            self.provisioned_capacity_gb
                .unwrap_or(0)
                .saturating_add(size),
        );
        self.updated = Utc::now();
    }
}
