use super::HostFilter;
use crate::host::{Capacity, HostState};
use crate::scheduler::FilterProperties;

/// Type spec that opts a resource out of thin provisioning when false.
pub const THIN_PROVISIONING_SPEC: &str = "thin_provisioning";

/// Rejects hosts without room for the requested size.
///
/// Thick pools need `free - reserved >= size`. Thin pools are bounded by
/// their over-subscription ratio instead. Extend requests are checked
/// against the size increase only.
pub struct CapacityFilter;

impl CapacityFilter {
    fn requested_size(props: &FilterProperties) -> u64 {
        if props.is_extend {
            props.size_increase.unwrap_or(props.size)
        } else {
            props.size
        }
    }

    fn uses_thin(host: &HostState, props: &FilterProperties) -> bool {
        let type_wants_thin = props
            .extra_specs()
            .and_then(|specs| specs.bool_value(THIN_PROVISIONING_SPEC));
        host.thin_provisioning && type_wants_thin != Some(false)
    }
}

impl HostFilter for CapacityFilter {
    fn name(&self) -> &'static str {
        "CapacityFilter"
    }

    fn host_passes(&self, host: &HostState, props: &FilterProperties) -> bool {
        let size = Self::requested_size(props);

        let free = match host.free_capacity_gb {
            Capacity::Finite(free) => free,
            Capacity::Infinite | Capacity::Unknown => return true,
        };

        let reserved = host.reserved_gb();
        let total = match host.total_capacity_gb {
            Capacity::Finite(0) => {
                tracing::warn!(host = %host.host, "Host reports zero total capacity");
                return false;
            }
            Capacity::Finite(total) => Some(total as f64),
            Capacity::Infinite | Capacity::Unknown => None,
        };
        let usable_free = (free as f64 - reserved).floor();

        if let (Some(total), true) = (total, Self::uses_thin(host, props)) {
            let provisioned = host
                .provisioned_capacity_gb
                .unwrap_or(host.allocated_capacity_gb) as f64;
            let provisioned_ratio = (provisioned + size as f64) / total;
            if provisioned_ratio > host.max_over_subscription_ratio {
                tracing::debug!(
                    host = %host.host,
                    provisioned_ratio,
                    max_ratio = host.max_over_subscription_ratio,
                    "Insufficient virtual capacity"
                );
                return false;
            }
            let adjusted_free_virtual = usable_free * host.max_over_subscription_ratio;
            return adjusted_free_virtual >= size as f64;
        }

        if usable_free < size as f64 {
            tracing::debug!(
                host = %host.host,
                requested = size,
                available = usable_free,
                "Insufficient free capacity"
            );
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{ExtraSpecs, ResourceType};

    fn thick(total: u64, free: u64) -> HostState {
        HostState::new("h1@b#p").with_capacity(Capacity::Finite(total), Capacity::Finite(free))
    }

    fn sized(size: u64) -> FilterProperties {
        FilterProperties {
            size,
            ..Default::default()
        }
    }

    #[test]
    fn test_thick_fits() {
        assert!(CapacityFilter.host_passes(&thick(100, 50), &sized(50)));
        assert!(!CapacityFilter.host_passes(&thick(100, 50), &sized(51)));
    }

    #[test]
    fn test_reserved_percentage_is_held_back() {
        let mut host = thick(100, 50);
        host.reserved_percentage = 10;
        assert!(CapacityFilter.host_passes(&host, &sized(40)));
        assert!(!CapacityFilter.host_passes(&host, &sized(41)));
    }

    #[test]
    fn test_unknown_and_infinite_free_pass() {
        let host = HostState::new("h").with_capacity(Capacity::Unknown, Capacity::Unknown);
        assert!(CapacityFilter.host_passes(&host, &sized(1_000_000)));
        let host = HostState::new("h").with_capacity(Capacity::Infinite, Capacity::Infinite);
        assert!(CapacityFilter.host_passes(&host, &sized(1_000_000)));
    }

    #[test]
    fn test_zero_total_fails() {
        assert!(!CapacityFilter.host_passes(&thick(0, 10), &sized(1)));
    }

    #[test]
    fn test_thin_over_subscription() {
        let mut host = thick(100, 10);
        host.thin_provisioning = true;
        host.max_over_subscription_ratio = 2.0;
        host.provisioned_capacity_gb = Some(150);

        // (150 + 40) / 100 = 1.9 <= 2.0, 10 * 2 = 20 < 40
        assert!(!CapacityFilter.host_passes(&host, &sized(40)));
        // (150 + 20) / 100 = 1.7, 20 >= 20
        assert!(CapacityFilter.host_passes(&host, &sized(20)));
        // (150 + 60) / 100 = 2.1 > 2.0
        host.free_capacity_gb = Capacity::Finite(90);
        assert!(!CapacityFilter.host_passes(&host, &sized(60)));
    }

    #[test]
    fn test_type_can_refuse_thin() {
        let mut host = thick(100, 10);
        host.thin_provisioning = true;
        host.max_over_subscription_ratio = 20.0;
        host.provisioned_capacity_gb = Some(0);

        let mut props = sized(50);
        assert!(CapacityFilter.host_passes(&host, &props));

        props.resource_type = Some(ResourceType::new(
            "thick",
            [(THIN_PROVISIONING_SPEC, "<is> False")]
                .into_iter()
                .collect::<ExtraSpecs>(),
        ));
        assert!(!CapacityFilter.host_passes(&host, &props));
    }

    #[test]
    fn test_extend_checks_increase_only() {
        let props = FilterProperties {
            size: 500,
            size_increase: Some(5),
            is_extend: true,
            ..Default::default()
        };
        assert!(CapacityFilter.host_passes(&thick(100, 10), &props));
    }
}
