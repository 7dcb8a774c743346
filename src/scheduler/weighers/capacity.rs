use super::HostWeigher;
use crate::host::{Capacity, HostState};
use crate::scheduler::FilterProperties;

/// Prefers hosts with the most usable free space.
///
/// Thin pools count virtual free space (total scaled by the
/// over-subscription ratio, minus what is already provisioned). Hosts
/// reporting infinite space rank above every finite host; hosts reporting
/// unknown space rank last for a positive multiplier.
pub struct CapacityWeigher {
    multiplier: f64,
}

impl CapacityWeigher {
    pub fn new(multiplier: f64) -> Self {
        Self { multiplier }
    }
}

impl HostWeigher for CapacityWeigher {
    fn name(&self) -> &'static str {
        "CapacityWeigher"
    }

    fn multiplier(&self) -> f64 {
        self.multiplier
    }

    fn weigh(&self, host: &HostState, _props: &FilterProperties) -> f64 {
        let reserved = host.reserved_gb();
        match (host.total_capacity_gb, host.free_capacity_gb) {
            (Capacity::Unknown, _) | (_, Capacity::Unknown) => {
                if self.multiplier > 0.0 {
                    f64::NEG_INFINITY
                } else {
                    f64::INFINITY
                }
            }
            (Capacity::Infinite, _) | (_, Capacity::Infinite) => f64::INFINITY,
            (Capacity::Finite(total), Capacity::Finite(free)) => {
                if host.thin_provisioning {
                    let provisioned = host
                        .provisioned_capacity_gb
                        .unwrap_or(host.allocated_capacity_gb) as f64;
                    (total as f64 * host.max_over_subscription_ratio - provisioned - reserved)
                        .floor()
                } else {
                    (free as f64 - reserved).floor()
                }
            }
        }
    }

    fn weigh_all(&self, hosts: &[&HostState], props: &FilterProperties) -> Vec<f64> {
        let raw: Vec<f64> = hosts.iter().map(|h| self.weigh(h, props)).collect();

        // Map unbounded scores just outside the finite range so normalisation
        // keeps their rank.
        let finite = raw.iter().copied().filter(|v| v.is_finite());
        let min = finite.clone().fold(f64::INFINITY, f64::min);
        let max = finite.fold(f64::NEG_INFINITY, f64::max);
        let (min, max) = if min.is_finite() { (min, max) } else { (0.0, 0.0) };

        raw.into_iter()
            .map(|v| {
                if v == f64::INFINITY {
                    max + 1.0
                } else if v == f64::NEG_INFINITY {
                    min - 1.0
                } else {
                    v
                }
            })
            .collect()
    }
}

/// Scores hosts by allocated capacity. The default negative multiplier
/// spreads resources across lightly used hosts.
pub struct AllocatedCapacityWeigher {
    multiplier: f64,
}

impl AllocatedCapacityWeigher {
    pub fn new(multiplier: f64) -> Self {
        Self { multiplier }
    }
}

impl HostWeigher for AllocatedCapacityWeigher {
    fn name(&self) -> &'static str {
        "AllocatedCapacityWeigher"
    }

    fn multiplier(&self) -> f64 {
        self.multiplier
    }

    fn weigh(&self, host: &HostState, _props: &FilterProperties) -> f64 {
        host.allocated_capacity_gb as f64
    }
}
