//! Host weighers.
//!
//! Every weigher scores all surviving hosts. Scores are min-max normalised
//! per weigher, scaled by the weigher's multiplier and summed. The result is
//! sorted best first; ties keep their input order.

mod capacity;

pub use capacity::{AllocatedCapacityWeigher, CapacityWeigher};

use super::{FilterProperties, SchedulerError};
use crate::host::HostState;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

/// Scoring function over one host.
pub trait HostWeigher: Send + Sync {
    /// Name used in configuration and diagnostics.
    fn name(&self) -> &'static str;

    /// Scale applied to the normalised score. Negative values invert the ranking.
    fn multiplier(&self) -> f64 {
        1.0
    }

    /// Raw score of one host.
    fn weigh(&self, host: &HostState, props: &FilterProperties) -> f64;

    /// Raw scores of all hosts, in order. Override to post-process the set.
    fn weigh_all(&self, hosts: &[&HostState], props: &FilterProperties) -> Vec<f64> {
        hosts.iter().map(|host| self.weigh(host, props)).collect()
    }
}

/// A host with its aggregate weight.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeighedHost {
    pub host_state: HostState,
    pub weight: f64,
}

impl WeighedHost {
    /// Identifier of the underlying host.
    pub fn host(&self) -> &str {
        &self.host_state.host
    }
}

/// Min-max normalise into `[0, 1]`. A flat list normalises to zeros.
pub fn normalize(values: &[f64]) -> Vec<f64> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;

    if !range.is_finite() || range == 0.0 {
        return vec![0.0; values.len()];
    }
    values.iter().map(|v| (v - min) / range).collect()
}

/// Registration table of weighers, keyed by name.
#[derive(Clone, Default)]
pub struct WeigherCatalog {
    weighers: BTreeMap<&'static str, Arc<dyn HostWeigher>>,
}

impl WeigherCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog holding every built-in weigher with the given multipliers.
    pub fn builtin(capacity_multiplier: f64, allocated_capacity_multiplier: f64) -> Self {
        let mut catalog = Self::new();
        catalog.register(Arc::new(CapacityWeigher::new(capacity_multiplier)));
        catalog.register(Arc::new(AllocatedCapacityWeigher::new(
            allocated_capacity_multiplier,
        )));
        catalog
    }

    pub fn register(&mut self, weigher: Arc<dyn HostWeigher>) {
        self.weighers.insert(weigher.name(), weigher);
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.weighers.keys().copied().collect()
    }

    /// Resolve names in order.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidConfiguration` naming the first unknown weigher.
    pub fn resolve<S: AsRef<str>>(
        &self,
        names: &[S],
    ) -> Result<Vec<Arc<dyn HostWeigher>>, SchedulerError> {
        names
            .iter()
            .map(|name| {
                self.weighers.get(name.as_ref()).cloned().ok_or_else(|| {
                    SchedulerError::invalid_configuration(format!(
                        "unknown weigher '{}'",
                        name.as_ref()
                    ))
                })
            })
            .collect()
    }
}

/// Ordered list of weighers applied to every scheduling pass.
#[derive(Clone)]
pub struct WeigherChain {
    weighers: Vec<Arc<dyn HostWeigher>>,
}

impl WeigherChain {
    pub fn new(weighers: Vec<Arc<dyn HostWeigher>>) -> Self {
        Self { weighers }
    }

    /// Build a chain from catalog names.
    pub fn from_names<S: AsRef<str>>(
        catalog: &WeigherCatalog,
        names: &[S],
    ) -> Result<Self, SchedulerError> {
        Ok(Self::new(catalog.resolve(names)?))
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.weighers.iter().map(|w| w.name()).collect()
    }

    /// Score `hosts` and return them best first.
    pub fn get_weighed_hosts(
        &self,
        hosts: &[&HostState],
        props: &FilterProperties,
    ) -> Vec<WeighedHost> {
        let mut totals = vec![0.0; hosts.len()];

        for weigher in &self.weighers {
            let start = Instant::now();
            let raw = weigher.weigh_all(hosts, props);
            let multiplier = weigher.multiplier();

            for (total, score) in totals.iter_mut().zip(normalize(&raw)) {
                *total += multiplier * score;
            }

            metrics::histogram!(
                "berth_weigher_duration_seconds",
                "weigher" => weigher.name(),
            )
            .record(start.elapsed().as_secs_f64());
        }

        let mut weighed: Vec<WeighedHost> = hosts
            .iter()
            .zip(totals)
            .map(|(host, weight)| WeighedHost {
                host_state: (*host).clone(),
                weight,
            })
            .collect();
        weighed.sort_by(|a, b| b.weight.total_cmp(&a.weight));

        tracing::debug!(
            hosts = ?weighed.iter().map(|w| (w.host(), w.weight)).collect::<Vec<_>>(),
            "Weighed hosts"
        );
        weighed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ByName;

    impl HostWeigher for ByName {
        fn name(&self) -> &'static str {
            "ByName"
        }
        fn weigh(&self, host: &HostState, _props: &FilterProperties) -> f64 {
            host.host.trim_start_matches('h').parse().unwrap_or(0.0)
        }
    }

    struct Constant;

    impl HostWeigher for Constant {
        fn name(&self) -> &'static str {
            "Constant"
        }
        fn weigh(&self, _host: &HostState, _props: &FilterProperties) -> f64 {
            7.0
        }
    }

    struct Inverted;

    impl HostWeigher for Inverted {
        fn name(&self) -> &'static str {
            "Inverted"
        }
        fn multiplier(&self) -> f64 {
            -2.0
        }
        fn weigh(&self, host: &HostState, props: &FilterProperties) -> f64 {
            ByName.weigh(host, props)
        }
    }

    fn hosts(ids: &[&str]) -> Vec<HostState> {
        ids.iter().map(|id| HostState::new(*id)).collect()
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(&[1.0, 3.0, 2.0]), vec![0.0, 1.0, 0.5]);
        assert_eq!(normalize(&[4.0, 4.0]), vec![0.0, 0.0]);
        assert!(normalize(&[]).is_empty());
    }

    #[test]
    fn test_best_first() {
        let hosts = hosts(&["h1", "h3", "h2"]);
        let refs: Vec<&HostState> = hosts.iter().collect();
        let chain = WeigherChain::new(vec![Arc::new(ByName)]);

        let weighed = chain.get_weighed_hosts(&refs, &FilterProperties::default());
        let order: Vec<&str> = weighed.iter().map(|w| w.host()).collect();
        assert_eq!(order, vec!["h3", "h2", "h1"]);
        assert_eq!(weighed[0].weight, 1.0);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let hosts = hosts(&["b", "a", "c"]);
        let refs: Vec<&HostState> = hosts.iter().collect();
        let chain = WeigherChain::new(vec![Arc::new(Constant)]);

        let weighed = chain.get_weighed_hosts(&refs, &FilterProperties::default());
        let order: Vec<&str> = weighed.iter().map(|w| w.host()).collect();
        assert_eq!(order, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_multipliers_combine() {
        let hosts = hosts(&["h1", "h2", "h3"]);
        let refs: Vec<&HostState> = hosts.iter().collect();
        let chain = WeigherChain::new(vec![Arc::new(ByName), Arc::new(Inverted)]);

        // 1.0 * n - 2.0 * n: lowest raw score wins
        let weighed = chain.get_weighed_hosts(&refs, &FilterProperties::default());
        assert_eq!(weighed[0].host(), "h1");
        assert_eq!(weighed[2].weight, -1.0);
    }

    #[test]
    fn test_empty_chain_keeps_order() {
        let hosts = hosts(&["x", "y"]);
        let refs: Vec<&HostState> = hosts.iter().collect();
        let weighed = WeigherChain::new(vec![]).get_weighed_hosts(&refs, &FilterProperties::default());
        assert_eq!(weighed.len(), 2);
        assert_eq!(weighed[0].host(), "x");
    }

    #[test]
    fn test_unknown_weigher_name() {
        let catalog = WeigherCatalog::builtin(1.0, -1.0);
        assert!(WeigherChain::from_names(&catalog, &["CapacityWeigher"]).is_ok());
        let err = WeigherChain::from_names(&catalog, &["Nope"]).err().unwrap();
        assert!(err.to_string().contains("unknown weigher 'Nope'"));
    }
}
