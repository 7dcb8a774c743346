use super::*;
use crate::scheduler::{RequestContext, ResourceProperties};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn pool(id: &str, free: u64) -> HostState {
    HostState::new(id).with_capacity(Capacity::Finite(1000), Capacity::Finite(free))
}

fn write_reports(file: &tempfile::NamedTempFile, reports: &[HostState]) {
    let json = serde_json::to_string(reports).unwrap();
    std::fs::write(file.path(), json).unwrap();
}

#[test]
fn test_registry_starts_empty() {
    let registry = HostRegistry::new();
    assert_eq!(registry.host_count(), 0);
    assert!(registry
        .get_all_host_states(&RequestContext::admin(), true)
        .is_empty());
}

#[test]
fn test_update_replaces_existing_report() {
    let registry = HostRegistry::new();
    registry.update_host_capabilities(pool("h1@b#p", 10));
    registry.update_host_capabilities(pool("h1@b#p", 20));

    assert_eq!(registry.host_count(), 1);
    assert_eq!(
        registry.get_host("h1@b#p").unwrap().free_capacity_gb,
        Capacity::Finite(20)
    );
}

#[test]
fn test_remove_host() {
    let registry = HostRegistry::new();
    registry.update_host_capabilities(pool("h1@b#p", 10));

    let removed = registry.remove_host("h1@b#p").unwrap();
    assert_eq!(removed.host, "h1@b#p");
    assert!(matches!(
        registry.remove_host("h1@b#p"),
        Err(HostError::HostNotFound(_))
    ));
}

#[test]
fn test_disabled_hosts_excluded_unless_requested() {
    let registry = HostRegistry::new();
    registry.update_host_capabilities(pool("h1@b#p", 10));
    registry.update_host_capabilities(pool("h2@b#p", 10));
    registry.set_disabled("h2@b#p", true).unwrap();

    let ctx = RequestContext::admin();
    let enabled = registry.get_all_host_states(&ctx, false);
    assert_eq!(enabled.len(), 1);
    assert_eq!(enabled[0].host, "h1@b#p");

    assert_eq!(registry.get_all_host_states(&ctx, true).len(), 2);
}

#[test]
fn test_set_disabled_unknown_host() {
    let registry = HostRegistry::new();
    assert!(matches!(
        registry.set_disabled("nope", true),
        Err(HostError::HostNotFound(_))
    ));
}

#[test]
fn test_stale_hosts_are_skipped() {
    let registry = HostRegistry::new().with_service_down(chrono::Duration::seconds(60));
    let mut stale = pool("old@b#p", 10);
    stale.updated = chrono::Utc::now() - chrono::Duration::seconds(600);
    registry.update_host_capabilities(stale);
    registry.update_host_capabilities(pool("new@b#p", 10));

    let hosts = registry.get_all_host_states(&RequestContext::admin(), true);
    assert_eq!(hosts.len(), 1);
    assert_eq!(hosts[0].host, "new@b#p");
}

#[test]
fn test_snapshots_are_sorted_by_host() {
    let registry = HostRegistry::new();
    for id in ["c@b#p", "a@b#p", "b@b#p"] {
        registry.update_host_capabilities(pool(id, 10));
    }

    let ids: Vec<String> = registry
        .get_all_host_states(&RequestContext::admin(), false)
        .into_iter()
        .map(|h| h.host)
        .collect();
    assert_eq!(ids, vec!["a@b#p", "b@b#p", "c@b#p"]);
}

#[test]
fn test_snapshots_are_independent_copies() {
    let registry = HostRegistry::new();
    registry.update_host_capabilities(pool("h1@b#p", 100));

    let mut hosts = registry.get_all_host_states(&RequestContext::admin(), false);
    hosts[0].consume_from_resource(&ResourceProperties::with_size(40));

    assert_eq!(hosts[0].free_capacity_gb, Capacity::Finite(60));
    assert_eq!(
        registry.get_host("h1@b#p").unwrap().free_capacity_gb,
        Capacity::Finite(100)
    );
}

#[test]
fn test_load_reports_prunes_missing_hosts() {
    let file = tempfile::NamedTempFile::new().unwrap();
    write_reports(&file, &[pool("h1@b#p", 10), pool("h2@b#p", 20)]);

    let registry = HostRegistry::new().with_source(file.path());
    assert_eq!(registry.reload().unwrap(), 2);

    write_reports(&file, &[pool("h2@b#p", 5)]);
    assert_eq!(registry.reload().unwrap(), 1);
    assert!(registry.get_host("h1@b#p").is_none());
    assert_eq!(
        registry.get_host("h2@b#p").unwrap().free_capacity_gb,
        Capacity::Finite(5)
    );
}

#[test]
fn test_reload_without_source() {
    let registry = HostRegistry::new();
    assert!(matches!(registry.reload(), Err(HostError::NoSource)));
}

#[test]
fn test_load_reports_missing_file() {
    let registry = HostRegistry::new();
    let result = registry.load_reports(std::path::Path::new("/nonexistent/hosts.json"));
    assert!(matches!(result, Err(HostError::Io { .. })));
}

#[test]
fn test_load_reports_invalid_json() {
    let file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(file.path(), "{not json").unwrap();

    let registry = HostRegistry::new();
    assert!(matches!(
        registry.load_reports(file.path()),
        Err(HostError::Parse { .. })
    ));
}

#[test]
fn test_from_config_loads_source() {
    let file = tempfile::NamedTempFile::new().unwrap();
    write_reports(&file, &[pool("h1@b#p", 10)]);

    let config = crate::config::HostsConfig {
        source: Some(file.path().to_path_buf()),
        ..Default::default()
    };
    let registry = HostRegistry::from_config(&config).unwrap();
    assert_eq!(registry.host_count(), 1);
}

#[test]
fn test_get_pools_applies_filters() {
    let registry = HostRegistry::new();
    registry.update_host_capabilities(pool("node1@lvm#fast", 10));
    registry.update_host_capabilities(pool("node1@zfs#bulk", 10));
    registry.update_host_capabilities(pool("node2@lvm#fast", 10));

    let filters = PoolFilters {
        backend: Some("lvm".to_string()),
        ..Default::default()
    };
    let pools = registry
        .get_pools(&RequestContext::admin(), &filters, true)
        .unwrap();

    let names: Vec<&str> = pools.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["node1@lvm#fast", "node2@lvm#fast"]);
}

#[test]
fn test_get_pools_uncached_reloads_source() {
    let file = tempfile::NamedTempFile::new().unwrap();
    write_reports(&file, &[pool("h1@b#p", 10)]);
    let registry = HostRegistry::new().with_source(file.path());
    registry.reload().unwrap();

    write_reports(&file, &[pool("h1@b#p", 10), pool("h2@b#p", 10)]);
    let ctx = RequestContext::admin();

    let cached = registry
        .get_pools(&ctx, &PoolFilters::default(), true)
        .unwrap();
    assert_eq!(cached.len(), 1);

    let fresh = registry
        .get_pools(&ctx, &PoolFilters::default(), false)
        .unwrap();
    assert_eq!(fresh.len(), 2);
}

#[tokio::test]
async fn test_refresher_stops_on_cancel() {
    let file = tempfile::NamedTempFile::new().unwrap();
    write_reports(&file, &[pool("h1@b#p", 10)]);
    let registry = Arc::new(HostRegistry::new().with_source(file.path()));

    let cancel = CancellationToken::new();
    let handle = CapabilityRefresher::new(Arc::clone(&registry), 1).start(cancel.clone());

    // First tick fires immediately
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert_eq!(registry.host_count(), 1);

    cancel.cancel();
    tokio::time::timeout(std::time::Duration::from_secs(2), handle)
        .await
        .expect("refresher should stop")
        .unwrap();
}

#[test]
fn test_refresh_once_keeps_reports_on_failure() {
    let registry = Arc::new(HostRegistry::new().with_source("/nonexistent/hosts.json"));
    registry.update_host_capabilities(pool("h1@b#p", 10));

    let refresher = CapabilityRefresher::new(Arc::clone(&registry), 60);
    assert_eq!(refresher.refresh_once(), None);
    assert_eq!(registry.host_count(), 1);
}

mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_consumption_conserves_capacity(
            free in 0u64..10_000,
            sizes in proptest::collection::vec(0u64..500, 1..20),
        ) {
            // Free capacity drops by exactly what was consumed, floored at zero
            let mut host = pool("h1@b#p", free);
            for size in &sizes {
                host.consume_from_resource(&ResourceProperties::with_size(*size));
            }

            let consumed: u64 = sizes.iter().sum();
            prop_assert_eq!(host.free_capacity_gb, Capacity::Finite(free.saturating_sub(consumed)));
            prop_assert_eq!(host.allocated_capacity_gb, consumed);
            prop_assert_eq!(host.provisioned_capacity_gb, Some(consumed));
        }

        #[test]
        fn prop_disabled_count_matches(flags in proptest::collection::vec(any::<bool>(), 0..30)) {
            let registry = HostRegistry::new();
            for (i, disabled) in flags.iter().enumerate() {
                let mut state = pool(&format!("h{}@b#p", i), 10);
                state.disabled = *disabled;
                registry.update_host_capabilities(state);
            }

            let ctx = RequestContext::admin();
            let enabled = flags.iter().filter(|d| !**d).count();
            prop_assert_eq!(registry.get_all_host_states(&ctx, false).len(), enabled);
            prop_assert_eq!(registry.get_all_host_states(&ctx, true).len(), flags.len());
        }
    }
}
