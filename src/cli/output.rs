//! Output formatting helpers for CLI commands

use crate::cli::schedule::Decision;
use crate::host::{Capacity, PoolInfo};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use serde_json::json;

/// View model for pool display
#[derive(Debug, Clone, serde::Serialize)]
pub struct PoolView {
    pub name: String,
    pub backend: String,
    pub pool: String,
    pub availability_zone: Option<String>,
    pub total_capacity_gb: Capacity,
    pub free_capacity_gb: Capacity,
    pub allocated_capacity_gb: u64,
    pub storage_protocol: Option<String>,
    pub thin_provisioning: bool,
    pub replication_domain: Option<String>,
}

impl From<&PoolInfo> for PoolView {
    fn from(info: &PoolInfo) -> Self {
        let state = &info.capabilities;
        Self {
            name: info.name.clone(),
            backend: info.backend.clone(),
            pool: info.pool.clone(),
            availability_zone: state.availability_zone.clone(),
            total_capacity_gb: state.total_capacity_gb,
            free_capacity_gb: state.free_capacity_gb,
            allocated_capacity_gb: state.allocated_capacity_gb,
            storage_protocol: state.storage_protocol.clone(),
            thin_provisioning: state.thin_provisioning,
            replication_domain: state.replication_domain.clone(),
        }
    }
}

fn capacity_cell(capacity: Capacity) -> String {
    match capacity {
        Capacity::Finite(gb) => format!("{} GiB", gb),
        Capacity::Infinite => "infinite".cyan().to_string(),
        Capacity::Unknown => "unknown".yellow().to_string(),
    }
}

/// Format pools as a table
pub fn format_pools_table(pools: &[PoolView]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        "Pool", "Backend", "AZ", "Total", "Free", "Allocated", "Protocol", "Provisioning",
    ]);

    for p in pools {
        let provisioning = if p.thin_provisioning {
            "thin".green().to_string()
        } else {
            "thick".to_string()
        };

        table.add_row(vec![
            Cell::new(&p.name),
            Cell::new(&p.backend),
            Cell::new(p.availability_zone.as_deref().unwrap_or("-")),
            Cell::new(capacity_cell(p.total_capacity_gb)),
            Cell::new(capacity_cell(p.free_capacity_gb)),
            Cell::new(format!("{} GiB", p.allocated_capacity_gb)),
            Cell::new(p.storage_protocol.as_deref().unwrap_or("-")),
            Cell::new(provisioning),
        ]);
    }

    table.to_string()
}

/// Format pools as JSON
pub fn format_pools_json(pools: &[PoolView]) -> String {
    serde_json::to_string_pretty(&json!({
        "pools": pools
    }))
    .unwrap()
}

/// Render a scheduling decision as one JSON document
pub fn format_decision(decision: &Decision, pretty: bool) -> String {
    if pretty {
        serde_json::to_string_pretty(decision).unwrap()
    } else {
        serde_json::to_string(decision).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostState;

    fn create_test_pool_view() -> PoolView {
        let mut state = HostState::new("node1@netapp#aggr1")
            .with_capacity(Capacity::Finite(1024), Capacity::Infinite);
        state.storage_protocol = Some("NFS_CIFS".to_string());
        PoolView::from(&PoolInfo::from(state))
    }

    #[test]
    fn test_pool_view_from_info() {
        let view = create_test_pool_view();
        assert_eq!(view.name, "node1@netapp#aggr1");
        assert_eq!(view.backend, "netapp");
        assert_eq!(view.pool, "aggr1");
    }

    #[test]
    fn test_format_pools_table_empty() {
        let output = format_pools_table(&[]);
        assert!(output.contains("Pool")); // Header present
    }

    #[test]
    fn test_format_pools_table_with_data() {
        let output = format_pools_table(&[create_test_pool_view()]);
        assert!(output.contains("node1@netapp#aggr1"));
        assert!(output.contains("1024 GiB"));
        assert!(output.contains("infinite"));
    }

    #[test]
    fn test_format_pools_json_valid() {
        let output = format_pools_json(&[create_test_pool_view()]);
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["pools"][0]["free_capacity_gb"], "infinite");
        assert_eq!(parsed["pools"][0]["total_capacity_gb"], 1024);
    }

    #[test]
    fn test_format_decision_single_line() {
        let decision = Decision::invalid_request("expected value");
        let output = format_decision(&decision, false);
        assert!(!output.contains('\n'));
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["ok"], false);
        assert!(parsed.get("host").is_none());
    }
}
