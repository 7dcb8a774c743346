//! Pools command implementation

use crate::cli::output::{format_pools_json, format_pools_table, PoolView};
use crate::cli::serve::load_config_with_overrides;
use crate::cli::PoolsArgs;
use crate::host::{HostRegistry, HostStateProvider, PoolFilters};
use crate::scheduler::RequestContext;

/// Pool filters described by the command-line globs
pub fn pool_filters(args: &PoolsArgs) -> PoolFilters {
    PoolFilters {
        host: args.host.clone(),
        backend: args.backend.clone(),
        pool: args.pool.clone(),
        ..Default::default()
    }
}

/// Handle `berth pools` command
pub fn handle_pools(
    args: &PoolsArgs,
    provider: &dyn HostStateProvider,
) -> Result<String, Box<dyn std::error::Error>> {
    let pools = provider.get_pools(&RequestContext::admin(), &pool_filters(args), true)?;
    let views: Vec<PoolView> = pools.iter().map(PoolView::from).collect();

    if args.json {
        Ok(format_pools_json(&views))
    } else {
        Ok(format_pools_table(&views))
    }
}

/// Load the configured host source and list its pools
pub fn run_pools(args: &PoolsArgs) -> Result<String, Box<dyn std::error::Error>> {
    let config = load_config_with_overrides(&args.config)?;
    let registry = HostRegistry::from_config(&config.hosts)?;
    handle_pools(args, &registry)
}
