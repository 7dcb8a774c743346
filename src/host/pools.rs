//! Pool listing for capacity-reporting callers.

use super::{extract_host, HostError, HostLevel, HostState};
use globset::{Glob, GlobMatcher};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Criteria for [`get_pools`](super::HostStateProvider::get_pools).
///
/// `host`, `backend` and `pool` are glob patterns matched against the
/// corresponding segment of the pool identifier. Capabilities must match
/// exactly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolFilters {
    pub host: Option<String>,
    pub backend: Option<String>,
    pub pool: Option<String>,
    pub capabilities: BTreeMap<String, String>,
}

impl PoolFilters {
    /// Compile the glob patterns once for a listing pass.
    pub fn compile(&self) -> Result<CompiledPoolFilters, HostError> {
        let compile = |pattern: &Option<String>| -> Result<Option<GlobMatcher>, HostError> {
            match pattern {
                Some(p) => Ok(Some(Glob::new(p)?.compile_matcher())),
                None => Ok(None),
            }
        };

        Ok(CompiledPoolFilters {
            host: compile(&self.host)?,
            backend: compile(&self.backend)?,
            pool: compile(&self.pool)?,
            capabilities: self.capabilities.clone(),
        })
    }
}

/// [`PoolFilters`] with glob patterns compiled.
#[derive(Debug, Clone)]
pub struct CompiledPoolFilters {
    host: Option<GlobMatcher>,
    backend: Option<GlobMatcher>,
    pool: Option<GlobMatcher>,
    capabilities: BTreeMap<String, String>,
}

impl CompiledPoolFilters {
    pub fn matches(&self, info: &PoolInfo) -> bool {
        let segment_matches = |matcher: &Option<GlobMatcher>, value: &str| {
            matcher.as_ref().is_none_or(|m| m.is_match(value))
        };

        segment_matches(&self.host, &info.host)
            && segment_matches(&self.backend, &info.backend)
            && segment_matches(&self.pool, &info.pool)
            && self.capabilities.iter().all(|(key, expected)| {
                info.capabilities.capability(key).as_deref() == Some(expected.as_str())
            })
    }
}

/// One pool as reported to capacity-listing callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolInfo {
    /// Full `host@backend#pool` identifier
    pub name: String,
    pub host: String,
    pub backend: String,
    pub pool: String,
    pub capabilities: HostState,
}

impl From<HostState> for PoolInfo {
    fn from(state: HostState) -> Self {
        let id = state.host.clone();
        Self {
            name: id.clone(),
            host: extract_host(&id, HostLevel::Host, false).unwrap_or_default(),
            backend: extract_host(&id, HostLevel::BackendName, false).unwrap_or_default(),
            pool: extract_host(&id, HostLevel::Pool, true).unwrap_or_default(),
            capabilities: state,
        }
    }
}
