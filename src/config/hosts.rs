//! Host capability source configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where host capability reports come from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostsConfig {
    /// JSON file holding an array of host reports
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
    /// Seconds between reloads of `source` while serving
    pub refresh_interval_seconds: u64,
    /// Reports older than this are treated as down
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_down_seconds: Option<u64>,
}

impl Default for HostsConfig {
    fn default() -> Self {
        Self {
            source: None,
            refresh_interval_seconds: 60,
            service_down_seconds: None,
        }
    }
}
