use super::{RequestContext, RequestSpec, ResourceProperties, ResourceType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Affinity and targeting hints for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerHints {
    /// Comma-separated resource hosts to share a backend with
    #[serde(skip_serializing_if = "Option::is_none")]
    pub same_host: Option<String>,
    /// Comma-separated resource hosts whose backends must be avoided
    #[serde(skip_serializing_if = "Option::is_none")]
    pub different_host: Option<String>,
    /// Exact host to place on (admin only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub only_host: Option<String>,
}

impl SchedulerHints {
    pub fn is_empty(&self) -> bool {
        self.same_host.is_none() && self.different_host.is_none() && self.only_host.is_none()
    }
}

/// Retry bookkeeping threaded through re-schedules of one logical request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryRecord {
    pub num_attempts: u32,
    /// Hosts already tried, oldest first
    #[serde(default)]
    pub hosts: Vec<String>,
    /// Stringified failure of the previous attempt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exc: Option<String>,
}

/// Working state for one scheduling attempt.
///
/// Built by `FilterScheduler::format_filter_properties` and read by every
/// filter and weigher. The caller keeps it between attempts so the retry
/// record and hints survive a re-schedule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterProperties {
    #[serde(skip)]
    pub context: RequestContext,
    pub request_spec: RequestSpec,
    pub config_options: BTreeMap<String, String>,
    pub resource_type: Option<ResourceType>,
    pub group_type: Option<ResourceType>,
    pub group_id: Option<String>,
    pub scheduler_hints: SchedulerHints,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryRecord>,
    pub size: u64,
    /// GiB added by an extend request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_increase: Option<u64>,
    pub availability_zone_id: Option<String>,
    pub user_id: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub snapshot_id: Option<String>,
    pub is_extend: bool,
    pub replication_domain: Option<String>,
    pub resource_properties: ResourceProperties,
    /// Filter-specific data with no dedicated field
    pub extensions: BTreeMap<String, serde_json::Value>,
}

impl FilterProperties {
    /// Extra-specs of the resolved type, if any.
    pub fn extra_specs(&self) -> Option<&super::ExtraSpecs> {
        self.resource_type.as_ref().map(|t| &t.extra_specs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_is_not_serialized() {
        let props = FilterProperties {
            context: RequestContext::new("alice", "proj"),
            size: 5,
            ..Default::default()
        };
        let json = serde_json::to_value(&props).unwrap();
        assert!(json.get("context").is_none());
        assert_eq!(json["size"], 5);
    }

    #[test]
    fn test_retry_record_round_trips_through_caller() {
        let json = r#"{"retry": {"num_attempts": 2, "hosts": ["h1@b#p"], "exc": "boom"}}"#;
        let props: FilterProperties = serde_json::from_str(json).unwrap();
        let retry = props.retry.unwrap();
        assert_eq!(retry.num_attempts, 2);
        assert_eq!(retry.hosts, vec!["h1@b#p"]);
        assert_eq!(retry.exc.as_deref(), Some("boom"));
    }

    #[test]
    fn test_hints_empty() {
        assert!(SchedulerHints::default().is_empty());
        let hints = SchedulerHints {
            only_host: Some("h1".to_string()),
            ..Default::default()
        };
        assert!(!hints.is_empty());
    }
}
