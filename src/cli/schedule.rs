//! Schedule command implementation
//!
//! A [`SchedulingRequest`] names one scheduler entry point and carries its
//! arguments. [`dispatch`] runs it and returns a [`Decision`], which is what
//! both `berth schedule` and `berth serve` print.

use crate::cli::output::format_decision;
use crate::cli::serve::load_config_with_overrides;
use crate::cli::ScheduleArgs;
use crate::config::BerthConfig;
use crate::host::{HostRegistry, HostState};
use crate::scheduler::message::{MemoryMessageSink, UserMessage};
use crate::scheduler::{
    FilterProperties, FilterScheduler, RequestContext, RequestSpec, SchedulerError,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One call into the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum SchedulingRequest {
    /// `schedule_create_share`
    Share {
        request_spec: RequestSpec,
        #[serde(default)]
        filter_properties: Option<FilterProperties>,
        #[serde(default)]
        context: Option<RequestContext>,
    },
    /// `schedule_create_replica`
    Replica {
        request_spec: RequestSpec,
        #[serde(default)]
        filter_properties: Option<FilterProperties>,
        #[serde(default)]
        context: Option<RequestContext>,
    },
    /// `schedule_create_share_group`
    Group {
        group_id: String,
        request_spec: RequestSpec,
        #[serde(default)]
        context: Option<RequestContext>,
    },
    /// `host_passes_filters`
    CheckHost {
        host: String,
        request_spec: RequestSpec,
        #[serde(default)]
        filter_properties: Option<FilterProperties>,
        #[serde(default)]
        context: Option<RequestContext>,
    },
    /// `schedule_extend_share`
    Extend {
        host: String,
        size_increase: u64,
        request_spec: RequestSpec,
        #[serde(default)]
        filter_properties: Option<FilterProperties>,
        #[serde(default)]
        context: Option<RequestContext>,
    },
}

impl SchedulingRequest {
    pub fn operation(&self) -> &'static str {
        match self {
            SchedulingRequest::Share { .. } => "share",
            SchedulingRequest::Replica { .. } => "replica",
            SchedulingRequest::Group { .. } => "group",
            SchedulingRequest::CheckHost { .. } => "check_host",
            SchedulingRequest::Extend { .. } => "extend",
        }
    }

    /// Replace the carried filter properties (ignored for groups).
    pub fn set_filter_properties(&mut self, properties: FilterProperties) {
        match self {
            SchedulingRequest::Share {
                filter_properties, ..
            }
            | SchedulingRequest::Replica {
                filter_properties, ..
            }
            | SchedulingRequest::CheckHost {
                filter_properties, ..
            }
            | SchedulingRequest::Extend {
                filter_properties, ..
            } => *filter_properties = Some(properties),
            SchedulingRequest::Group { .. } => {}
        }
    }
}

/// Error half of a [`Decision`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionError {
    /// `invalid_configuration`, `no_default_type`, `will_not_schedule`,
    /// `no_valid_host` or `invalid_request`
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_filter: Option<String>,
}

impl From<&SchedulerError> for DecisionError {
    fn from(err: &SchedulerError) -> Self {
        Self {
            kind: err.kind().as_str().to_string(),
            message: err.to_string(),
            last_filter: err.last_filter().map(str::to_string),
        }
    }
}

/// Outcome of one request as printed by the CLI.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Decision {
    pub operation: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    /// Host snapshot for check_host and extend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_state: Option<HostState>,
    /// Properties to send back on a re-schedule
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_properties: Option<FilterProperties>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<DecisionError>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<UserMessage>,
}

impl Decision {
    fn failed(operation: &str, err: &SchedulerError) -> Self {
        Self {
            operation: operation.to_string(),
            error: Some(DecisionError::from(err)),
            ..Default::default()
        }
    }

    /// Decision for input that could not be parsed.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            operation: "unknown".to_string(),
            error: Some(DecisionError {
                kind: "invalid_request".to_string(),
                message: message.into(),
                last_filter: None,
            }),
            ..Default::default()
        }
    }
}

/// Scheduler backed by a [`HostRegistry`] plus the sink collecting its messages.
pub struct SchedulerHandle {
    pub scheduler: FilterScheduler,
    pub registry: Arc<HostRegistry>,
    pub messages: Arc<MemoryMessageSink>,
}

/// Build the scheduler described by `config`, loading hosts from its source.
pub fn build_scheduler(config: &BerthConfig) -> Result<SchedulerHandle, Box<dyn std::error::Error>> {
    let registry = Arc::new(HostRegistry::from_config(&config.hosts)?);
    let messages = Arc::new(MemoryMessageSink::new());
    let scheduler = FilterScheduler::new(&config.scheduler, registry.clone(), messages.clone())?;

    tracing::debug!(hosts = registry.host_count(), "Scheduler ready");
    Ok(SchedulerHandle {
        scheduler,
        registry,
        messages,
    })
}

/// Run one request and collect the user messages it produced.
pub fn dispatch(handle: &SchedulerHandle, request: SchedulingRequest) -> Decision {
    let operation = request.operation();
    let scheduler = &handle.scheduler;

    let mut decision = match request {
        SchedulingRequest::Share {
            request_spec,
            filter_properties,
            context,
        } => {
            let context = context.unwrap_or_default();
            match scheduler.schedule_create_share(&context, &request_spec, filter_properties) {
                Ok(s) => Decision {
                    operation: operation.to_string(),
                    ok: true,
                    host: Some(s.host),
                    weight: Some(s.weight),
                    filter_properties: Some(s.filter_properties),
                    ..Default::default()
                },
                Err(e) => Decision::failed(operation, &e),
            }
        }
        SchedulingRequest::Replica {
            request_spec,
            filter_properties,
            context,
        } => {
            let context = context.unwrap_or_default();
            match scheduler.schedule_create_replica(&context, &request_spec, filter_properties) {
                Ok(s) => Decision {
                    operation: operation.to_string(),
                    ok: true,
                    host: Some(s.host),
                    weight: Some(s.weight),
                    filter_properties: Some(s.filter_properties),
                    ..Default::default()
                },
                Err(e) => Decision::failed(operation, &e),
            }
        }
        SchedulingRequest::Group {
            group_id,
            request_spec,
            context,
        } => {
            let context = context.unwrap_or_default();
            match scheduler.schedule_create_share_group(&context, &group_id, &request_spec) {
                Ok(host) => Decision {
                    operation: operation.to_string(),
                    ok: true,
                    host: Some(host),
                    ..Default::default()
                },
                Err(e) => Decision::failed(operation, &e),
            }
        }
        SchedulingRequest::CheckHost {
            host,
            request_spec,
            filter_properties,
            context,
        } => {
            let context = context.unwrap_or_default();
            match scheduler.host_passes_filters(&context, &host, &request_spec, filter_properties)
            {
                Ok(state) => Decision {
                    operation: operation.to_string(),
                    ok: true,
                    host: Some(state.host.clone()),
                    host_state: Some(state),
                    ..Default::default()
                },
                Err(e) => Decision::failed(operation, &e),
            }
        }
        SchedulingRequest::Extend {
            host,
            size_increase,
            request_spec,
            filter_properties,
            context,
        } => {
            let context = context.unwrap_or_default();
            match scheduler.schedule_extend_share(
                &context,
                &host,
                &request_spec,
                filter_properties,
                size_increase,
            ) {
                Ok(state) => Decision {
                    operation: operation.to_string(),
                    ok: true,
                    host: Some(state.host.clone()),
                    host_state: Some(state),
                    ..Default::default()
                },
                Err(e) => Decision::failed(operation, &e),
            }
        }
    };

    decision.messages = handle.messages.drain();
    decision
}

/// Handle `berth schedule`
///
/// Prints the decision on stdout and fails when the request was not placed.
pub fn run_schedule(args: &ScheduleArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config_with_overrides(&args.config)?;
    config.validate()?;
    crate::logging::init_tracing(&config.logging)?;

    let raw = std::fs::read_to_string(&args.request)?;
    let mut request: SchedulingRequest = serde_json::from_str(&raw)?;
    if let Some(path) = &args.properties {
        let previous: FilterProperties = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        request.set_filter_properties(previous);
    }

    let handle = build_scheduler(&config)?;
    let decision = dispatch(&handle, request);
    println!("{}", format_decision(&decision, args.pretty));

    match decision.error {
        Some(error) => Err(error.message.into()),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Capacity;
    use crate::scheduler::message::MessageDetail;
    use crate::scheduler::{ExtraSpecs, ResourceType};

    fn handle_with(hosts: Vec<HostState>) -> SchedulerHandle {
        let handle = build_scheduler(&BerthConfig::default()).unwrap();
        for host in hosts {
            handle.registry.update_host_capabilities(host);
        }
        handle
    }

    fn pool(id: &str, free: u64) -> HostState {
        HostState::new(id).with_capacity(Capacity::Finite(1000), Capacity::Finite(free))
    }

    fn spec(size: u64) -> RequestSpec {
        RequestSpec::new("share-1", size, ResourceType::new("default", ExtraSpecs::new()))
    }

    #[test]
    fn test_request_parses_tagged_operation() {
        let request: SchedulingRequest = serde_json::from_str(
            r#"{
                "operation": "extend",
                "host": "h1@b#p",
                "size_increase": 5,
                "request_spec": {"resource_id": "share-1", "resource_type": {}}
            }"#,
        )
        .unwrap();
        assert_eq!(request.operation(), "extend");
        assert!(matches!(
            request,
            SchedulingRequest::Extend { size_increase: 5, .. }
        ));
    }

    #[test]
    fn test_unknown_operation_is_rejected() {
        let result: Result<SchedulingRequest, _> =
            serde_json::from_str(r#"{"operation": "migrate", "request_spec": {}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_dispatch_share_success() {
        let handle = handle_with(vec![pool("h1@b#p", 100), pool("h2@b#p", 300)]);
        let decision = dispatch(
            &handle,
            SchedulingRequest::Share {
                request_spec: spec(10),
                filter_properties: None,
                context: None,
            },
        );

        assert!(decision.ok);
        assert_eq!(decision.host.as_deref(), Some("h2@b#p"));
        let retry = decision.filter_properties.unwrap().retry.unwrap();
        assert_eq!(retry.hosts, vec!["h2@b#p"]);
    }

    #[test]
    fn test_dispatch_collects_messages_on_failure() {
        let handle = handle_with(vec![]);
        let decision = dispatch(
            &handle,
            SchedulingRequest::Share {
                request_spec: spec(10),
                filter_properties: None,
                context: None,
            },
        );

        assert!(!decision.ok);
        let error = decision.error.unwrap();
        assert_eq!(error.kind, "will_not_schedule");
        assert_eq!(decision.messages.len(), 1);
        assert_eq!(
            decision.messages[0].detail,
            MessageDetail::ShareBackendNotReadyYet
        );
        // Drained per request
        assert!(handle.messages.messages().is_empty());
    }

    #[test]
    fn test_dispatch_check_host_reports_last_filter() {
        let handle = handle_with(vec![pool("h1@b#p", 5)]);
        let decision = dispatch(
            &handle,
            SchedulingRequest::CheckHost {
                host: "h1@b#p".to_string(),
                request_spec: spec(10),
                filter_properties: None,
                context: None,
            },
        );

        let error = decision.error.unwrap();
        assert_eq!(error.kind, "no_valid_host");
        assert_eq!(error.last_filter.as_deref(), Some("CapacityFilter"));
    }

    #[test]
    fn test_dispatch_extend_returns_consumed_state() {
        let handle = handle_with(vec![pool("h1@b#p", 100)]);
        let decision = dispatch(
            &handle,
            SchedulingRequest::Extend {
                host: "h1@b#p".to_string(),
                size_increase: 30,
                request_spec: spec(10),
                filter_properties: None,
                context: None,
            },
        );

        assert!(decision.ok);
        let state = decision.host_state.unwrap();
        assert_eq!(state.free_capacity_gb, Capacity::Finite(70));
    }

    #[test]
    fn test_set_filter_properties_ignored_for_groups() {
        let mut request = SchedulingRequest::Group {
            group_id: "g".to_string(),
            request_spec: RequestSpec::default(),
            context: None,
        };
        request.set_filter_properties(FilterProperties::default());
        assert_eq!(request.operation(), "group");
    }
}
