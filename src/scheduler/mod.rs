//! Placement engine.
//!
//! [`FilterScheduler`] turns a [`RequestSpec`] into [`FilterProperties`],
//! fetches host snapshots from a [`HostStateProvider`], runs the filter and
//! weigher chains and virtually consumes the chosen host's capacity.

mod context;
mod error;
mod extra_specs;
pub mod filters;
mod group;
pub mod message;
mod properties;
mod request;
mod retry;
pub mod weighers;

pub use context::*;
pub use error::*;
pub use extra_specs::*;
pub use group::intersect_by_host;
pub use properties::*;
pub use request::*;
pub use retry::*;

use crate::config::SchedulerConfig;
use crate::host::{HostError, HostState, HostStateProvider, PoolFilters, PoolInfo};
use filters::{FilterCatalog, FilterChain};
use message::{MessageAction, MessageDetail, MessageResource, MessageSink};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use weighers::{WeighedHost, WeigherCatalog, WeigherChain};

/// Extra-spec pinning a type to one backend name.
pub const SHARE_BACKEND_NAME_SPEC: &str = "share_backend_name";
/// Extra-spec holding the protocols a type accepts.
pub const STORAGE_PROTOCOL_SPEC: &str = "storage_protocol";

/// Outcome of a successful create call.
#[derive(Debug, Clone, Serialize)]
pub struct Scheduled {
    /// Chosen host identifier
    pub host: String,
    pub weight: f64,
    /// Properties to hand back on a re-schedule
    pub filter_properties: FilterProperties,
}

/// Filter-and-weigh scheduler.
pub struct FilterScheduler {
    provider: Arc<dyn HostStateProvider>,
    messages: Arc<dyn MessageSink>,
    filters: FilterChain,
    weighers: WeigherChain,
    retry: RetryTracker,
    extend_filters: Vec<String>,
    group_filters: Vec<String>,
    boolean_extra_specs: Vec<String>,
    required_extra_specs: Vec<String>,
    options: BTreeMap<String, String>,
}

impl FilterScheduler {
    /// Build a scheduler with the built-in filter and weigher catalogs.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidConfiguration` when `max_attempts < 1`
    /// or a configured filter or weigher name is unknown.
    pub fn new(
        config: &SchedulerConfig,
        provider: Arc<dyn HostStateProvider>,
        messages: Arc<dyn MessageSink>,
    ) -> Result<Self, SchedulerError> {
        let weighers = WeigherCatalog::builtin(
            config.capacity_weight_multiplier,
            config.allocated_capacity_weight_multiplier,
        );
        Self::with_catalogs(config, FilterCatalog::builtin(), weighers, provider, messages)
    }

    /// Build a scheduler resolving names against custom catalogs.
    pub fn with_catalogs(
        config: &SchedulerConfig,
        filter_catalog: FilterCatalog,
        weigher_catalog: WeigherCatalog,
        provider: Arc<dyn HostStateProvider>,
        messages: Arc<dyn MessageSink>,
    ) -> Result<Self, SchedulerError> {
        let retry = RetryTracker::new(config.max_attempts)?;
        let filter_catalog = Arc::new(filter_catalog);

        // Alternate lists are resolved per call; reject bad names now.
        filter_catalog.resolve(&config.extend_filters)?;
        filter_catalog.resolve(&config.group_filters)?;

        let filters = FilterChain::new(Arc::clone(&filter_catalog), &config.default_filters)?;
        let weighers = WeigherChain::from_names(&weigher_catalog, &config.default_weighers)?;

        tracing::debug!(
            max_attempts = config.max_attempts,
            filters = ?filters.default_names(),
            weighers = ?weighers.names(),
            "Filter scheduler initialized"
        );

        Ok(Self {
            provider,
            messages,
            filters,
            weighers,
            retry,
            extend_filters: config.extend_filters.clone(),
            group_filters: config.group_filters.clone(),
            boolean_extra_specs: config.boolean_extra_specs.clone(),
            required_extra_specs: config.required_extra_specs.clone(),
            options: config.options.clone(),
        })
    }

    pub fn max_attempts(&self) -> u32 {
        self.retry.max_attempts()
    }

    /// Pools known to the host provider.
    pub fn get_pools(
        &self,
        context: &RequestContext,
        filters: &PoolFilters,
        cached: bool,
    ) -> Result<Vec<PoolInfo>, HostError> {
        self.provider.get_pools(context, filters, cached)
    }

    /// Build the working properties for one attempt.
    ///
    /// `previous` carries the retry record and hints of an earlier attempt.
    pub fn format_filter_properties(
        &self,
        context: &RequestContext,
        previous: Option<FilterProperties>,
        request_spec: &RequestSpec,
    ) -> Result<FilterProperties, SchedulerError> {
        let elevated = context.elevated();
        let mut spec = request_spec.clone();
        let resource_id = spec.resource_id.clone();

        let Some(mut resource_type) = spec.resource_type.take() else {
            tracing::error!(
                resource_id = resource_id.as_deref().unwrap_or_default(),
                "You must create a share type in advance, and specify in request body or set default_share_type"
            );
            self.notify(
                context,
                MessageAction::Create,
                MessageResource::Share,
                resource_id.as_deref(),
                MessageDetail::NoDefaultShareType,
            );
            return Err(SchedulerError::NoDefaultType { resource_id });
        };

        if !resource_type.extra_specs.is_empty() {
            resource_type
                .extra_specs
                .normalize_booleans(&self.boolean_extra_specs);
        }

        if !resource_type.extra_specs.contains_key(STORAGE_PROTOCOL_SPEC) {
            if let Some(protocol) = spec.effective_protocol() {
                // A host may report several protocols at once
                resource_type.extra_specs.insert(
                    STORAGE_PROTOCOL_SPEC,
                    SpecPredicate::In(protocol.to_string()),
                );
            }
        }

        let partner_hosts: Vec<&str> = [
            spec.active_replica_host.as_deref(),
            spec.snapshot_host.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect();

        let mut replication_domain = None;
        if !partner_hosts.is_empty() {
            replication_domain = self
                .provider
                .get_all_host_states(&elevated, false)
                .into_iter()
                .find(|h| partner_hosts.contains(&h.host.as_str()))
                .and_then(|h| h.replication_domain);
            // Any host in the domain will do, not only the partner's backend
            resource_type.extra_specs.remove(SHARE_BACKEND_NAME_SPEC);
        }

        spec.resource_type = Some(resource_type.clone());

        let mut props = previous.unwrap_or_default();
        self.retry.populate(&mut props, resource_id.as_deref())?;

        props.context = context.clone();
        props.config_options = self.options.clone();
        props.resource_type = Some(resource_type);
        props.group_id = spec.group_id.clone();
        props.replication_domain = replication_domain;

        props.size = spec.resource_properties.size;
        props.availability_zone_id = spec.instance_properties.availability_zone_id.clone();
        props.user_id = spec.resource_properties.user_id.clone();
        props.metadata = spec.resource_properties.metadata.clone();
        props.snapshot_id = spec.resource_properties.snapshot_id.clone();
        props.is_extend = spec.is_extend;
        props.resource_properties = spec.resource_properties.clone();
        props.request_spec = spec;

        populate_scheduler_hints(&mut props);
        Ok(props)
    }

    /// Pick the best host for a request.
    ///
    /// Does not touch the retry host list; callers record the chosen host
    /// on success.
    pub fn schedule(
        &self,
        context: &RequestContext,
        request_spec: &RequestSpec,
        previous: Option<FilterProperties>,
    ) -> Result<(WeighedHost, FilterProperties), SchedulerError> {
        let elevated = context.elevated();
        let props = self.format_filter_properties(context, previous, request_spec)?;

        let consider_disabled =
            context.is_host_admin() && props.scheduler_hints.only_host.is_some();
        let mut hosts = self
            .provider
            .get_all_host_states(&elevated, consider_disabled);

        let best = self.place(&mut hosts, &props)?;
        Ok((best, props))
    }

    /// Filter, weigh and pick from `hosts`, consuming the winner in place.
    ///
    /// Calling this repeatedly over the same slice sees earlier consumption.
    pub fn place(
        &self,
        hosts: &mut [HostState],
        props: &FilterProperties,
    ) -> Result<WeighedHost, SchedulerError> {
        let resource_id = props.request_spec.resource_id.as_deref();

        if hosts.is_empty() {
            self.notify(
                &props.context,
                MessageAction::Create,
                MessageResource::Share,
                resource_id,
                MessageDetail::ShareBackendNotReadyYet,
            );
            return Err(SchedulerError::WillNotSchedule {
                reason: "There are no hosts to fulfill this provisioning request. Are share backend services down?"
                    .to_string(),
            });
        }

        let best = {
            let (filtered, last_filter) =
                self.filters
                    .get_filtered_hosts(hosts.iter().collect(), props, None)?;

            if filtered.is_empty() {
                let last = last_filter.unwrap_or("None");
                return Err(SchedulerError::NoValidHost {
                    reason: format!(
                        "Failed to find a weighted host, the last executed filter was {}.",
                        last
                    ),
                    last_filter: last_filter.map(str::to_string),
                });
            }
            tracing::debug!(
                hosts = ?filtered.iter().map(|h| h.host.as_str()).collect::<Vec<_>>(),
                "Filtered hosts"
            );

            self.weighers
                .get_weighed_hosts(&filtered, props)
                .into_iter()
                .next()
        };

        let Some(mut best) = best else {
            return Err(SchedulerError::no_valid_host("Failed to weigh filtered hosts."));
        };

        if let Some(chosen) = hosts.iter_mut().find(|h| h.host == best.host_state.host) {
            chosen.consume_from_resource(&props.resource_properties);
            best.host_state = chosen.clone();
        }

        tracing::debug!(
            resource_id = resource_id.unwrap_or_default(),
            host = %best.host_state.host,
            weight = best.weight,
            "Choosing host"
        );
        Ok(best)
    }

    /// Choose a host for a new share and record it in the retry history.
    pub fn schedule_create_share(
        &self,
        context: &RequestContext,
        request_spec: &RequestSpec,
        previous: Option<FilterProperties>,
    ) -> Result<Scheduled, SchedulerError> {
        let result = self.schedule_and_record(context, request_spec, previous);
        record_outcome("create_share", &result);
        self.notify_no_valid_host(
            context,
            &result,
            MessageAction::AllocateHost,
            MessageResource::Share,
            request_spec.resource_id.as_deref(),
        );
        let scheduled = result?;

        tracing::info!(
            resource_id = request_spec.resource_id.as_deref().unwrap_or_default(),
            host = %scheduled.host,
            "Scheduled share"
        );
        Ok(scheduled)
    }

    /// Choose a host for a new replica of an existing share.
    pub fn schedule_create_replica(
        &self,
        context: &RequestContext,
        request_spec: &RequestSpec,
        previous: Option<FilterProperties>,
    ) -> Result<Scheduled, SchedulerError> {
        let result = self.schedule_and_record(context, request_spec, previous);
        record_outcome("create_replica", &result);
        self.notify_no_valid_host(
            context,
            &result,
            MessageAction::AllocateHost,
            MessageResource::ShareReplica,
            request_spec.instance_properties.id.as_deref(),
        );
        let scheduled = result?;

        tracing::info!(
            replica_id = request_spec
                .instance_properties
                .id
                .as_deref()
                .unwrap_or_default(),
            host = %scheduled.host,
            "Scheduled share replica"
        );
        Ok(scheduled)
    }

    /// Validate that `host` would accept the request.
    ///
    /// The full fleet is filtered and weighed; the target's snapshot is
    /// returned when it survives. Extend requests use the extend filter list.
    pub fn host_passes_filters(
        &self,
        context: &RequestContext,
        host: &str,
        request_spec: &RequestSpec,
        previous: Option<FilterProperties>,
    ) -> Result<HostState, SchedulerError> {
        let result = self.check_host(context, host, request_spec, previous);
        record_outcome("host_passes_filters", &result);
        result
    }

    /// Validate an extend on `host` and consume the increase.
    pub fn schedule_extend_share(
        &self,
        context: &RequestContext,
        host: &str,
        request_spec: &RequestSpec,
        previous: Option<FilterProperties>,
        size_increase: u64,
    ) -> Result<HostState, SchedulerError> {
        let mut spec = request_spec.clone();
        spec.is_extend = true;
        let mut props = previous.unwrap_or_default();
        props.size_increase = Some(size_increase);

        let result = self.check_host(context, host, &spec, Some(props));
        record_outcome("extend_share", &result);
        self.notify_no_valid_host(
            context,
            &result,
            MessageAction::Extend,
            MessageResource::Share,
            spec.resource_id.as_deref(),
        );
        let mut state = result?;

        state.consume_from_resource(&ResourceProperties::with_size(size_increase));
        tracing::info!(
            resource_id = spec.resource_id.as_deref().unwrap_or_default(),
            host,
            size_increase,
            "Extend validated"
        );
        Ok(state)
    }

    fn schedule_and_record(
        &self,
        context: &RequestContext,
        request_spec: &RequestSpec,
        previous: Option<FilterProperties>,
    ) -> Result<Scheduled, SchedulerError> {
        let (best, mut props) = self.schedule(context, request_spec, previous)?;
        add_retry_host(&mut props, &best.host_state.host);

        Ok(Scheduled {
            host: best.host_state.host,
            weight: best.weight,
            filter_properties: props,
        })
    }

    fn check_host(
        &self,
        context: &RequestContext,
        host: &str,
        request_spec: &RequestSpec,
        previous: Option<FilterProperties>,
    ) -> Result<HostState, SchedulerError> {
        let elevated = context.elevated();
        let props = self.format_filter_properties(context, previous, request_spec)?;

        let consider_disabled =
            context.is_host_admin() && props.scheduler_hints.only_host.is_some();
        let hosts = self
            .provider
            .get_all_host_states(&elevated, consider_disabled);
        let filter_names = request_spec
            .is_extend
            .then_some(self.extend_filters.as_slice());

        let (filtered, last_filter) =
            self.filters
                .get_filtered_hosts(hosts.iter().collect(), &props, filter_names)?;
        let weighed = self.weighers.get_weighed_hosts(&filtered, &props);

        if let Some(target) = weighed.into_iter().find(|w| w.host_state.host == host) {
            return Ok(target.host_state);
        }

        Err(SchedulerError::NoValidHost {
            reason: format!(
                "Cannot place share {} on {}, the last executed filter was {}.",
                request_spec.resource_id.as_deref().unwrap_or("None"),
                host,
                last_filter.unwrap_or("None")
            ),
            last_filter: last_filter.map(str::to_string),
        })
    }

    /// Report a `NoValidHost` failure to the tenant.
    fn notify_no_valid_host<T>(
        &self,
        context: &RequestContext,
        result: &Result<T, SchedulerError>,
        action: MessageAction,
        resource_type: MessageResource,
        resource_id: Option<&str>,
    ) {
        if matches!(result, Err(e) if e.kind() == SchedulerErrorKind::NoValidHost) {
            self.notify(
                context,
                action,
                resource_type,
                resource_id,
                MessageDetail::NoValidHost,
            );
        }
    }

    fn notify(
        &self,
        context: &RequestContext,
        action: MessageAction,
        resource_type: MessageResource,
        resource_id: Option<&str>,
        detail: MessageDetail,
    ) {
        if let Err(e) = self.messages.create(
            context,
            action,
            context.project_id.as_deref(),
            resource_type,
            resource_id,
            detail,
        ) {
            tracing::warn!(error = %e, detail = ?detail, "Failed to record user message");
        }
    }
}

/// Copy affinity hints from resource metadata, once per logical request.
fn populate_scheduler_hints(props: &mut FilterProperties) {
    if props.request_spec.resource_id.is_none() {
        props.scheduler_hints = SchedulerHints::default();
        return;
    }
    if !props.scheduler_hints.is_empty() {
        return;
    }

    let metadata = &props.request_spec.resource_properties.metadata;
    let hint = |key: &str| metadata.get(key).filter(|v| !v.is_empty()).cloned();
    props.scheduler_hints = SchedulerHints {
        same_host: hint(AFFINITY_KEY),
        different_host: hint(ANTI_AFFINITY_KEY),
        only_host: None,
    };
}

fn record_outcome<T>(operation: &'static str, result: &Result<T, SchedulerError>) {
    let outcome = match result {
        Ok(_) => "success",
        Err(e) => e.kind().as_str(),
    };
    metrics::counter!(
        "berth_schedule_total",
        "operation" => operation,
        "outcome" => outcome,
    )
    .increment(1);
}
