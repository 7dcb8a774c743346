//! Share group placement across several member types.

use super::message::{MessageAction, MessageResource};
use super::weighers::WeighedHost;
use super::{FilterProperties, FilterScheduler, RequestContext, RequestSpec, ResourceType, SchedulerError};
use crate::host::HostState;

/// Keep the entries of `carrier` whose host also appears in `gate`.
///
/// Order and weights come from `carrier`; `gate` only decides membership.
pub fn intersect_by_host(carrier: Vec<WeighedHost>, gate: &[WeighedHost]) -> Vec<WeighedHost> {
    carrier
        .into_iter()
        .filter(|candidate| gate.iter().any(|g| g.host_state.host == candidate.host_state.host))
        .collect()
}

impl FilterScheduler {
    /// Choose one host able to serve every member type and the group type.
    pub fn schedule_create_share_group(
        &self,
        context: &RequestContext,
        group_id: &str,
        request_spec: &RequestSpec,
    ) -> Result<String, SchedulerError> {
        tracing::info!(group_id, "Scheduling share group");

        let result = self
            .get_weighted_candidates_for_group(context, request_spec)
            .and_then(|candidates| match candidates.into_iter().next() {
                Some(best) => Ok(best.host_state.host),
                None => Err(SchedulerError::no_valid_host(format!(
                    "No hosts available for share group {}.",
                    group_id
                ))),
            });
        super::record_outcome("create_share_group", &result);
        self.notify_no_valid_host(
            context,
            &result,
            MessageAction::AllocateHost,
            MessageResource::ShareGroup,
            Some(group_id),
        );
        let host = result?;

        tracing::info!(group_id, host = %host, "Chose host for share group");
        Ok(host)
    }

    /// Hosts acceptable to every member type and the group type, best first.
    ///
    /// Each member type is filtered and weighed against the full fleet on its
    /// own; the first type's ranking is kept and later types only narrow it.
    pub fn get_weighted_candidates_for_group(
        &self,
        context: &RequestContext,
        request_spec: &RequestSpec,
    ) -> Result<Vec<WeighedHost>, SchedulerError> {
        let elevated = context.elevated();
        let all_hosts = self.provider.get_all_host_states(&elevated, false);
        if all_hosts.is_empty() {
            return Ok(Vec::new());
        }

        let mut weighed: Vec<WeighedHost> = Vec::new();
        for (index, member_type) in request_spec.member_types.iter().enumerate() {
            let candidates =
                self.weighted_hosts_for_member_type(&elevated, request_spec, member_type, &all_hosts)?;

            if index == 0 {
                weighed = candidates;
            } else {
                weighed = intersect_by_host(weighed, &candidates);
            }
            if weighed.is_empty() {
                tracing::debug!(
                    member_type = member_type.name.as_deref().unwrap_or_default(),
                    "No common host left for share group member types"
                );
                return Ok(Vec::new());
            }
        }

        let group_type = request_spec.resource_type.clone().unwrap_or_default();
        let group_candidates =
            self.weighted_hosts_for_group_type(&elevated, request_spec, group_type, &all_hosts)?;

        Ok(intersect_by_host(weighed, &group_candidates))
    }

    fn weighted_hosts_for_member_type(
        &self,
        context: &RequestContext,
        request_spec: &RequestSpec,
        member_type: &ResourceType,
        all_hosts: &[HostState],
    ) -> Result<Vec<WeighedHost>, SchedulerError> {
        let mut member_type = member_type.clone();
        if !member_type.extra_specs.is_empty() {
            member_type
                .extra_specs
                .normalize_booleans(&self.required_extra_specs);
        }

        let props = FilterProperties {
            context: context.clone(),
            request_spec: request_spec.clone(),
            config_options: self.options.clone(),
            resource_type: Some(member_type),
            size: 0,
            ..Default::default()
        };
        self.filter_and_weigh(all_hosts, &props, None)
    }

    fn weighted_hosts_for_group_type(
        &self,
        context: &RequestContext,
        request_spec: &RequestSpec,
        group_type: ResourceType,
        all_hosts: &[HostState],
    ) -> Result<Vec<WeighedHost>, SchedulerError> {
        let props = FilterProperties {
            context: context.clone(),
            request_spec: request_spec.clone(),
            config_options: self.options.clone(),
            group_type: Some(group_type.clone()),
            resource_type: Some(group_type),
            group_id: request_spec.group_id.clone(),
            ..Default::default()
        };
        self.filter_and_weigh(all_hosts, &props, Some(self.group_filters.as_slice()))
    }

    fn filter_and_weigh(
        &self,
        all_hosts: &[HostState],
        props: &FilterProperties,
        filter_names: Option<&[String]>,
    ) -> Result<Vec<WeighedHost>, SchedulerError> {
        let (filtered, _) = self
            .filters
            .get_filtered_hosts(all_hosts.iter().collect(), props, filter_names)?;
        if filtered.is_empty() {
            return Ok(Vec::new());
        }
        tracing::debug!(
            hosts = ?filtered.iter().map(|h| h.host.as_str()).collect::<Vec<_>>(),
            "Filtered hosts"
        );
        Ok(self.weighers.get_weighed_hosts(&filtered, props))
    }
}
