use super::HostFilter;
use crate::host::HostState;
use crate::scheduler::FilterProperties;

/// Rejects hosts already tried for this request.
pub struct RetryFilter;

impl HostFilter for RetryFilter {
    fn name(&self) -> &'static str {
        "RetryFilter"
    }

    fn host_passes(&self, host: &HostState, props: &FilterProperties) -> bool {
        let Some(retry) = props.retry.as_ref() else {
            // Re-scheduling disabled
            return true;
        };

        let passes = !retry.hosts.iter().any(|tried| tried == &host.host);
        if !passes {
            tracing::debug!(host = %host.host, "Host already attempted for this request");
        }
        passes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::RetryRecord;

    #[test]
    fn test_passes_without_retry_record() {
        assert!(RetryFilter.host_passes(&HostState::new("h1"), &FilterProperties::default()));
    }

    #[test]
    fn test_rejects_tried_host() {
        let props = FilterProperties {
            retry: Some(RetryRecord {
                num_attempts: 2,
                hosts: vec!["h1@b#p".to_string()],
                exc: None,
            }),
            ..Default::default()
        };
        assert!(!RetryFilter.host_passes(&HostState::new("h1@b#p"), &props));
        assert!(RetryFilter.host_passes(&HostState::new("h2@b#p"), &props));
    }
}
