//! Filters driven by scheduler hints.

use super::{hint_list, host_matches, HostFilter};
use crate::host::HostState;
use crate::scheduler::FilterProperties;

/// Restricts placement to the `only_host` hint, when given.
pub struct OnlyHostFilter;

impl HostFilter for OnlyHostFilter {
    fn name(&self) -> &'static str {
        "OnlyHostFilter"
    }

    fn host_passes(&self, host: &HostState, props: &FilterProperties) -> bool {
        match props.scheduler_hints.only_host.as_deref() {
            Some(only_host) => host_matches(only_host, &host.host),
            None => true,
        }
    }
}

/// Keeps hosts matching any entry of the `same_host` hint.
pub struct AffinityFilter;

impl HostFilter for AffinityFilter {
    fn name(&self) -> &'static str {
        "AffinityFilter"
    }

    fn host_passes(&self, host: &HostState, props: &FilterProperties) -> bool {
        match props.scheduler_hints.same_host.as_deref() {
            Some(targets) => {
                let mut targets = hint_list(targets).peekable();
                targets.peek().is_none() || targets.any(|t| host_matches(t, &host.host))
            }
            None => true,
        }
    }
}

/// Drops hosts matching any entry of the `different_host` hint.
pub struct AntiAffinityFilter;

impl HostFilter for AntiAffinityFilter {
    fn name(&self) -> &'static str {
        "AntiAffinityFilter"
    }

    fn host_passes(&self, host: &HostState, props: &FilterProperties) -> bool {
        match props.scheduler_hints.different_host.as_deref() {
            Some(targets) => !hint_list(targets).any(|t| host_matches(t, &host.host)),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::SchedulerHints;

    fn props(hints: SchedulerHints) -> FilterProperties {
        FilterProperties {
            scheduler_hints: hints,
            ..Default::default()
        }
    }

    #[test]
    fn test_only_host() {
        let p = props(SchedulerHints {
            only_host: Some("node1@lvm#fast".to_string()),
            ..Default::default()
        });
        assert!(OnlyHostFilter.host_passes(&HostState::new("node1@lvm#fast"), &p));
        assert!(!OnlyHostFilter.host_passes(&HostState::new("node1@lvm#slow"), &p));
        assert!(OnlyHostFilter.host_passes(&HostState::new("x"), &FilterProperties::default()));
    }

    #[test]
    fn test_affinity_matches_backend() {
        let p = props(SchedulerHints {
            same_host: Some("node1@lvm#a,node3@zfs#b".to_string()),
            ..Default::default()
        });
        assert!(AffinityFilter.host_passes(&HostState::new("node1@lvm#a"), &p));
        assert!(AffinityFilter.host_passes(&HostState::new("node3@zfs#b"), &p));
        assert!(!AffinityFilter.host_passes(&HostState::new("node2@lvm#a"), &p));
    }

    #[test]
    fn test_empty_affinity_hint_passes() {
        let p = props(SchedulerHints {
            same_host: Some(" ".to_string()),
            ..Default::default()
        });
        assert!(AffinityFilter.host_passes(&HostState::new("node1@lvm#a"), &p));
    }

    #[test]
    fn test_anti_affinity() {
        let p = props(SchedulerHints {
            different_host: Some("node1@lvm".to_string()),
            ..Default::default()
        });
        assert!(!AntiAffinityFilter.host_passes(&HostState::new("node1@lvm#a"), &p));
        assert!(AntiAffinityFilter.host_passes(&HostState::new("node2@lvm#a"), &p));
    }
}
