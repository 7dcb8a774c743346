//! Error types for placement failures

use thiserror::Error;

/// Errors that can occur while placing a resource
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Scheduler was built with an unusable configuration
    #[error("Invalid scheduler configuration: {message}")]
    InvalidConfiguration { message: String },

    /// The request carries no type and no default is configured
    #[error("You must create a share type in advance, and specify in request body or set default_share_type in the scheduler configuration.")]
    NoDefaultType { resource_id: Option<String> },

    /// No backends are reachable at all; retrying will not help
    #[error("{reason}")]
    WillNotSchedule { reason: String },

    /// Backends exist but none is acceptable for this request
    #[error("No valid host was found. {reason}")]
    NoValidHost {
        reason: String,
        last_filter: Option<String>,
    },
}

/// Discriminant of [`SchedulerError`] for callers that only need the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerErrorKind {
    InvalidConfiguration,
    NoDefaultType,
    WillNotSchedule,
    NoValidHost,
}

impl SchedulerError {
    pub fn no_valid_host(reason: impl Into<String>) -> Self {
        SchedulerError::NoValidHost {
            reason: reason.into(),
            last_filter: None,
        }
    }

    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        SchedulerError::InvalidConfiguration {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> SchedulerErrorKind {
        match self {
            SchedulerError::InvalidConfiguration { .. } => SchedulerErrorKind::InvalidConfiguration,
            SchedulerError::NoDefaultType { .. } => SchedulerErrorKind::NoDefaultType,
            SchedulerError::WillNotSchedule { .. } => SchedulerErrorKind::WillNotSchedule,
            SchedulerError::NoValidHost { .. } => SchedulerErrorKind::NoValidHost,
        }
    }

    /// Name of the filter that emptied the candidate set, when known.
    pub fn last_filter(&self) -> Option<&str> {
        match self {
            SchedulerError::NoValidHost { last_filter, .. } => last_filter.as_deref(),
            _ => None,
        }
    }
}

impl SchedulerErrorKind {
    /// Stable label used in metrics and JSON output.
    pub fn as_str(self) -> &'static str {
        match self {
            SchedulerErrorKind::InvalidConfiguration => "invalid_configuration",
            SchedulerErrorKind::NoDefaultType => "no_default_type",
            SchedulerErrorKind::WillNotSchedule => "will_not_schedule",
            SchedulerErrorKind::NoValidHost => "no_valid_host",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_valid_host_message() {
        let err = SchedulerError::NoValidHost {
            reason: "Failed to find a weighted host, the last executed filter was CapacityFilter."
                .to_string(),
            last_filter: Some("CapacityFilter".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "No valid host was found. Failed to find a weighted host, the last executed filter was CapacityFilter."
        );
        assert_eq!(err.last_filter(), Some("CapacityFilter"));
        assert_eq!(err.kind(), SchedulerErrorKind::NoValidHost);
    }

    #[test]
    fn test_kinds_are_distinct() {
        let unavailable = SchedulerError::WillNotSchedule {
            reason: "no hosts".to_string(),
        };
        let no_host = SchedulerError::no_valid_host("none passed");
        assert_ne!(unavailable.kind(), no_host.kind());
        assert_eq!(unavailable.last_filter(), None);
        assert_eq!(unavailable.kind().as_str(), "will_not_schedule");
    }
}
