use super::{FilterProperties, RetryRecord, SchedulerError};

/// Enforces the maximum number of scheduling attempts per logical request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryTracker {
    max_attempts: u32,
}

impl RetryTracker {
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidConfiguration` when `max_attempts < 1`.
    pub fn new(max_attempts: u32) -> Result<Self, SchedulerError> {
        if max_attempts < 1 {
            return Err(SchedulerError::invalid_configuration(
                "Invalid value for 'max_attempts', must be >= 1",
            ));
        }
        Ok(Self { max_attempts })
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Record another attempt on `props`.
    ///
    /// With a single allowed attempt re-scheduling is disabled and any
    /// existing record is dropped.
    pub fn populate(
        &self,
        props: &mut FilterProperties,
        resource_id: Option<&str>,
    ) -> Result<(), SchedulerError> {
        let retry = props.retry.take();

        if self.max_attempts == 1 {
            return Ok(());
        }

        let mut retry = match retry {
            Some(mut existing) => {
                existing.num_attempts = existing.num_attempts.saturating_add(1);
                existing
            }
            None => RetryRecord {
                num_attempts: 1,
                hosts: Vec::new(),
                exc: None,
            },
        };

        log_previous_error(resource_id, &mut retry);

        let num_attempts = retry.num_attempts;
        props.retry = Some(retry);

        if num_attempts > self.max_attempts {
            let resource_id = resource_id.unwrap_or("None");
            return Err(SchedulerError::no_valid_host(format!(
                "Exceeded max scheduling attempts {} for share {}",
                self.max_attempts, resource_id
            )));
        }

        tracing::trace!(
            resource_id = resource_id.unwrap_or_default(),
            num_attempts,
            max_attempts = self.max_attempts,
            "Retry record populated"
        );
        Ok(())
    }
}

/// Append the chosen host to the retry record, when retries are enabled.
pub fn add_retry_host(props: &mut FilterProperties, host: &str) {
    if let Some(retry) = props.retry.as_mut() {
        retry.hosts.push(host.to_string());
    }
}

fn log_previous_error(resource_id: Option<&str>, retry: &mut RetryRecord) {
    let Some(exc) = retry.exc.take() else {
        return;
    };
    let Some(last_host) = retry.hosts.last() else {
        return;
    };
    tracing::error!(
        resource_id = resource_id.unwrap_or_default(),
        last_host = %last_host,
        error = %exc,
        "Error scheduling resource from last backend service"
    );
}
