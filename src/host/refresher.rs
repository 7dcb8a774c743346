use super::HostRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Background service that periodically reloads capability reports.
pub struct CapabilityRefresher {
    registry: Arc<HostRegistry>,
    interval_seconds: u64,
}

impl CapabilityRefresher {
    pub fn new(registry: Arc<HostRegistry>, interval_seconds: u64) -> Self {
        Self {
            registry,
            interval_seconds,
        }
    }

    /// Reload once, logging rather than returning failures.
    pub fn refresh_once(&self) -> Option<usize> {
        match self.registry.reload() {
            Ok(count) => {
                metrics::gauge!("berth_hosts_registered").set(count as f64);
                Some(count)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Capability refresh failed, keeping previous reports");
                None
            }
        }
    }

    /// Start the refresher background task.
    /// Returns a JoinHandle that resolves when the refresher stops.
    pub fn start(self, cancel_token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(self.interval_seconds));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            tracing::info!(
                interval_seconds = self.interval_seconds,
                "Capability refresher started"
            );

            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => {
                        tracing::info!("Capability refresher shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        if let Some(count) = self.refresh_once() {
                            tracing::debug!(hosts = count, "Capability refresh cycle completed");
                        }
                    }
                }
            }
        })
    }
}
