//! Serve command implementation
//!
//! Reads one JSON [`SchedulingRequest`] per line from stdin and writes one
//! JSON [`Decision`] per line to stdout, while a background task keeps the
//! host registry in sync with its source file.

use crate::cli::output::format_decision;
use crate::cli::schedule::{build_scheduler, dispatch, Decision, SchedulerHandle, SchedulingRequest};
use crate::cli::{ConfigArgs, ServeArgs};
use crate::config::BerthConfig;
use crate::host::CapabilityRefresher;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;

/// Load configuration with CLI overrides
pub fn load_config_with_overrides(
    args: &ConfigArgs,
) -> Result<BerthConfig, Box<dyn std::error::Error>> {
    // Load from file if it exists, otherwise use defaults
    let mut config = if args.config.exists() {
        BerthConfig::load(Some(&args.config))?
    } else {
        tracing::debug!("Config file not found, using defaults");
        BerthConfig::default()
    };

    // Apply environment variable overrides
    config = config.with_env_overrides();

    // Apply CLI overrides (highest priority)
    if let Some(ref hosts) = args.hosts {
        config.hosts.source = Some(hosts.clone());
    }
    if let Some(ref log_level) = args.log_level {
        config.logging.level = log_level.clone();
    }
    if let Some(max_attempts) = args.max_attempts {
        config.scheduler.max_attempts = max_attempts;
    }

    Ok(config)
}

/// Answer requests from `reader` until EOF or cancellation.
///
/// Returns the number of requests answered. Blank lines are skipped; lines
/// that do not parse get an `invalid_request` decision.
pub async fn serve_lines<R, W>(
    handle: &SchedulerHandle,
    reader: R,
    writer: &mut W,
    cancel_token: CancellationToken,
) -> std::io::Result<usize>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    let mut answered = 0;

    loop {
        let line = tokio::select! {
            _ = cancel_token.cancelled() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            tracing::debug!("Input closed");
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let decision = match serde_json::from_str::<SchedulingRequest>(line) {
            Ok(request) => dispatch(handle, request),
            Err(e) => {
                tracing::warn!(error = %e, "Rejected malformed request");
                Decision::invalid_request(e.to_string())
            }
        };

        writer
            .write_all(format_decision(&decision, false).as_bytes())
            .await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        answered += 1;
    }

    Ok(answered)
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal(cancel_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to install CTRL+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, shutting down...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
        _ = cancel_token.cancelled() => {}
    }

    cancel_token.cancel();
}

/// Main serve command handler
pub async fn run_serve(args: ServeArgs) -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load and merge configuration
    let config = load_config_with_overrides(&args.config)?;
    config.validate()?;

    // 2. Initialize tracing
    crate::logging::init_tracing(&config.logging)?;

    tracing::info!("Starting Berth scheduler");
    tracing::debug!(?config, "Loaded configuration");

    // 3. Load hosts and build the scheduler
    let handle = build_scheduler(&config)?;
    tracing::info!(hosts = handle.registry.host_count(), "Host registry loaded");

    // 4. Start the capability refresher when there is something to refresh
    let cancel_token = CancellationToken::new();
    let refresher_handle = if config.hosts.source.is_some() && !args.no_refresh {
        tracing::info!(
            interval_seconds = config.hosts.refresh_interval_seconds,
            "Starting capability refresher"
        );
        let refresher = CapabilityRefresher::new(
            handle.registry.clone(),
            config.hosts.refresh_interval_seconds,
        );
        Some(refresher.start(cancel_token.clone()))
    } else {
        tracing::info!("Capability refresh disabled");
        None
    };

    let signal_handle = tokio::spawn(shutdown_signal(cancel_token.clone()));

    // 5. Answer requests
    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    let answered = serve_lines(&handle, stdin, &mut stdout, cancel_token.clone()).await?;

    // 6. Cleanup
    cancel_token.cancel();
    if let Some(handle) = refresher_handle {
        tracing::info!("Waiting for capability refresher to stop");
        handle.await?;
    }
    signal_handle.await?;

    tracing::info!(answered, "Berth scheduler stopped");
    Ok(())
}
