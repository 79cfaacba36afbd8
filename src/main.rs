// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Heatmap-Sync runner
//!
//! Runs one sync against the configured provider and exits. Scheduling is
//! left to whatever invokes the binary.

use anyhow::Context;
use chrono::Utc;
use heatmap_sync::{
    config::Config,
    models::Provider,
    services::{
        ActivitySource, GarminClient, GarminService, StravaClient, StravaService, SyncReport,
        SyncService,
    },
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> std::process::ExitCode {
    // Initialize structured JSON logging
    init_logging();

    match run().await {
        Ok(report) => {
            if report.is_partial() {
                tracing::info!("Run ended early; progress was saved");
            }
            std::process::ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = format!("{:#}", e), "Sync failed");
            eprintln!("heatmap-sync: {:#}", e);
            std::process::ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<SyncReport> {
    // Load and validate configuration before any network call
    let config = Config::from_env().context("Failed to load configuration")?;
    config
        .validate(Utc::now().date_naive())
        .context("Invalid configuration")?;
    tracing::info!(
        provider = %config.provider,
        data_dir = %config.paths.data_dir.display(),
        "Starting sync"
    );

    let report = match config.provider {
        Provider::Strava => {
            let source = StravaService::connect(StravaClient::new(), &config.credentials).await?;
            sync_with(config, &source).await?
        }
        Provider::Garmin => {
            let source = GarminService::connect(GarminClient::new(), &config.credentials)?;
            sync_with(config, &source).await?
        }
    };
    Ok(report)
}

async fn sync_with<S: ActivitySource>(config: Config, source: &S) -> anyhow::Result<SyncReport> {
    let service = SyncService::new(config);
    Ok(service.run_once(source).await?)
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("heatmap_sync=debug,info"));

    tracing_subscriber::registry().with(filter).with(format).init();
}
