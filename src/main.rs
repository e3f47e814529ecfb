mod config;
mod control;
mod kasa;
mod notify;
mod secrets;
mod tado;

use std::time::Duration;

use anyhow::Result;
use aws_config::BehaviorVersion;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::{
    config::Config,
    control::ControlService,
    kasa::KasaClient,
    notify::EmailNotifier,
    tado::TadoClient,
};

/// Wall-clock wait between switching the dehumidifier on and sampling its
/// current draw. The compressor needs this long to reach steady-state; on a
/// shorter delay the low-current check would misfire.
const SETTLE_DELAY: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env (ignore error if file absent — env vars may be set externally)
    let _ = dotenvy::dotenv();

    // Initialise tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    // AWS_REGION is picked up by the default config loader.
    let aws = aws_config::load_defaults(BehaviorVersion::latest()).await;

    // Load config; both service passwords are KMS-decrypted here, before any
    // service call.
    let config = Config::load(&aws_sdk_kms::Client::new(&aws)).await?;

    let sensor = TadoClient::new(&config);
    let plug = KasaClient::new(&config);
    let notifier = EmailNotifier::new(aws_sdk_sesv2::Client::new(&aws), &config);

    let service = ControlService::new(
        sensor,
        plug,
        notifier,
        config.humidity_threshold,
        config.current_alert,
        SETTLE_DELAY,
    );

    // One run is one decision; the scheduler that launches this process
    // decides the cadence.
    match service.invoke().await? {
        Some(status) => info!(status = %status, "Control run complete"),
        None => info!("Control run failed; operator notified"),
    }

    Ok(())
}
