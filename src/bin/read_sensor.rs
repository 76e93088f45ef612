//! Log readings from the configured source without starting the web server.
//! Useful for checking the wiring before a live session.

use anyhow::Result;
use clap::Parser;
use emg_monitor::{
    broadcaster::{BroadcastError, Publisher},
    config::Config,
    externals::sensors::services::open_source,
    models::sample::Sample,
    tasks::sampler::{task_sample_and_broadcast, Sampler, SamplerState},
    telemetry::init_tracing,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Publishes by logging.
struct LogPublisher;

impl Publisher for LogPublisher {
    fn publish(&self, sample: Sample) -> Result<usize, BroadcastError> {
        info!("Muscle activity: {}", sample);
        Ok(1)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();
    init_tracing(config.log_level)?;
    config.validate()?;

    let source = open_source(&config)?;
    let sampler = Sampler::new(source, LogPublisher, config.interval());

    let token = CancellationToken::new();
    let token_clone = token.clone();
    tokio::spawn(async move {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for ctrl_c. Error: {}", e);
        }
        token_clone.cancel();
    });

    match task_sample_and_broadcast(token, sampler).await {
        SamplerState::Stopped(reason) => info!("Stopped. {}", reason),
        SamplerState::Running => {}
    }
    Ok(())
}
