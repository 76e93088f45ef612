use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use emg_monitor::{
    broadcaster::Broadcaster,
    config::Config,
    externals::{
        sensors::services::open_source,
        web::{state::AppContext, task_serve},
    },
    tasks::sampler::{spawn_sampler_thread, Sampler, SamplerState},
    telemetry::init_tracing,
};
use tokio::{net::TcpListener, signal};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{error, info, warn};

/// How long shutdown waits for a sampler that is inside a read.
const SAMPLER_GRACE: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();
    init_tracing(config.log_level)?;
    config.validate()?;
    info!("Starting with {:?} source.", config.variant);

    let tracker = TaskTracker::new();
    let token = CancellationToken::new();
    let broadcaster = Broadcaster::new(config.channel_capacity);

    // NOTE: Hardware is opened before anything is spawned so a missing bus or
    // daemon fails the process at startup.
    let source = open_source(&config)?;
    let listener = TcpListener::bind(config.bind).await?;

    let sampler = Sampler::new(source, broadcaster.clone(), config.interval());
    // The server keeps running after the sampler stops.
    let sampler_done = spawn_sampler_thread(token.clone(), sampler)?;

    let ctx = AppContext::new(broadcaster, token.clone());
    let token_clone = token.clone();
    tracker.spawn(async move {
        if let Err(e) = task_serve(listener, ctx).await {
            error!("Web server failed. Error: {}", e);
            token_clone.cancel();
        }
    });

    let token_clone = token.clone();

    tokio::select! {
        _ = token_clone.cancelled() => {}
        res = signal::ctrl_c() => {
            match res {
                Ok(_) => {
                    info!("Shutting down.");
                    token.cancel();
                },
                Err(e) => {
                    error!("Failed to listen for ctrl_c. Error: {}", e);
                    token.cancel();
                }
            };
        },
    }

    tracker.close();
    tracker.wait().await;

    match tokio::time::timeout(SAMPLER_GRACE, sampler_done).await {
        Ok(Ok(SamplerState::Stopped(reason))) => info!("Sampler stopped. {}", reason),
        Ok(Ok(SamplerState::Running)) => {}
        Ok(Err(_)) => error!("Sampler thread exited without reporting."),
        Err(_) => warn!("Sampler is stuck in a read. Exiting without it."),
    }

    Ok(())
}
