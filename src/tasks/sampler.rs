use std::{thread, time::Duration};

use thiserror::Error;
use tokio::{runtime, sync::oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::{
    broadcaster::{BroadcastError, Publisher},
    externals::sensors::services::{ReadingSource, SourceError},
};

/// Why a sampler stopped. Stopping is permanent.
#[derive(Error, Debug)]
pub enum StopReason {
    #[error("Cancelled.")]
    Cancelled,

    #[error("Failed to read from the reading source. Error: {0}")]
    Source(#[from] SourceError),

    #[error("Failed to publish sample. Error: {0}")]
    Publish(#[from] BroadcastError),
}

#[derive(Debug)]
pub enum SamplerState {
    Running,
    Stopped(StopReason),
}

impl SamplerState {
    pub fn is_running(&self) -> bool {
        matches!(self, SamplerState::Running)
    }
}

/// Reads one sample per tick and hands it to a publisher. The first read or
/// publish failure stops it for good and releases the source.
pub struct Sampler<S: ReadingSource, P: Publisher> {
    source: S,
    publisher: P,
    interval: Duration,
    state: SamplerState,
    published: u64,
}

impl<S: ReadingSource, P: Publisher> Sampler<S, P> {
    pub fn new(source: S, publisher: P, interval: Duration) -> Self {
        Self {
            source,
            publisher,
            interval,
            state: SamplerState::Running,
            published: 0,
        }
    }

    pub fn state(&self) -> &SamplerState {
        &self.state
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of samples handed to the publisher so far.
    pub fn published(&self) -> u64 {
        self.published
    }

    /// One read followed by one publish. A no-op once stopped.
    pub fn tick(&mut self) -> &SamplerState {
        if !self.state.is_running() {
            return &self.state;
        }

        let sample = match self.source.produce_one_reading() {
            Ok(sample) => sample,
            Err(e) => {
                self.stop(e.into());
                return &self.state;
            }
        };

        match self.publisher.publish(sample) {
            Ok(subscribers) => {
                self.published += 1;
                trace!("Published {} to {} subscribers.", sample, subscribers);
            }
            Err(e) => self.stop(e.into()),
        }
        &self.state
    }

    /// Stop without a failure. A no-op once stopped.
    pub fn cancel(&mut self) {
        if self.state.is_running() {
            self.stop(StopReason::Cancelled);
        }
    }

    /// The only transition out of `Running`, so the source is closed exactly once.
    fn stop(&mut self, reason: StopReason) {
        match &reason {
            StopReason::Cancelled => warn!("Sampler cancelled."),
            e => error!("Sampler stopped permanently. {}", e),
        }

        if let Err(e) = self.source.close() {
            error!("Failed to close {} source. Error: {}", self.source.name(), e);
        } else {
            debug!("Closed {} source.", self.source.name());
        }
        self.state = SamplerState::Stopped(reason);
    }

    pub fn into_state(self) -> SamplerState {
        self.state
    }
}

/// Task: Runs periodically to read the sensor and broadcast the sample.
/// Sleeps a fixed interval after every tick, so latency of the read and
/// publish adds to the spacing between samples. Exits on the first error or
/// when cancelled, and returns the final state.
#[tracing::instrument(skip_all)]
pub async fn task_sample_and_broadcast<S: ReadingSource, P: Publisher>(
    token: CancellationToken,
    mut sampler: Sampler<S, P>,
) -> SamplerState {
    info!(
        "Started. Sampling {} every {:?}.",
        sampler.source.name(),
        sampler.interval
    );

    loop {
        if token.is_cancelled() {
            sampler.cancel();
            break;
        }
        if !sampler.tick().is_running() {
            break;
        }

        tokio::select! {
            _ = token.cancelled() => {
                sampler.cancel();
                break;
            },
            _ = tokio::time::sleep(sampler.interval) => {}
        };
    }

    info!("Exited after publishing {} samples.", sampler.published);
    sampler.into_state()
}

/// Runs `task_sample_and_broadcast` on a dedicated OS thread with its own
/// current-thread runtime. Reads block only that thread, never the workers
/// answering requests. The thread is detached: a read that never returns
/// does not hold up process exit. The receiver resolves with the final state.
pub fn spawn_sampler_thread<S, P>(
    token: CancellationToken,
    sampler: Sampler<S, P>,
) -> std::io::Result<oneshot::Receiver<SamplerState>>
where
    S: ReadingSource + 'static,
    P: Publisher + 'static,
{
    let runtime = runtime::Builder::new_current_thread().enable_time().build()?;
    let (tx, rx) = oneshot::channel();

    thread::Builder::new()
        .name("sampler".to_string())
        .spawn(move || {
            let state = runtime.block_on(task_sample_and_broadcast(token, sampler));
            // Nobody waiting is fine.
            let _ = tx.send(state);
        })?;

    Ok(rx)
}
