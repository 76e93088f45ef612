use thiserror::Error;
use tokio::sync::broadcast::{self, Receiver, Sender};
use tracing::trace;

use crate::models::sample::Sample;

/// Event name every sample is published under.
pub const EVENT_NAME: &str = "emg_data";

/// Anything the sampler can hand a sample to.
pub trait Publisher: Send {
    /// Fire-and-forget. Returns how many subscribers the sample was queued
    /// for, which may be zero.
    fn publish(&self, sample: Sample) -> Result<usize, BroadcastError>;
}

#[derive(Error, Debug)]
pub enum BroadcastError {
    /// JSON has no representation for NaN or infinity.
    #[error("Refusing to publish non-finite sample {0}.")]
    NonFinite(Sample),
}

/// Fan-out of samples to every connected websocket subscriber.
///
/// Each subscriber owns a bounded queue. A subscriber that falls more than
/// `capacity` samples behind skips the oldest ones; the publisher never waits.
#[derive(Clone, Debug)]
pub struct Broadcaster {
    tx: Sender<Sample>,
}

impl Broadcaster {
    /// Panics if `capacity` is zero or absurdly large. `Config::validate`
    /// bounds it before startup.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> Receiver<Sample> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Publisher for Broadcaster {
    fn publish(&self, sample: Sample) -> Result<usize, BroadcastError> {
        if !sample.is_finite() {
            return Err(BroadcastError::NonFinite(sample));
        }
        match self.tx.send(sample) {
            Ok(subscribers) => Ok(subscribers),
            Err(_) => {
                trace!("No subscribers, dropped sample {}.", sample);
                Ok(0)
            }
        }
    }
}

/// Encode one published sample as a websocket text frame:
/// `["emg_data", <scalar>]`.
pub fn encode_event(sample: Sample) -> Result<String, serde_json::Error> {
    serde_json::to_string(&(EVENT_NAME, sample))
}

#[cfg(test)]
mod tests {
    use tokio::sync::broadcast::error::TryRecvError;

    use super::*;

    #[test]
    fn test_publish_without_subscribers_is_dropped() {
        let broadcaster = Broadcaster::new(4);
        assert_eq!(broadcaster.subscriber_count(), 0);
        for i in 0..100 {
            assert_eq!(broadcaster.publish(Sample::Integer(i)).unwrap(), 0);
        }
    }

    #[test]
    fn test_every_subscriber_gets_samples_in_order() {
        let broadcaster = Broadcaster::new(8);
        let mut a = broadcaster.subscribe();
        let mut b = broadcaster.subscribe();

        for value in [3, 7, 2] {
            assert_eq!(broadcaster.publish(Sample::Integer(value)).unwrap(), 2);
        }

        for rx in [&mut a, &mut b] {
            assert_eq!(rx.try_recv().unwrap(), Sample::Integer(3));
            assert_eq!(rx.try_recv().unwrap(), Sample::Integer(7));
            assert_eq!(rx.try_recv().unwrap(), Sample::Integer(2));
            assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
        }
    }

    #[test]
    fn test_late_subscriber_gets_no_replay() {
        let broadcaster = Broadcaster::new(8);
        let _early = broadcaster.subscribe();
        broadcaster.publish(Sample::Integer(1)).unwrap();

        let mut late = broadcaster.subscribe();
        assert!(matches!(late.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn test_slow_subscriber_lags_without_blocking_publisher() {
        let broadcaster = Broadcaster::new(2);
        let mut slow = broadcaster.subscribe();
        for i in 0..5 {
            broadcaster.publish(Sample::Integer(i)).unwrap();
        }

        assert!(matches!(slow.try_recv(), Err(TryRecvError::Lagged(3))));
        assert_eq!(slow.try_recv().unwrap(), Sample::Integer(3));
        assert_eq!(slow.try_recv().unwrap(), Sample::Integer(4));
    }

    #[test]
    fn test_rejects_non_finite() {
        let broadcaster = Broadcaster::new(2);
        let _rx = broadcaster.subscribe();
        assert!(matches!(
            broadcaster.publish(Sample::Float(f64::NAN)),
            Err(BroadcastError::NonFinite(_))
        ));
    }

    #[test]
    fn test_encode_event() {
        assert_eq!(
            encode_event(Sample::Integer(7)).unwrap(),
            r#"["emg_data",7]"#
        );
        assert_eq!(
            encode_event(Sample::Float(0.5)).unwrap(),
            r#"["emg_data",0.5]"#
        );
    }
}
