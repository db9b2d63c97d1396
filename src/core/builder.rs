use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use super::{config::SchedulerConfig, scheduler::Scheduler};
use crate::{
    events::{Bus, Event},
    subscribers::{Subscribe, SubscriberSet},
};

/// Builder for constructing a [`Scheduler`] with subscribers.
pub struct SchedulerBuilder {
    cfg: SchedulerConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl SchedulerBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: SchedulerConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive scheduler events (provider cycles, failures, drops)
    /// through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Adds one subscriber.
    pub fn with_subscriber(mut self, subscriber: Arc<dyn Subscribe>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    /// Builds and returns the scheduler.
    ///
    /// With subscribers present this spawns their workers and a listener that forwards
    /// bus events to them; both stop when the scheduler is dropped. Requires a tokio
    /// runtime in that case.
    pub fn build(self) -> Scheduler {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        if self.subscribers.is_empty() {
            return Scheduler::from_parts(self.cfg, bus, None);
        }

        let subs = Arc::new(SubscriberSet::new(self.subscribers, bus.clone()));
        let stop = CancellationToken::new();
        subscriber_listener(&bus, subs, stop.clone());
        Scheduler::from_parts(self.cfg, bus, Some(stop))
    }
}

/// Subscribes to the bus and forwards events to the subscriber set (fire-and-forget).
fn subscriber_listener(bus: &Bus, set: Arc<SubscriberSet>, stop: CancellationToken) {
    let mut rx = bus.subscribe();
    let lag_bus = bus.clone();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                msg = rx.recv() => match msg {
                    Ok(ev) => set.emit(&ev),
                    Err(RecvError::Closed) => break,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "subscriber listener lagged");
                        lag_bus.publish(Event::subscriber_overflow("listener", "lagged"));
                    }
                }
            }
        }
        // Last handle to the set: drain the workers.
        if let Ok(set) = Arc::try_unwrap(set) {
            set.shutdown().await;
        }
    });
}
