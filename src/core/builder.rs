use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::{
    config::Config,
    error::LifecycleError,
    events::Bus,
    subscribers::{Subscribe, SubscriberSet},
};
use super::{owner::Owner, scheduler::Scheduler, supervisor::LifecycleSupervisor};

/// Builder for attaching a [`LifecycleSupervisor`] to an owner.
pub struct SupervisorBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
    scheduler: Option<Scheduler>,
}

impl SupervisorBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            scheduler: None,
        }
    }

    /// Sets event subscribers.
    ///
    /// Subscribers receive every event of the supervisor and its resources
    /// through dedicated workers with bounded queues. Requires a tokio runtime
    /// at [`attach`](Self::attach).
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Shares a scheduler (and its virtual clock) with other supervisors.
    ///
    /// Without one, the supervisor gets a private scheduler.
    pub fn with_scheduler(mut self, scheduler: Scheduler) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Builds the supervisor and attaches it to `owner` as a destruction listener.
    ///
    /// # Errors
    /// - [`LifecycleError::InvalidState`] if `owner` is already destroyed;
    /// - [`LifecycleError::NoRuntime`] if subscribers were given outside a tokio runtime.
    pub fn attach(self, owner: &Arc<Owner>) -> Result<Arc<LifecycleSupervisor>, LifecycleError> {
        if owner.is_destroyed() {
            return Err(LifecycleError::InvalidState {
                owner: owner.id(),
                reason: "owner_destroyed",
            });
        }

        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let fanout = CancellationToken::new();
        if !self.subscribers.is_empty() {
            tokio::runtime::Handle::try_current().map_err(|_| LifecycleError::NoRuntime)?;
            let subs = SubscriberSet::new(self.subscribers, bus.clone());
            subscriber_listener(&bus, subs, fanout.clone());
        }

        let sup = Arc::new(LifecycleSupervisor::new_internal(
            self.cfg,
            owner,
            bus,
            self.scheduler.unwrap_or_default(),
            fanout,
        ));
        owner.attach(sup.clone())?;
        Ok(sup)
    }
}

/// Forwards bus events to the subscriber set until `stop` is cancelled.
///
/// The set itself holds a publisher (for overflow and panic events), so the
/// bus never closes on its own. On `stop` the listener forwards whatever is
/// still buffered, then shuts the set down and waits for its workers.
fn subscriber_listener(bus: &Bus, set: SubscriberSet, stop: CancellationToken) {
    use tokio::sync::broadcast::error::{RecvError, TryRecvError};

    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                res = rx.recv() => match res {
                    Ok(ev) => set.emit(&ev),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "subscriber listener lagged");
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = stop.cancelled() => break,
            }
        }
        loop {
            match rx.try_recv() {
                Ok(ev) => set.emit(&ev),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
        set.shutdown().await;
    });
}
