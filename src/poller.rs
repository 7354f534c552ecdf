use std::{future::Future, sync::Arc, time::Duration};

use tokio::{
    sync::{watch, Notify},
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tracing::{debug, info};

/// Refresh period used by every view unless configured otherwise.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(5000);

/// Interval-driven refresh loop for one view.
///
/// The callback runs once immediately on start, then on every tick until the
/// poller is stopped. Invocations are awaited one after another, so a slow
/// refresh delays the next tick instead of overlapping it.
///
/// An optional [`Notify`] trigger requests an extra refresh right away (e.g.
/// after a filter change or a push notification) and restarts the interval.
///
/// Dropping a `Poller` deactivates it; [`Poller::stop`] additionally waits
/// for the loop to exit.
#[derive(Debug)]
pub struct Poller {
    name: String,
    stop_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

#[derive(Debug)]
pub struct PollerBuilder {
    name: String,
    interval: Duration,
    trigger: Option<Arc<Notify>>,
}

impl PollerBuilder {
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn trigger(mut self, trigger: Arc<Notify>) -> Self {
        self.trigger = Some(trigger);
        self
    }

    /// Spawn the loop. Must be called from within a tokio runtime.
    pub fn start<F, Fut>(self, mut refresh: F) -> Poller
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let Self {
            name,
            interval,
            trigger,
        } = self;

        info!(poller = %name, interval_ms = interval.as_millis() as u64, "Poller started");

        let task_name = name.clone();
        let handle = tokio::spawn(async move {
            refresh().await;

            let mut ticker = time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = stop_rx.changed() => break,
                    _ = ticker.tick() => {}
                    _ = triggered(trigger.as_deref()) => {
                        debug!(poller = %task_name, "Refresh triggered");
                        ticker.reset();
                    }
                }
                if *stop_rx.borrow() {
                    break;
                }
                refresh().await;
            }

            debug!(poller = %task_name, "Poller loop exited");
        });

        Poller {
            name,
            stop_tx,
            handle: Some(handle),
        }
    }
}

async fn triggered(trigger: Option<&Notify>) {
    match trigger {
        Some(notify) => notify.notified().await,
        None => std::future::pending().await,
    }
}

impl Poller {
    pub fn builder(name: impl Into<String>) -> PollerBuilder {
        PollerBuilder {
            name: name.into(),
            interval: DEFAULT_INTERVAL,
            trigger: None,
        }
    }

    pub fn is_active(&self) -> bool {
        !*self.stop_tx.borrow() && self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Deactivate and wait for the loop to exit. A refresh that is already
    /// running is allowed to finish; no further one is scheduled.
    pub async fn stop(mut self) {
        let _ = self.stop_tx.send(true);
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
        info!(poller = %self.name, "Poller stopped");
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(true);
    }
}
