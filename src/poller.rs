//! Periodic device-location polling for the map screen.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::GpsPoint;
use crate::coordinator::MapCoordinator;
use crate::source::RouteProvider;

/// Source of device location fixes.
pub trait LocationProvider: Send + Sync + 'static {
    /// Last known location, `None` when no fix is available yet.
    fn last_location(&self) -> impl Future<Output = Option<GpsPoint>> + Send;
}

/// Background task feeding location fixes into a [`MapCoordinator`].
///
/// Each tick reads the provider and passes the fix to
/// [`MapCoordinator::update_location`]; when that asks for a fetch, a
/// `load_nearby` for the fix is spawned. The loop ends on [`stop`](Self::stop)
/// or when the poller is dropped. Fetches already spawned run to completion.
pub struct LocationPoller {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl LocationPoller {
    /// Start polling on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime, like `tokio::spawn`.
    pub fn spawn<S, L>(coordinator: Arc<MapCoordinator<S>>, provider: Arc<L>, period: Duration) -> Self
    where
        S: RouteProvider,
        L: LocationProvider,
    {
        Self::spawn_on(&Handle::current(), coordinator, provider, period)
    }

    /// Start polling on `runtime`.
    pub fn spawn_on<S, L>(
        runtime: &Handle,
        coordinator: Arc<MapCoordinator<S>>,
        provider: Arc<L>,
        period: Duration,
    ) -> Self
    where
        S: RouteProvider,
        L: LocationProvider,
    {
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let spawner = runtime.clone();

        let handle = runtime.spawn(async move {
            info!("[LocationPoller] Started, period {:?}", period);
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = shutdown_rx.changed() => break,
                }

                let fix = tokio::select! {
                    fix = provider.last_location() => fix,
                    _ = shutdown_rx.changed() => break,
                };
                let Some(location) = fix else {
                    debug!("[LocationPoller] No fix yet");
                    continue;
                };

                if coordinator.update_location(location) {
                    debug!(
                        "[LocationPoller] First fix at ({:.5}, {:.5}), fetching routes",
                        location.latitude, location.longitude
                    );
                    let coordinator = Arc::clone(&coordinator);
                    spawner.spawn(async move {
                        coordinator
                            .load_nearby(Some(location.latitude), Some(location.longitude), false)
                            .await;
                    });
                }
            }

            info!("[LocationPoller] Stopped");
        });

        Self { shutdown, handle }
    }

    /// Ask the loop to end. A location read still in flight is abandoned.
    pub fn stop(&self) {
        let _ = self.shutdown.send(true);
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for LocationPoller {
    fn drop(&mut self) {
        self.stop();
    }
}
