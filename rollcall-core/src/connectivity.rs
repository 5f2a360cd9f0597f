//! Online/offline state and the drain trigger that follows it.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::coordinator::SubmissionCoordinator;
use crate::notice::Notifier;

/// Connectivity as last reported by the host.
///
/// `reconnects` counts offline-to-online transitions. A watcher that only
/// sees the latest value can still tell that the host went offline and came
/// back in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivityState {
    pub online: bool,
    pub reconnects: u64,
}

/// Shared online flag. Clones observe and update the same state.
#[derive(Debug, Clone)]
pub struct Connectivity {
    state: Arc<watch::Sender<ConnectivityState>>,
}

impl Default for Connectivity {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Connectivity {
    pub fn new(online: bool) -> Self {
        let (state, _) = watch::channel(ConnectivityState {
            online,
            reconnects: 0,
        });
        Self {
            state: Arc::new(state),
        }
    }

    pub fn is_online(&self) -> bool {
        self.state.borrow().online
    }

    /// Record the host's current connectivity. Returns whether it changed.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.state.send_if_modified(|current| {
            if current.online == online {
                return false;
            }
            current.online = online;
            if online {
                current.reconnects += 1;
            }
            true
        });
        if changed {
            info!(online, "connectivity changed");
        }
        changed
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectivityState> {
        self.state.subscribe()
    }
}

/// Drains the offline queue once at startup and again every time the
/// host comes back online. Never polls.
#[derive(Debug)]
pub struct ConnectivityMonitor;

impl ConnectivityMonitor {
    pub fn spawn(
        coordinator: Arc<SubmissionCoordinator>,
        connectivity: Connectivity,
        notifier: Arc<dyn Notifier>,
    ) -> JoinHandle<()> {
        let mut updates = connectivity.subscribe();
        drop(connectivity);

        tokio::spawn(async move {
            let initial = *updates.borrow_and_update();
            let mut seen_reconnects = initial.reconnects;
            debug!(online = initial.online, "connectivity monitor started");
            drain_and_notify(&coordinator, notifier.as_ref()).await;

            while updates.changed().await.is_ok() {
                let state = *updates.borrow_and_update();
                // Intermediate values may have been coalesced; a moved
                // counter still means at least one reconnect happened.
                if state.online && state.reconnects != seen_reconnects {
                    drain_and_notify(&coordinator, notifier.as_ref()).await;
                }
                seen_reconnects = state.reconnects;
            }
            debug!("connectivity monitor stopped");
        })
    }
}

async fn drain_and_notify(coordinator: &SubmissionCoordinator, notifier: &dyn Notifier) {
    let report = coordinator.drain_queue().await;
    if let Some(notice) = report.notice() {
        notifier.notify(notice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let connectivity = Connectivity::new(false);
        let other = connectivity.clone();

        assert!(other.set_online(true));
        assert!(connectivity.is_online());
    }

    #[test]
    fn repeated_state_is_not_a_change() {
        let connectivity = Connectivity::default();
        assert!(connectivity.is_online());
        assert!(!connectivity.set_online(true));
        assert!(connectivity.set_online(false));
        assert!(!connectivity.set_online(false));
    }

    #[tokio::test]
    async fn subscribers_see_transitions() {
        let connectivity = Connectivity::new(false);
        let mut updates = connectivity.subscribe();

        connectivity.set_online(true);
        updates.changed().await.unwrap();
        assert!(updates.borrow_and_update().online);
    }

    #[tokio::test]
    async fn a_collapsed_flap_still_counts_as_a_reconnect() {
        let connectivity = Connectivity::default();
        let mut updates = connectivity.subscribe();
        let _ = updates.borrow_and_update();

        connectivity.set_online(false);
        connectivity.set_online(true);

        updates.changed().await.unwrap();
        let state = *updates.borrow_and_update();
        assert_eq!(
            state,
            ConnectivityState {
                online: true,
                reconnects: 1
            }
        );
    }
}
