//! Online/offline signal.

use tokio::sync::watch;

/// Publisher of the client's connectivity.
#[derive(Debug)]
pub struct Connectivity {
    tx: watch::Sender<bool>,
}

impl Connectivity {
    /// Creates a signal with the given initial state.
    #[must_use]
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self { tx }
    }

    /// Publishes a new state. Repeating the current state is a no-op.
    pub fn set_online(&self, online: bool) {
        self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
    }

    /// Current state.
    #[must_use]
    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Subscribes to state changes.
    #[must_use]
    pub fn subscribe(&self) -> ConnectivityWatch {
        let rx = self.tx.subscribe();
        let last_seen = *rx.borrow();
        ConnectivityWatch { rx, last_seen }
    }
}

impl Default for Connectivity {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Subscriber side of [`Connectivity`].
#[derive(Debug, Clone)]
pub struct ConnectivityWatch {
    rx: watch::Receiver<bool>,
    last_seen: bool,
}

impl ConnectivityWatch {
    /// Current state.
    #[must_use]
    pub fn is_online(&self) -> bool {
        *self.rx.borrow()
    }

    /// Waits until the state goes from offline to online.
    ///
    /// Returns `false` once the publisher is gone.
    /// Edges that happen entirely between two polls are coalesced.
    pub async fn reconnected(&mut self) -> bool {
        loop {
            if self.rx.changed().await.is_err() {
                return false;
            }
            let online = *self.rx.borrow_and_update();
            let edge = online && !self.last_seen;
            self.last_seen = online;
            if edge {
                return true;
            }
        }
    }
}
