//! Connectivity signal.
//!
//! [`Connectivity`] is the producer side: platform glue calls
//! [`Connectivity::set`] whenever reachability changes. Consumers hold a
//! `watch::Receiver`, which always reflects the latest state; repeated reports
//! of the same state are not delivered as changes.

use serde::Serialize;
use tokio::sync::watch;

/// Network reachability.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkState {
    /// The remote side is reachable.
    Online,
    /// No connection.
    Offline,
}

impl NetworkState {
    /// Whether this is [`NetworkState::Online`].
    pub fn is_online(self) -> bool {
        self == Self::Online
    }

    /// Whether moving from `self` to `next` is a reconnect.
    pub fn is_reconnect(self, next: Self) -> bool {
        self == Self::Offline && next == Self::Online
    }
}

/// Owner of the connectivity channel.
#[derive(Debug)]
pub struct Connectivity {
    tx: watch::Sender<NetworkState>,
}

impl Connectivity {
    /// Start with `initial` state.
    pub fn new(initial: NetworkState) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// Report the current state. Returns `true` if it differs from the last one.
    pub fn set(&self, state: NetworkState) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state;
            true
        })
    }

    /// Latest reported state.
    pub fn current(&self) -> NetworkState {
        *self.tx.borrow()
    }

    /// New receiver positioned at the current state.
    pub fn subscribe(&self) -> watch::Receiver<NetworkState> {
        self.tx.subscribe()
    }
}
