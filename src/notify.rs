//! Fan-out of snapshots to interested observers.
//!
//! Every accepted mutation pushes the full [`Snapshot`] (never a diff) to
//! each registered [`Observer`], so a missed notification heals itself on
//! the next one. A failing observer is logged and skipped; it never stops
//! delivery to the rest.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::models::Snapshot;

/// Returned by an observer that could not take a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("observer unavailable: {0}")]
pub struct DeliveryError(pub String);

/// Receives the full snapshot after every accepted mutation.
pub trait Observer: core::fmt::Debug + Send + Sync {
    /// Delivers one snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError`] if the observer is gone or cannot accept
    /// the snapshot. The error is logged and otherwise ignored.
    fn on_snapshot(&self, snapshot: &Snapshot) -> Result<(), DeliveryError>;
}

/// Observer backed by an unbounded channel.
///
/// Delivery fails once the receiving half is dropped, mirroring a page or
/// popup that stopped listening.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    /// Label used in logs.
    name: String,
    /// Sending half of the channel.
    tx: mpsc::UnboundedSender<Snapshot>,
}

impl ChannelObserver {
    /// Creates an observer and the receiver that will get its snapshots.
    #[inline]
    #[must_use]
    pub fn new<T: Into<String>>(name: T) -> (Self, mpsc::UnboundedReceiver<Snapshot>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                name: name.into(),
                tx,
            },
            rx,
        )
    }
}

impl Observer for ChannelObserver {
    #[inline]
    fn on_snapshot(&self, snapshot: &Snapshot) -> Result<(), DeliveryError> {
        self.tx
            .send(snapshot.clone())
            .map_err(|_closed| DeliveryError(self.name.clone()))
    }
}

/// Delivers snapshots to every registered observer.
#[derive(Debug, Default, Clone)]
pub struct Notifier {
    /// Registered observers, notified in registration order.
    observers: Vec<Arc<dyn Observer>>,
}

impl Notifier {
    /// Creates a notifier with no observers.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an observer.
    #[inline]
    #[must_use]
    pub fn with_observer<O: Observer + 'static>(mut self, observer: O) -> Self {
        self.observers.push(Arc::new(observer));
        self
    }

    /// Returns the number of registered observers.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    /// Returns `true` if no observers are registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Pushes `snapshot` to every observer, returning how many accepted it.
    #[inline]
    #[tracing::instrument(skip_all, fields(observers = self.observers.len()))]
    pub fn notify(&self, snapshot: &Snapshot) -> usize {
        let mut delivered: usize = 0;
        for observer in &self.observers {
            match observer.on_snapshot(snapshot) {
                Ok(()) => delivered += 1,
                Err(err) => tracing::debug!(error = %err, "snapshot not delivered"),
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Observer that always fails.
    #[derive(Debug)]
    struct Gone;

    impl Observer for Gone {
        fn on_snapshot(&self, _snapshot: &Snapshot) -> Result<(), DeliveryError> {
            Err(DeliveryError("gone".to_owned()))
        }
    }

    #[test]
    fn delivers_to_every_observer() {
        let (first, mut first_rx) = ChannelObserver::new("popup");
        let (second, mut second_rx) = ChannelObserver::new("tab");
        let notifier = Notifier::new().with_observer(first).with_observer(second);
        assert_eq!(notifier.notify(&Snapshot::default()), 2);
        assert_eq!(first_rx.try_recv().unwrap(), Snapshot::default());
        assert_eq!(second_rx.try_recv().unwrap(), Snapshot::default());
    }

    #[test]
    fn failing_observer_does_not_stop_others() {
        let (live, mut live_rx) = ChannelObserver::new("live");
        let notifier = Notifier::new().with_observer(Gone).with_observer(live);
        assert_eq!(notifier.notify(&Snapshot::default()), 1);
        assert!(live_rx.try_recv().is_ok());
    }

    #[test]
    fn dropped_receiver_fails_delivery() {
        let (observer, rx) = ChannelObserver::new("closed-tab");
        drop(rx);
        let err = observer.on_snapshot(&Snapshot::default()).unwrap_err();
        assert_eq!(err, DeliveryError("closed-tab".to_owned()));
    }

    #[test]
    fn empty_notifier_delivers_nothing() {
        let notifier = Notifier::new();
        assert!(notifier.is_empty());
        assert_eq!(notifier.notify(&Snapshot::default()), 0);
    }
}
