//! The reconciliation store.
//!
//! All records live inside a single actor task. Callers talk to it through
//! a cloneable [`StoreHandle`]; commands are queued and applied one at a
//! time, so no two mutations ever interleave. Deadline timers post into the
//! same queue.
//!
//! Persistence runs in a separate worker fed by a `watch` channel: callers
//! get their acknowledgement as soon as the in-memory state changed, and
//! the worker always writes the latest published snapshot. A failed write
//! is logged and never rolled back.

mod deadline;

use core::mem;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use self::deadline::DeadlineTimer;
use crate::config::CaptureConfig;
use crate::error::{CaptureError, Result};
use crate::legacy;
use crate::models::{BusinessCode, Credential, MerchantRecord, Platform, Snapshot};
use crate::notify::Notifier;
use crate::reconcile::{Deadline, PlatformState, Signal, Transition, reconcile};
use crate::storage::Storage;

/// What a submitted signal did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Malformed or unmatched; nothing changed.
    Ignored,
    /// Held in the pending slot, waiting for identity or the deadline.
    Pending,
    /// Records changed; a persistence and notification cycle followed.
    Stored,
}

/// Messages processed by the store task.
#[derive(Debug)]
enum Command {
    /// Apply a signal to one platform.
    Signal {
        /// Target platform.
        platform: Platform,
        /// Signal to apply.
        signal: Signal,
        /// Receives the outcome once applied.
        ack: oneshot::Sender<Outcome>,
    },
    /// A pending-slot deadline fired.
    DeadlineElapsed {
        /// Platform whose slot expired.
        platform: Platform,
        /// Generation the deadline was armed for.
        generation: u64,
    },
    /// Clear everything.
    Reset {
        /// Signalled once the empty state is published.
        ack: oneshot::Sender<()>,
    },
    /// Stop the store after the last snapshot is written.
    Shutdown {
        /// Signalled once persistence has drained.
        ack: oneshot::Sender<()>,
    },
}

/// Handle to a running store.
///
/// Cheap to clone; the store stops once every handle is dropped.
#[derive(Debug, Clone)]
pub struct StoreHandle {
    /// Command queue into the store task.
    queue: mpsc::UnboundedSender<Command>,
    /// Latest published snapshot.
    snapshots: watch::Receiver<Snapshot>,
}

impl StoreHandle {
    /// Loads persisted state, normalizing the legacy layout, and starts the
    /// store and persistence tasks on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the persisted state cannot be read.
    #[inline]
    #[tracing::instrument(skip_all)]
    pub async fn start<S: Storage + 'static>(
        storage: Arc<S>,
        notifier: Notifier,
        config: &CaptureConfig,
    ) -> Result<Self> {
        let now = Utc::now();
        let snapshot = match storage.load().await? {
            Some(raw) => {
                let snapshot = legacy::normalize(&raw, now);
                if legacy::is_legacy(&raw) {
                    tracing::info!(records = snapshot.len(), "normalized legacy persisted state");
                    if let Err(err) = storage.save(&snapshot).await {
                        tracing::warn!(error = %err, "failed to rewrite normalized state");
                    }
                }
                snapshot
            }
            None => Snapshot::default(),
        };
        tracing::debug!(records = snapshot.len(), "store starting");

        let (queue, commands) = mpsc::unbounded_channel();
        let (published, snapshots) = watch::channel(snapshot.clone());
        let persister = tokio::spawn(persist_latest(storage, published.subscribe()));

        let actor = StoreTask {
            woaizuji: PlatformEntry::new(Platform::Woaizuji, snapshot.woaizuji, config),
            rrzu: PlatformEntry::new(Platform::Rrzu, snapshot.rrzu, config),
            notifier,
            published,
            deadline_queue: queue.downgrade(),
            pending_timeout: config.pending_timeout,
            persister,
        };
        let _store_task = tokio::spawn(actor.run(commands));

        Ok(Self { queue, snapshots })
    }

    /// Submits a captured credential.
    ///
    /// A credential already held by a complete record only refreshes that
    /// record; anything else opens (or replaces) the platform's pending
    /// slot.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::StoreClosed`] if the store has stopped.
    #[inline]
    pub async fn submit_credential(
        &self,
        platform: Platform,
        credential: Credential,
        source_url: Option<String>,
    ) -> Result<Outcome> {
        self.apply(
            platform,
            Signal::Credential {
                credential,
                source_url,
            },
        )
        .await
    }

    /// Submits a captured merchant identity.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::StoreClosed`] if the store has stopped.
    #[inline]
    pub async fn submit_identity(
        &self,
        platform: Platform,
        business_code: Option<BusinessCode>,
        display_name: Option<String>,
    ) -> Result<Outcome> {
        self.apply(
            platform,
            Signal::Identity {
                business_code,
                display_name,
            },
        )
        .await
    }

    /// Clears both platforms, cancels pending deadlines, persists the empty
    /// state and notifies observers.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::StoreClosed`] if the store has stopped.
    #[inline]
    pub async fn reset(&self) -> Result<()> {
        let (ack, done) = oneshot::channel();
        self.queue
            .send(Command::Reset { ack })
            .map_err(|_closed| CaptureError::StoreClosed)?;
        done.await.map_err(|_closed| CaptureError::StoreClosed)
    }

    /// Stops the store once the latest snapshot has been written.
    ///
    /// Pending slots are dropped without conversion. Other handles see
    /// [`CaptureError::StoreClosed`] afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::StoreClosed`] if the store had already
    /// stopped.
    #[inline]
    pub async fn shutdown(self) -> Result<()> {
        let (ack, done) = oneshot::channel();
        self.queue
            .send(Command::Shutdown { ack })
            .map_err(|_closed| CaptureError::StoreClosed)?;
        done.await.map_err(|_closed| CaptureError::StoreClosed)
    }

    /// Returns the current state of both platforms.
    ///
    /// Reads the in-memory state, never storage, and never waits.
    #[inline]
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.snapshots.borrow().clone()
    }

    /// Returns the current records of one platform.
    #[inline]
    #[must_use]
    pub fn snapshot_of(&self, platform: Platform) -> Vec<MerchantRecord> {
        self.snapshots.borrow().records(platform).to_vec()
    }

    /// Returns a receiver that sees every published snapshot.
    #[inline]
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.clone()
    }

    /// Queues a signal and waits until it has been applied.
    async fn apply(&self, platform: Platform, signal: Signal) -> Result<Outcome> {
        let (ack, done) = oneshot::channel();
        self.queue
            .send(Command::Signal {
                platform,
                signal,
                ack,
            })
            .map_err(|_closed| CaptureError::StoreClosed)?;
        done.await.map_err(|_closed| CaptureError::StoreClosed)
    }
}

/// Records, pending slot and deadline for one platform.
#[derive(Debug)]
struct PlatformEntry {
    /// Reconciliation state.
    state: PlatformState,
    /// Deadline armed for the open slot, if any.
    deadline: Option<DeadlineTimer>,
}

impl PlatformEntry {
    /// Creates an entry seeded with loaded records.
    fn new(platform: Platform, records: Vec<MerchantRecord>, config: &CaptureConfig) -> Self {
        Self {
            state: PlatformState::with_records(platform, records)
                .pending_window(config.pending_timeout),
            deadline: None,
        }
    }
}

/// The store task; sole owner of all records.
#[derive(Debug)]
struct StoreTask {
    /// Woaizuji state.
    woaizuji: PlatformEntry,
    /// Rrzu state.
    rrzu: PlatformEntry,
    /// Observers notified after each accepted mutation.
    notifier: Notifier,
    /// Publishes snapshots to readers and the persistence worker.
    published: watch::Sender<Snapshot>,
    /// Weak sender handed to deadline timers so they don't keep the
    /// store alive.
    deadline_queue: mpsc::WeakUnboundedSender<Command>,
    /// Delay before a pending slot is converted.
    pending_timeout: core::time::Duration,
    /// Persistence worker; finishes once `published` is dropped.
    persister: JoinHandle<()>,
}

impl StoreTask {
    /// Processes commands until shut down or every handle is dropped, then
    /// waits for the persistence worker to drain.
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        let mut shutdown_ack = None;
        while let Some(command) = commands.recv().await {
            match command {
                Command::Signal {
                    platform,
                    signal,
                    ack,
                } => {
                    let outcome = self.apply(platform, signal);
                    if ack.send(outcome).is_err() {
                        tracing::trace!(%platform, "caller stopped waiting for outcome");
                    }
                }
                Command::DeadlineElapsed {
                    platform,
                    generation,
                } => {
                    let outcome = self.apply(platform, Signal::DeadlineElapsed { generation });
                    if outcome == Outcome::Ignored {
                        tracing::debug!(%platform, generation, "late deadline ignored");
                    }
                }
                Command::Reset { ack } => {
                    self.reset();
                    if ack.send(()).is_err() {
                        tracing::trace!("caller stopped waiting for reset");
                    }
                }
                Command::Shutdown { ack } => {
                    shutdown_ack = Some(ack);
                    break;
                }
            }
        }
        tracing::debug!("store stopping");

        let Self {
            published,
            persister,
            ..
        } = self;
        drop(published);
        if let Err(err) = persister.await {
            tracing::warn!(error = %err, "persistence worker failed");
        }
        if let Some(ack) = shutdown_ack
            && ack.send(()).is_err()
        {
            tracing::trace!("caller stopped waiting for shutdown");
        }
    }

    /// Returns the entry for `platform`.
    const fn entry_mut(&mut self, platform: Platform) -> &mut PlatformEntry {
        match platform {
            Platform::Woaizuji => &mut self.woaizuji,
            Platform::Rrzu => &mut self.rrzu,
        }
    }

    /// Runs one signal through the merge policy and carries out its effects.
    #[tracing::instrument(skip(self, signal))]
    fn apply(&mut self, platform: Platform, signal: Signal) -> Outcome {
        let deadline_queue = self.deadline_queue.clone();
        let pending_timeout = self.pending_timeout;
        let entry = self.entry_mut(platform);

        let state = mem::replace(&mut entry.state, PlatformState::new(platform));
        let Transition { state, effect } = reconcile(state, signal, Utc::now());
        entry.state = state;

        match effect.deadline {
            Deadline::Keep => {}
            Deadline::Arm { generation } => {
                // Replacing the timer drops, and so aborts, the previous one.
                entry.deadline = Some(DeadlineTimer::schedule(
                    platform,
                    generation,
                    pending_timeout,
                    deadline_queue,
                ));
            }
            Deadline::Disarm => {
                if let Some(timer) = entry.deadline.take() {
                    tracing::trace!(generation = timer.generation(), "slot resolved");
                    timer.cancel();
                }
            }
        }

        if effect.persist {
            self.publish();
            Outcome::Stored
        } else if effect.is_ignored() {
            tracing::debug!("signal ignored");
            Outcome::Ignored
        } else {
            tracing::debug!("credential held for identity");
            Outcome::Pending
        }
    }

    /// Clears both platforms and publishes the empty state.
    fn reset(&mut self) {
        for entry in [&mut self.woaizuji, &mut self.rrzu] {
            entry.state.clear();
            if let Some(timer) = entry.deadline.take() {
                timer.cancel();
            }
        }
        tracing::info!("captured state reset");
        self.publish();
    }

    /// Publishes the current records to readers, persistence and observers.
    fn publish(&self) {
        let snapshot = Snapshot {
            woaizuji: self.woaizuji.state.records.clone(),
            rrzu: self.rrzu.state.records.clone(),
        };
        let _previous = self.published.send_replace(snapshot.clone());
        let delivered = self.notifier.notify(&snapshot);
        tracing::debug!(records = snapshot.len(), delivered, "snapshot published");
    }
}

/// Writes every newly published snapshot to storage.
///
/// Only the latest value is written when several arrive while a write is
/// in flight; each write carries the complete state.
async fn persist_latest<S: Storage>(storage: Arc<S>, mut snapshots: watch::Receiver<Snapshot>) {
    while snapshots.changed().await.is_ok() {
        let snapshot = snapshots.borrow_and_update().clone();
        match storage.save(&snapshot).await {
            Ok(()) => tracing::trace!(records = snapshot.len(), "snapshot persisted"),
            Err(err) => {
                tracing::warn!(error = %err, "failed to persist snapshot, keeping in-memory state");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use core::future::{self, Future};
    use core::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::notify::ChannelObserver;
    use crate::storage::InMemoryStorage;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn config() -> CaptureConfig {
        CaptureConfig::default().pending_timeout(TIMEOUT)
    }

    fn code(value: &str) -> Option<BusinessCode> {
        BusinessCode::from_raw(value)
    }

    fn azjtk(token: &str) -> Credential {
        Credential::azjtk(token).unwrap()
    }

    fn order_list_url() -> Option<String> {
        Some(
            "https://external-gw.woaizuji.com/merchantTeamwork/inside_route_page/merchantOrder/orderList"
                .to_owned(),
        )
    }

    async fn start() -> (StoreHandle, Arc<InMemoryStorage>) {
        let storage = Arc::new(InMemoryStorage::new());
        let handle = StoreHandle::start(Arc::clone(&storage), Notifier::new(), &config())
            .await
            .unwrap();
        (handle, storage)
    }

    /// Lets spawned tasks run until the runtime is idle.
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    /// Storage whose writes always fail.
    #[derive(Debug, Default)]
    struct FailingStorage;

    impl Storage for FailingStorage {
        fn load(&self) -> impl Future<Output = Result<Option<serde_json::Value>>> + Send {
            future::ready(Ok(None))
        }
        fn save(&self, _snapshot: &Snapshot) -> impl Future<Output = Result<()>> + Send {
            future::ready(Err(CaptureError::Storage("disk full".into())))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn credential_then_identity_persists_complete_record() {
        let (store, storage) = start().await;
        let outcome = store
            .submit_credential(Platform::Woaizuji, azjtk("A"), order_list_url())
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Pending);
        let outcome = store
            .submit_identity(Platform::Woaizuji, code("M1"), Some("Shop".to_owned()))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Stored);
        settle().await;

        let persisted = storage.persisted().unwrap().unwrap();
        assert_eq!(persisted.woaizuji.len(), 1);
        assert!(persisted.woaizuji[0].is_complete());
        assert_eq!(persisted, store.snapshot());
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_is_idempotent() {
        let (store, _storage) = start().await;
        let _pending = store
            .submit_credential(Platform::Woaizuji, azjtk("A"), None)
            .await
            .unwrap();
        let _stored = store
            .submit_identity(Platform::Woaizuji, code("M1"), Some("Shop".to_owned()))
            .await
            .unwrap();
        let mut last_seen = store.snapshot_of(Platform::Woaizuji)[0].observed_at;

        for _ in 0..2 {
            // Timestamps come from the wall clock, which paused time does
            // not advance.
            std::thread::sleep(Duration::from_millis(2));
            let outcome = store
                .submit_credential(Platform::Woaizuji, azjtk("A"), order_list_url())
                .await
                .unwrap();
            assert_eq!(outcome, Outcome::Stored);
            let records = store.snapshot_of(Platform::Woaizuji);
            assert_eq!(records.len(), 1);
            assert!(records[0].observed_at > last_seen);
            last_seen = records[0].observed_at;
        }
        assert_eq!(
            store.snapshot_of(Platform::Woaizuji)[0].source_url,
            order_list_url()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_persists_degraded_record_only_after_deadline() {
        let (store, storage) = start().await;
        let _pending = store
            .submit_credential(Platform::Woaizuji, azjtk("A"), None)
            .await
            .unwrap();

        tokio::time::sleep(TIMEOUT - Duration::from_secs(1)).await;
        assert!(store.snapshot().is_empty());
        assert!(storage.persisted().unwrap().is_none());

        tokio::time::sleep(Duration::from_secs(2)).await;
        let persisted = storage.persisted().unwrap().unwrap();
        assert_eq!(persisted.woaizuji.len(), 1);
        let degraded = &persisted.woaizuji[0];
        assert!(degraded.business_code.is_none());
        assert!(degraded.display_name.is_none());
        assert_eq!(degraded.credential, Some(azjtk("A")));
    }

    #[tokio::test(start_paused = true)]
    async fn identity_cancels_deadline() {
        let (store, storage) = start().await;
        let _pending = store
            .submit_credential(Platform::Woaizuji, azjtk("A"), None)
            .await
            .unwrap();
        let _stored = store
            .submit_identity(Platform::Woaizuji, code("M1"), Some("Shop".to_owned()))
            .await
            .unwrap();

        tokio::time::sleep(TIMEOUT * 3).await;
        let records = storage.persisted().unwrap().unwrap().woaizuji;
        assert_eq!(records.len(), 1);
        assert!(records.iter().all(|rec| !rec.is_degraded()));
        assert_eq!(storage.save_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn identity_first_converges_after_deadline() {
        let (store, storage) = start().await;
        let _stored = store
            .submit_identity(Platform::Woaizuji, code("M1"), Some("Shop".to_owned()))
            .await
            .unwrap();
        let _pending = store
            .submit_credential(Platform::Woaizuji, azjtk("C"), None)
            .await
            .unwrap();

        tokio::time::sleep(TIMEOUT + Duration::from_secs(1)).await;
        let records = storage.persisted().unwrap().unwrap().woaizuji;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].business_code, code("M1"));
        assert_eq!(records[0].display_name.as_deref(), Some("Shop"));
        assert_eq!(records[0].credential, Some(azjtk("C")));
    }

    #[tokio::test(start_paused = true)]
    async fn stored_identity_from_earlier_session_is_not_adopted() {
        let storage = Arc::new(InMemoryStorage::with_raw(json!({
            "woaizuji": [{
                "platform": "woaizuji",
                "businessCode": "M1",
                "displayName": "Shop",
                "observedAt": "2024-05-01T08:00:00Z"
            }],
            "rrzu": []
        })));
        let store = StoreHandle::start(Arc::clone(&storage), Notifier::new(), &config())
            .await
            .unwrap();
        let _pending = store
            .submit_credential(Platform::Woaizuji, azjtk("OTHER"), None)
            .await
            .unwrap();

        tokio::time::sleep(TIMEOUT + Duration::from_secs(1)).await;
        let records = storage.persisted().unwrap().unwrap().woaizuji;
        assert_eq!(records.len(), 2);
        let merchant = records.iter().find(|rec| rec.has_code(&BusinessCode::new("M1".to_owned())));
        assert!(merchant.unwrap().credential.is_none());
        let degraded = records.iter().find(|rec| rec.is_degraded()).unwrap();
        assert_eq!(degraded.credential, Some(azjtk("OTHER")));
    }

    #[tokio::test(start_paused = true)]
    async fn replaced_slot_restarts_deadline() {
        let (store, _storage) = start().await;
        let _first = store
            .submit_credential(Platform::Woaizuji, azjtk("A"), None)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(3)).await;
        let _second = store
            .submit_credential(Platform::Woaizuji, azjtk("B"), None)
            .await
            .unwrap();

        // The first deadline would have fired here.
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(store.snapshot().is_empty());

        tokio::time::sleep(Duration::from_secs(3)).await;
        let records = store.snapshot_of(Platform::Woaizuji);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].credential, Some(azjtk("B")));
    }

    #[tokio::test(start_paused = true)]
    async fn reset_clears_everything_and_cancels_slots() {
        let (store, storage) = start().await;
        let _stored = store
            .submit_identity(Platform::Rrzu, code("R1"), Some("Rent".to_owned()))
            .await
            .unwrap();
        let _pending = store
            .submit_credential(Platform::Woaizuji, azjtk("A"), None)
            .await
            .unwrap();

        store.reset().await.unwrap();
        assert!(store.snapshot().is_empty());

        tokio::time::sleep(TIMEOUT * 2).await;
        assert!(store.snapshot().is_empty());
        assert_eq!(storage.persisted().unwrap(), Some(Snapshot::default()));

        // Reset is idempotent.
        store.reset().await.unwrap();
        assert!(store.snapshot().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_signals_do_not_persist() {
        let (store, storage) = start().await;
        let outcome = store
            .submit_identity(Platform::Woaizuji, None, Some(String::new()))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Ignored);
        let outcome = store
            .submit_credential(
                Platform::Rrzu,
                Credential::HeaderPair {
                    authorization: None,
                    cookie: None,
                },
                None,
            )
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Ignored);
        tokio::time::sleep(TIMEOUT * 2).await;
        assert_eq!(storage.save_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn observers_receive_full_snapshots() {
        let storage = Arc::new(InMemoryStorage::new());
        let (observer, mut received) = ChannelObserver::new("popup");
        let (closed, closed_rx) = ChannelObserver::new("closed-tab");
        drop(closed_rx);
        let notifier = Notifier::new().with_observer(closed).with_observer(observer);
        let store = StoreHandle::start(storage, notifier, &config()).await.unwrap();

        let _stored = store
            .submit_identity(Platform::Woaizuji, code("M1"), Some("One".to_owned()))
            .await
            .unwrap();
        let _stored = store
            .submit_identity(Platform::Rrzu, code("R1"), Some("Two".to_owned()))
            .await
            .unwrap();

        let first = received.recv().await.unwrap();
        assert_eq!(first.len(), 1);
        let second = received.recv().await.unwrap();
        assert_eq!(second.len(), 2);
        assert_eq!(second, store.snapshot());
    }

    #[tokio::test(start_paused = true)]
    async fn persistence_failure_keeps_memory_state() {
        let store = StoreHandle::start(Arc::new(FailingStorage), Notifier::new(), &config())
            .await
            .unwrap();
        let _stored = store
            .submit_identity(Platform::Rrzu, code("R1"), Some("Rent".to_owned()))
            .await
            .unwrap();
        settle().await;
        assert_eq!(store.snapshot_of(Platform::Rrzu).len(), 1);

        // Still usable afterwards.
        let outcome = store
            .submit_identity(Platform::Rrzu, code("R2"), Some("Rent 2".to_owned()))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Stored);
        assert_eq!(store.snapshot_of(Platform::Rrzu).len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn legacy_state_is_normalized_on_start() {
        let storage = Arc::new(InMemoryStorage::with_raw(json!({
            "woaizuji": {
                "azjtk": "tok",
                "timestamp": "2024/5/1 08:00:00",
                "url": null,
                "merchantCode": "M7",
                "merchantName": "Legacy Shop"
            },
            "rrzu": {"authorization": "Bearer x", "cookie": null, "timestamp": null, "url": null}
        })));
        let store = StoreHandle::start(Arc::clone(&storage), Notifier::new(), &config())
            .await
            .unwrap();

        let snapshot = store.snapshot();
        assert_eq!(snapshot.woaizuji.len(), 1);
        assert!(snapshot.rrzu.is_empty());
        assert_eq!(storage.persisted().unwrap(), Some(snapshot));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_flushes_and_closes() {
        let (store, storage) = start().await;
        let other = store.clone();
        let _stored = store
            .submit_identity(Platform::Rrzu, code("R1"), Some("Rent".to_owned()))
            .await
            .unwrap();
        store.shutdown().await.unwrap();

        assert_eq!(storage.persisted().unwrap().unwrap().rrzu.len(), 1);
        let err = other
            .submit_identity(Platform::Rrzu, code("R2"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, CaptureError::StoreClosed));
    }

    #[tokio::test(start_paused = true)]
    async fn subscribers_see_latest_snapshot() {
        let (store, _storage) = start().await;
        let mut updates = store.subscribe();
        let _stored = store
            .submit_identity(Platform::Woaizuji, code("M1"), Some("Shop".to_owned()))
            .await
            .unwrap();
        updates.changed().await.unwrap();
        assert_eq!(updates.borrow().woaizuji.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn platforms_are_independent() {
        let (store, _storage) = start().await;
        let _pending = store
            .submit_credential(Platform::Woaizuji, azjtk("A"), None)
            .await
            .unwrap();
        let _stored = store
            .submit_identity(Platform::Rrzu, code("R1"), Some("Rent".to_owned()))
            .await
            .unwrap();
        // The Rrzu identity must not consume the Woaizuji slot.
        assert!(store.snapshot_of(Platform::Rrzu)[0].credential.is_none());

        tokio::time::sleep(TIMEOUT + Duration::from_secs(1)).await;
        assert!(store.snapshot_of(Platform::Woaizuji)[0].is_degraded());
    }
}
