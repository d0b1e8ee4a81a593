//! Merge-key resolution for capture signals.
//!
//! [`reconcile`] is a pure function of the current per-platform state and
//! one incoming [`Signal`]. It returns the next state together with an
//! [`Effect`] telling the caller whether to persist and what to do with the
//! platform's pending deadline. All timing and I/O lives in
//! [`crate::store`]; nothing here sleeps or touches storage.
//!
//! Resolution order for an identity signal:
//!
//! 1. an open pending slot absorbs it (the slot wins over a code match);
//! 2. otherwise a record with the same business code is updated in place;
//! 3. otherwise an identity-only record is appended.

use core::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::config::DEFAULT_PENDING_TIMEOUT;
use crate::models::{BusinessCode, Credential, MerchantRecord, Platform};

/// A credential held while waiting for a matching identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSlot {
    /// Credential awaiting identity.
    pub credential: Credential,
    /// Request URL the credential was captured from.
    pub source_url: Option<String>,
    /// When the slot was (last) opened.
    pub opened_at: DateTime<Utc>,
    /// Identifies the deadline armed for this slot.
    pub generation: u64,
    /// Display name seen without a business code while the slot was open.
    pub held_name: Option<String>,
}

/// Records and pending slot for one platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformState {
    /// Platform this state belongs to.
    pub platform: Platform,
    /// Records in capture order.
    pub records: Vec<MerchantRecord>,
    /// The single pending slot, if open.
    pub pending: Option<PendingSlot>,
    /// Generation handed to the next opened slot.
    pub next_generation: u64,
    /// How long before a slot opened an identity-only record may have
    /// been observed and still adopt the slot's credential.
    pub pending_window: TimeDelta,
}

impl PlatformState {
    /// Creates an empty state for `platform`.
    #[inline]
    #[must_use]
    pub fn new(platform: Platform) -> Self {
        Self::with_records(platform, Vec::new())
    }

    /// Creates a state seeded with previously persisted records.
    #[inline]
    #[must_use]
    pub fn with_records(platform: Platform, records: Vec<MerchantRecord>) -> Self {
        Self {
            platform,
            records,
            pending: None,
            next_generation: 0,
            pending_window: window(DEFAULT_PENDING_TIMEOUT),
        }
    }

    /// Sets the adoption window, normally the pending-slot timeout.
    #[inline]
    #[must_use]
    pub fn pending_window(mut self, timeout: Duration) -> Self {
        self.pending_window = window(timeout);
        self
    }

    /// Drops all records and the pending slot.
    ///
    /// The generation counter is kept so that a deadline armed before the
    /// reset can never match a slot opened after it.
    #[inline]
    pub fn clear(&mut self) {
        self.records.clear();
        self.pending = None;
    }
}

/// Converts a timeout into a signed window, saturating on overflow.
fn window(timeout: Duration) -> TimeDelta {
    TimeDelta::from_std(timeout).unwrap_or(TimeDelta::MAX)
}

/// One observation delivered to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    /// A credential captured from an outbound request.
    Credential {
        /// Captured credential.
        credential: Credential,
        /// Request URL.
        source_url: Option<String>,
    },
    /// Merchant identity captured from a response body or page message.
    Identity {
        /// Merchant business code.
        business_code: Option<BusinessCode>,
        /// Merchant display name.
        display_name: Option<String>,
    },
    /// The deadline armed for `generation` has fired.
    DeadlineElapsed {
        /// Generation the deadline was armed for.
        generation: u64,
    },
}

/// What the caller must do with the platform's deadline task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deadline {
    /// Leave any running deadline alone.
    Keep,
    /// Cancel any running deadline and arm a new one.
    Arm {
        /// Generation of the newly opened slot.
        generation: u64,
    },
    /// Cancel any running deadline.
    Disarm,
}

/// Side effects requested by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Effect {
    /// Persist and notify the new snapshot.
    pub persist: bool,
    /// Deadline handling.
    pub deadline: Deadline,
}

impl Effect {
    /// The signal was dropped without changing anything.
    pub const IGNORED: Self = Self {
        persist: false,
        deadline: Deadline::Keep,
    };

    /// Records changed; the deadline is untouched.
    const PERSIST: Self = Self {
        persist: true,
        deadline: Deadline::Keep,
    };

    /// Records changed and the slot was resolved.
    const RESOLVED: Self = Self {
        persist: true,
        deadline: Deadline::Disarm,
    };

    /// Returns `true` if the signal had no effect at all.
    #[inline]
    #[must_use]
    pub fn is_ignored(self) -> bool {
        self == Self::IGNORED
    }
}

/// Result of applying one signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// State after the signal.
    pub state: PlatformState,
    /// Effects the caller must carry out.
    pub effect: Effect,
}

impl Transition {
    /// Pairs a state with its effect.
    const fn new(state: PlatformState, effect: Effect) -> Self {
        Self { state, effect }
    }
}

/// Applies `signal` to `state` at time `now`.
#[inline]
#[must_use]
pub fn reconcile(state: PlatformState, signal: Signal, now: DateTime<Utc>) -> Transition {
    match signal {
        Signal::Credential {
            credential,
            source_url,
        } => on_credential(state, credential, source_url, now),
        Signal::Identity {
            business_code,
            display_name,
        } => on_identity(state, business_code, display_name, now),
        Signal::DeadlineElapsed { generation } => on_deadline(state, generation, now),
    }
}

/// Refreshes a known session or opens the pending slot.
fn on_credential(
    mut state: PlatformState,
    credential: Credential,
    source_url: Option<String>,
    now: DateTime<Utc>,
) -> Transition {
    if credential.is_empty() || credential.platform() != state.platform {
        return Transition::new(state, Effect::IGNORED);
    }

    if let Some(record) = state
        .records
        .iter_mut()
        .find(|record| record.is_complete() && record.has_primary(&credential))
    {
        if let Some(held) = record.credential.as_mut() {
            held.refresh_from(&credential);
        }
        if source_url.is_some() {
            record.source_url = source_url;
        }
        record.touch(now);
        return Transition::new(state, Effect::PERSIST);
    }

    let generation = state.next_generation;
    state.next_generation = generation.wrapping_add(1);
    let held_name = state.pending.take().and_then(|slot| slot.held_name);
    state.pending = Some(PendingSlot {
        credential,
        source_url,
        opened_at: now,
        generation,
        held_name,
    });
    Transition::new(
        state,
        Effect {
            persist: false,
            deadline: Deadline::Arm { generation },
        },
    )
}

/// Resolves an identity against the slot, then by code, then appends.
fn on_identity(
    mut state: PlatformState,
    business_code: Option<BusinessCode>,
    display_name: Option<String>,
    now: DateTime<Utc>,
) -> Transition {
    let display_name = display_name.filter(|name| !name.trim().is_empty());
    let Some(code) = business_code else {
        // A name alone cannot key a record; hold it for the open slot.
        if let (Some(slot), Some(name)) = (state.pending.as_mut(), display_name) {
            slot.held_name = Some(name);
        }
        return Transition::new(state, Effect::IGNORED);
    };

    if let Some(slot) = state.pending.take() {
        let name = display_name
            .or(slot.held_name)
            .unwrap_or_else(|| code.as_inner().to_owned());
        state
            .records
            .retain(|record| !(record.is_degraded() && record.has_primary(&slot.credential)));
        let mut merged = MerchantRecord {
            platform: state.platform,
            business_code: Some(code),
            display_name: Some(name),
            credential: Some(slot.credential),
            source_url: slot.source_url,
            observed_at: now,
        };
        match state
            .records
            .iter_mut()
            .find(|record| record.business_code == merged.business_code)
        {
            Some(existing) => {
                merged.touch(existing.observed_at);
                *existing = merged;
            }
            None => state.records.push(merged),
        }
        return Transition::new(state, Effect::RESOLVED);
    }

    if let Some(existing) = state
        .records
        .iter_mut()
        .find(|record| record.has_code(&code))
    {
        if let Some(name) = display_name {
            existing.display_name = Some(name);
        }
        existing.touch(now);
        return Transition::new(state, Effect::PERSIST);
    }

    let name = display_name.unwrap_or_else(|| code.as_inner().to_owned());
    state.records.push(MerchantRecord {
        platform: state.platform,
        business_code: Some(code),
        display_name: Some(name),
        credential: None,
        source_url: None,
        observed_at: now,
    });
    Transition::new(state, Effect::PERSIST)
}

/// Converts an expired slot into a record.
///
/// A late deadline whose generation no longer matches the open slot is
/// ignored.
fn on_deadline(mut state: PlatformState, generation: u64, now: DateTime<Utc>) -> Transition {
    let Some(slot) = state
        .pending
        .take_if(|slot| slot.generation == generation)
    else {
        return Transition::new(state, Effect::IGNORED);
    };

    // Identity arrived shortly before the credential: adopt into that
    // record. Older identity-only records belong to some other session.
    let earliest = slot.opened_at.checked_sub_signed(state.pending_window);
    if adoption_target(&state.records, earliest).is_some() {
        // The token is about to be confirmed; drop its degraded copy.
        state
            .records
            .retain(|record| !(record.is_degraded() && record.has_primary(&slot.credential)));
        if let Some(record) = adoption_target(&state.records, earliest)
            .and_then(|index| state.records.get_mut(index))
        {
            record.credential = Some(slot.credential);
            if slot.source_url.is_some() {
                record.source_url = slot.source_url;
            }
            record.touch(now);
            return Transition::new(state, Effect::RESOLVED);
        }
    }

    if let Some(degraded) = state
        .records
        .iter_mut()
        .find(|record| record.is_degraded())
    {
        degraded.credential = Some(slot.credential);
        degraded.source_url = slot.source_url;
        degraded.touch(now);
        return Transition::new(state, Effect::RESOLVED);
    }

    state.records.push(MerchantRecord {
        platform: state.platform,
        business_code: None,
        display_name: None,
        credential: Some(slot.credential),
        source_url: slot.source_url,
        observed_at: now,
    });
    Transition::new(state, Effect::RESOLVED)
}

/// Index of the newest identity-only record observed no earlier than
/// `earliest`.
fn adoption_target(records: &[MerchantRecord], earliest: Option<DateTime<Utc>>) -> Option<usize> {
    records
        .iter()
        .enumerate()
        .filter(|(_, record)| {
            record.is_identity_only()
                && earliest.is_none_or(|earliest| record.observed_at >= earliest)
        })
        .max_by_key(|(_, record)| record.observed_at)
        .map(|(index, _)| index)
}
