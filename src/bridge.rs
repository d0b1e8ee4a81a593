//! Read-only access to the snapshot for allow-listed external pages.
//!
//! The bridge answers a single request type, `GET_SNAPSHOT`, and only for
//! origins on a fixed allow-list. Origins are compared in their serialized
//! form (`scheme://host[:port]`), so paths and trailing slashes in the
//! configured entries do not matter. The bridge never mutates the store.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::config::CaptureConfig;
use crate::models::{Platform, Snapshot};
use crate::store::StoreHandle;

/// A request accepted by the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BridgeRequest {
    /// Reads both platforms, or only `platform` when given.
    GetSnapshot {
        /// Optional platform filter.
        #[serde(default)]
        platform: Option<Platform>,
    },
}

/// The bridge's answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BridgeResponse {
    /// Current records.
    Snapshot(Snapshot),
    /// The caller's origin is not allow-listed. Carries no record data.
    Unauthorized {
        /// Origin as presented by the caller.
        origin: String,
    },
    /// The request type is not supported.
    Unsupported,
}

/// Serves snapshot reads to allow-listed origins.
#[derive(Debug, Clone)]
pub struct Bridge {
    /// Serialized allowed origins.
    allowed: Vec<String>,
    /// Store to read from.
    store: StoreHandle,
}

/// Serializes `raw` as a URL origin, or `None` if it has no usable origin.
fn serialized_origin(raw: &str) -> Option<String> {
    let origin = Url::parse(raw.trim()).ok()?.origin();
    origin
        .is_tuple()
        .then(|| origin.ascii_serialization())
}

impl Bridge {
    /// Creates a bridge over `store` answering the given origins.
    ///
    /// Entries that are not valid origins are logged and skipped.
    #[inline]
    #[must_use]
    pub fn new<I, T>(allowed_origins: I, store: StoreHandle) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let allowed = allowed_origins
            .into_iter()
            .filter_map(|entry| {
                let parsed = serialized_origin(entry.as_ref());
                if parsed.is_none() {
                    tracing::warn!(origin = entry.as_ref(), "ignoring invalid allowed origin");
                }
                parsed
            })
            .collect();
        Self { allowed, store }
    }

    /// Creates a bridge using the configured allow-list.
    #[inline]
    #[must_use]
    pub fn from_config(config: &CaptureConfig, store: StoreHandle) -> Self {
        Self::new(&config.allowed_origins, store)
    }

    /// Returns `true` if `origin` may read snapshots.
    #[inline]
    #[must_use]
    pub fn is_allowed(&self, origin: &str) -> bool {
        serialized_origin(origin).is_some_and(|origin| self.allowed.contains(&origin))
    }

    /// Answers a raw JSON request from `origin`.
    ///
    /// The origin is checked before the request is looked at.
    #[inline]
    #[tracing::instrument(skip(self, request))]
    pub fn handle(&self, origin: &str, request: &Value) -> BridgeResponse {
        if !self.is_allowed(origin) {
            tracing::warn!("bridge request from unauthorized origin");
            return BridgeResponse::Unauthorized {
                origin: origin.to_owned(),
            };
        }
        match BridgeRequest::deserialize(request) {
            Ok(request) => self.answer(request),
            Err(err) => {
                tracing::debug!(error = %err, "unsupported bridge request");
                BridgeResponse::Unsupported
            }
        }
    }

    /// Answers an already-parsed request. The caller must have checked the
    /// origin.
    fn answer(&self, request: BridgeRequest) -> BridgeResponse {
        match request {
            BridgeRequest::GetSnapshot { platform: None } => {
                BridgeResponse::Snapshot(self.store.snapshot())
            }
            BridgeRequest::GetSnapshot {
                platform: Some(platform),
            } => BridgeResponse::Snapshot(self.store.snapshot().only(platform)),
        }
    }
}
