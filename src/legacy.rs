//! Startup normalization of persisted state.
//!
//! Older builds stored one object per platform instead of a record list:
//!
//! ```text
//! { "woaizuji": { "azjtk", "timestamp", "url", "merchantCode", "merchantName" },
//!   "rrzu":     { "authorization", "cookie", "timestamp", "url" } }
//! ```
//!
//! [`normalize`] turns either layout into a [`Snapshot`]. A legacy object
//! without a `merchantCode` is dropped. This runs once when the store
//! starts and never during normal operation.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::models::{BusinessCode, Credential, MerchantRecord, Platform, Snapshot};

/// Format written by the legacy build (`toLocaleString('zh-CN')`).
const LEGACY_TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// UTC offset of the locale the legacy timestamps were written in.
const LEGACY_UTC_OFFSET_SECS: i32 = 8 * 3600;

/// Single-object layout written by the legacy build.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct LegacyEntry {
    /// Woaizuji token header.
    azjtk: Option<String>,
    /// Rrzu authorization header.
    authorization: Option<String>,
    /// Rrzu cookie header.
    cookie: Option<String>,
    /// Locale-formatted capture time.
    timestamp: Option<String>,
    /// Request URL.
    url: Option<String>,
    /// Merchant business code.
    merchant_code: Option<String>,
    /// Merchant display name.
    merchant_name: Option<String>,
}

/// Returns `true` if any platform is stored in the legacy single-object
/// layout.
#[inline]
#[must_use]
pub fn is_legacy(raw: &Value) -> bool {
    Platform::ALL
        .into_iter()
        .any(|platform| raw.get(platform.as_str()).is_some_and(Value::is_object))
}

/// Normalizes a persisted value into a snapshot.
///
/// Unreadable platform entries are logged and treated as empty; `now` is
/// used for legacy entries whose timestamp cannot be parsed.
#[inline]
#[must_use]
pub fn normalize(raw: &Value, now: DateTime<Utc>) -> Snapshot {
    let mut snapshot = Snapshot::default();
    for platform in Platform::ALL {
        let records = match raw.get(platform.as_str()) {
            Some(&Value::Array(ref items)) => current_records(platform, items),
            Some(entry @ &Value::Object(_)) => legacy_record(platform, entry, now)
                .into_iter()
                .collect(),
            Some(&Value::Null) | None => Vec::new(),
            Some(other) => {
                tracing::warn!(%platform, kind = %value_kind(other), "unexpected persisted shape, starting empty");
                Vec::new()
            }
        };
        *snapshot.records_mut(platform) = records;
    }
    snapshot
}

/// Reads a current-layout record list, skipping entries that do not parse
/// or belong to another platform.
fn current_records(platform: Platform, items: &[Value]) -> Vec<MerchantRecord> {
    items
        .iter()
        .filter_map(|item| match MerchantRecord::deserialize(item) {
            Ok(record) if record.platform == platform => Some(record),
            Ok(record) => {
                tracing::warn!(%platform, found = %record.platform, "skipping record filed under wrong platform");
                None
            }
            Err(err) => {
                tracing::warn!(%platform, error = %err, "skipping unreadable persisted record");
                None
            }
        })
        .collect()
}

/// Converts one legacy object into a record, if it has a business code.
fn legacy_record(platform: Platform, entry: &Value, now: DateTime<Utc>) -> Option<MerchantRecord> {
    let legacy = match LegacyEntry::deserialize(entry) {
        Ok(legacy) => legacy,
        Err(err) => {
            tracing::warn!(%platform, error = %err, "unreadable legacy entry dropped");
            return None;
        }
    };
    let Some(code) = legacy.merchant_code.as_deref().and_then(BusinessCode::from_raw) else {
        tracing::debug!(%platform, "legacy entry without merchant code dropped");
        return None;
    };
    let credential = match platform {
        Platform::Woaizuji => legacy.azjtk.as_deref().and_then(Credential::azjtk),
        Platform::Rrzu => {
            Credential::header_pair(legacy.authorization.as_deref(), legacy.cookie.as_deref())
        }
    };
    let display_name = legacy
        .merchant_name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| code.as_inner().to_owned());
    let observed_at = legacy
        .timestamp
        .as_deref()
        .and_then(parse_legacy_timestamp)
        .unwrap_or(now);
    Some(MerchantRecord {
        platform,
        business_code: Some(code),
        display_name: Some(display_name),
        credential,
        source_url: legacy.url,
        observed_at,
    })
}

/// Parses a legacy locale timestamp such as `2024/5/1 08:00:00`.
fn parse_legacy_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(raw.trim(), LEGACY_TIMESTAMP_FORMAT).ok()?;
    let offset = FixedOffset::east_opt(LEGACY_UTC_OFFSET_SECS)?;
    naive
        .and_local_timezone(offset)
        .single()
        .map(|local| local.with_timezone(&Utc))
}

/// Short name of a JSON value's type, for diagnostics.
const fn value_kind(value: &Value) -> &'static str {
    match *value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
