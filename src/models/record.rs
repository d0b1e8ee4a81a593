//! Merchant record model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BusinessCode, Credential, Platform};

/// One merchant session captured on a platform.
///
/// A record is either *complete* (business code and display name both
/// set), *identity-only* (complete but no credential captured yet) or
/// *degraded* (a credential whose identity never arrived).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantRecord {
    /// Platform the record was captured on.
    pub platform: Platform,
    /// Stable merchant identifier; never changes once set.
    #[serde(default)]
    pub business_code: Option<BusinessCode>,
    /// Human-readable merchant name.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Captured credential, if any.
    #[serde(default)]
    pub credential: Option<Credential>,
    /// Last request URL that produced or refreshed this record.
    #[serde(default)]
    pub source_url: Option<String>,
    /// Last time any field was refreshed.
    pub observed_at: DateTime<Utc>,
}

impl MerchantRecord {
    /// Returns `true` if both business code and display name are set.
    #[inline]
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.business_code.is_some() && self.display_name.is_some()
    }

    /// Returns `true` for a timeout fallback record without identity.
    #[inline]
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        self.business_code.is_none() && self.credential.is_some()
    }

    /// Returns `true` for a complete record still waiting for a credential.
    #[inline]
    #[must_use]
    pub const fn is_identity_only(&self) -> bool {
        self.is_complete() && self.credential.is_none()
    }

    /// Returns `true` if this record carries the given business code.
    #[inline]
    #[must_use]
    pub fn has_code(&self, code: &BusinessCode) -> bool {
        self.business_code.as_ref() == Some(code)
    }

    /// Returns `true` if this record's credential identifies the same
    /// session as `credential`.
    #[inline]
    #[must_use]
    pub fn has_primary(&self, credential: &Credential) -> bool {
        self.credential
            .as_ref()
            .is_some_and(|held| held.same_primary(credential))
    }

    /// Advances `observed_at`, never moving it backwards.
    #[inline]
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.observed_at = self.observed_at.max(now);
    }
}
