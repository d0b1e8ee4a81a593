//! Runtime messages exchanged with page scripts and the popup.
//!
//! Messages are JSON objects tagged by `type`:
//!
//! ```text
//! { "type": "GET_HEADER_DATA" }
//! { "type": "MERCHANT_INFO_EXTRACTED", "site": "woaizuji",
//!   "data": { "merchantCode": "M1", "merchantName": "Shop" } }
//! { "type": "CLEAR_DATA" }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{BusinessCode, Platform, Snapshot};
use crate::store::{Outcome, StoreHandle};

/// Merchant identity as reported by a page script.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MerchantInfo {
    /// Merchant business code.
    pub merchant_code: Option<String>,
    /// Merchant display name.
    pub merchant_name: Option<String>,
}

/// A runtime message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    /// Asks for the current snapshot.
    GetHeaderData,
    /// Reports a merchant identity seen on a page.
    MerchantInfoExtracted {
        /// Site identifier, matched against platform names.
        site: String,
        /// Reported identity.
        #[serde(default)]
        data: MerchantInfo,
    },
    /// Clears all captured data.
    ClearData,
}

/// Answer to a routed [`Message`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Current records of both platforms.
    Snapshot(Snapshot),
    /// What the store did with a reported identity.
    Submitted(Outcome),
    /// All data was cleared.
    Cleared,
}

/// Routes a message into the store.
///
/// A `MERCHANT_INFO_EXTRACTED` for an unknown site is ignored.
///
/// # Errors
///
/// Returns [`crate::CaptureError::StoreClosed`] if the store has stopped.
#[inline]
#[tracing::instrument(skip_all)]
pub async fn route(store: &StoreHandle, message: Message) -> Result<Reply> {
    match message {
        Message::GetHeaderData => Ok(Reply::Snapshot(store.snapshot())),
        Message::MerchantInfoExtracted { site, data } => {
            let Ok(platform) = site.parse::<Platform>() else {
                tracing::debug!(%site, "merchant info from unknown site ignored");
                return Ok(Reply::Submitted(Outcome::Ignored));
            };
            let business_code = data.merchant_code.as_deref().and_then(BusinessCode::from_raw);
            let outcome = store
                .submit_identity(platform, business_code, data.merchant_name)
                .await?;
            Ok(Reply::Submitted(outcome))
        }
        Message::ClearData => {
            store.reset().await?;
            Ok(Reply::Cleared)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::config::CaptureConfig;
    use crate::notify::Notifier;
    use crate::storage::InMemoryStorage;

    async fn store() -> StoreHandle {
        StoreHandle::start(
            Arc::new(InMemoryStorage::new()),
            Notifier::new(),
            &CaptureConfig::default(),
        )
        .await
        .unwrap()
    }

    #[test]
    fn parses_wire_format() {
        let message: Message = serde_json::from_value(json!({
            "type": "MERCHANT_INFO_EXTRACTED",
            "site": "woaizuji",
            "data": {"merchantCode": "M1", "merchantName": "Shop"}
        }))
        .unwrap();
        assert_eq!(
            message,
            Message::MerchantInfoExtracted {
                site: "woaizuji".to_owned(),
                data: MerchantInfo {
                    merchant_code: Some("M1".to_owned()),
                    merchant_name: Some("Shop".to_owned()),
                },
            }
        );
        let clear: Message = serde_json::from_str(r#"{"type":"CLEAR_DATA"}"#).unwrap();
        assert_eq!(clear, Message::ClearData);
        assert!(serde_json::from_str::<Message>(r#"{"type":"HEADER_EXTRACTED"}"#).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn merchant_info_creates_identity_record() {
        let store = store().await;
        let reply = route(
            &store,
            Message::MerchantInfoExtracted {
                site: "woaizuji".to_owned(),
                data: MerchantInfo {
                    merchant_code: Some("M1".to_owned()),
                    merchant_name: Some("Shop".to_owned()),
                },
            },
        )
        .await
        .unwrap();
        assert_eq!(reply, Reply::Submitted(Outcome::Stored));

        let Reply::Snapshot(snapshot) = route(&store, Message::GetHeaderData).await.unwrap()
        else {
            panic!("expected snapshot");
        };
        assert_eq!(snapshot.woaizuji.len(), 1);
        assert!(snapshot.woaizuji[0].is_identity_only());
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_site_is_ignored() {
        let store = store().await;
        let reply = route(
            &store,
            Message::MerchantInfoExtracted {
                site: "elsewhere".to_owned(),
                data: MerchantInfo::default(),
            },
        )
        .await
        .unwrap();
        assert_eq!(reply, Reply::Submitted(Outcome::Ignored));
        assert!(store.snapshot().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn clear_data_resets() {
        let store = store().await;
        let _stored = store
            .submit_identity(Platform::Rrzu, BusinessCode::from_raw("R1"), None)
            .await
            .unwrap();
        assert_eq!(route(&store, Message::ClearData).await.unwrap(), Reply::Cleared);
        assert!(store.snapshot().is_empty());
    }
}
