//! Extraction of credential and identity signals from observed traffic.
//!
//! The capture layer sees outgoing request headers and some response
//! bodies. These functions decide which of them belong to a supported
//! merchant console and turn them into platform-tagged signals for the
//! store. Anything unrecognized yields `None`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::Result;
use crate::models::{BusinessCode, Credential, Platform};
use crate::store::{Outcome, StoreHandle};

/// Host serving the Woaizuji merchant console API.
const WOAIZUJI_HOST: &str = "external-gw.woaizuji.com";

/// Path of the Woaizuji order list endpoint.
const WOAIZUJI_ORDER_LIST_PATH: &str =
    "/merchantTeamwork/inside_route_page/merchantOrder/orderList";

/// Host fragment identifying Rrzu endpoints.
const RRZU_HOST_FRAGMENT: &str = "rrzu";

/// A credential observed on an outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialSignal {
    /// Platform the request targeted.
    pub platform: Platform,
    /// Captured headers.
    pub credential: Credential,
    /// Request URL.
    pub source_url: String,
}

/// A merchant identity observed in a response or page message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentitySignal {
    /// Platform the identity belongs to.
    pub platform: Platform,
    /// Merchant business code.
    pub business_code: Option<BusinessCode>,
    /// Merchant display name.
    pub display_name: Option<String>,
}

/// Returns `true` for the Woaizuji order list endpoint.
fn is_woaizuji_order_list(url: &Url) -> bool {
    url.host_str() == Some(WOAIZUJI_HOST) && url.path().starts_with(WOAIZUJI_ORDER_LIST_PATH)
}

/// Returns `true` for any Rrzu host.
fn is_rrzu(url: &Url) -> bool {
    url.host_str()
        .is_some_and(|host| host.to_ascii_lowercase().contains(RRZU_HOST_FRAGMENT))
}

/// Finds a header by case-insensitive name.
fn header<'h, K, V>(headers: &'h [(K, V)], name: &str) -> Option<&'h str>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    headers
        .iter()
        .find(|pair| pair.0.as_ref().eq_ignore_ascii_case(name))
        .map(|pair| pair.1.as_ref())
}

/// Extracts a credential from an outgoing request.
///
/// Woaizuji is captured from the order list endpoint's `azjtk` header;
/// Rrzu from any Rrzu host carrying `authorization` and/or `cookie`.
#[inline]
#[must_use]
pub fn credential_from_request<K, V>(url: &str, headers: &[(K, V)]) -> Option<CredentialSignal>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let parsed = Url::parse(url).ok()?;
    let (platform, credential) = if is_woaizuji_order_list(&parsed) {
        (
            Platform::Woaizuji,
            Credential::azjtk(header(headers, "azjtk")?)?,
        )
    } else if is_rrzu(&parsed) {
        (
            Platform::Rrzu,
            Credential::header_pair(header(headers, "authorization"), header(headers, "cookie"))?,
        )
    } else {
        return None;
    };
    tracing::debug!(%platform, "credential captured");
    Some(CredentialSignal {
        platform,
        credential,
        source_url: url.to_owned(),
    })
}

/// Extracts the merchant identity from a Woaizuji order list response.
///
/// The identity is read from the first order in `data.data`.
#[inline]
#[must_use]
pub fn identity_from_order_list(url: &str, body: &Value) -> Option<IdentitySignal> {
    let parsed = Url::parse(url).ok()?;
    if !is_woaizuji_order_list(&parsed) {
        return None;
    }
    let first = body.pointer("/data/data/0")?;
    let business_code = first
        .get("merchantCode")
        .and_then(Value::as_str)
        .and_then(BusinessCode::from_raw);
    let display_name = first
        .get("merchantName")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_owned);
    if business_code.is_none() && display_name.is_none() {
        tracing::debug!("order list carried no merchant identity");
        return None;
    }
    Some(IdentitySignal {
        platform: Platform::Woaizuji,
        business_code,
        display_name,
    })
}

/// One piece of observed traffic, as recorded for replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Captured {
    /// Outgoing request headers.
    Request {
        /// Request URL.
        url: String,
        /// Header name and value pairs.
        headers: Vec<(String, String)>,
    },
    /// Response body.
    Response {
        /// Request URL.
        url: String,
        /// Parsed JSON body.
        body: Value,
    },
}

impl Captured {
    /// Extracts the signal carried by this traffic, if any, and submits it.
    ///
    /// Returns [`Outcome::Ignored`] for unrecognized traffic.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CaptureError::StoreClosed`] if the store has stopped.
    #[inline]
    pub async fn submit(self, store: &StoreHandle) -> Result<Outcome> {
        match self {
            Self::Request { url, headers } => match credential_from_request(&url, &headers) {
                Some(signal) => {
                    store
                        .submit_credential(signal.platform, signal.credential, Some(signal.source_url))
                        .await
                }
                None => Ok(Outcome::Ignored),
            },
            Self::Response { url, body } => match identity_from_order_list(&url, &body) {
                Some(signal) => {
                    store
                        .submit_identity(signal.platform, signal.business_code, signal.display_name)
                        .await
                }
                None => Ok(Outcome::Ignored),
            },
        }
    }
}
