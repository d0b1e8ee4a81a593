//! Platform-specific credential payloads.

use serde::{Deserialize, Serialize};

use super::{Platform, Token};

/// Authentication payload captured from a partner-site request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Credential {
    /// Woaizuji `azjtk` header token.
    Azjtk {
        /// Token value.
        token: Token,
    },
    /// Rrzu `authorization` header with the session cookie.
    HeaderPair {
        /// `authorization` header value.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        authorization: Option<Token>,
        /// `cookie` header value.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cookie: Option<Token>,
    },
}

impl Credential {
    /// Builds a Woaizuji credential from a raw header value.
    ///
    /// Returns `None` if the value is blank.
    #[inline]
    #[must_use]
    pub fn azjtk(raw: &str) -> Option<Self> {
        Token::from_raw(raw).map(|token| Self::Azjtk { token })
    }

    /// Builds a Rrzu credential from raw header values.
    ///
    /// Returns `None` unless at least one of the two is non-blank.
    #[inline]
    #[must_use]
    pub fn header_pair(authorization: Option<&str>, cookie: Option<&str>) -> Option<Self> {
        let credential = Self::HeaderPair {
            authorization: authorization.and_then(Token::from_raw),
            cookie: cookie.and_then(Token::from_raw),
        };
        (!credential.is_empty()).then_some(credential)
    }

    /// Returns the platform this credential shape belongs to.
    #[inline]
    #[must_use]
    pub const fn platform(&self) -> Platform {
        match *self {
            Self::Azjtk { .. } => Platform::Woaizuji,
            Self::HeaderPair { .. } => Platform::Rrzu,
        }
    }

    /// Returns `true` if no field carries a value.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match *self {
            Self::Azjtk { ref token } => token.as_inner().trim().is_empty(),
            Self::HeaderPair {
                ref authorization,
                ref cookie,
            } => authorization.is_none() && cookie.is_none(),
        }
    }

    /// Returns the value that identifies the session.
    ///
    /// For a header pair this is the `authorization` value, falling back to
    /// the cookie when only the cookie was captured.
    #[inline]
    #[must_use]
    pub fn primary(&self) -> Option<&Token> {
        match *self {
            Self::Azjtk { ref token } => Some(token),
            Self::HeaderPair {
                ref authorization,
                ref cookie,
            } => authorization.as_ref().or(cookie.as_ref()),
        }
    }

    /// Returns the secondary secret, if this shape has one.
    #[inline]
    #[must_use]
    pub fn secondary(&self) -> Option<&Token> {
        match *self {
            Self::Azjtk { .. } => None,
            Self::HeaderPair {
                ref authorization,
                ref cookie,
            } => authorization.as_ref().and(cookie.as_ref()),
        }
    }

    /// Returns `true` if both credentials identify the same session.
    #[inline]
    #[must_use]
    pub fn same_primary(&self, other: &Self) -> bool {
        self.platform() == other.platform()
            && self.primary().is_some()
            && self.primary() == other.primary()
    }

    /// Copies the secondary secret from a fresher capture of the same
    /// session. Values absent from `fresher` are left untouched.
    #[inline]
    pub fn refresh_from(&mut self, fresher: &Self) {
        if let Self::HeaderPair { ref mut cookie, .. } = *self
            && let Self::HeaderPair {
                cookie: Some(ref fresh_cookie),
                ..
            } = *fresher
        {
            *cookie = Some(fresh_cookie.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(value: &str) -> Token {
        Token::new(value.to_owned())
    }

    #[test]
    fn azjtk_rejects_blank() {
        assert!(Credential::azjtk("   ").is_none());
        assert_eq!(
            Credential::azjtk("abc").unwrap(),
            Credential::Azjtk { token: token("abc") }
        );
    }

    #[test]
    fn header_pair_requires_one_field() {
        assert!(Credential::header_pair(None, Some("")).is_none());
        let only_cookie = Credential::header_pair(None, Some("sid=1")).unwrap();
        assert_eq!(only_cookie.primary(), Some(&token("sid=1")));
        assert!(only_cookie.secondary().is_none());
    }

    #[test]
    fn header_pair_primary_is_authorization() {
        let pair = Credential::header_pair(Some("Bearer x"), Some("sid=1")).unwrap();
        assert_eq!(pair.primary(), Some(&token("Bearer x")));
        assert_eq!(pair.secondary(), Some(&token("sid=1")));
        assert_eq!(pair.platform(), Platform::Rrzu);
    }

    #[test]
    fn same_primary_ignores_cookie() {
        let first = Credential::header_pair(Some("Bearer x"), Some("sid=1")).unwrap();
        let second = Credential::header_pair(Some("Bearer x"), Some("sid=2")).unwrap();
        let other = Credential::header_pair(Some("Bearer y"), Some("sid=1")).unwrap();
        assert!(first.same_primary(&second));
        assert!(!first.same_primary(&other));
    }

    #[test]
    fn same_primary_never_crosses_platforms() {
        let azjtk = Credential::azjtk("abc").unwrap();
        let pair = Credential::header_pair(Some("abc"), None).unwrap();
        assert!(!azjtk.same_primary(&pair));
    }

    #[test]
    fn refresh_from_updates_cookie_only_when_present() {
        let mut stored = Credential::header_pair(Some("Bearer x"), Some("sid=1")).unwrap();
        stored.refresh_from(&Credential::header_pair(Some("Bearer x"), None).unwrap());
        assert_eq!(stored.secondary(), Some(&token("sid=1")));
        stored.refresh_from(&Credential::header_pair(Some("Bearer x"), Some("sid=2")).unwrap());
        assert_eq!(stored.secondary(), Some(&token("sid=2")));
    }

    #[test]
    fn serde_shape_is_tagged() {
        let json = serde_json::to_value(Credential::azjtk("abc").unwrap()).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "azjtk", "token": "abc"}));
        let pair: Credential =
            serde_json::from_str(r#"{"kind":"headerPair","authorization":"Bearer x"}"#).unwrap();
        assert_eq!(pair.primary(), Some(&token("Bearer x")));
    }
}
