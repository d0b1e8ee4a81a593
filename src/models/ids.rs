//! Newtype wrappers for captured string values.
//!
//! These keep merchant business codes and credential tokens from being
//! mixed up with each other or with display text at compile time.

use serde::{Deserialize, Serialize};

/// Macro to define a newtype wrapping a non-empty `String`.
macro_rules! define_string_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new value from the given string.
            #[inline]
            #[must_use]
            pub const fn new(value: String) -> Self {
                Self(value)
            }

            /// Creates a value from raw captured text.
            ///
            /// Surrounding whitespace is trimmed; returns `None` when
            /// nothing is left.
            #[inline]
            #[must_use]
            pub fn from_raw(raw: &str) -> Option<Self> {
                let trimmed = raw.trim();
                (!trimmed.is_empty()).then(|| Self(trimmed.to_owned()))
            }

            /// Returns a reference to the inner string.
            #[inline]
            #[must_use]
            pub fn as_inner(&self) -> &str {
                &self.0
            }

            /// Consumes the wrapper and returns the inner string.
            #[inline]
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            #[inline]
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<String> for $name {
            #[inline]
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

define_string_id! {
    /// Stable merchant identifier; the primary dedup key within a platform.
    BusinessCode
}

define_string_id! {
    /// Opaque credential value captured from a request header.
    Token
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_code_serde_transparent() {
        let code = BusinessCode::new("M10086".to_owned());
        let json = serde_json::to_string(&code).unwrap();
        assert_eq!(json, r#""M10086""#);
        let deserialized: BusinessCode = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, code);
    }

    #[test]
    fn from_raw_trims_whitespace() {
        let token = Token::from_raw("  eyJhbGciOi  ").unwrap();
        assert_eq!(token.as_inner(), "eyJhbGciOi");
    }

    #[test]
    fn from_raw_rejects_blank() {
        assert!(BusinessCode::from_raw("").is_none());
        assert!(BusinessCode::from_raw("   ").is_none());
    }

    #[test]
    fn display_shows_inner_value() {
        let code = BusinessCode::new("shop-7".to_owned());
        assert_eq!(code.to_string(), "shop-7");
    }

    #[test]
    fn into_inner_returns_string() {
        let token: Token = "abc".to_owned().into();
        assert_eq!(token.into_inner(), "abc");
    }
}
