//! Supported partner platforms.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the two partner sites whose traffic is captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Woaizuji merchant console; credential is the `azjtk` header.
    Woaizuji,
    /// Rrzu merchant console; credential is the `authorization`/`cookie` pair.
    Rrzu,
}

impl Platform {
    /// Every supported platform, in snapshot order.
    pub const ALL: [Self; 2] = [Self::Woaizuji, Self::Rrzu];

    /// Returns the key used for this platform in snapshots and messages.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Woaizuji => "woaizuji",
            Self::Rrzu => "rrzu",
        }
    }
}

impl fmt::Display for Platform {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name a supported platform.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown platform: {0}")]
pub struct UnknownPlatform(pub String);

impl FromStr for Platform {
    type Err = UnknownPlatform;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|platform| platform.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownPlatform(s.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_serde_lowercase() {
        let json = serde_json::to_string(&Platform::Woaizuji).unwrap();
        assert_eq!(json, r#""woaizuji""#);
        let deserialized: Platform = serde_json::from_str(r#""rrzu""#).unwrap();
        assert_eq!(deserialized, Platform::Rrzu);
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("RRZU".parse::<Platform>().unwrap(), Platform::Rrzu);
        assert_eq!(" woaizuji ".parse::<Platform>().unwrap(), Platform::Woaizuji);
    }

    #[test]
    fn parse_unknown_fails() {
        let err = "taobao".parse::<Platform>().unwrap_err();
        assert_eq!(err, UnknownPlatform("taobao".to_owned()));
        assert!(err.to_string().contains("taobao"));
    }

    #[test]
    fn invalid_platform_json_fails() {
        assert!(serde_json::from_str::<Platform>(r#""jd""#).is_err());
    }
}
