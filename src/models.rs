//! Data models for captured merchant state.
//!
//! This module contains the strongly-typed record, credential and snapshot
//! types, newtype wrappers for codes and tokens, and the platform enum.

mod credential;
mod ids;
mod platform;
mod record;
mod snapshot;

pub use credential::Credential;
pub use ids::{BusinessCode, Token};
pub use platform::{Platform, UnknownPlatform};
pub use record::MerchantRecord;
pub use snapshot::Snapshot;
