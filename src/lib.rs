//! Merchant session capture for rental-platform merchant consoles.
//!
//! This crate reconciles two independently observed signals per platform,
//! the session credential seen on outgoing requests and the merchant
//! identity seen in responses or page messages, into at most one record
//! per merchant. Records are persisted under a single key and pushed to
//! observers after every accepted change.
//!
//! The moving parts:
//!
//! - [`signal`] turns observed traffic into credential and identity
//!   signals.
//! - [`reconcile`] is the pure merge policy.
//! - [`store`] runs that policy in a single task, arms pending-slot
//!   deadlines, persists through [`storage`] and notifies through
//!   [`notify`].
//! - [`message`] and [`bridge`] expose the state to the popup and to
//!   allow-listed external pages.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use merchant_capture::config::CaptureConfig;
//! use merchant_capture::models::{Credential, Platform};
//! use merchant_capture::notify::Notifier;
//! use merchant_capture::storage::InMemoryStorage;
//! use merchant_capture::store::StoreHandle;
//!
//! # async fn demo() -> merchant_capture::Result<()> {
//! let store = StoreHandle::start(
//!     Arc::new(InMemoryStorage::new()),
//!     Notifier::new(),
//!     &CaptureConfig::default(),
//! )
//! .await?;
//! if let Some(credential) = Credential::azjtk("token") {
//!     let _outcome = store
//!         .submit_credential(Platform::Woaizuji, credential, None)
//!         .await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod config;
pub mod error;
pub mod legacy;
pub mod message;
pub mod models;
pub mod notify;
pub mod reconcile;
pub mod signal;
pub mod storage;
pub mod store;

pub use error::{CaptureError, Result};
