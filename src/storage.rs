//! Pluggable storage backends for persisting the captured snapshot.
//!
//! This module defines the [`Storage`] (async) and [`BlockingStorage`]
//! (blocking) traits via a shared macro. The store reads and writes through
//! [`Storage`]; [`BlockingStorage`] only reads, for tools that inspect the
//! state without running a store. The persisted value lives under a single
//! key, [`STATE_KEY`].

#[cfg(feature = "storage-file")]
mod file;
mod memory;

#[cfg(feature = "storage-file")]
pub use file::FileStorage;
pub use memory::InMemoryStorage;

/// The single durable key holding the full snapshot.
pub const STATE_KEY: &str = "extractedData";

/// Generates a storage trait (async or blocking) with all methods.
///
/// `@methods` lists the methods of each variant, and `@method` renders one
/// method in async (`impl Future + Send`) or blocking (`fn`) style.
macro_rules! define_storage {
    // ── Entry points ────────────────────────────────────────────────
    (
        trait_name: $trait_name:ident,
        trait_doc: $trait_doc:expr,
        mode: async_mode,
    ) => {
        #[doc = $trait_doc]
        pub trait $trait_name: core::fmt::Debug + Send + Sync {
            define_storage!(@methods async_mode);
        }
    };
    (
        trait_name: $trait_name:ident,
        trait_doc: $trait_doc:expr,
        mode: blocking,
    ) => {
        #[doc = $trait_doc]
        pub trait $trait_name: core::fmt::Debug + Send + Sync {
            define_storage!(@methods blocking);
        }
    };

    // ── Method lists ────────────────────────────────────────────────
    // The blocking variant only reads; writes go through the store.
    (@methods async_mode) => {
        define_storage!(@load async_mode);
        define_storage!(@method async_mode, save,
            "Replaces the persisted state with `snapshot`.\n\n# Errors\n\nReturns an error if the storage backend fails to write.",
            snapshot: &Snapshot, -> Result<()>);
    };
    (@methods blocking) => {
        define_storage!(@load blocking);
    };
    (@load $mode:ident) => {
        define_storage!(@method $mode, load,
            "Returns the raw persisted state, or `Ok(None)` if nothing has been saved yet.\n\nThe value is returned untyped so callers can normalize older layouts.\n\n# Errors\n\nReturns an error if the storage backend fails to read or the stored bytes are not JSON.",
            -> Result<Option<serde_json::Value>>);
    };

    // ── Blocking method renderer ────────────────────────────────────
    (@method blocking, $name:ident, $doc:expr,
     $($param:ident: $param_ty:ty,)* -> $ret:ty) => {
        #[doc = $doc]
        fn $name(&self $(, $param: $param_ty)*) -> $ret;
    };

    // ── Async method renderer (returns impl Future + Send) ──────────
    (@method async_mode, $name:ident, $doc:expr,
     $($param:ident: $param_ty:ty,)* -> $ret:ty) => {
        #[doc = $doc]
        fn $name(&self $(, $param: $param_ty)*)
            -> impl core::future::Future<Output = $ret> + Send;
    };
}

mod async_storage {
    //! Async storage trait definition.

    use crate::error::Result;
    use crate::models::Snapshot;

    define_storage! {
        trait_name: Storage,
        trait_doc: "Async storage backend for persisting the captured snapshot.\n\nAll methods take `&self`; implementations should use interior mutability\n(e.g. `Mutex`) for thread-safe mutation.",
        mode: async_mode,
    }
}

#[cfg(feature = "blocking")]
mod blocking_storage {
    //! Blocking storage trait definition.

    use crate::error::Result;

    define_storage! {
        trait_name: BlockingStorage,
        trait_doc: "Blocking read access to the persisted snapshot.",
        mode: blocking,
    }
}

pub use async_storage::Storage;
#[cfg(feature = "blocking")]
pub use blocking_storage::BlockingStorage;
