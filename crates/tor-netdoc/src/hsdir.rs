//! Directory-side support for onion service v3 descriptors.
//!
//! This module holds the pieces of the onion service descriptor subsystem
//! that run on an HSDir (a relay that caches descriptors for lookup by
//! clients) rather than on a client or service: a [`cache`] that accepts
//! and expires descriptors keyed by blinded public ID, a [`storage_dir`]
//! that persists arbitrary accepted descriptors to disk, and a [`collate`]
//! helper used by a consensus-building process to decide which identities
//! a majority of authorities agree on.
//!
//! None of this validates descriptor content beyond structural parsing
//! and outer-layer signature/lifetime checks: an HSDir cannot decrypt the
//! superencrypted and encrypted layers, so (per rend-spec-v3) it only ever
//! inspects the plaintext outer document.

pub(crate) mod err;

pub mod cache;
pub mod collate;
pub mod storage_dir;

pub use cache::{HsDirCache, HsDirCacheConfig};
pub use collate::{CollateError, ConsensusMethod, VoteCollator, VoteRowHandle};
pub use err::{CacheError, StorageError, StoreOutcome};
pub use storage_dir::{StorageDir, StorageDirConfig};
