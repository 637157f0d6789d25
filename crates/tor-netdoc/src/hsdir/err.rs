//! Error types for the directory-side onion service storage components
//! (the directory cache, the storage directory, and the vote collator).

use std::sync::Arc;

use tor_error::ErrorKind;

/// An error returned by [`super::cache::HsDirCache`].
#[derive(Clone, Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CacheError {
    /// The descriptor text we were asked to store did not parse.
    #[error("could not parse descriptor")]
    BadFormat(#[source] Arc<crate::Error>),

    /// The descriptor we were asked to store exceeds the configured size
    /// cap.
    #[error("descriptor of {len} bytes exceeds maximum of {max}")]
    TooLarge {
        /// The length of the rejected descriptor, in bytes.
        len: usize,
        /// The configured maximum.
        max: u32,
    },

    /// A configuration value was out of its permitted range.
    #[error("invalid configuration value")]
    BadArgument,

    /// We tried to initialize a cache that was already initialized, or
    /// tear down one that was not.
    #[error("cache lifecycle invariant violated")]
    LifecycleViolation,
}

impl tor_error::HasKind for CacheError {
    fn kind(&self) -> ErrorKind {
        use CacheError as E;
        use ErrorKind as K;
        match self {
            E::BadFormat(_) => K::CacheCorrupted,
            E::TooLarge { .. } => K::CacheCorrupted,
            E::BadArgument => K::BadApiUsage,
            E::LifecycleViolation => K::Internal,
        }
    }
}

/// The outcome of a successful [`super::cache::HsDirCache::store`] call.
///
/// Per the directory-cache contract, replaying an old revision is not an
/// error: it is reported here, rather than as an `Err`, so the caller
/// cannot mistake a silently-ignored resubmission for a failure.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum StoreOutcome {
    /// The new descriptor replaced an existing (or absent) entry.
    Replaced,
    /// The new descriptor's revision counter was not newer than what we
    /// already had, so the entry was left unchanged.
    NotNewer,
}

/// An error returned by [`super::storage_dir::StorageDir`].
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StorageError {
    /// An I/O or permissions error occurred while accessing the storage
    /// directory.
    #[error("I/O error accessing storage directory")]
    Io(#[source] Arc<fs_mistrust::Error>),

    /// Every name in the bounded numeric namespace is already in use.
    #[error("storage directory is full ({max_files} files)")]
    OutOfSpace {
        /// The configured maximum number of files.
        max_files: u32,
    },

    /// A rescan of the directory failed; the caller should treat the
    /// directory's contents as unknown until it succeeds.
    #[error("failed to rescan storage directory")]
    RescanFailed(#[source] Arc<fs_mistrust::Error>),
}

impl tor_error::HasKind for StorageError {
    fn kind(&self) -> ErrorKind {
        use ErrorKind as K;
        use StorageError as E;
        match self {
            E::Io(_) | E::RescanFailed(_) => K::PersistentStateAccessFailed,
            E::OutOfSpace { .. } => K::LocalResourceExhausted,
        }
    }
}

impl From<fs_mistrust::Error> for StorageError {
    fn from(e: fs_mistrust::Error) -> Self {
        StorageError::Io(Arc::new(e))
    }
}
