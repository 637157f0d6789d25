//! A bounded, numerically-named directory of cached files.
//!
//! This is the storage layer an HSDir uses to persist accepted descriptors
//! to disk (spec.md §4.9). It is deliberately generic over file contents:
//! callers decide what bytes to save and how to interpret what they read
//! back.
//!
//! Grounded on `storagedir.c`'s `storage_dir_t`, reusing this workspace's
//! `fs-mistrust` (for safe directory creation/IO, in place of the
//! reference implementation's sandboxing layer) exactly as
//! `tor_persist::fs::FsStateMgr` already does for a similar problem.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use fs_mistrust::CheckedDir;

use super::err::StorageError;

/// The lowest filename used by a [`StorageDir`] (`FNAME_MIN_NUM`).
const FNAME_MIN_NUM: u32 = 1000;

/// Configuration for a [`StorageDir`].
#[derive(Copy, Clone, Debug)]
pub struct StorageDirConfig {
    /// The largest number of non-temporary files this directory will hold.
    max_files: u32,
}

impl StorageDirConfig {
    /// Construct a new configuration.
    pub fn new(max_files: u32) -> Self {
        StorageDirConfig { max_files }
    }
}

/// What we know about a storage directory's contents.
///
/// Mirrors spec.md §4.11's storage-directory state machine:
/// `unknown -> scanned(list, usage) -> unknown` on rescan.
#[derive(Debug, Default)]
enum Contents {
    /// We haven't scanned the directory since the last save/remove.
    #[default]
    Unknown,
    /// We know exactly what's in the directory, and how much space it
    /// uses.
    Scanned {
        /// Every non-temporary file name currently present.
        names: Vec<String>,
        /// Total size in bytes of all files in `names`.
        usage: u64,
    },
}

/// A directory on disk holding up to `max_files` files, named by decimal
/// integers in `[1000, 1000 + max_files)`.
///
/// Writes go through the teacher's `write-to-temp-then-rename` idiom
/// (`CheckedDir::write_and_replace`), so a crash mid-write never leaves a
/// half-written file visible under its final name.
#[derive(Debug)]
pub struct StorageDir {
    /// The checked, permission-validated directory we operate within.
    dir: CheckedDir,
    /// Configuration.
    config: StorageDirConfig,
    /// Our current knowledge of the directory's contents.
    contents: Contents,
}

impl StorageDir {
    /// Open or create a storage directory at `path`, enforcing `mistrust`'s
    /// permission rules on it (and creating it if absent), exactly as
    /// `tor_persist::fs::FsStateMgr::from_path_and_mistrust` does for its
    /// state directory.
    pub fn new(
        path: impl AsRef<Path>,
        config: StorageDirConfig,
        mistrust: &fs_mistrust::Mistrust,
    ) -> Result<Self, StorageError> {
        let dir = mistrust
            .verifier()
            .check_content()
            .make_secure_dir(path.as_ref())?;
        Ok(StorageDir {
            dir,
            config,
            contents: Contents::Unknown,
        })
    }

    /// The on-disk path of `n.tmp`, the staging name `save_bytes` writes to
    /// before renaming it into place.
    fn tmp_name(n: u32) -> String {
        format!("{n}.tmp")
    }

    /// Re-list the directory, dropping any leftover `.tmp` files (as if a
    /// previous write crashed mid-rename) and recomputing total usage.
    ///
    /// Grounded on `storage_dir_rescan` + `storage_dir_clean_tmpfiles`.
    fn rescan(&mut self) -> Result<(), StorageError> {
        let entries = self
            .dir
            .read_directory(".")
            .map_err(|e| StorageError::RescanFailed(std::sync::Arc::new(e)))?;

        let mut names = Vec::new();
        let mut usage = 0_u64;
        for entry in entries {
            let entry = match entry {
                Ok(e) => e,
                Err(_) => continue,
            };
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(".tmp") {
                // A write that never completed; drop it.
                let _ = self.dir.remove_file(&name);
                continue;
            }
            if let Ok(meta) = self.dir.metadata(&name) {
                usage += meta.len();
            }
            names.push(name);
        }
        self.contents = Contents::Scanned { names, usage };
        Ok(())
    }

    /// Ensure `self.contents` reflects an actual directory listing,
    /// rescanning if it's currently `Unknown`.
    fn ensure_scanned(&mut self) -> Result<(), StorageError> {
        if matches!(self.contents, Contents::Unknown) {
            self.rescan()?;
        }
        Ok(())
    }

    /// The total number of bytes used by files in this directory.
    pub fn usage(&mut self) -> Result<u64, StorageError> {
        self.ensure_scanned()?;
        match &self.contents {
            Contents::Scanned { usage, .. } => Ok(*usage),
            Contents::Unknown => unreachable!("ensure_scanned leaves Unknown behind"),
        }
    }

    /// The list of file names currently present.
    pub fn list(&mut self) -> Result<Vec<String>, StorageError> {
        self.ensure_scanned()?;
        match &self.contents {
            Contents::Scanned { names, .. } => Ok(names.clone()),
            Contents::Unknown => unreachable!("ensure_scanned leaves Unknown behind"),
        }
    }

    /// Find the lowest-numbered unused name in `[1000, 1000+max_files)`.
    fn find_unused_name(&mut self) -> Result<Option<u32>, StorageError> {
        self.ensure_scanned()?;
        let names = match &self.contents {
            Contents::Scanned { names, .. } => names,
            Contents::Unknown => unreachable!(),
        };
        for n in FNAME_MIN_NUM..FNAME_MIN_NUM + self.config.max_files {
            if !names.iter().any(|name| name == &n.to_string()) {
                return Ok(Some(n));
            }
        }
        Ok(None)
    }

    /// Save `data` to the first unused name, writing via
    /// temp-then-rename, and return the assigned (purely numeric)
    /// basename.
    pub fn save_bytes(&mut self, data: &[u8]) -> Result<String, StorageError> {
        let n = self
            .find_unused_name()?
            .ok_or(StorageError::OutOfSpace {
                max_files: self.config.max_files,
            })?;
        let name = n.to_string();

        self.dir.write_and_replace(&name, data)?;

        if let Contents::Scanned { names, usage } = &mut self.contents {
            names.push(name.clone());
            *usage += data.len() as u64;
        }
        Ok(name)
    }

    /// Read back the bytes saved under `name`.
    pub fn read(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        Ok(self.dir.read(name)?)
    }

    /// Remove the file `name`, updating tracked usage if it is known.
    pub fn remove_file(&mut self, name: &str) -> Result<(), StorageError> {
        let size = if let Contents::Scanned { .. } = &self.contents {
            self.dir.metadata(name).map(|m| m.len()).unwrap_or(0)
        } else {
            0
        };

        self.dir.remove_file(name)?;

        if let Contents::Scanned { names, usage } = &mut self.contents {
            names.retain(|n| n != name);
            *usage = usage.saturating_sub(size);
        }
        Ok(())
    }

    /// Remove the oldest (by mtime) files until usage is at or below
    /// `target` *and* at least `min_to_remove` files have been deleted,
    /// or the directory runs out of files.
    ///
    /// Individual unlink failures are logged and skipped, matching
    /// `storage_dir_shrink`'s tolerance for a file vanishing underneath
    /// it; a rescan failure aborts the whole operation.
    pub fn shrink(&mut self, target: u64, min_to_remove: u32) -> Result<(), StorageError> {
        self.rescan()?;

        let mut entries: Vec<(String, SystemTime, u64)> = {
            let names = match &self.contents {
                Contents::Scanned { names, .. } => names.clone(),
                Contents::Unknown => unreachable!(),
            };
            names
                .into_iter()
                .filter_map(|name| {
                    let meta = self.dir.metadata(&name).ok()?;
                    let mtime = meta.modified().ok()?;
                    let size = meta.len();
                    Some((name, mtime, size))
                })
                .collect()
        };
        entries.sort_by_key(|(_, mtime, _)| *mtime);

        let mut removed = 0_u32;
        for (name, _mtime, size) in entries {
            let usage = match &self.contents {
                Contents::Scanned { usage, .. } => *usage,
                Contents::Unknown => unreachable!(),
            };
            if usage <= target && removed >= min_to_remove {
                break;
            }
            match self.dir.remove_file(&name) {
                Ok(()) => {
                    removed += 1;
                    if let Contents::Scanned { names, usage } = &mut self.contents {
                        names.retain(|n| n != &name);
                        *usage = usage.saturating_sub(size);
                    }
                }
                Err(e) => {
                    tracing::warn!(file = %name, error = %e, "unable to unlink during shrink");
                }
            }
        }

        self.rescan()
    }

    /// Remove every file in the directory.
    pub fn remove_all(&mut self) -> Result<(), StorageError> {
        self.shrink(0, self.config.max_files)
    }

    /// The path to the directory this handle manages.
    pub fn path(&self) -> &Path {
        self.dir.as_path()
    }
}

/// Compute the temp-file path for an in-progress save; retained for
/// callers that need to register filesystem access up front, the way
/// `storage_dir_register_with_sandbox` enumerates `(n, n.tmp)` pairs for
/// the sandbox.
pub fn tmp_and_final_names(max_files: u32) -> Vec<(PathBuf, PathBuf)> {
    (FNAME_MIN_NUM..FNAME_MIN_NUM + max_files)
        .map(|n| (PathBuf::from(n.to_string()), PathBuf::from(StorageDir::tmp_name(n))))
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    fn open_dir(max_files: u32) -> (tempfile::TempDir, StorageDir) {
        let tmp = tempfile::tempdir().unwrap();
        let mistrust = fs_mistrust::Mistrust::new_dangerously_trust_everyone();
        let sd = StorageDir::new(tmp.path(), StorageDirConfig::new(max_files), &mistrust).unwrap();
        (tmp, sd)
    }

    #[test]
    fn save_read_remove() {
        let (_tmp, mut sd) = open_dir(8);
        let name = sd.save_bytes(b"hello").unwrap();
        assert_eq!(sd.read(&name).unwrap(), b"hello");
        assert_eq!(sd.usage().unwrap(), 5);

        sd.remove_file(&name).unwrap();
        assert_eq!(sd.usage().unwrap(), 0);
        assert!(sd.list().unwrap().is_empty());
    }

    #[test]
    fn save_until_full() {
        let (_tmp, mut sd) = open_dir(3);
        for _ in 0..3 {
            sd.save_bytes(b"x").unwrap();
        }
        let err = sd.save_bytes(b"x").unwrap_err();
        assert!(matches!(err, StorageError::OutOfSpace { max_files: 3 }));
    }

    #[test]
    fn shrink_removes_oldest() {
        let (_tmp, mut sd) = open_dir(8);
        let mut names = Vec::new();
        for i in 0..8 {
            let name = sd.save_bytes(format!("entry-{i}").as_bytes()).unwrap();
            names.push(name);
            // Ensure distinct mtimes even on coarse filesystem clocks.
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        sd.shrink(u64::MAX, 3).unwrap();
        let remaining = sd.list().unwrap();
        assert_eq!(remaining.len(), 5);
        for old in &names[..3] {
            assert!(!remaining.contains(old));
        }
    }

    #[test]
    fn invariant_usage_matches_stat_sum() {
        let (_tmp, mut sd) = open_dir(8);
        sd.save_bytes(b"abc").unwrap();
        sd.save_bytes(b"de").unwrap();
        let listed = sd.list().unwrap();
        let mut total = 0;
        for name in &listed {
            total += sd.read(name).unwrap().len() as u64;
        }
        assert_eq!(total, sd.usage().unwrap());
    }

    #[test]
    fn remove_all_empties_directory() {
        let (_tmp, mut sd) = open_dir(4);
        for _ in 0..4 {
            sd.save_bytes(b"y").unwrap();
        }
        sd.remove_all().unwrap();
        assert!(sd.list().unwrap().is_empty());
        assert_eq!(sd.usage().unwrap(), 0);
    }
}
