//! The store file being watched, plus the journal file its writer uses.

use std::ffi::{OsStr, OsString};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::TargetError;

/// Suffix that transactional stores append to the database file name for
/// their rollback journal (`app.db` → `app.db-journal`).
pub const DEFAULT_JOURNAL_SUFFIX: &str = "-journal";

/// Resolved location of a watched store.
///
/// `directory` is canonical, so paths reported by the platform watch facility
/// (which are rooted at the watched directory) compare equal to
/// [`WatchTarget::db_path`] and [`WatchTarget::journal_path`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchTarget {
    directory: PathBuf,
    file_name: OsString,
    journal_file_name: OsString,
}

impl WatchTarget {
    /// Resolve `path` against the current directory.
    ///
    /// The containing directory must exist; the store file itself may not
    /// have been created yet.
    pub fn resolve(path: impl AsRef<Path>, journal_suffix: &str) -> Result<Self, TargetError> {
        let path = path.as_ref();
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            let cwd = std::env::current_dir().map_err(|source| TargetError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            cwd.join(path)
        };

        let Some(file_name) = absolute.file_name().map(OsStr::to_os_string) else {
            return Err(TargetError::InvalidPath { path: absolute });
        };
        let parent = absolute
            .parent()
            .ok_or_else(|| TargetError::InvalidPath {
                path: absolute.clone(),
            })?;

        let directory = match std::fs::canonicalize(parent) {
            Ok(dir) => dir,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(TargetError::DirectoryNotFound {
                    path: parent.to_path_buf(),
                })
            }
            Err(source) => {
                return Err(TargetError::Io {
                    path: parent.to_path_buf(),
                    source,
                })
            }
        };
        if !directory.is_dir() {
            return Err(TargetError::DirectoryNotFound { path: directory });
        }

        Ok(Self::from_parts(directory, file_name, journal_suffix))
    }

    /// Build a target without touching the filesystem. `directory` is taken as-is.
    pub fn from_parts(
        directory: impl Into<PathBuf>,
        file_name: impl Into<OsString>,
        journal_suffix: &str,
    ) -> Self {
        let file_name = file_name.into();
        let mut journal_file_name = file_name.clone();
        journal_file_name.push(journal_suffix);
        Self {
            directory: directory.into(),
            file_name,
            journal_file_name,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn file_name(&self) -> &OsStr {
        &self.file_name
    }

    pub fn journal_file_name(&self) -> &OsStr {
        &self.journal_file_name
    }

    pub fn db_path(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }

    pub fn journal_path(&self) -> PathBuf {
        self.directory.join(&self.journal_file_name)
    }

    /// True when `path` is the store file or its journal.
    pub fn matches(&self, path: &Path) -> bool {
        if path.parent() != Some(self.directory.as_path()) {
            return false;
        }
        match path.file_name() {
            Some(name) => name == self.file_name || name == self.journal_file_name,
            None => false,
        }
    }
}
