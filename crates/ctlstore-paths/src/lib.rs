//! The on-disk directory structure used by ctlstore processes, represented
//! as a type hierarchy rather than raw [`PathBuf`] threading (mirrors the
//! teacher's `spacetimedb-paths` crate).

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PathsError {
    #[error("failed to create directory {path}: {source}")]
    CreateDir { path: PathBuf, source: std::io::Error },
}

macro_rules! path_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub struct $name(PathBuf);

        impl $name {
            pub fn as_path(&self) -> &Path {
                &self.0
            }
        }

        impl AsRef<Path> for $name {
            fn as_ref(&self) -> &Path {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0.display())
            }
        }

        impl From<$name> for PathBuf {
            fn from(v: $name) -> PathBuf {
                v.0
            }
        }
    };
}

path_newtype!(AuthorityDbPath);
path_newtype!(ReplicaDbPath);
path_newtype!(ChangelogPath);

/// Root of a ctlstore process's on-disk state: `<data-dir>/{ctldb.sqlite,
/// ldb.sqlite, changelog.ndjson}`.
#[derive(Debug, Clone)]
pub struct CtlstoreDataDir {
    root: PathBuf,
}

impl CtlstoreDataDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Creates the root directory (and parents) if it doesn't exist.
    pub fn ensure_exists(&self) -> Result<(), PathsError> {
        std::fs::create_dir_all(&self.root).map_err(|source| PathsError::CreateDir {
            path: self.root.clone(),
            source,
        })
    }

    pub fn authority_db(&self) -> AuthorityDbPath {
        AuthorityDbPath(self.root.join("ctldb.sqlite"))
    }

    pub fn replica_db(&self) -> ReplicaDbPath {
        ReplicaDbPath(self.root.join("ldb.sqlite"))
    }

    pub fn changelog(&self) -> ChangelogPath {
        ChangelogPath(self.root.join("changelog.ndjson"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subpaths_are_joined_under_root() {
        let dir = CtlstoreDataDir::new("/var/lib/ctlstore");
        assert_eq!(dir.authority_db().as_path(), Path::new("/var/lib/ctlstore/ctldb.sqlite"));
        assert_eq!(dir.replica_db().as_path(), Path::new("/var/lib/ctlstore/ldb.sqlite"));
        assert_eq!(
            dir.changelog().as_path(),
            Path::new("/var/lib/ctlstore/changelog.ndjson")
        );
    }

    #[test]
    fn ensure_exists_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a/b/c");
        let dir = CtlstoreDataDir::new(&nested);
        dir.ensure_exists().unwrap();
        assert!(nested.is_dir());
    }
}
