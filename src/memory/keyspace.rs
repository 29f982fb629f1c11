//! User keyspace — opaque user id to storage location.
//!
//! The file name is `memory_{sha256(user_id) as hex}.json` under the data
//! root. The mapping is one-way; nothing here tries to recover an id from a
//! file name.

use std::fmt;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

/// Resolved per-user file. Equality is path equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorageLocation {
    path: PathBuf,
}

impl StorageLocation {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory that holds the file (and its temporary siblings).
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }
}

impl fmt::Display for StorageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.path.file_name() {
            Some(name) => write!(f, "{}", name.to_string_lossy()),
            None => write!(f, "{}", self.path.display()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UserKeyspace {
    root: PathBuf,
}

impl UserKeyspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn location_for(&self, user_id: &str) -> StorageLocation {
        StorageLocation {
            path: self.root.join(format!("memory_{}.json", hash_user_id(user_id))),
        }
    }
}

/// Lowercase hex SHA-256 of the UTF-8 identifier.
pub fn hash_user_id(user_id: &str) -> String {
    hex::encode(Sha256::digest(user_id.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_sha256_hex() {
        // sha256("alice")
        assert_eq!(
            hash_user_id("alice"),
            "2bd806c97f0e00af1a1fc3328fa763a9269723c8db8fac4f93af71db186d6e90"
        );
        assert_eq!(hash_user_id("").len(), 64);
    }

    #[test]
    fn location_is_deterministic() {
        let ks = UserKeyspace::new("/data");
        assert_eq!(ks.location_for("alice"), ks.location_for("alice"));
        assert_ne!(ks.location_for("alice"), ks.location_for("Alice"));
    }

    #[test]
    fn location_layout() {
        let ks = UserKeyspace::new("/data");
        let loc = ks.location_for("alice");
        assert_eq!(loc.dir(), Path::new("/data"));
        let name = loc.to_string();
        assert!(name.starts_with("memory_"));
        assert!(name.ends_with(".json"));
        assert!(!name.contains("alice"));
    }

    #[test]
    fn path_like_ids_stay_inside_root() {
        let ks = UserKeyspace::new("/data");
        let loc = ks.location_for("../../etc/passwd");
        assert_eq!(loc.dir(), Path::new("/data"));
    }
}
