//! Local mirror of artifact content on disk.
//!
//! Each crawl target owns one directory; a blob lives at
//! `{mirror_dir}/{crawl_target}/{identity}`. Writes go to a temporary file in
//! the same directory and are renamed into place, so a reader never observes
//! a partially written blob.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

/// Prefix of in-flight temporary files. Identities may not use it.
const TEMP_PREFIX: &str = ".partial-";

/// Errors from the content store.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("invalid artifact identity '{0}'")]
    InvalidIdentity(String),

    #[error("content store error for '{identity}': {source}")]
    Io {
        identity: String,
        #[source]
        source: io::Error,
    },
}

impl ContentError {
    fn io(identity: &str, source: io::Error) -> Self {
        Self::Io {
            identity: identity.to_string(),
            source,
        }
    }
}

/// Byte-for-byte mirror of artifact payloads for one crawl target.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Make the store usable. Failure means no write can succeed.
    async fn prepare(&self) -> Result<(), ContentError>;

    /// Create or replace a blob atomically.
    async fn write(&self, identity: &str, bytes: &[u8]) -> Result<(), ContentError>;

    async fn read(&self, identity: &str) -> Result<Option<Vec<u8>>, ContentError>;

    /// Remove a blob. Removing an absent blob is not an error.
    async fn delete(&self, identity: &str) -> Result<(), ContentError>;

    async fn exists(&self, identity: &str) -> Result<bool, ContentError>;

    /// Identities of all stored blobs, sorted.
    async fn list(&self) -> Result<Vec<String>, ContentError>;
}

/// Check that an identity can name a file directly inside the target directory.
pub fn validate_identity(identity: &str) -> Result<(), ContentError> {
    let invalid = identity.is_empty()
        || identity == "."
        || identity == ".."
        || identity.contains(['/', '\\', '\0'])
        || identity.starts_with(TEMP_PREFIX);

    if invalid {
        Err(ContentError::InvalidIdentity(identity.to_string()))
    } else {
        Ok(())
    }
}

/// Filesystem-backed content store.
#[derive(Debug, Clone)]
pub struct FsContentStore {
    root: PathBuf,
}

impl FsContentStore {
    /// Store rooted at an explicit directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store for `crawl_target` under the mirror directory.
    pub fn for_target(mirror_dir: &Path, crawl_target: &str) -> Result<Self, ContentError> {
        validate_identity(crawl_target)?;
        Ok(Self::new(mirror_dir.join(crawl_target)))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of the blob for `identity`.
    pub fn path_for(&self, identity: &str) -> Result<PathBuf, ContentError> {
        validate_identity(identity)?;
        Ok(self.root.join(identity))
    }

    /// Size in bytes of a stored blob.
    pub async fn blob_size(&self, identity: &str) -> Result<Option<u64>, ContentError> {
        let path = self.path_for(identity)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(Some(meta.len())),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ContentError::io(identity, e)),
        }
    }
}

fn write_atomic(dir: &Path, target: &Path, data: &[u8]) -> io::Result<()> {
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .tempfile_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(target).map_err(|e| e.error)?;

    Ok(())
}

#[async_trait]
impl ContentStore for FsContentStore {
    async fn prepare(&self) -> Result<(), ContentError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| ContentError::io("", e))?;

        let meta = tokio::fs::metadata(&self.root)
            .await
            .map_err(|e| ContentError::io("", e))?;
        if meta.permissions().readonly() {
            return Err(ContentError::io(
                "",
                io::Error::new(
                    io::ErrorKind::PermissionDenied,
                    format!("{} is read-only", self.root.display()),
                ),
            ));
        }
        Ok(())
    }

    async fn write(&self, identity: &str, bytes: &[u8]) -> Result<(), ContentError> {
        let path = self.path_for(identity)?;
        let dir = self.root.clone();
        let data = bytes.to_vec();

        tokio::task::spawn_blocking(move || write_atomic(&dir, &path, &data))
            .await
            .unwrap_or_else(|e| Err(io::Error::other(e)))
            .map_err(|e| ContentError::io(identity, e))
    }

    async fn read(&self, identity: &str) -> Result<Option<Vec<u8>>, ContentError> {
        let path = self.path_for(identity)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ContentError::io(identity, e)),
        }
    }

    async fn delete(&self, identity: &str) -> Result<(), ContentError> {
        let path = self.path_for(identity)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ContentError::io(identity, e)),
        }
    }

    async fn exists(&self, identity: &str) -> Result<bool, ContentError> {
        Ok(self.blob_size(identity).await?.is_some())
    }

    async fn list(&self) -> Result<Vec<String>, ContentError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ContentError::io("", e)),
        };

        let mut identities = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ContentError::io("", e))?
        {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if name.starts_with(TEMP_PREFIX) {
                continue;
            }
            let is_file = entry
                .file_type()
                .await
                .map(|t| t.is_file())
                .unwrap_or(false);
            if is_file {
                identities.push(name);
            }
        }

        identities.sort();
        Ok(identities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_validate_identity() {
        assert!(validate_identity("a.pdf").is_ok());
        assert!(validate_identity("Annual Report.pdf").is_ok());
        assert!(validate_identity(".hidden").is_ok());

        for bad in ["", ".", "..", "a/b.pdf", "a\\b.pdf", "a\0b", ".partial-abc"] {
            assert!(
                matches!(validate_identity(bad), Err(ContentError::InvalidIdentity(_))),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[tokio::test]
    async fn test_write_read_overwrite() {
        let dir = tempdir().unwrap();
        let store = FsContentStore::for_target(dir.path(), "site").unwrap();
        store.prepare().await.unwrap();

        assert_eq!(store.read("a.pdf").await.unwrap(), None);
        assert!(!store.exists("a.pdf").await.unwrap());

        store.write("a.pdf", b"v1").await.unwrap();
        assert_eq!(store.read("a.pdf").await.unwrap(), Some(b"v1".to_vec()));
        assert!(dir.path().join("site").join("a.pdf").is_file());

        store.write("a.pdf", b"version two").await.unwrap();
        assert_eq!(
            store.read("a.pdf").await.unwrap(),
            Some(b"version two".to_vec())
        );
        assert_eq!(store.blob_size("a.pdf").await.unwrap(), Some(11));
    }

    #[tokio::test]
    async fn test_empty_payload_is_a_blob() {
        let dir = tempdir().unwrap();
        let store = FsContentStore::new(dir.path());

        store.write("empty.txt", b"").await.unwrap();
        assert!(store.exists("empty.txt").await.unwrap());
        assert_eq!(store.read("empty.txt").await.unwrap(), Some(Vec::new()));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = FsContentStore::new(dir.path());

        store.write("a.pdf", b"x").await.unwrap();
        store.delete("a.pdf").await.unwrap();
        assert!(!store.exists("a.pdf").await.unwrap());
        store.delete("a.pdf").await.unwrap();
    }

    #[tokio::test]
    async fn test_list_skips_temp_files_and_directories() {
        let dir = tempdir().unwrap();
        let store = FsContentStore::new(dir.path());

        store.write("b.png", b"b").await.unwrap();
        store.write("a.pdf", b"a").await.unwrap();
        std::fs::write(dir.path().join(".partial-xyz"), b"junk").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        assert_eq!(store.list().await.unwrap(), vec!["a.pdf", "b.png"]);
    }

    #[tokio::test]
    async fn test_list_missing_root_is_empty() {
        let dir = tempdir().unwrap();
        let store = FsContentStore::new(dir.path().join("never-created"));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_identity_never_touches_disk() {
        let dir = tempdir().unwrap();
        let store = FsContentStore::new(dir.path().join("site"));

        let err = store.write("../escape.pdf", b"x").await.unwrap_err();
        assert!(matches!(err, ContentError::InvalidIdentity(_)));
        assert!(!dir.path().join("escape.pdf").exists());
    }

    #[tokio::test]
    async fn test_prepare_fails_when_root_is_a_file() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("site");
        std::fs::write(&root, b"not a directory").unwrap();

        let store = FsContentStore::new(&root);
        assert!(store.prepare().await.is_err());
        assert!(matches!(
            store.write("a.pdf", b"x").await,
            Err(ContentError::Io { .. })
        ));
    }
}
