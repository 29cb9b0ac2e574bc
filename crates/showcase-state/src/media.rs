//! Filesystem-backed media store.

use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::StorageError;
use crate::storage_traits::{MediaStore, StorageResult};

/// Stores uploaded media under a root directory and hands out `file://` URLs.
///
/// Layout: `<root>/<upload path>`, e.g. `<root>/performances/c-1/1700000000000_take.mp3`
#[derive(Debug, Clone)]
pub struct FsMediaStore {
    root: PathBuf,
}

impl FsMediaStore {
    /// Create a new `FsMediaStore` rooted at `root`. Creates `root` if needed.
    pub fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        fs::create_dir_all(root.as_ref())?;
        let root = root.as_ref().canonicalize()?;
        Ok(Self { root })
    }

    /// Root from `SHOWCASE_MEDIA_DIR`, defaulting to `.showcase/media`.
    pub fn from_env() -> StorageResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`FsMediaStore::from_env`] with a caller-supplied variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> StorageResult<Self> {
        let root = lookup("SHOWCASE_MEDIA_DIR")
            .filter(|dir| !dir.is_empty())
            .unwrap_or_else(|| ".showcase/media".to_string());
        Self::new(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative upload path, refusing anything that escapes the root.
    fn resolve(&self, path: &str) -> StorageResult<PathBuf> {
        let rel = Path::new(path);
        let plain = rel
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if path.is_empty() || !plain {
            return Err(StorageError::InvalidMediaPath {
                path: path.to_string(),
            });
        }
        Ok(self.root.join(rel))
    }
}

#[async_trait]
impl MediaStore for FsMediaStore {
    async fn upload(&self, path: &str, data: &[u8]) -> StorageResult<String> {
        let target = self.resolve(path)?;
        let data = data.to_vec();
        let written = target.clone();

        tokio::task::spawn_blocking(move || -> StorageResult<()> {
            let dir = target.parent().ok_or_else(|| StorageError::InvalidMediaPath {
                path: target.display().to_string(),
            })?;
            fs::create_dir_all(dir)?;

            // Atomic write: temp file in the same directory, then rename.
            let mut tmp = NamedTempFile::new_in(dir)?;
            tmp.write_all(&data)?;
            tmp.persist(&target).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| StorageError::Backend(format!("media upload task failed: {e}")))??;

        debug!(path = %written.display(), "media stored");
        Ok(format!("file://{}", written.display()))
    }

    async fn fetch(&self, path: &str) -> StorageResult<Vec<u8>> {
        let target = self.resolve(path)?;
        let owned = path.to_string();
        tokio::task::spawn_blocking(move || {
            fs::read(&target).map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    StorageError::MediaNotFound { path: owned }
                } else {
                    StorageError::Io(e)
                }
            })
        })
        .await
        .map_err(|e| StorageError::Backend(format!("media fetch task failed: {e}")))?
    }

    async fn remove(&self, path: &str) -> StorageResult<()> {
        let target = self.resolve(path)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => {
                debug!(path = %target.display(), "media removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::MediaNotFound {
                path: path.to_string(),
            }),
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_store() -> (tempfile::TempDir, FsMediaStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FsMediaStore::new(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn media_dir_comes_from_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let wanted = dir.path().join("media");
        let store = FsMediaStore::from_lookup(|key| {
            (key == "SHOWCASE_MEDIA_DIR").then(|| wanted.display().to_string())
        })
        .unwrap();
        assert_eq!(store.root(), wanted.canonicalize().unwrap());
    }

    #[tokio::test]
    async fn upload_then_fetch() {
        let (_dir, store) = make_store();
        let url = store
            .upload("performances/c-1/1_take.mp3", b"la la la")
            .await
            .unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.ends_with("performances/c-1/1_take.mp3"));

        let got = store.fetch("performances/c-1/1_take.mp3").await.unwrap();
        assert_eq!(got, b"la la la");
    }

    #[tokio::test]
    async fn upload_overwrites_same_path() {
        let (_dir, store) = make_store();
        store.upload("a/b.wav", b"first").await.unwrap();
        store.upload("a/b.wav", b"second").await.unwrap();
        assert_eq!(store.fetch("a/b.wav").await.unwrap(), b"second");
    }

    #[tokio::test]
    async fn fetch_missing_is_not_found() {
        let (_dir, store) = make_store();
        match store.fetch("nope/missing.mp4").await {
            Err(StorageError::MediaNotFound { path }) => assert_eq!(path, "nope/missing.mp4"),
            other => panic!("expected MediaNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rejects_paths_escaping_root() {
        let (_dir, store) = make_store();
        for bad in ["../outside.mp3", "/etc/passwd", "", "a/../../b"] {
            let err = store.upload(bad, b"x").await.unwrap_err();
            assert!(
                matches!(err, StorageError::InvalidMediaPath { .. }),
                "path {bad:?} gave {err:?}"
            );
        }
    }

    #[tokio::test]
    async fn remove_deletes_blob_once() {
        let (_dir, store) = make_store();
        store.upload("performances/c-1/1_take.mp3", b"x").await.unwrap();
        store.remove("performances/c-1/1_take.mp3").await.unwrap();

        assert!(matches!(
            store.fetch("performances/c-1/1_take.mp3").await,
            Err(StorageError::MediaNotFound { .. })
        ));
        assert!(matches!(
            store.remove("performances/c-1/1_take.mp3").await,
            Err(StorageError::MediaNotFound { .. })
        ));
        assert!(matches!(
            store.remove("../escape.mp3").await,
            Err(StorageError::InvalidMediaPath { .. })
        ));
    }

    #[tokio::test]
    async fn empty_blob_is_stored() {
        let (_dir, store) = make_store();
        store.upload("empty.bin", b"").await.unwrap();
        assert!(store.fetch("empty.bin").await.unwrap().is_empty());
    }
}
