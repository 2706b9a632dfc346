//! A filesystem [`BlobStore`] for snapshot text.

use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use gongbu_core::{Error, Result, blob::BlobStore};
use tokio::io::AsyncWriteExt as _;

/// Stores each blob as a file under `root`, at the path named by its key.
///
/// Blobs are write-once: putting an existing key fails. The mime type is
/// not kept on disk; the snapshot registry row records it.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
  root: PathBuf,
}

impl FsBlobStore {
  pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

  /// Map `key` to a path under the root. Keys are relative `/`-separated
  /// paths without `.` or `..` segments.
  fn path_for(&self, key: &str) -> Result<PathBuf> {
    let relative = Path::new(key);
    let clean = !key.is_empty()
      && relative.components().all(|c| matches!(c, Component::Normal(_)));
    if !clean {
      return Err(Error::InvalidInput(format!("blob key {key:?}")));
    }
    Ok(self.root.join(relative))
  }
}

fn unavailable(e: std::io::Error) -> Error { Error::StoreUnavailable(e.to_string()) }

impl BlobStore for FsBlobStore {
  async fn put(&self, key: String, body: Bytes, _mime: String) -> Result<()> {
    let path = self.path_for(&key)?;
    if let Some(parent) = path.parent() {
      tokio::fs::create_dir_all(parent).await.map_err(unavailable)?;
    }

    let mut file = tokio::fs::OpenOptions::new()
      .write(true)
      .create_new(true)
      .open(&path)
      .await
      .map_err(unavailable)?;
    file.write_all(&body).await.map_err(unavailable)?;
    file.sync_all().await.map_err(unavailable)?;

    tracing::debug!(key = %key, bytes = body.len(), "blob written");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn put_writes_under_the_root() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsBlobStore::new(dir.path());

    store
      .put("snapshots/u1/a.txt".into(), Bytes::from("안녕하세요"), "text/plain".into())
      .await
      .unwrap();

    let body = tokio::fs::read(dir.path().join("snapshots/u1/a.txt")).await.unwrap();
    assert_eq!(body, "안녕하세요".as_bytes());
  }

  #[tokio::test]
  async fn blobs_are_write_once() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsBlobStore::new(dir.path());

    store.put("a.txt".into(), Bytes::from("one"), "text/plain".into()).await.unwrap();
    let err = store
      .put("a.txt".into(), Bytes::from("two"), "text/plain".into())
      .await
      .unwrap_err();

    assert_eq!(err.code(), "STORE_UNAVAILABLE");
    assert_eq!(tokio::fs::read(dir.path().join("a.txt")).await.unwrap(), b"one");
  }

  #[tokio::test]
  async fn escaping_keys_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsBlobStore::new(dir.path().join("blobs"));

    for key in ["../outside.txt", "/etc/passwd", "./a.txt", ""] {
      let err = store
        .put(key.into(), Bytes::from("x"), "text/plain".into())
        .await
        .unwrap_err();
      assert_eq!(err.code(), "INVALID_INPUT", "{key}");
    }
  }
}
