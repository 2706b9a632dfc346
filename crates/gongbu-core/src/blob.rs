//! The `BlobStore` trait for snapshot text, plus an in-memory backend.

use std::{
  collections::HashMap,
  future::Future,
  sync::{Arc, Mutex},
};

use bytes::Bytes;

use crate::{Error, Result};

/// Write-once object storage addressed by key.
pub trait BlobStore: Send + Sync {
  /// Store `body` under `key`. Implementations fail with
  /// [`Error::StoreUnavailable`] when the backend cannot be reached.
  fn put(
    &self,
    key: String,
    body: Bytes,
    mime: String,
  ) -> impl Future<Output = Result<()>> + Send + '_;
}

/// A process-local blob store, for development and tests.
///
/// Clones share the same map.
#[derive(Clone, Default)]
pub struct MemoryBlobStore {
  objects: Arc<Mutex<HashMap<String, (String, Bytes)>>>,
}

impl MemoryBlobStore {
  pub fn new() -> Self { Self::default() }

  /// Return the body and mime type stored under `key`.
  pub fn get(&self, key: &str) -> Option<(String, Bytes)> {
    self.objects.lock().ok()?.get(key).cloned()
  }

  pub fn len(&self) -> usize { self.objects.lock().map(|m| m.len()).unwrap_or(0) }

  pub fn is_empty(&self) -> bool { self.len() == 0 }
}

impl BlobStore for MemoryBlobStore {
  async fn put(&self, key: String, body: Bytes, mime: String) -> Result<()> {
    let mut objects = self
      .objects
      .lock()
      .map_err(|_| Error::StoreUnavailable("blob map poisoned".into()))?;
    objects.insert(key, (mime, body));
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn put_then_get() {
    let store = MemoryBlobStore::new();
    store
      .put("snapshots/a.txt".into(), Bytes::from_static("안녕".as_bytes()), "text/plain".into())
      .await
      .unwrap();

    let (mime, body) = store.get("snapshots/a.txt").unwrap();
    assert_eq!(mime, "text/plain");
    assert_eq!(&body[..], "안녕".as_bytes());
    assert_eq!(store.len(), 1);
  }
}
