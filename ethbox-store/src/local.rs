use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::TryStreamExt;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::ObjectStore;
use object_store::PutPayload;
use tracing::debug;

use crate::Datastore;
use crate::Key;
use crate::StoreError;

/// Datastore over an [`ObjectStore`], usually a directory on local disk.
#[derive(Debug, Clone)]
pub struct LocalStore {
    inner: Arc<dyn ObjectStore>,
}

impl LocalStore {
    /// Opens (creating it if needed) a filesystem backed store rooted at `dir`.
    pub fn open(dir: impl AsRef<std::path::Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        debug!("Opening local block store at {:?}", dir);
        let inner = LocalFileSystem::new_with_prefix(dir)?;
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(InMemory::new()),
        }
    }
}

#[async_trait]
impl Datastore for LocalStore {
    async fn put(
        &self,
        key: &Key,
        value: Bytes,
    ) -> Result<(), StoreError> {
        let path = key.to_path()?;
        self.inner.put(&path, PutPayload::from(value)).await?;
        Ok(())
    }

    async fn get(
        &self,
        key: &Key,
    ) -> Result<Bytes, StoreError> {
        let path = key.to_path()?;
        match self.inner.get(&path).await {
            Ok(result) => Ok(result.bytes().await?),
            Err(object_store::Error::NotFound { .. }) => Err(StoreError::NotFound(key.clone())),
            Err(err) => Err(err.into()),
        }
    }

    async fn has(
        &self,
        key: &Key,
    ) -> Result<bool, StoreError> {
        let path = key.to_path()?;
        match self.inner.head(&path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn delete(
        &self,
        key: &Key,
    ) -> Result<(), StoreError> {
        let path = key.to_path()?;
        match self.inner.delete(&path).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn query(
        &self,
        prefix: &Key,
    ) -> Result<Vec<Key>, StoreError> {
        let prefix = prefix.to_path()?;
        let prefix = (!prefix.as_ref().is_empty()).then_some(prefix);

        let mut keys: Vec<Key> = self
            .inner
            .list(prefix.as_ref())
            .map_ok(|meta| Key::from_path(&meta.location))
            .try_collect()
            .await?;
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BatchOp;

    async fn exercise(store: LocalStore) {
        let key = Key::new("/AB/CIQXAB");

        assert!(!store.has(&key).await.unwrap());
        assert!(store.get(&key).await.unwrap_err().is_not_found());

        store.put(&key, Bytes::from_static(b"block")).await.unwrap();
        assert!(store.has(&key).await.unwrap());
        assert_eq!(store.get(&key).await.unwrap().as_ref(), b"block");

        store
            .batch(vec![
                BatchOp::Put(Key::new("/CD/CIQXCD"), Bytes::from_static(b"other")),
                BatchOp::Put(Key::new("/SHARDING"), Bytes::from_static(b"marker")),
            ])
            .await
            .unwrap();
        assert_eq!(
            store.query(&Key::new("/")).await.unwrap(),
            vec![
                Key::new("/AB/CIQXAB"),
                Key::new("/CD/CIQXCD"),
                Key::new("/SHARDING"),
            ]
        );
        assert_eq!(
            store.query(&Key::new("/CD")).await.unwrap(),
            vec![Key::new("/CD/CIQXCD")]
        );

        store.delete(&key).await.unwrap();
        store.delete(&key).await.unwrap();
        assert!(!store.has(&key).await.unwrap());
    }

    #[tokio::test]
    async fn in_memory_store() {
        exercise(LocalStore::in_memory()).await;
    }

    #[tokio::test]
    async fn filesystem_store() {
        let dir = tempfile::tempdir().unwrap();
        exercise(LocalStore::open(dir.path().join("blocks")).unwrap()).await;

        assert!(dir.path().join("blocks").join("SHARDING").exists());
    }
}
