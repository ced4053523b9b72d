//! Block datastores: the local object store and the intercepting decorator
//! that redirects Ethereum content to a remote node.
use std::fmt::Display;
use std::fmt::Formatter;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use ethbox_fetch::FetchError;
use object_store::path::Path;
use thiserror::Error;

pub mod intercept;
pub mod local;

pub use intercept::InterceptingStore;
pub use local::LocalStore;

/// A hierarchical datastore key, e.g. `/CI/CIQ...`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(String);

impl Key {
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        if key.starts_with('/') {
            Self(key)
        } else {
            Self(format!("/{key}"))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Location of the key inside an object store.
    pub fn to_path(&self) -> Result<Path, StoreError> {
        Path::parse(self.0.trim_start_matches('/')).map_err(|source| {
            StoreError::InvalidKey {
                key: self.0.clone(),
                source,
            }
        })
    }

    pub fn from_path(path: &Path) -> Self {
        Self::new(path.as_ref())
    }
}

impl Display for Key {
    fn fmt(
        &self,
        f: &mut Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Key {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for Key {
    fn from(key: String) -> Self {
        Self::new(key)
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("key not found: {0}")]
    NotFound(Key),

    #[error("invalid key `{key}`: {source}")]
    InvalidKey {
        key: String,
        #[source]
        source: object_store::path::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("backend error: {0}")]
    Backend(#[from] object_store::Error),

    #[error(transparent)]
    Remote(#[from] FetchError),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// A single write of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Put(Key, Bytes),
    Delete(Key),
}

/// Byte oriented key-value store keyed by hierarchical keys.
#[async_trait]
pub trait Datastore: Send + Sync {
    async fn put(
        &self,
        key: &Key,
        value: Bytes,
    ) -> Result<(), StoreError>;

    /// Fails with [`StoreError::NotFound`] when the key is absent.
    async fn get(
        &self,
        key: &Key,
    ) -> Result<Bytes, StoreError>;

    async fn has(
        &self,
        key: &Key,
    ) -> Result<bool, StoreError>;

    /// Deleting an absent key is not an error.
    async fn delete(
        &self,
        key: &Key,
    ) -> Result<(), StoreError>;

    /// Enumerates every key below `prefix`.
    async fn query(
        &self,
        prefix: &Key,
    ) -> Result<Vec<Key>, StoreError>;

    /// Applies `ops` in order, stopping at the first failure.
    async fn batch(
        &self,
        ops: Vec<BatchOp>,
    ) -> Result<(), StoreError> {
        for op in ops {
            match op {
                BatchOp::Put(key, value) => self.put(&key, value).await?,
                BatchOp::Delete(key) => self.delete(&key).await?,
            }
        }
        Ok(())
    }
}

#[async_trait]
impl<T: Datastore + ?Sized> Datastore for Arc<T> {
    async fn put(
        &self,
        key: &Key,
        value: Bytes,
    ) -> Result<(), StoreError> {
        (**self).put(key, value).await
    }

    async fn get(
        &self,
        key: &Key,
    ) -> Result<Bytes, StoreError> {
        (**self).get(key).await
    }

    async fn has(
        &self,
        key: &Key,
    ) -> Result<bool, StoreError> {
        (**self).has(key).await
    }

    async fn delete(
        &self,
        key: &Key,
    ) -> Result<(), StoreError> {
        (**self).delete(key).await
    }

    async fn query(
        &self,
        prefix: &Key,
    ) -> Result<Vec<Key>, StoreError> {
        (**self).query(prefix).await
    }

    async fn batch(
        &self,
        ops: Vec<BatchOp>,
    ) -> Result<(), StoreError> {
        (**self).batch(ops).await
    }
}
