use async_trait::async_trait;
use bytes::Bytes;
use ethbox_cid::classify;
use ethbox_cid::KeyClass;
use ethbox_fetch::RemoteBlocks;
use metrics::counter;
use tracing::debug;

use crate::BatchOp;
use crate::Datastore;
use crate::Key;
use crate::StoreError;

/// Datastore decorator serving raw and Ethereum blocks from a remote node.
///
/// Only `get` and `has` are intercepted. A remote-origin key never falls back
/// to the local store; every other key and every write goes to `local`
/// unchanged.
#[derive(Debug, Clone)]
pub struct InterceptingStore<L, R> {
    local: L,
    remote: R,
}

impl<L, R> InterceptingStore<L, R>
where
    L: Datastore,
    R: RemoteBlocks,
{
    pub fn new(
        local: L,
        remote: R,
    ) -> Self {
        Self { local, remote }
    }

    pub fn local(&self) -> &L {
        &self.local
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }
}

#[async_trait]
impl<L, R> Datastore for InterceptingStore<L, R>
where
    L: Datastore,
    R: RemoteBlocks,
{
    async fn put(
        &self,
        key: &Key,
        value: Bytes,
    ) -> Result<(), StoreError> {
        self.local.put(key, value).await
    }

    async fn get(
        &self,
        key: &Key,
    ) -> Result<Bytes, StoreError> {
        match classify(key.as_str()) {
            KeyClass::Local => self.local.get(key).await,
            KeyClass::Remote(id) => {
                counter!("ethbox_store_intercepted_total", "op" => "get").increment(1);
                debug!("Intercepted get. key: {} cid: {}", key, id);
                Ok(self.remote.fetch(&id).await?)
            },
        }
    }

    async fn has(
        &self,
        key: &Key,
    ) -> Result<bool, StoreError> {
        match classify(key.as_str()) {
            KeyClass::Local => self.local.has(key).await,
            KeyClass::Remote(id) => {
                counter!("ethbox_store_intercepted_total", "op" => "has").increment(1);
                match self.remote.fetch(&id).await {
                    Ok(_) => Ok(true),
                    Err(err) => {
                        debug!("Remote block unavailable. cid: {} err: {}", id, err);
                        Ok(false)
                    },
                }
            },
        }
    }

    async fn delete(
        &self,
        key: &Key,
    ) -> Result<(), StoreError> {
        self.local.delete(key).await
    }

    async fn query(
        &self,
        prefix: &Key,
    ) -> Result<Vec<Key>, StoreError> {
        self.local.query(prefix).await
    }

    async fn batch(
        &self,
        ops: Vec<BatchOp>,
    ) -> Result<(), StoreError> {
        self.local.batch(ops).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use ethbox_cid::cid::Cid;
    use ethbox_cid::key::block_key;
    use ethbox_cid::Codec;
    use ethbox_cid::ContentIdentifier;
    use ethbox_fetch::FetchError;
    use multihash_codetable::Code;
    use multihash_codetable::MultihashDigest;

    use super::*;
    use crate::LocalStore;

    /// Records requested identifiers and answers from a fixed script.
    struct ScriptedRemote {
        requests: Mutex<Vec<ContentIdentifier>>,
        respond: fn(&ContentIdentifier) -> Result<Bytes, FetchError>,
    }

    impl ScriptedRemote {
        fn new(respond: fn(&ContentIdentifier) -> Result<Bytes, FetchError>) -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
                respond,
            }
        }

        fn requests(&self) -> Vec<ContentIdentifier> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RemoteBlocks for ScriptedRemote {
        async fn fetch(
            &self,
            id: &ContentIdentifier,
        ) -> Result<Bytes, FetchError> {
            self.requests.lock().unwrap().push(id.clone());
            (self.respond)(id)
        }
    }

    fn found(_: &ContentIdentifier) -> Result<Bytes, FetchError> {
        Ok(Bytes::from_static(b"remote"))
    }

    fn missing(_: &ContentIdentifier) -> Result<Bytes, FetchError> {
        Err(FetchError::RemoteFetch {
            status: 500,
            body: "blockstore: block not found".to_string(),
        })
    }

    fn id(content_type: Codec) -> ContentIdentifier {
        ContentIdentifier::try_from(Cid::new_v1(
            content_type.code(),
            Code::Keccak256.digest(b"X"),
        ))
        .unwrap()
    }

    #[tokio::test]
    async fn local_keys_are_delegated() {
        let store = InterceptingStore::new(LocalStore::in_memory(), ScriptedRemote::new(found));
        let key = Key::new(block_key(&id(Codec::DagCbor)));

        assert!(!store.has(&key).await.unwrap());
        assert!(store.get(&key).await.unwrap_err().is_not_found());

        store.put(&key, Bytes::from_static(b"local")).await.unwrap();
        assert!(store.has(&key).await.unwrap());
        assert_eq!(store.get(&key).await.unwrap().as_ref(), b"local");

        for reserved in ["/SHARDING", "/_README", "/plain"] {
            assert!(!store.has(&Key::new(reserved)).await.unwrap());
        }
        assert!(store.remote().requests().is_empty());
    }

    #[tokio::test]
    async fn remote_keys_never_touch_local() {
        let store = InterceptingStore::new(LocalStore::in_memory(), ScriptedRemote::new(missing));
        let key = Key::new(block_key(&id(Codec::Raw)));

        // Even with a local copy, the remote answer wins.
        store.local().put(&key, Bytes::from_static(b"stale")).await.unwrap();

        assert!(matches!(
            store.get(&key).await,
            Err(StoreError::Remote(FetchError::RemoteFetch { status: 500, .. }))
        ));
        assert!(!store.has(&key).await.unwrap());
        assert_eq!(store.remote().requests().len(), 2);
    }

    #[tokio::test]
    async fn remote_hits() {
        let store = InterceptingStore::new(LocalStore::in_memory(), ScriptedRemote::new(found));
        let eth = id(Codec::EthTxReceipt);
        let key = Key::new(block_key(&eth));

        assert_eq!(store.get(&key).await.unwrap().as_ref(), b"remote");
        assert!(store.has(&key).await.unwrap());
        assert_eq!(store.remote().requests(), vec![eth.clone(), eth]);
    }

    #[tokio::test]
    async fn writes_are_not_intercepted() {
        let store = InterceptingStore::new(LocalStore::in_memory(), ScriptedRemote::new(found));
        let key = Key::new(block_key(&id(Codec::EthBlock)));

        store
            .batch(vec![BatchOp::Put(key.clone(), Bytes::from_static(b"kept"))])
            .await
            .unwrap();
        assert_eq!(store.query(&Key::new("/")).await.unwrap(), vec![key.clone()]);
        assert_eq!(store.local().get(&key).await.unwrap().as_ref(), b"kept");

        store.delete(&key).await.unwrap();
        assert!(store.query(&Key::new("/")).await.unwrap().is_empty());
        assert!(store.remote().requests().is_empty());
    }
}
