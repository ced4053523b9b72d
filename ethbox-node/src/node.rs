use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use anyhow::ensure;
use anyhow::Context;
use bytes::Bytes;
use ethbox_cid::cid::Cid;
use ethbox_cid::key::block_key;
use ethbox_cid::key::decode_segment;
use ethbox_cid::key::identifier_segment;
use ethbox_cid::Codec;
use ethbox_cid::ContentIdentifier;
use ethbox_cid::DecodeError;
use ethbox_cid::HashFunction;
use ethbox_store::Key;
use ethbox_store::StoreError;
use multihash_codetable::Code;
use multihash_codetable::MultihashDigest;
use serde_derive::Serialize;
use thiserror::Error;
use tracing::info;
use tracing::warn;

use crate::repo::Repository;

/// Size information about a block, as reported by `block/stat`.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct BlockStat {
    pub(crate) key: String,
    pub(crate) size: usize,
}

/// Failure of [`Node::block_put`].
#[derive(Error, Debug)]
pub(crate) enum PutError {
    #[error("hash function {0} cannot be computed")]
    UnsupportedHash(HashFunction),

    #[error("building block identifier: {0}")]
    Identifier(#[from] DecodeError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Storage node serving blocks out of a repository.
#[derive(Debug)]
pub(crate) struct Node {
    repo: Repository,
    online: AtomicBool,
}

impl Node {
    pub(crate) fn new(repo: Repository) -> Self {
        Self {
            repo,
            online: AtomicBool::new(false),
        }
    }

    pub(crate) fn repo(&self) -> &Repository {
        &self.repo
    }

    pub(crate) fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    pub(crate) async fn start(&self) -> anyhow::Result<()> {
        ensure!(!self.is_online(), "node already started");
        let blocks = self
            .repo
            .blocks()
            .query(&Key::new("/"))
            .await
            .context("listing local blocks")?;
        info!(
            "Node started. repo: {:?} local_keys: {}",
            self.repo.root(),
            blocks.len()
        );
        self.online.store(true, Ordering::Release);
        Ok(())
    }

    pub(crate) async fn stop(&self) -> anyhow::Result<()> {
        if !self.online.swap(false, Ordering::AcqRel) {
            warn!("Node stopped twice");
            return Ok(());
        }
        self.repo.clear_api_addr()?;
        info!("Node stopped");
        Ok(())
    }

    pub(crate) async fn block_get(
        &self,
        id: &ContentIdentifier,
    ) -> Result<Bytes, StoreError> {
        self.repo.blocks().get(&Key::new(block_key(id))).await
    }

    pub(crate) async fn block_stat(
        &self,
        id: &ContentIdentifier,
    ) -> Result<BlockStat, StoreError> {
        let data = self.block_get(id).await?;
        Ok(BlockStat {
            key: id.to_string(),
            size: data.len(),
        })
    }

    /// Hashes `data` and stores it locally under its identifier.
    pub(crate) async fn block_put(
        &self,
        data: Bytes,
        content_type: Codec,
        hash_function: HashFunction,
    ) -> Result<ContentIdentifier, PutError> {
        let code = hasher(hash_function).ok_or(PutError::UnsupportedHash(hash_function))?;
        let id = ContentIdentifier::try_from(Cid::new_v1(content_type.code(), code.digest(&data)))?;

        self.repo
            .blocks()
            .put(&Key::new(block_key(&id)), data)
            .await?;
        Ok(id)
    }

    /// Removes a block from local disk. Blocks only served by the remote
    /// node are not found.
    pub(crate) async fn block_rm(
        &self,
        id: &ContentIdentifier,
    ) -> Result<(), StoreError> {
        let key = Key::new(block_key(id));
        if !self.is_stored_locally(&key).await? {
            return Err(StoreError::NotFound(key));
        }
        self.repo.blocks().delete(&key).await
    }

    /// Looks `key` up in its shard listing. Listings are never intercepted,
    /// so only local blocks show up.
    async fn is_stored_locally(
        &self,
        key: &Key,
    ) -> Result<bool, StoreError> {
        let shard = key
            .as_str()
            .rsplit_once('/')
            .map_or("/", |(shard, _)| shard);
        let keys = self.repo.blocks().query(&Key::new(shard)).await?;
        Ok(keys.contains(key))
    }

    /// Identifiers of every block stored on local disk.
    pub(crate) async fn refs_local(&self) -> Result<Vec<ContentIdentifier>, StoreError> {
        let keys = self.repo.blocks().query(&Key::new("/")).await?;
        Ok(keys
            .iter()
            .filter_map(|key| identifier_segment(key.as_str()))
            .filter_map(|segment| decode_segment(segment).ok())
            .collect())
    }
}

fn hasher(hash_function: HashFunction) -> Option<Code> {
    match hash_function {
        HashFunction::Sha2_256 => Some(Code::Sha2_256),
        HashFunction::Sha2_512 => Some(Code::Sha2_512),
        HashFunction::Sha3_224 => Some(Code::Sha3_224),
        HashFunction::Sha3_256 => Some(Code::Sha3_256),
        HashFunction::Sha3_384 => Some(Code::Sha3_384),
        HashFunction::Sha3_512 => Some(Code::Sha3_512),
        HashFunction::Keccak224 => Some(Code::Keccak224),
        HashFunction::Keccak256 => Some(Code::Keccak256),
        HashFunction::Keccak384 => Some(Code::Keccak384),
        HashFunction::Keccak512 => Some(Code::Keccak512),
        _ => None,
    }
}
