use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use ethbox_cid::cid::Version;
use ethbox_cid::multibase::Base;
use ethbox_cid::Codec;
use ethbox_cid::ContentIdentifier;
use ethbox_cid::DecodeError;
use ethbox_cid::HashFunction;
use metrics::counter;
use metrics::histogram;
use multihash_codetable::Code;
use multihash_codetable::MultihashDigest;
use reqwest::StatusCode;
use tracing::debug;
use tracing::warn;
use url::Url;

use crate::FetchError;
use crate::RemoteEndpoint;

/// The only hash function the remote node can resolve blocks by.
pub const REQUIRED_HASH: HashFunction = HashFunction::Keccak256;

/// Source of blocks that do not live on local disk.
#[async_trait]
pub trait RemoteBlocks: Send + Sync {
    /// Returns the raw bytes of the block addressed by `id`.
    async fn fetch(
        &self,
        id: &ContentIdentifier,
    ) -> Result<Bytes, FetchError>;
}

/// Computes the identifier actually sent to the remote node.
///
/// Rejects any hash function but [`REQUIRED_HASH`]. Storage trie nodes are
/// requested under the state trie content type, as the node only indexes
/// trie nodes under the latter (paritytech/parity#4172).
pub fn request_identifier(id: &ContentIdentifier) -> Result<ContentIdentifier, FetchError> {
    if id.hash_function() != REQUIRED_HASH {
        return Err(FetchError::UnsupportedHash {
            hash_function: id.hash_function(),
        });
    }

    if id.content_type() == Codec::EthStorageTrie {
        return Ok(id.with_content_type(Codec::EthStateTrie)?);
    }

    Ok(id.clone())
}

/// Text form of `id` sent as the `arg` query parameter.
///
/// Always base58btc: the node parses v1 identifiers in that base, and it is
/// the only form a v0 identifier has.
pub fn request_arg(id: &ContentIdentifier) -> Result<String, FetchError> {
    match id.version() {
        Version::V0 => Ok(id.to_string()),
        Version::V1 => Ok(id
            .as_cid()
            .to_string_of_base(Base::Base58Btc)
            .map_err(DecodeError::from)?),
    }
}

/// Fetches blocks over HTTP from `/api/v0/block/get`.
///
/// Issues exactly one request per call; no retries and no caching.
#[derive(Debug, Clone)]
pub struct BlockFetcher {
    client: reqwest::Client,
    block_get_url: Url,
    verify_digest: bool,
}

impl BlockFetcher {
    pub fn new(endpoint: &RemoteEndpoint) -> Result<Self, FetchError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = endpoint.timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(FetchError::Client)?;

        Ok(Self {
            client,
            block_get_url: endpoint.block_get_url()?,
            verify_digest: endpoint.verify_digest,
        })
    }

    pub fn block_get_url(&self) -> &Url {
        &self.block_get_url
    }

    fn request_url(
        &self,
        id: &ContentIdentifier,
    ) -> Result<Url, FetchError> {
        let mut url = self.block_get_url.clone();
        url.query_pairs_mut().append_pair("arg", &request_arg(id)?);
        Ok(url)
    }

    async fn fetch_block(
        &self,
        id: &ContentIdentifier,
    ) -> Result<Bytes, FetchError> {
        let request_id = request_identifier(id)?;
        let url = self.request_url(&request_id)?;
        debug!("Fetching remote block. cid: {} url: {}", id, url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(FetchError::RemoteTransport)?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(FetchError::RemoteTransport)?;

        if status != StatusCode::OK {
            return Err(FetchError::RemoteFetch {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        if self.verify_digest {
            verify_digest(&request_id, &body)?;
        }

        debug!("Fetched remote block. cid: {} size: {}", id, body.len());
        Ok(body)
    }
}

fn verify_digest(
    id: &ContentIdentifier,
    body: &[u8],
) -> Result<(), FetchError> {
    let computed = Code::Keccak256.digest(body);
    if computed.digest() != id.digest() {
        warn!("Remote block digest mismatch. cid: {}", id);
        return Err(FetchError::DigestMismatch {
            requested: id.to_string(),
        });
    }
    Ok(())
}

#[async_trait]
impl RemoteBlocks for BlockFetcher {
    async fn fetch(
        &self,
        id: &ContentIdentifier,
    ) -> Result<Bytes, FetchError> {
        let start_time = Instant::now();
        let result = self.fetch_block(id).await;

        let outcome = match &result {
            Ok(_) => "ok",
            Err(err) => err.kind(),
        };
        counter!("ethbox_remote_fetch_total", "outcome" => outcome).increment(1);
        histogram!("ethbox_remote_fetch_duration_seconds")
            .record(start_time.elapsed().as_secs_f64());

        result
    }
}
