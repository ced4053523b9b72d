//! Resolves content identifiers against an Ethereum node's block API.
use ethbox_cid::DecodeError;
use ethbox_cid::HashFunction;
use thiserror::Error;

pub mod endpoint;
pub mod fetcher;

pub use endpoint::RemoteEndpoint;
pub use fetcher::request_arg;
pub use fetcher::request_identifier;
pub use fetcher::BlockFetcher;
pub use fetcher::RemoteBlocks;
pub use fetcher::REQUIRED_HASH;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("remote fetch failed - unsupported hash type {hash_function}")]
    UnsupportedHash { hash_function: HashFunction },

    #[error("remote fetch failed - {status} - {body}")]
    RemoteFetch { status: u16, body: String },

    #[error("remote fetch failed - transport error: {0}")]
    RemoteTransport(#[source] reqwest::Error),

    #[error("remote fetch failed - body does not hash to {requested}")]
    DigestMismatch { requested: String },

    #[error("invalid request identifier: {0}")]
    InvalidIdentifier(#[from] DecodeError),

    #[error("invalid remote endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    #[error("building http client: {0}")]
    Client(#[source] reqwest::Error),
}

impl FetchError {
    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::UnsupportedHash { .. } => "unsupported_hash",
            FetchError::RemoteFetch { .. } => "remote_status",
            FetchError::RemoteTransport(_) => "transport",
            FetchError::DigestMismatch { .. } => "digest_mismatch",
            FetchError::InvalidIdentifier(_) => "invalid_identifier",
            FetchError::InvalidEndpoint(_) => "invalid_endpoint",
            FetchError::Client(_) => "client",
        }
    }
}
