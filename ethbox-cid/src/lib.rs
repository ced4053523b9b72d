//! Content identifiers as they appear in block store keys.
//!
//! Keys of the block datastore carry a base32 encoded content identifier. This
//! crate decodes those keys and decides which of them address content that
//! lives on a remote Ethereum node rather than on local disk.
use thiserror::Error;

pub mod codec;
pub mod identifier;
pub mod key;

pub use cid;
pub use multibase;
pub use codec::Codec;
pub use codec::HashFunction;
pub use identifier::ContentIdentifier;
pub use key::classify;
pub use key::KeyClass;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("segment is not valid base32: {0}")]
    Base32(#[from] multibase::Error),

    #[error("malformed content identifier: {0}")]
    Cid(#[from] cid::Error),

    #[error("malformed multihash: {0}")]
    Multihash(#[from] cid::multihash::Error),

    #[error("{0} trailing bytes after content identifier")]
    TrailingBytes(usize),

    #[error("unknown content type code {0:#x}")]
    UnknownContentType(u64),

    #[error("unknown content type `{0}`")]
    UnknownContentTypeName(String),

    #[error("unregistered hash function code {0:#x}")]
    UnknownHashFunction(u64),

    #[error("unregistered hash function `{0}`")]
    UnknownHashFunctionName(String),
}
