//! Storage key layout and the local/remote classification of keys.
use multibase::Base;
use tracing::trace;

use crate::ContentIdentifier;
use crate::DecodeError;

/// Keys written by the sharding layer itself; they never address a block.
pub const RESERVED_KEYS: [&str; 2] = ["/SHARDING", "/_README"];

/// Marker stored under `/SHARDING` describing how block keys are sharded.
pub const SHARDING_SPEC: &str = "/repo/flatfs/shard/v1/next-to-last/2";

/// Path position (after splitting on `/`) of the encoded identifier.
const IDENTIFIER_POSITION: usize = 2;

const SHARD_SUFFIX_LEN: usize = 2;

/// Outcome of classifying a storage key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyClass {
    /// Served by the wrapped local store.
    Local,
    /// Must be fetched from the remote block endpoint.
    Remote(ContentIdentifier),
}

/// Decodes a base32 key segment into a content identifier.
pub fn decode_segment(segment: &str) -> Result<ContentIdentifier, DecodeError> {
    let bytes = Base::Base32Upper.decode(segment)?;
    ContentIdentifier::from_bytes(&bytes)
}

/// Encodes an identifier the way the block store names its keys.
pub fn encode_segment(id: &ContentIdentifier) -> String {
    Base::Base32Upper.encode(id.to_bytes())
}

/// Extracts the identifier segment of `key`, if the key has that shape at all.
pub fn identifier_segment(key: &str) -> Option<&str> {
    if RESERVED_KEYS.contains(&key) {
        return None;
    }
    key.split('/')
        .nth(IDENTIFIER_POSITION)
        .filter(|segment| !segment.is_empty())
}

/// Raw content and every Ethereum content type live on the remote node.
pub fn is_remote_origin(id: &ContentIdentifier) -> bool {
    let content_type = id.content_type();
    content_type == crate::Codec::Raw || content_type.is_eth_family()
}

/// Decides whether `key` is served locally or fetched remotely.
///
/// Keys that fail to decode are local; the error is only traced.
pub fn classify(key: &str) -> KeyClass {
    let Some(segment) = identifier_segment(key) else {
        return KeyClass::Local;
    };

    match decode_segment(segment) {
        Ok(id) if is_remote_origin(&id) => KeyClass::Remote(id),
        Ok(id) => {
            trace!("local content type. key: {} content_type: {}", key, id.content_type());
            KeyClass::Local
        },
        Err(err) => {
            trace!("key is not an identifier. key: {} err: {}", key, err);
            KeyClass::Local
        },
    }
}

/// The `next-to-last/2` shard directory for an encoded segment.
pub fn shard_of(segment: &str) -> String {
    let padded = if segment.len() < SHARD_SUFFIX_LEN + 1 {
        let padding = "_".repeat(SHARD_SUFFIX_LEN + 1 - segment.len());
        format!("{padding}{segment}")
    } else {
        segment.to_string()
    };
    let offset = padded.len() - SHARD_SUFFIX_LEN - 1;
    padded[offset..offset + SHARD_SUFFIX_LEN].to_string()
}

/// Full sharded storage key of a block: `/{shard}/{SEGMENT}`.
pub fn block_key(id: &ContentIdentifier) -> String {
    let segment = encode_segment(id);
    format!("/{}/{}", shard_of(&segment), segment)
}
