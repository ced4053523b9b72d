use std::fmt::Display;
use std::fmt::Formatter;
use std::str::FromStr;

use cid::multihash::Multihash;
use cid::Cid;
use cid::Version;

use crate::Codec;
use crate::DecodeError;
use crate::HashFunction;

/// A decoded content identifier whose content type and hash function are
/// both registered in [`Codec`] and [`HashFunction`].
///
/// Built once per lookup and never mutated; [`ContentIdentifier::with_content_type`]
/// returns a new value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentIdentifier {
    cid: Cid,
    content_type: Codec,
    hash_function: HashFunction,
}

impl ContentIdentifier {
    /// Parses the binary form of a content identifier.
    ///
    /// The whole slice must be consumed.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = bytes;
        let cid = Cid::read_bytes(&mut reader)?;
        if !reader.is_empty() {
            return Err(DecodeError::TrailingBytes(reader.len()));
        }
        Self::try_from(cid)
    }

    /// Builds a version 1 identifier from its parts.
    pub fn new_v1(
        content_type: Codec,
        hash_function: HashFunction,
        digest: &[u8],
    ) -> Result<Self, DecodeError> {
        let multihash = Multihash::wrap(hash_function.code(), digest)?;
        Ok(Self {
            cid: Cid::new_v1(content_type.code(), multihash),
            content_type,
            hash_function,
        })
    }

    pub fn version(&self) -> Version {
        self.cid.version()
    }

    pub fn content_type(&self) -> Codec {
        self.content_type
    }

    pub fn hash_function(&self) -> HashFunction {
        self.hash_function
    }

    pub fn digest(&self) -> &[u8] {
        self.cid.hash().digest()
    }

    pub fn multihash(&self) -> &Multihash<64> {
        self.cid.hash()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.cid.to_bytes()
    }

    pub fn as_cid(&self) -> &Cid {
        &self.cid
    }

    /// Returns a copy carrying `content_type`, with version and multihash unchanged.
    pub fn with_content_type(
        &self,
        content_type: Codec,
    ) -> Result<Self, DecodeError> {
        let cid = Cid::new(self.cid.version(), content_type.code(), *self.cid.hash())?;
        Ok(Self {
            cid,
            content_type,
            hash_function: self.hash_function,
        })
    }
}

impl TryFrom<Cid> for ContentIdentifier {
    type Error = DecodeError;

    fn try_from(cid: Cid) -> Result<Self, Self::Error> {
        let content_type = Codec::try_from(cid.codec())?;
        let hash_function = HashFunction::try_from(cid.hash().code())?;
        Ok(Self {
            cid,
            content_type,
            hash_function,
        })
    }
}

/// Canonical text form: base32 multibase for v1, base58btc for v0.
impl Display for ContentIdentifier {
    fn fmt(
        &self,
        f: &mut Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "{}", self.cid)
    }
}

impl FromStr for ContentIdentifier {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(Cid::try_from(s)?)
    }
}
