//! Multicodec content types and multihash functions known to the store.
use std::fmt::Display;
use std::fmt::Formatter;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

use crate::DecodeError;

/// Prefix shared by every Ethereum content type name.
pub const ETH_FAMILY_PREFIX: &str = "eth-";

/// Content type tag carried by a content identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Codec {
    Raw,
    DagPb,
    DagCbor,
    DagJson,
    GitRaw,
    EthBlock,
    EthBlockList,
    EthTxTrie,
    EthTx,
    EthTxReceiptTrie,
    EthTxReceipt,
    EthStateTrie,
    EthAccountSnapshot,
    EthStorageTrie,
    EthReceiptLogTrie,
    EthReceiptLog,
}

impl Codec {
    pub const ALL: [Codec; 16] = [
        Codec::Raw,
        Codec::DagPb,
        Codec::DagCbor,
        Codec::DagJson,
        Codec::GitRaw,
        Codec::EthBlock,
        Codec::EthBlockList,
        Codec::EthTxTrie,
        Codec::EthTx,
        Codec::EthTxReceiptTrie,
        Codec::EthTxReceipt,
        Codec::EthStateTrie,
        Codec::EthAccountSnapshot,
        Codec::EthStorageTrie,
        Codec::EthReceiptLogTrie,
        Codec::EthReceiptLog,
    ];

    /// The multicodec table code.
    pub fn code(self) -> u64 {
        match self {
            Codec::Raw => 0x55,
            Codec::DagPb => 0x70,
            Codec::DagCbor => 0x71,
            Codec::DagJson => 0x0129,
            Codec::GitRaw => 0x78,
            Codec::EthBlock => 0x90,
            Codec::EthBlockList => 0x91,
            Codec::EthTxTrie => 0x92,
            Codec::EthTx => 0x93,
            Codec::EthTxReceiptTrie => 0x94,
            Codec::EthTxReceipt => 0x95,
            Codec::EthStateTrie => 0x96,
            Codec::EthAccountSnapshot => 0x97,
            Codec::EthStorageTrie => 0x98,
            Codec::EthReceiptLogTrie => 0x99,
            Codec::EthReceiptLog => 0x9a,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Codec::Raw => "raw",
            Codec::DagPb => "dag-pb",
            Codec::DagCbor => "dag-cbor",
            Codec::DagJson => "dag-json",
            Codec::GitRaw => "git-raw",
            Codec::EthBlock => "eth-block",
            Codec::EthBlockList => "eth-block-list",
            Codec::EthTxTrie => "eth-tx-trie",
            Codec::EthTx => "eth-tx",
            Codec::EthTxReceiptTrie => "eth-tx-receipt-trie",
            Codec::EthTxReceipt => "eth-tx-receipt",
            Codec::EthStateTrie => "eth-state-trie",
            Codec::EthAccountSnapshot => "eth-account-snapshot",
            Codec::EthStorageTrie => "eth-storage-trie",
            Codec::EthReceiptLogTrie => "eth-receipt-log-trie",
            Codec::EthReceiptLog => "eth-receipt-log",
        }
    }

    /// Whether the tag belongs to the Ethereum family of content types.
    pub fn is_eth_family(self) -> bool {
        self.name().starts_with(ETH_FAMILY_PREFIX)
    }
}

impl Display for Codec {
    fn fmt(
        &self,
        f: &mut Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl TryFrom<u64> for Codec {
    type Error = DecodeError;

    fn try_from(code: u64) -> Result<Self, Self::Error> {
        Codec::ALL
            .into_iter()
            .find(|codec| codec.code() == code)
            .ok_or(DecodeError::UnknownContentType(code))
    }
}

impl FromStr for Codec {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Codec::ALL
            .into_iter()
            .find(|codec| codec.name() == s)
            .ok_or_else(|| DecodeError::UnknownContentTypeName(s.to_string()))
    }
}

impl TryFrom<String> for Codec {
    type Error = DecodeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Codec> for String {
    fn from(codec: Codec) -> Self {
        codec.name().to_string()
    }
}

/// Hash function tag of a multihash.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum HashFunction {
    Identity,
    Sha1,
    Sha2_256,
    Sha2_512,
    Sha3_512,
    Sha3_384,
    Sha3_256,
    Sha3_224,
    Keccak224,
    Keccak256,
    Keccak384,
    Keccak512,
    Blake3,
    Blake2b256,
}

impl HashFunction {
    pub const ALL: [HashFunction; 14] = [
        HashFunction::Identity,
        HashFunction::Sha1,
        HashFunction::Sha2_256,
        HashFunction::Sha2_512,
        HashFunction::Sha3_512,
        HashFunction::Sha3_384,
        HashFunction::Sha3_256,
        HashFunction::Sha3_224,
        HashFunction::Keccak224,
        HashFunction::Keccak256,
        HashFunction::Keccak384,
        HashFunction::Keccak512,
        HashFunction::Blake3,
        HashFunction::Blake2b256,
    ];

    /// The multihash table code.
    pub fn code(self) -> u64 {
        match self {
            HashFunction::Identity => 0x00,
            HashFunction::Sha1 => 0x11,
            HashFunction::Sha2_256 => 0x12,
            HashFunction::Sha2_512 => 0x13,
            HashFunction::Sha3_512 => 0x14,
            HashFunction::Sha3_384 => 0x15,
            HashFunction::Sha3_256 => 0x16,
            HashFunction::Sha3_224 => 0x17,
            HashFunction::Keccak224 => 0x1a,
            HashFunction::Keccak256 => 0x1b,
            HashFunction::Keccak384 => 0x1c,
            HashFunction::Keccak512 => 0x1d,
            HashFunction::Blake3 => 0x1e,
            HashFunction::Blake2b256 => 0xb220,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            HashFunction::Identity => "identity",
            HashFunction::Sha1 => "sha1",
            HashFunction::Sha2_256 => "sha2-256",
            HashFunction::Sha2_512 => "sha2-512",
            HashFunction::Sha3_512 => "sha3-512",
            HashFunction::Sha3_384 => "sha3-384",
            HashFunction::Sha3_256 => "sha3-256",
            HashFunction::Sha3_224 => "sha3-224",
            HashFunction::Keccak224 => "keccak-224",
            HashFunction::Keccak256 => "keccak-256",
            HashFunction::Keccak384 => "keccak-384",
            HashFunction::Keccak512 => "keccak-512",
            HashFunction::Blake3 => "blake3",
            HashFunction::Blake2b256 => "blake2b-256",
        }
    }
}

impl Display for HashFunction {
    fn fmt(
        &self,
        f: &mut Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl TryFrom<u64> for HashFunction {
    type Error = DecodeError;

    fn try_from(code: u64) -> Result<Self, Self::Error> {
        HashFunction::ALL
            .into_iter()
            .find(|hash| hash.code() == code)
            .ok_or(DecodeError::UnknownHashFunction(code))
    }
}

impl FromStr for HashFunction {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HashFunction::ALL
            .into_iter()
            .find(|hash| hash.name() == s)
            .ok_or_else(|| DecodeError::UnknownHashFunctionName(s.to_string()))
    }
}

impl TryFrom<String> for HashFunction {
    type Error = DecodeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<HashFunction> for String {
    fn from(hash: HashFunction) -> Self {
        hash.name().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_and_names_are_unique() {
        for (i, a) in Codec::ALL.iter().enumerate() {
            for b in &Codec::ALL[i + 1..] {
                assert_ne!(a.code(), b.code());
                assert_ne!(a.name(), b.name());
            }
        }
        for (i, a) in HashFunction::ALL.iter().enumerate() {
            for b in &HashFunction::ALL[i + 1..] {
                assert_ne!(a.code(), b.code());
                assert_ne!(a.name(), b.name());
            }
        }
    }

    #[test]
    fn eth_family_membership() {
        assert!(Codec::EthStorageTrie.is_eth_family());
        assert!(Codec::EthTxReceipt.is_eth_family());
        assert!(!Codec::Raw.is_eth_family());
        assert!(!Codec::DagCbor.is_eth_family());
    }

    #[test]
    fn lookup_by_code_and_name() {
        assert_eq!(Codec::try_from(0x98).unwrap(), Codec::EthStorageTrie);
        assert_eq!("eth-state-trie".parse::<Codec>().unwrap(), Codec::EthStateTrie);
        assert_eq!(HashFunction::try_from(0x1b).unwrap(), HashFunction::Keccak256);
        assert!(matches!(
            Codec::try_from(0xdead),
            Err(DecodeError::UnknownContentType(0xdead))
        ));
        assert!(matches!(
            HashFunction::try_from(0x99),
            Err(DecodeError::UnknownHashFunction(0x99))
        ));
    }

    #[test]
    fn serde_uses_registry_names() {
        assert_eq!(
            serde_json::to_string(&Codec::EthStateTrie).unwrap(),
            "\"eth-state-trie\""
        );
        assert_eq!(
            serde_json::to_string(&HashFunction::Sha2_256).unwrap(),
            "\"sha2-256\""
        );
        assert_eq!(
            serde_json::from_str::<Codec>("\"eth-tx-receipt\"").unwrap(),
            Codec::EthTxReceipt
        );
        assert_eq!(
            serde_json::from_str::<HashFunction>("\"keccak-256\"").unwrap(),
            HashFunction::Keccak256
        );
        assert!(serde_json::from_str::<Codec>("\"eth-unknown\"").is_err());
        assert!(serde_json::from_str::<HashFunction>("\"md5\"").is_err());
    }
}
