//! Content identifiers for encoded nodes.
//!
//! The layouts never hash anything themselves: they hand the encoded bytes and the multicodec to
//! a [`CidBuilder`]. [`Prefix`] is the default implementation, other hashing schemes plug in by
//! implementing the trait.
use std::fmt::Debug;

use ipld_core::cid::{Cid, Version};
use multihash::Multihash;
use serde::{Deserialize, Serialize};
use sha2::Digest;

use crate::errors::UnixFsError;

/// Multicodec of DAG-PB nodes.
pub const DAG_PB: u64 = 0x70;

/// Multicodec of raw leaves.
pub const RAW: u64 = 0x55;

/// Multihash code of sha2-256.
pub const SHA2_256: u64 = 0x12;

/// Multihash code of blake3.
pub const BLAKE3: u64 = 0x1e;

/// Derives the content identifier of an encoded node.
pub trait CidBuilder: Debug + Send + Sync {
    fn build(&self, codec: u64, data: &[u8]) -> Result<Cid, UnixFsError>;
}

/// Hash functions understood by [`Prefix`] and by [`verify`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HashFunction {
    #[default]
    #[serde(rename = "sha2-256")]
    Sha2_256,
    #[serde(rename = "blake3")]
    Blake3,
}

impl HashFunction {
    pub fn code(&self) -> u64 {
        match self {
            Self::Sha2_256 => SHA2_256,
            Self::Blake3 => BLAKE3,
        }
    }

    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            SHA2_256 => Some(Self::Sha2_256),
            BLAKE3 => Some(Self::Blake3),
            _ => None,
        }
    }

    pub fn digest(&self, data: &[u8]) -> Result<Multihash<64>, UnixFsError> {
        let mh = match self {
            Self::Sha2_256 => Multihash::wrap(SHA2_256, &sha2::Sha256::digest(data))?,
            Self::Blake3 => Multihash::wrap(BLAKE3, blake3::hash(data).as_bytes())?,
        };
        Ok(mh)
    }
}

/// CID version plus hash function, applied to every node of a DAG.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Prefix {
    version: Version,
    hash: HashFunction,
}

impl Default for Prefix {
    fn default() -> Self {
        Self::v0()
    }
}

impl Prefix {
    pub fn new(version: Version, hash: HashFunction) -> Result<Self, UnixFsError> {
        if version == Version::V0 && hash != HashFunction::Sha2_256 {
            return Err(UnixFsError::InvalidConfig(
                "CIDv0 only supports sha2-256".to_string(),
            ));
        }
        Ok(Self { version, hash })
    }

    /// CIDv0, sha2-256. Raw leaves still get CIDv1 because v0 cannot express the codec.
    pub fn v0() -> Self {
        Self {
            version: Version::V0,
            hash: HashFunction::Sha2_256,
        }
    }

    pub fn v1(hash: HashFunction) -> Self {
        Self {
            version: Version::V1,
            hash,
        }
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn hash(&self) -> HashFunction {
        self.hash
    }
}

impl CidBuilder for Prefix {
    fn build(&self, codec: u64, data: &[u8]) -> Result<Cid, UnixFsError> {
        let mh = self.hash.digest(data)?;
        match self.version {
            Version::V0 if codec == DAG_PB => Ok(Cid::new_v0(mh)?),
            _ => Ok(Cid::new_v1(codec, mh)),
        }
    }
}

/// Check that `data` hashes to the multihash embedded in `cid`.
pub fn verify(cid: &Cid, data: &[u8]) -> Result<(), UnixFsError> {
    let code = cid.hash().code();
    let hasher = HashFunction::from_code(code).ok_or(UnixFsError::UnsupportedHash(code))?;
    if hasher.digest(data)?.digest() == cid.hash().digest() {
        Ok(())
    } else {
        Err(UnixFsError::HashMismatch(*cid))
    }
}
