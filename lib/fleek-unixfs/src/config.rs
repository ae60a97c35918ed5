use std::time::Duration;

use ipld_core::cid::Version;
use serde::{Deserialize, Serialize};

use crate::chunker::DEFAULT_CHUNK_SIZE;
use crate::errors::UnixFsError;
use crate::importer::helpers::DEFAULT_LINKS_PER_BLOCK;
use crate::prefix::{HashFunction, Prefix};

/// Blocks buffered before the importer writes to the store.
pub const DEFAULT_BATCH_SIZE: usize = 128;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    #[default]
    Balanced,
    Trickle,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub layout: Layout,
    pub chunk_size: usize,
    pub max_links: usize,
    pub raw_leaves: bool,
    pub cid_version: u64,
    pub hash: HashFunction,
    pub batch_size: usize,
    #[serde(with = "humantime_serde")]
    pub fetch_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            layout: Layout::Balanced,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_links: DEFAULT_LINKS_PER_BLOCK,
            raw_leaves: false,
            cid_version: 0,
            hash: HashFunction::Sha2_256,
            batch_size: DEFAULT_BATCH_SIZE,
            fetch_timeout: None,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), UnixFsError> {
        if self.chunk_size == 0 {
            return Err(UnixFsError::InvalidConfig(
                "chunk_size must be positive".to_string(),
            ));
        }
        if self.max_links < 2 {
            return Err(UnixFsError::InvalidConfig(
                "max_links must be at least 2".to_string(),
            ));
        }
        self.prefix().map(|_| ())
    }

    pub fn prefix(&self) -> Result<Prefix, UnixFsError> {
        let version = Version::try_from(self.cid_version)?;
        Prefix::new(version, self.hash)
    }
}
