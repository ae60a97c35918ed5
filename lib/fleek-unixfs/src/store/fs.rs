use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use ipld_core::cid::Cid;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{trace, warn};

use super::BlockStore;
use crate::dag_pb::Block;
use crate::errors::UnixFsError;
use crate::prefix;

pub const BLOCK_DIR: &str = "block";
pub const TMP_DIR: &str = "tmp";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsStoreConfig {
    pub root: PathBuf,
}

impl Default for FsStoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(".unixfs"),
        }
    }
}

/// Stores one file per block under `<root>/block/<cid>`.
///
/// Writes land in `<root>/tmp` first and are renamed into place, so a crashed write never leaves
/// a truncated block behind. Reads re-hash the content.
#[derive(Clone, Debug)]
pub struct FsBlockStore {
    root: PathBuf,
}

impl FsBlockStore {
    pub async fn init(config: FsStoreConfig) -> Result<Self, UnixFsError> {
        let root = config.root;
        fs::create_dir_all(root.join(BLOCK_DIR)).await?;
        fs::create_dir_all(root.join(TMP_DIR)).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn block_path(&self, cid: &Cid) -> PathBuf {
        self.root.join(BLOCK_DIR).join(cid.to_string())
    }
}

async fn write_into_place(tmp: &Path, path: &Path, data: &[u8]) -> io::Result<()> {
    let mut file = fs::File::create(tmp).await?;
    file.write_all(data).await?;
    file.sync_all().await?;
    drop(file);
    fs::rename(tmp, path).await
}

#[async_trait]
impl BlockStore for FsBlockStore {
    async fn get(&self, cid: &Cid) -> Result<Bytes, UnixFsError> {
        let data = match fs::read(self.block_path(cid)).await {
            Ok(data) => Bytes::from(data),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(UnixFsError::BlockNotFound(*cid));
            },
            Err(e) => return Err(e.into()),
        };
        if let Err(e) = prefix::verify(cid, &data) {
            warn!("block {cid} failed verification: {e}");
            return Err(e);
        }
        Ok(data)
    }

    async fn put(&self, block: Block) -> Result<(), UnixFsError> {
        let path = self.block_path(&block.cid);
        if fs::try_exists(&path).await? {
            return Ok(());
        }
        let tmp = self
            .root
            .join(TMP_DIR)
            .join(format!("{}.{:016x}", block.cid, rand::random::<u64>()));
        if let Err(e) = write_into_place(&tmp, &path, &block.data).await {
            if let Err(e) = fs::remove_file(&tmp).await {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!("failed to remove {}: {e}", tmp.display());
                }
            }
            return Err(e.into());
        }
        trace!("stored block {} ({} bytes)", block.cid, block.data.len());
        Ok(())
    }

    async fn has(&self, cid: &Cid) -> Result<bool, UnixFsError> {
        Ok(fs::try_exists(self.block_path(cid)).await?)
    }
}
