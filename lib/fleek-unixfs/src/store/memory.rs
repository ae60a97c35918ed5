use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use ipld_core::cid::Cid;
use parking_lot::RwLock;

use super::BlockStore;
use crate::dag_pb::Block;
use crate::errors::UnixFsError;

/// In-memory store. Clones share the same blocks.
#[derive(Clone, Default)]
pub struct MemoryBlockStore {
    pub(crate) inner: Arc<RwLock<HashMap<Cid, Bytes>>>,
}

impl MemoryBlockStore {
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn cids(&self) -> Vec<Cid> {
        self.inner.read().keys().copied().collect()
    }

    pub fn remove(&self, cid: &Cid) -> Option<Bytes> {
        self.inner.write().remove(cid)
    }
}

impl std::fmt::Debug for MemoryBlockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBlockStore")
            .field("blocks", &self.len())
            .finish()
    }
}

#[async_trait]
impl BlockStore for MemoryBlockStore {
    async fn get(&self, cid: &Cid) -> Result<Bytes, UnixFsError> {
        self.inner
            .read()
            .get(cid)
            .cloned()
            .ok_or(UnixFsError::BlockNotFound(*cid))
    }

    async fn put(&self, block: Block) -> Result<(), UnixFsError> {
        self.inner.write().insert(block.cid, block.data);
        Ok(())
    }

    async fn put_many(&self, blocks: Vec<Block>) -> Result<(), UnixFsError> {
        let mut inner = self.inner.write();
        for block in blocks {
            inner.insert(block.cid, block.data);
        }
        Ok(())
    }

    async fn has(&self, cid: &Cid) -> Result<bool, UnixFsError> {
        Ok(self.inner.read().contains_key(cid))
    }
}
