//! Block storage.
//!
//! The layouts write through a [`Batch`], the reader and the resolver read through
//! [`get_node`]. Any backend implementing [`BlockStore`] can be plugged in.
mod fs;
mod gateway;
mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
pub use fs::{FsBlockStore, FsStoreConfig};
pub use gateway::GatewayBlockStore;
use ipld_core::cid::Cid;
pub use memory::MemoryBlockStore;
use tracing::trace;

use crate::dag_pb::{Block, Node};
use crate::errors::UnixFsError;

/// Content addressed block storage.
#[async_trait]
pub trait BlockStore: Send + Sync {
    /// Fetch the encoded bytes of a block. Fails with `BlockNotFound` when absent.
    async fn get(&self, cid: &Cid) -> Result<Bytes, UnixFsError>;

    async fn put(&self, block: Block) -> Result<(), UnixFsError>;

    /// Store blocks in the given order.
    async fn put_many(&self, blocks: Vec<Block>) -> Result<(), UnixFsError> {
        for block in blocks {
            self.put(block).await?;
        }
        Ok(())
    }

    async fn has(&self, cid: &Cid) -> Result<bool, UnixFsError>;
}

#[async_trait]
impl<T: BlockStore + ?Sized> BlockStore for Arc<T> {
    async fn get(&self, cid: &Cid) -> Result<Bytes, UnixFsError> {
        (**self).get(cid).await
    }

    async fn put(&self, block: Block) -> Result<(), UnixFsError> {
        (**self).put(block).await
    }

    async fn put_many(&self, blocks: Vec<Block>) -> Result<(), UnixFsError> {
        (**self).put_many(blocks).await
    }

    async fn has(&self, cid: &Cid) -> Result<bool, UnixFsError> {
        (**self).has(cid).await
    }
}

/// Fetch and decode a node.
pub async fn get_node<S: BlockStore + ?Sized>(store: &S, cid: &Cid) -> Result<Node, UnixFsError> {
    let bytes = store.get(cid).await?;
    Node::decode(cid, bytes)
}

/// Ordered write buffer in front of a store.
///
/// Blocks reach the store in the order they were added, so a child added before its parent is
/// always persisted first.
pub struct Batch<'a, S: ?Sized> {
    store: &'a S,
    pending: Vec<Block>,
    max_blocks: usize,
    written: usize,
}

impl<'a, S: BlockStore + ?Sized> Batch<'a, S> {
    pub fn new(store: &'a S, max_blocks: usize) -> Self {
        Self {
            store,
            pending: Vec::new(),
            max_blocks: max_blocks.max(1),
            written: 0,
        }
    }

    pub async fn add(&mut self, block: Block) -> Result<(), UnixFsError> {
        self.pending.push(block);
        if self.pending.len() >= self.max_blocks {
            self.flush().await?;
        }
        Ok(())
    }

    /// Write every pending block.
    pub async fn commit(&mut self) -> Result<(), UnixFsError> {
        self.flush().await
    }

    /// Number of blocks handed to the store so far.
    pub fn written(&self) -> usize {
        self.written
    }

    async fn flush(&mut self) -> Result<(), UnixFsError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let blocks = std::mem::take(&mut self.pending);
        let count = blocks.len();
        self.store.put_many(blocks).await?;
        self.written += count;
        trace!("flushed {count} blocks");
        Ok(())
    }
}
