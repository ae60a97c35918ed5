//! Shared machinery of the layouts: chunk look-ahead, leaf creation, internal node assembly and
//! ordered persistence.
use std::sync::Arc;

use bytes::Bytes;
use typed_builder::TypedBuilder;

use crate::chunker::Splitter;
use crate::config::{Config, DEFAULT_BATCH_SIZE};
use crate::dag_pb::{BuiltNode, Link, Node, ProtoNode};
use crate::errors::UnixFsError;
use crate::prefix::{CidBuilder, Prefix};
use crate::store::{Batch, BlockStore};
use crate::unixfs::{DataType, FsNode};

/// Rough size of a serialized link: CID, name and `Tsize`.
const ROUGH_LINK_SIZE: usize = 34 + 8 + 5;

/// Target size of an internal node.
const ROUGH_LINK_BLOCK_SIZE: usize = 1 << 13;

/// Maximum links per internal node, keeping internal nodes around 8KiB.
pub const DEFAULT_LINKS_PER_BLOCK: usize = ROUGH_LINK_BLOCK_SIZE / ROUGH_LINK_SIZE;

/// Parameters shared by both layouts.
#[derive(Clone, Debug, TypedBuilder)]
pub struct DagBuilderParams {
    #[builder(default = DEFAULT_LINKS_PER_BLOCK)]
    pub max_links: usize,
    #[builder(default)]
    pub raw_leaves: bool,
    #[builder(default = default_cid_builder())]
    pub cid_builder: Arc<dyn CidBuilder>,
    #[builder(default = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,
}

fn default_cid_builder() -> Arc<dyn CidBuilder> {
    Arc::new(Prefix::default())
}

impl Default for DagBuilderParams {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl DagBuilderParams {
    pub fn from_config(config: &Config) -> Result<Self, UnixFsError> {
        config.validate()?;
        Ok(Self::builder()
            .max_links(config.max_links)
            .raw_leaves(config.raw_leaves)
            .cid_builder(Arc::new(config.prefix()?))
            .batch_size(config.batch_size)
            .build())
    }

    pub fn new_helper<'a, S: BlockStore + ?Sized>(
        &self,
        store: &'a S,
        splitter: impl Splitter + 'a,
    ) -> DagBuilderHelper<'a, S> {
        DagBuilderHelper {
            splitter: Box::new(splitter),
            batch: Batch::new(store, self.batch_size),
            cid_builder: self.cid_builder.clone(),
            max_links: self.max_links.max(2),
            raw_leaves: self.raw_leaves,
            next: None,
            exhausted: false,
            nodes: 0,
        }
    }
}

/// Wraps a chunk source and a block sink for the duration of one import.
pub struct DagBuilderHelper<'a, S: ?Sized> {
    splitter: Box<dyn Splitter + 'a>,
    batch: Batch<'a, S>,
    cid_builder: Arc<dyn CidBuilder>,
    max_links: usize,
    raw_leaves: bool,
    next: Option<Bytes>,
    exhausted: bool,
    nodes: usize,
}

impl<'a, S: BlockStore + ?Sized> DagBuilderHelper<'a, S> {
    pub fn max_links(&self) -> usize {
        self.max_links
    }

    /// Number of nodes queued for the store so far.
    pub fn nodes(&self) -> usize {
        self.nodes
    }

    async fn prepare_next(&mut self) -> Result<(), UnixFsError> {
        if self.next.is_none() && !self.exhausted {
            match self.splitter.next_chunk().await? {
                Some(chunk) => self.next = Some(chunk),
                None => self.exhausted = true,
            }
        }
        Ok(())
    }

    /// Whether the chunk source is exhausted. Reads one chunk ahead.
    pub async fn done(&mut self) -> Result<bool, UnixFsError> {
        self.prepare_next().await?;
        Ok(self.next.is_none())
    }

    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, UnixFsError> {
        self.prepare_next().await?;
        Ok(self.next.take())
    }

    /// Wrap a chunk as a leaf, raw or typed depending on `raw_leaves`.
    pub fn new_leaf(&self, data: Bytes) -> Result<BuiltNode, UnixFsError> {
        let file_size = data.len() as u64;
        let node = if self.raw_leaves {
            Node::Raw(data)
        } else {
            let mut fs = FsNode::new(DataType::File);
            fs.set_data(data);
            ProtoNode::new(fs.to_bytes()?, Vec::new()).into()
        };
        BuiltNode::new(node, file_size, self.cid_builder.as_ref())
    }

    /// Leaf over the next chunk. An exhausted source yields an empty leaf.
    pub async fn new_leaf_data_node(&mut self) -> Result<BuiltNode, UnixFsError> {
        let data = self.next_chunk().await?.unwrap_or_default();
        self.new_leaf(data)
    }

    /// Assemble an internal node over already built children. The children are queued, the
    /// node itself is left to whoever links it, or to [`DagBuilderHelper::finish`] for a root.
    pub async fn new_internal_node(
        &mut self,
        children: Vec<BuiltNode>,
    ) -> Result<BuiltNode, UnixFsError> {
        let mut node = FileNodeBuilder::new();
        for child in children {
            node.add_child(child, self).await?;
        }
        node.commit(self)
    }

    /// Queue a node for the store.
    pub async fn add(&mut self, node: &BuiltNode) -> Result<(), UnixFsError> {
        self.nodes += 1;
        self.batch.add(node.to_block()).await
    }

    /// Queue the root and write everything still pending.
    pub async fn finish(mut self, root: BuiltNode) -> Result<BuiltNode, UnixFsError> {
        self.add(&root).await?;
        self.batch.commit().await?;
        Ok(root)
    }

    /// Append leaves to `node` until it is full or the source is exhausted.
    pub async fn fill_node_layer(
        &mut self,
        node: &mut FileNodeBuilder,
    ) -> Result<(), UnixFsError> {
        while node.num_children() < self.max_links && !self.done().await? {
            let child = self.new_leaf_data_node().await?;
            node.add_child(child, self).await?;
        }
        Ok(())
    }
}

/// A UnixFS file node under construction.
#[derive(Debug)]
pub struct FileNodeBuilder {
    fs: FsNode,
    links: Vec<Link>,
}

impl Default for FileNodeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FileNodeBuilder {
    pub fn new() -> Self {
        Self {
            fs: FsNode::new(DataType::File),
            links: Vec::new(),
        }
    }

    pub fn num_children(&self) -> usize {
        self.links.len()
    }

    pub fn file_size(&self) -> u64 {
        self.fs.file_size()
    }

    /// Persist `child` and link it. The child is queued before this node can be.
    pub async fn add_child<S: BlockStore + ?Sized>(
        &mut self,
        child: BuiltNode,
        db: &mut DagBuilderHelper<'_, S>,
    ) -> Result<(), UnixFsError> {
        db.add(&child).await?;
        self.links.push(child.to_link());
        self.fs.add_block_size(child.file_size());
        Ok(())
    }

    /// Encode the node. It is not persisted: whoever links it does that.
    pub fn commit<S: BlockStore + ?Sized>(
        self,
        db: &DagBuilderHelper<'_, S>,
    ) -> Result<BuiltNode, UnixFsError> {
        let file_size = self.fs.file_size();
        let node = ProtoNode::new(self.fs.to_bytes()?, self.links);
        BuiltNode::new(node.into(), file_size, db.cid_builder.as_ref())
    }
}
