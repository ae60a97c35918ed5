#![allow(dead_code)]

use std::collections::BTreeMap;
use std::env;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use fleek_unixfs::chunker::SizeSplitter;
use fleek_unixfs::dag_pb::{Block, BuiltNode, Link, Node, ProtoNode};
use fleek_unixfs::hamt::{hash_key, HashBits};
use fleek_unixfs::prefix::Prefix;
use fleek_unixfs::store::{get_node, BlockStore, MemoryBlockStore};
use fleek_unixfs::unixfs::{DataType, FsNode, NodeView, HASH_MURMUR3};
use fleek_unixfs::{build_balanced, build_trickle, DagBuilderParams, Layout, UnixFsError};
use futures::future::BoxFuture;
use futures::FutureExt;
use ipld_core::cid::Cid;
use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};

/// Log to stdout when `RUST_LOG` names a level.
pub fn setup_logging() {
    let level = env::var("RUST_LOG")
        .ok()
        .and_then(|level| tracing::Level::from_str(&level).ok());
    if let Some(level) = level {
        let _ = tracing_subscriber::fmt().with_max_level(level).try_init();
    }
}

pub fn random_data(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut data = vec![0u8; len];
    rng.fill_bytes(&mut data);
    data
}

/// `B[i] = i mod 256`.
pub fn sequential_data(len: usize) -> Vec<u8> {
    (0..len).map(|i| i as u8).collect()
}

pub async fn build(
    store: &MemoryBlockStore,
    data: &[u8],
    layout: Layout,
    chunk_size: usize,
    params: &DagBuilderParams,
) -> BuiltNode {
    let splitter = SizeSplitter::new(data, chunk_size);
    match layout {
        Layout::Balanced => build_balanced(store, splitter, params).await.unwrap(),
        Layout::Trickle => build_trickle(store, splitter, params).await.unwrap(),
    }
}

pub fn params(max_links: usize) -> DagBuilderParams {
    DagBuilderParams::builder().max_links(max_links).build()
}

/// Summary of a file DAG gathered by [`check_dag`].
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DagStats {
    pub depth: usize,
    pub leaves: usize,
    pub internal: usize,
}

/// Fanout rule enforced by [`check_dag`].
#[derive(Clone, Copy, Debug)]
pub enum Fanout {
    /// Internal nodes hold at most this many links.
    AtMost(usize),
    /// Internal nodes off the rightmost path hold exactly this many links, the others at most.
    Full(usize),
}

/// Walk a file DAG and assert its structural invariants: every internal node follows `fanout`,
/// has as many block sizes as links, a declared size equal to the sum of its parts, and every
/// child's size matches its block size. Returns the logical size.
pub fn check_dag<'a>(
    store: &'a MemoryBlockStore,
    cid: Cid,
    fanout: Fanout,
    stats: &'a mut DagStats,
    level: usize,
    rightmost: bool,
) -> BoxFuture<'a, u64> {
    async move {
        stats.depth = stats.depth.max(level);
        let node = get_node(store, &cid).await.unwrap();
        match NodeView::of(&node) {
            NodeView::RawLeaf(data) => {
                stats.leaves += 1;
                data.len() as u64
            },
            NodeView::File(proto, fs) => {
                let links = proto.links();
                if links.is_empty() {
                    stats.leaves += 1;
                    assert_eq!(fs.declared_file_size(), Some(fs.data().len() as u64));
                    return fs.data().len() as u64;
                }
                stats.internal += 1;
                match fanout {
                    Fanout::AtMost(max) => {
                        assert!(links.len() <= max, "node {cid} exceeds fanout");
                    },
                    Fanout::Full(max) if rightmost => {
                        assert!(links.len() <= max, "node {cid} exceeds fanout");
                    },
                    Fanout::Full(max) => {
                        assert_eq!(links.len(), max, "node {cid} off the rightmost path");
                    },
                }
                assert_eq!(fs.block_sizes().len(), links.len());
                assert_eq!(fs.declared_file_size(), Some(fs.file_size()));
                for (i, (link, expected)) in links.iter().zip(fs.block_sizes()).enumerate() {
                    assert_eq!(link.name(), Some(""));
                    let last = rightmost && i + 1 == links.len();
                    let size = check_dag(store, *link.cid(), fanout, stats, level + 1, last).await;
                    assert_eq!(size, *expected, "child {} of {cid}", link.cid());
                }
                fs.file_size()
            },
            other => panic!("unexpected node in file DAG: {other:?}"),
        }
    }
    .boxed()
}

/// Persist a DAG-PB node and return its CID.
pub async fn put_proto(store: &MemoryBlockStore, node: ProtoNode) -> Cid {
    let built = BuiltNode::new(node.into(), 0, &Prefix::v0()).unwrap();
    store.put(built.to_block()).await.unwrap();
    *built.cid()
}

/// Plain UnixFS directory with the given named entries.
pub async fn put_directory(store: &MemoryBlockStore, entries: &[(&str, Cid)]) -> Cid {
    let fs = FsNode::new(DataType::Directory);
    let links = entries
        .iter()
        .map(|(name, cid)| Link::new(*cid, Some(name.to_string()), Some(0)))
        .collect();
    put_proto(store, ProtoNode::new(fs.to_bytes().unwrap(), links)).await
}

/// Build a sharded directory in the layout go-unixfs writes: entries are spread by the bits of
/// their murmur3 digest, colliding entries move to a child shard one level down.
pub fn put_shard(
    store: &MemoryBlockStore,
    entries: Vec<(String, Cid)>,
    fanout: u64,
    level: usize,
) -> BoxFuture<'_, Cid> {
    async move {
        let width = fanout.trailing_zeros();
        let pad = format!("{:X}", fanout - 1).len();
        let mut slots: BTreeMap<usize, Vec<(String, Cid)>> = BTreeMap::new();
        for (name, cid) in entries {
            let digest = hash_key(&name).unwrap();
            let mut bits = HashBits::new(&digest);
            let mut index = 0;
            for _ in 0..=level {
                index = bits.next(width).unwrap();
            }
            slots.entry(index).or_default().push((name, cid));
        }

        let mut links = Vec::new();
        for (index, mut group) in slots {
            let prefix = format!("{:0pad$X}", index);
            if group.len() == 1 {
                let (name, cid) = group.remove(0);
                links.push(Link::new(cid, Some(format!("{prefix}{name}")), Some(0)));
            } else {
                let child = put_shard(store, group, fanout, level + 1).await;
                links.push(Link::new(child, Some(prefix), Some(0)));
            }
        }

        let mut fs = FsNode::new(DataType::HAMTShard);
        fs.set_hash_type(HASH_MURMUR3);
        fs.set_fanout(fanout);
        put_proto(store, ProtoNode::new(fs.to_bytes().unwrap(), links)).await
    }
    .boxed()
}

/// Counts reads and optionally delays them.
#[derive(Clone, Default)]
pub struct InstrumentedStore {
    pub inner: MemoryBlockStore,
    gets: Arc<AtomicUsize>,
    delay_ms: Arc<AtomicU64>,
}

impl InstrumentedStore {
    pub fn new(inner: MemoryBlockStore) -> Self {
        Self {
            inner,
            ..Default::default()
        }
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }
}

#[async_trait]
impl BlockStore for InstrumentedStore {
    async fn get(&self, cid: &Cid) -> Result<Bytes, UnixFsError> {
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(cid).await
    }

    async fn put(&self, block: Block) -> Result<(), UnixFsError> {
        self.inner.put(block).await
    }

    async fn has(&self, cid: &Cid) -> Result<bool, UnixFsError> {
        self.inner.has(cid).await
    }
}

/// Accepts `limit` blocks, then fails every write.
#[derive(Default)]
pub struct FailingStore {
    pub inner: MemoryBlockStore,
    pub limit: usize,
}

#[async_trait]
impl BlockStore for FailingStore {
    async fn get(&self, cid: &Cid) -> Result<Bytes, UnixFsError> {
        self.inner.get(cid).await
    }

    async fn put(&self, block: Block) -> Result<(), UnixFsError> {
        if self.inner.len() >= self.limit {
            return Err(std::io::Error::other("disk full").into());
        }
        self.inner.put(block).await
    }

    async fn has(&self, cid: &Cid) -> Result<bool, UnixFsError> {
        self.inner.has(cid).await
    }
}

pub fn raw_node(data: &'static [u8]) -> Node {
    Node::Raw(Bytes::from_static(data))
}
