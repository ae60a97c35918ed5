//! Seekable reader over a UnixFS file DAG.
//!
//! The reader keeps the path from the root to the node holding the current offset as a stack of
//! frames. Every frame knows the absolute offset its subtree starts at and the cumulative sizes
//! of its children, so locating an offset only fetches the nodes on the way down to it.
use std::io::SeekFrom;
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures::stream::{self, Stream};
use ipld_core::cid::Cid;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::dag_pb::Node;
use crate::errors::UnixFsError;
use crate::store::{get_node, BlockStore};
use crate::unixfs::NodeView;

/// Decoded file node: inline data, then children in link order.
#[derive(Debug)]
struct FileSegment {
    data: Bytes,
    links: Vec<Cid>,
    /// `ends[i]` is the offset, relative to the segment, right after child `i`.
    ends: Vec<u64>,
    size: u64,
}

impl FileSegment {
    fn from_node(cid: &Cid, node: &Node) -> Result<Self, UnixFsError> {
        match NodeView::of(node) {
            NodeView::RawLeaf(data) => Ok(Self {
                data: data.clone(),
                links: Vec::new(),
                ends: Vec::new(),
                size: data.len() as u64,
            }),
            NodeView::File(proto, fs) => {
                if fs.block_sizes().len() != proto.links().len() {
                    return Err(UnixFsError::MalformedNode(
                        *cid,
                        format!(
                            "{} block sizes for {} links",
                            fs.block_sizes().len(),
                            proto.links().len()
                        ),
                    ));
                }
                let mut end = fs.data().len() as u64;
                let mut ends = Vec::with_capacity(fs.block_sizes().len());
                for block_size in fs.block_sizes() {
                    end = end.checked_add(*block_size).ok_or_else(|| {
                        UnixFsError::MalformedNode(*cid, "block sizes overflow".to_string())
                    })?;
                    ends.push(end);
                }
                let size = end;
                if let Some(declared) = fs.declared_file_size() {
                    if declared != size {
                        return Err(UnixFsError::MalformedNode(
                            *cid,
                            format!("declared size {declared} but content sums to {size}"),
                        ));
                    }
                }
                Ok(Self {
                    data: fs.data().clone(),
                    links: proto.links().iter().map(|link| *link.cid()).collect(),
                    ends,
                    size,
                })
            },
            _ => Err(UnixFsError::NotAFile(*cid)),
        }
    }
}

#[derive(Clone, Debug)]
struct Frame {
    segment: Arc<FileSegment>,
    start: u64,
}

impl Frame {
    fn covers(&self, offset: u64) -> bool {
        self.start <= offset && offset < self.start + self.segment.size
    }
}

/// Bytes of the node currently being read.
#[derive(Clone, Debug)]
struct Leaf {
    data: Bytes,
    start: u64,
}

impl Leaf {
    fn covers(&self, offset: u64) -> bool {
        self.start <= offset && offset < self.start + self.data.len() as u64
    }
}

/// Random access reader over a file DAG.
///
/// `read` suspends while fetching nodes, `seek` never does: it only moves the offset and unwinds
/// the frames that no longer cover it. A `read` that fails, or whose future is dropped, leaves
/// the cursor as it was.
#[derive(Debug)]
pub struct DagReader<S> {
    cid: Cid,
    store: S,
    root: Arc<FileSegment>,
    stack: Vec<Frame>,
    leaf: Option<Leaf>,
    offset: u64,
    closed: bool,
    cancel: Option<CancellationToken>,
    timeout: Option<Duration>,
}

impl<S: BlockStore> DagReader<S> {
    /// Open a reader over an already decoded root.
    pub fn new(cid: Cid, node: &Node, store: S) -> Result<Self, UnixFsError> {
        let root = Arc::new(FileSegment::from_node(&cid, node)?);
        Ok(Self {
            cid,
            store,
            stack: vec![Frame {
                segment: root.clone(),
                start: 0,
            }],
            root,
            leaf: None,
            offset: 0,
            closed: false,
            cancel: None,
            timeout: None,
        })
    }

    /// Fetch the root from `store` and open a reader over it.
    pub async fn open(cid: Cid, store: S) -> Result<Self, UnixFsError> {
        let node = get_node(&store, &cid).await?;
        Self::new(cid, &node, store)
    }

    /// Abort pending fetches with `Cancelled` once `token` fires.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Fail fetches that take longer than `timeout` with `DeadlineExceeded`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn cid(&self) -> &Cid {
        &self.cid
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Logical size of the file as declared by the root.
    pub fn size(&self) -> u64 {
        self.root.size
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Release the cursor. Later reads and seeks fail with `Closed`.
    pub fn close(&mut self) {
        self.closed = true;
        self.stack.clear();
        self.leaf = None;
    }

    /// Read at most `buf.len()` bytes from the current offset, never across a leaf boundary.
    /// Returns 0 at the end of the file.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize, UnixFsError> {
        self.ensure_open()?;
        if buf.is_empty() || self.offset >= self.size() {
            return Ok(0);
        }
        let leaf = self.current_leaf().await?;
        let pos = (self.offset - leaf.start) as usize;
        let n = buf.len().min(leaf.data.len() - pos);
        buf[..n].copy_from_slice(&leaf.data[pos..pos + n]);
        self.offset += n as u64;
        Ok(n)
    }

    /// Remainder of the current leaf, or `None` at the end of the file.
    pub async fn next_segment(&mut self) -> Result<Option<Bytes>, UnixFsError> {
        self.ensure_open()?;
        if self.offset >= self.size() {
            return Ok(None);
        }
        let leaf = self.current_leaf().await?;
        let segment = leaf.data.slice((self.offset - leaf.start) as usize..);
        self.offset += segment.len() as u64;
        Ok(Some(segment))
    }

    /// Read from the current offset to the end of the file.
    pub async fn read_to_end(&mut self) -> Result<Bytes, UnixFsError> {
        let remaining = self.size().saturating_sub(self.offset);
        let mut out = BytesMut::with_capacity(remaining as usize);
        while let Some(segment) = self.next_segment().await? {
            out.extend_from_slice(&segment);
        }
        Ok(out.freeze())
    }

    /// Stream the rest of the file one leaf segment at a time.
    pub fn into_stream(self) -> impl Stream<Item = Result<Bytes, UnixFsError>> {
        stream::try_unfold(self, |mut reader| async move {
            Ok(reader.next_segment().await?.map(|segment| (segment, reader)))
        })
    }

    /// Move the cursor. The target must lie in `[0, size]`. `End(n)` is a distance back from the
    /// end of the file: `End(0)` is the end, `End(1)` the last byte. Returns the new offset.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64, UnixFsError> {
        self.ensure_open()?;
        let target = match pos {
            SeekFrom::Start(n) => n as i128,
            SeekFrom::Current(n) => self.offset as i128 + n as i128,
            SeekFrom::End(n) => self.size() as i128 - n as i128,
        };
        if target < 0 || target > self.size() as i128 {
            return Err(UnixFsError::InvalidOffset(target));
        }
        let target = target as u64;

        if !self.leaf.as_ref().is_some_and(|leaf| leaf.covers(target)) {
            self.leaf = None;
            while self.stack.len() > 1 && !self.stack.last().is_some_and(|f| f.covers(target)) {
                self.stack.pop();
            }
        }
        self.offset = target;
        Ok(target)
    }

    fn ensure_open(&self) -> Result<(), UnixFsError> {
        if self.closed {
            Err(UnixFsError::Closed)
        } else {
            Ok(())
        }
    }

    /// The leaf covering the current offset, descending to it when needed.
    async fn current_leaf(&mut self) -> Result<Leaf, UnixFsError> {
        if let Some(leaf) = self.leaf.as_ref().filter(|leaf| leaf.covers(self.offset)) {
            return Ok(leaf.clone());
        }
        let (stack, leaf) = self.locate(self.offset).await?;
        self.stack = stack;
        self.leaf = Some(leaf.clone());
        Ok(leaf)
    }

    /// Find the leaf covering `target`, starting from the deepest frame that covers it.
    /// Works on a copy of the frame stack so nothing changes until it succeeds.
    async fn locate(&self, target: u64) -> Result<(Vec<Frame>, Leaf), UnixFsError> {
        let mut stack = self.stack.clone();
        while !stack.last().is_some_and(|frame| frame.covers(target)) {
            if stack.pop().is_none() {
                break;
            }
        }
        if stack.is_empty() {
            stack.push(Frame {
                segment: self.root.clone(),
                start: 0,
            });
        }

        loop {
            let frame = stack.last().cloned().ok_or(UnixFsError::InvalidOffset(target as i128))?;
            let segment = &frame.segment;
            let rel = target - frame.start;
            if rel < segment.data.len() as u64 {
                return Ok((
                    stack,
                    Leaf {
                        data: segment.data.clone(),
                        start: frame.start,
                    },
                ));
            }

            let index = segment.ends.partition_point(|&end| end <= rel);
            let (cid, end) = match (segment.links.get(index), segment.ends.get(index)) {
                (Some(cid), Some(end)) => (*cid, *end),
                _ => return Err(UnixFsError::InvalidOffset(target as i128)),
            };
            let child_rel = match index {
                0 => segment.data.len() as u64,
                i => segment.ends[i - 1],
            };

            trace!("descending into child {index} ({cid}) for offset {target}");
            let node = self.fetch(&cid).await?;
            let child = FileSegment::from_node(&cid, &node).map_err(|e| match e {
                UnixFsError::NotAFile(cid) => {
                    UnixFsError::MalformedNode(cid, "child of a file is not a file".to_string())
                },
                e => e,
            })?;
            if child.size != end - child_rel {
                return Err(UnixFsError::MalformedNode(
                    cid,
                    format!("size {} but parent expects {}", child.size, end - child_rel),
                ));
            }
            stack.push(Frame {
                segment: Arc::new(child),
                start: frame.start + child_rel,
            });
        }
    }

    async fn fetch(&self, cid: &Cid) -> Result<Node, UnixFsError> {
        let fetch = async {
            match self.timeout {
                Some(timeout) => tokio::time::timeout(timeout, get_node(&self.store, cid))
                    .await
                    .map_err(|_| UnixFsError::DeadlineExceeded(*cid))?,
                None => get_node(&self.store, cid).await,
            }
        };
        match &self.cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(UnixFsError::Cancelled),
                    res = fetch => res,
                }
            },
            None => fetch.await,
        }
    }
}
