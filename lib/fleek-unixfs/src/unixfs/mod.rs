//! UnixFS data model on top of DAG-PB nodes.
//!
//! Every UnixFS node stores a protobuf `Data` message in the `Data` field of its DAG-PB node.
//! [`FsNode`] is the owned, mutable view of that message used by the importer, and
//! [`NodeView`] classifies a decoded [`Node`] into the closed set of node kinds the reader and
//! the resolver dispatch on.
mod proto;

use std::borrow::Cow;

use bytes::Bytes;
pub use proto::unixfs::mod_Data::DataType;
pub use proto::unixfs::{Data, Metadata};
use quick_protobuf::{BytesReader, MessageRead, MessageWrite, Writer};

use crate::dag_pb::{Node, ProtoNode};
use crate::errors::UnixFsError;

/// Multihash code of murmur3-x64-64, the only hash function HAMT shards use.
pub const HASH_MURMUR3: u64 = 0x22;

/// Owned UnixFS `Data` message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FsNode {
    kind: DataType,
    data: Bytes,
    file_size: Option<u64>,
    block_sizes: Vec<u64>,
    hash_type: Option<u64>,
    fanout: Option<u64>,
}

impl FsNode {
    pub fn new(kind: DataType) -> Self {
        Self {
            kind,
            data: Bytes::new(),
            file_size: None,
            block_sizes: Vec::new(),
            hash_type: None,
            fanout: None,
        }
    }

    /// Parse the protobuf payload of a DAG-PB node.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, UnixFsError> {
        if bytes.is_empty() {
            let err = quick_protobuf::Error::Message("missing required field Type".into());
            return Err(err.into());
        }
        let data = Data::from_reader(&mut BytesReader::from_bytes(bytes), bytes)?;
        Ok(Self {
            kind: data.Type,
            data: data
                .Data
                .map(|d| Bytes::copy_from_slice(&d))
                .unwrap_or_default(),
            file_size: data.filesize,
            block_sizes: data.blocksizes,
            hash_type: data.hashType,
            fanout: data.fanout,
        })
    }

    /// Encode the message. File-like nodes always carry their computed `filesize`.
    pub fn to_bytes(&self) -> Result<Bytes, UnixFsError> {
        let file_size = match self.kind {
            DataType::File | DataType::Raw => Some(self.file_size()),
            _ => self.file_size,
        };
        let msg = Data {
            Type: self.kind,
            Data: (!self.data.is_empty()).then(|| Cow::Borrowed(self.data.as_ref())),
            filesize: file_size,
            blocksizes: self.block_sizes.clone(),
            hashType: self.hash_type,
            fanout: self.fanout,
        };
        let mut buf = Vec::with_capacity(msg.get_size());
        let mut writer = Writer::new(&mut buf);
        msg.write_message(&mut writer)?;
        Ok(buf.into())
    }

    pub fn kind(&self) -> DataType {
        self.kind
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn set_data(&mut self, data: Bytes) {
        self.data = data;
    }

    pub fn block_sizes(&self) -> &[u64] {
        &self.block_sizes
    }

    pub fn add_block_size(&mut self, size: u64) {
        self.block_sizes.push(size);
    }

    pub fn num_children(&self) -> usize {
        self.block_sizes.len()
    }

    /// Logical size: inline data followed by every child's logical size. Saturates on a size
    /// table that does not fit in `u64`, see [`FsNode::checked_file_size`].
    pub fn file_size(&self) -> u64 {
        self.block_sizes
            .iter()
            .fold(self.data.len() as u64, |acc, size| acc.saturating_add(*size))
    }

    /// Logical size, or `None` when the size table overflows.
    pub fn checked_file_size(&self) -> Option<u64> {
        self.block_sizes
            .iter()
            .try_fold(self.data.len() as u64, |acc, size| acc.checked_add(*size))
    }

    /// The `filesize` field as stored, if any.
    pub fn declared_file_size(&self) -> Option<u64> {
        self.file_size
    }

    pub fn hash_type(&self) -> Option<u64> {
        self.hash_type
    }

    pub fn set_hash_type(&mut self, hash_type: u64) {
        self.hash_type = Some(hash_type);
    }

    pub fn fanout(&self) -> Option<u64> {
        self.fanout
    }

    pub fn set_fanout(&mut self, fanout: u64) {
        self.fanout = Some(fanout);
    }
}

/// Closed classification of a decoded node.
#[derive(Debug)]
pub enum NodeView<'a> {
    /// A `raw` codec block: bytes only.
    RawLeaf(&'a Bytes),
    /// UnixFS `File` or `Raw` typed node, leaf or internal.
    File(&'a ProtoNode, FsNode),
    Directory(&'a ProtoNode, FsNode),
    HamtShard(&'a ProtoNode, FsNode),
    Symlink(&'a ProtoNode, FsNode),
    Metadata(&'a ProtoNode, FsNode),
    /// A DAG-PB node whose payload is not UnixFS.
    Generic(&'a ProtoNode),
}

impl<'a> NodeView<'a> {
    pub fn of(node: &'a Node) -> Self {
        match node {
            Node::Raw(data) => Self::RawLeaf(data),
            Node::Proto(proto) => match FsNode::from_bytes(proto.data()) {
                Err(_) => Self::Generic(proto),
                Ok(fs) => match fs.kind() {
                    DataType::File | DataType::Raw => Self::File(proto, fs),
                    DataType::Directory => Self::Directory(proto, fs),
                    DataType::HAMTShard => Self::HamtShard(proto, fs),
                    DataType::Symlink => Self::Symlink(proto, fs),
                    DataType::Metadata => Self::Metadata(proto, fs),
                },
            },
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, Self::RawLeaf(_) | Self::File(..))
    }
}
