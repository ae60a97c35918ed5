//! DAG-PB and raw nodes.
//!
//! A [`Node`] is either a `raw` block or a DAG-PB [`ProtoNode`]. Encoding and decoding of DAG-PB
//! goes through `ipld_dagpb`; what the `Data` payload means is left to [`crate::unixfs`].
use bytes::Bytes;
use ipld_core::cid::Cid;
use ipld_dagpb::{PbLink, PbNode};

use crate::errors::UnixFsError;
use crate::prefix::{CidBuilder, DAG_PB, RAW};

/// A link to another node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Link {
    cid: Cid,
    name: Option<String>,
    size: Option<u64>,
}

impl From<Cid> for Link {
    fn from(cid: Cid) -> Self {
        Self::new(cid, None, None)
    }
}

impl From<&PbLink> for Link {
    fn from(link: &PbLink) -> Self {
        Link::new(link.cid, link.name.clone(), link.size)
    }
}

impl From<&Link> for PbLink {
    fn from(link: &Link) -> Self {
        PbLink {
            cid: link.cid,
            name: link.name.clone(),
            size: link.size,
        }
    }
}

impl Link {
    pub fn new(cid: Cid, name: Option<String>, size: Option<u64>) -> Self {
        Self { cid, name, size }
    }

    pub fn cid(&self) -> &Cid {
        &self.cid
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Cumulative encoded size of the linked subtree (`Tsize`).
    pub fn size(&self) -> Option<u64> {
        self.size
    }
}

/// A DAG-PB node: opaque payload plus ordered links.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProtoNode {
    data: Bytes,
    links: Vec<Link>,
}

impl ProtoNode {
    pub fn new(data: Bytes, links: Vec<Link>) -> Self {
        Self { data, links }
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn add_link(&mut self, link: Link) {
        self.links.push(link);
    }

    /// First link carrying exactly `name`.
    pub fn get_link(&self, name: &str) -> Result<&Link, UnixFsError> {
        self.links
            .iter()
            .find(|link| link.name() == Some(name))
            .ok_or_else(|| UnixFsError::NoSuchLink(name.to_string()))
    }

    pub fn from_bytes(bytes: Bytes) -> Result<Self, UnixFsError> {
        let node = PbNode::from_bytes(bytes)?;
        Ok(Self {
            data: node.data.unwrap_or_default(),
            links: node.links.iter().map(Into::into).collect(),
        })
    }

    pub fn to_bytes(&self) -> Bytes {
        let node = PbNode {
            links: self.links.iter().map(Into::into).collect(),
            data: (!self.data.is_empty()).then(|| self.data.clone()),
        };
        node.into_bytes().into()
    }
}

/// Any node this crate stores or reads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    Raw(Bytes),
    Proto(ProtoNode),
}

impl From<ProtoNode> for Node {
    fn from(node: ProtoNode) -> Self {
        Self::Proto(node)
    }
}

impl Node {
    /// Decode a block, dispatching on the codec recorded in its CID.
    pub fn decode(cid: &Cid, bytes: Bytes) -> Result<Self, UnixFsError> {
        match cid.codec() {
            DAG_PB => ProtoNode::from_bytes(bytes)
                .map(Self::Proto)
                .map_err(|e| UnixFsError::MalformedNode(*cid, e.to_string())),
            RAW => Ok(Self::Raw(bytes)),
            _ => Err(UnixFsError::UnsupportedCodec(*cid)),
        }
    }

    pub fn encode(&self) -> Bytes {
        match self {
            Self::Raw(data) => data.clone(),
            Self::Proto(node) => node.to_bytes(),
        }
    }

    pub fn codec(&self) -> u64 {
        match self {
            Self::Raw(_) => RAW,
            Self::Proto(_) => DAG_PB,
        }
    }

    pub fn links(&self) -> &[Link] {
        match self {
            Self::Raw(_) => &[],
            Self::Proto(node) => node.links(),
        }
    }
}

/// An encoded block ready for the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub cid: Cid,
    pub data: Bytes,
}

impl Block {
    pub fn new(cid: Cid, data: Bytes) -> Self {
        Self { cid, data }
    }
}

/// A node whose identity is fixed: encoded, hashed and sized.
#[derive(Clone, Debug)]
pub struct BuiltNode {
    cid: Cid,
    node: Node,
    encoded: Bytes,
    file_size: u64,
    cumulative_size: u64,
}

impl BuiltNode {
    /// Encode `node` and derive its CID. `file_size` is the logical size of the subtree.
    pub fn new(node: Node, file_size: u64, builder: &dyn CidBuilder) -> Result<Self, UnixFsError> {
        let encoded = node.encode();
        let cid = builder.build(node.codec(), &encoded)?;
        let cumulative_size = encoded.len() as u64
            + node
                .links()
                .iter()
                .map(|link| link.size().unwrap_or_default())
                .sum::<u64>();
        Ok(Self {
            cid,
            node,
            encoded,
            file_size,
            cumulative_size,
        })
    }

    pub fn cid(&self) -> &Cid {
        &self.cid
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn into_node(self) -> Node {
        self.node
    }

    /// Logical number of file bytes under this node.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Encoded size of this node plus every block below it.
    pub fn cumulative_size(&self) -> u64 {
        self.cumulative_size
    }

    pub fn is_leaf(&self) -> bool {
        self.node.links().is_empty()
    }

    pub fn to_block(&self) -> Block {
        Block::new(self.cid, self.encoded.clone())
    }

    /// Unnamed link as used between file nodes.
    pub fn to_link(&self) -> Link {
        Link::new(self.cid, Some(String::new()), Some(self.cumulative_size))
    }
}
