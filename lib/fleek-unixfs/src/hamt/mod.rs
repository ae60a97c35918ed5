//! Read-only view over HAMT sharded directories.
//!
//! A shard node is a DAG-PB node whose UnixFS payload has type `HAMTShard`, a power of two
//! `fanout` and `hashType` murmur3. Its links are named by the upper-case hex slot index, padded
//! to the width of `fanout - 1`. A link named by the slot index alone points to a child shard,
//! one named by the slot index followed by the entry name is the entry itself.
//!
//! Lookup hashes the entry name with murmur3-x64-64 and consumes `log2(fanout)` bits of the
//! digest per level, most significant bit first.
use std::io::Cursor;

use ipld_core::cid::Cid;
use tracing::trace;

use crate::dag_pb::{Link, Node, ProtoNode};
use crate::errors::UnixFsError;
use crate::store::{get_node, BlockStore};
use crate::unixfs::{DataType, FsNode, HASH_MURMUR3};

/// murmur3-x64-64 digest of `name`, big-endian.
pub fn hash_key(name: &str) -> Result<[u8; 8], UnixFsError> {
    let hash = murmur3::murmur3_x64_128(&mut Cursor::new(name.as_bytes()), 0)?;
    Ok((hash as u64).to_be_bytes())
}

/// Consumes a digest a few bits at a time, most significant bit first.
#[derive(Debug)]
pub struct HashBits<'a> {
    bytes: &'a [u8],
    consumed: usize,
}

impl<'a> HashBits<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, consumed: 0 }
    }

    /// The next `width` bits as an integer.
    pub fn next(&mut self, width: u32) -> Result<usize, UnixFsError> {
        let width = width as usize;
        if self.consumed + width > self.bytes.len() * 8 {
            return Err(UnixFsError::InvalidShard(
                "sharded directory too deep".to_string(),
            ));
        }
        let mut out = 0;
        for _ in 0..width {
            let byte = self.bytes[self.consumed / 8];
            let bit = (byte >> (7 - self.consumed % 8)) & 1;
            out = (out << 1) | bit as usize;
            self.consumed += 1;
        }
        Ok(out)
    }
}

/// One level of a sharded directory.
#[derive(Clone, Debug)]
pub struct Shard {
    node: ProtoNode,
    bit_width: u32,
    pad_len: usize,
}

impl Shard {
    /// Validate the shard parameters of `node`.
    pub fn new(node: ProtoNode, fs: &FsNode) -> Result<Self, UnixFsError> {
        if fs.kind() != DataType::HAMTShard {
            return Err(UnixFsError::InvalidShard(format!(
                "node has type {:?}",
                fs.kind()
            )));
        }
        match fs.hash_type() {
            Some(HASH_MURMUR3) => {},
            other => {
                return Err(UnixFsError::InvalidShard(format!(
                    "unsupported hash function {other:?}"
                )))
            },
        }
        let fanout = fs
            .fanout()
            .ok_or_else(|| UnixFsError::InvalidShard("missing fanout".to_string()))?;
        if fanout < 2 || !fanout.is_power_of_two() {
            return Err(UnixFsError::InvalidShard(format!(
                "fanout {fanout} is not a power of two"
            )));
        }
        Ok(Self {
            node,
            bit_width: fanout.trailing_zeros(),
            pad_len: format!("{:X}", fanout - 1).len(),
        })
    }

    pub fn from_node(cid: &Cid, node: Node) -> Result<Self, UnixFsError> {
        match node {
            Node::Proto(node) => {
                let fs = FsNode::from_bytes(node.data())
                    .map_err(|e| UnixFsError::MalformedNode(*cid, e.to_string()))?;
                Self::new(node, &fs)
            },
            Node::Raw(_) => Err(UnixFsError::InvalidShard(format!(
                "child shard {cid} is a raw block"
            ))),
        }
    }

    pub fn bit_width(&self) -> u32 {
        self.bit_width
    }

    /// Link name prefix of a slot.
    pub fn slot_prefix(&self, index: usize) -> String {
        format!("{:0width$X}", index, width = self.pad_len)
    }

    /// Look `name` up, descending into child shards through `store`.
    pub async fn find<S: BlockStore + ?Sized>(
        self,
        store: &S,
        name: &str,
    ) -> Result<Link, UnixFsError> {
        let digest = hash_key(name)?;
        let mut bits = HashBits::new(&digest);
        let mut shard = self;
        loop {
            let prefix = shard.slot_prefix(bits.next(shard.bit_width)?);
            let link = shard
                .node
                .links()
                .iter()
                .find(|link| link.name().unwrap_or_default().starts_with(&prefix))
                .ok_or_else(|| UnixFsError::NotFound(name.to_string()))?;
            let rest = &link.name().unwrap_or_default()[prefix.len()..];
            if rest.is_empty() {
                trace!("descending into child shard {} for {name}", link.cid());
                let cid = *link.cid();
                shard = Self::from_node(&cid, get_node(store, &cid).await?)?;
            } else if rest == name {
                return Ok(link.clone());
            } else {
                return Err(UnixFsError::NotFound(name.to_string()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_bits_msb_first() {
        let bytes = [0b1010_0101, 0b1111_0000];
        let mut bits = HashBits::new(&bytes);
        assert_eq!(bits.next(4).unwrap(), 0b1010);
        assert_eq!(bits.next(6).unwrap(), 0b0101_11);
        assert_eq!(bits.next(6).unwrap(), 0b11_0000);
        assert!(bits.next(1).is_err());
    }

    #[test]
    fn test_shard_parameters() {
        let mut fs = FsNode::new(DataType::HAMTShard);
        fs.set_hash_type(HASH_MURMUR3);
        fs.set_fanout(256);
        let shard = Shard::new(ProtoNode::default(), &fs).unwrap();
        assert_eq!(shard.bit_width(), 8);
        assert_eq!(shard.slot_prefix(10), "0A");

        fs.set_fanout(16);
        let shard = Shard::new(ProtoNode::default(), &fs).unwrap();
        assert_eq!(shard.slot_prefix(10), "A");

        fs.set_fanout(100);
        assert!(matches!(
            Shard::new(ProtoNode::default(), &fs),
            Err(UnixFsError::InvalidShard(_))
        ));
    }

    #[test]
    fn test_rejects_other_hash_functions() {
        let mut fs = FsNode::new(DataType::HAMTShard);
        fs.set_hash_type(0x12);
        fs.set_fanout(256);
        assert!(Shard::new(ProtoNode::default(), &fs).is_err());
    }

    #[test]
    fn test_hash_key_is_stable() {
        assert_eq!(hash_key("a").unwrap(), hash_key("a").unwrap());
        assert_ne!(hash_key("a").unwrap(), hash_key("b").unwrap());
    }

    #[tokio::test]
    async fn test_missing_slot_is_not_found() {
        let mut fs = FsNode::new(DataType::HAMTShard);
        fs.set_hash_type(HASH_MURMUR3);
        fs.set_fanout(256);
        let shard = Shard::new(ProtoNode::default(), &fs).unwrap();
        let store = crate::store::MemoryBlockStore::default();
        let err = shard.find(&store, "missing").await.unwrap_err();
        assert!(err.is_not_found());
    }
}
