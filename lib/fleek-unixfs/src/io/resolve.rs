use ipld_core::cid::Cid;
use tracing::trace;

use crate::dag_pb::{Link, Node};
use crate::errors::UnixFsError;
use crate::hamt::Shard;
use crate::store::{get_node, BlockStore};
use crate::unixfs::NodeView;

/// Resolve the first of `names` against `node`.
///
/// Sharded directories are searched by hashed name, every other DAG-PB node by link name.
/// Returns the matching link and the names left to resolve.
pub async fn resolve_once<S: BlockStore + ?Sized>(
    store: &S,
    node: &Node,
    names: &[String],
) -> Result<(Link, Vec<String>), UnixFsError> {
    let (name, rest) = names.split_first().ok_or(UnixFsError::EmptyPath)?;
    let link = match NodeView::of(node) {
        NodeView::HamtShard(proto, fs) => Shard::new(proto.clone(), &fs)?.find(store, name).await?,
        NodeView::File(proto, _)
        | NodeView::Directory(proto, _)
        | NodeView::Symlink(proto, _)
        | NodeView::Metadata(proto, _)
        | NodeView::Generic(proto) => proto.get_link(name)?.clone(),
        NodeView::RawLeaf(_) => return Err(UnixFsError::NoSuchLink(name.clone())),
    };
    Ok((link, rest.to_vec()))
}

/// Follow `names` from `root` and return the CID they lead to.
pub async fn resolve_path<S: BlockStore + ?Sized>(
    store: &S,
    root: &Cid,
    names: &[String],
) -> Result<Cid, UnixFsError> {
    let mut cid = *root;
    let mut names = names.to_vec();
    while !names.is_empty() {
        let node = get_node(store, &cid).await?;
        let (link, rest) = resolve_once(store, &node, &names).await?;
        trace!("resolved {} to {}", names[0], link.cid());
        cid = *link.cid();
        names = rest;
    }
    Ok(cid)
}
