//! Trickle layout.
//!
//! Optimized for streaming reads: every node starts with a layer of up to `max_links` leaves,
//! followed by [`LAYER_REPEAT`] subtrees of depth 1, then `LAYER_REPEAT` of depth 2, and so on.
//! Subtree depth is bounded by the depth of the slot they fill, the root is unbounded. The first
//! bytes of the file are reachable through shallow paths no matter how large the file grows.
//!
//! A node that would end up holding one leaf and nothing else is replaced by that leaf.
use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::debug;

use super::helpers::{DagBuilderHelper, FileNodeBuilder};
use crate::dag_pb::BuiltNode;
use crate::errors::UnixFsError;
use crate::store::BlockStore;

/// Subtrees of each depth appended to a node after its leaf layer.
pub const LAYER_REPEAT: usize = 4;

pub async fn layout<S: BlockStore + ?Sized>(
    mut db: DagBuilderHelper<'_, S>,
) -> Result<BuiltNode, UnixFsError> {
    let root = fill_trickle_rec(&mut db, None).await?;
    let nodes = db.nodes() + 1;
    let root = db.finish(root).await?;
    debug!(
        "trickle layout: root {} size {} nodes {nodes}",
        root.cid(),
        root.file_size()
    );
    Ok(root)
}

/// Build one trickle node holding subtrees strictly shallower than `max_depth`.
fn fill_trickle_rec<'a, 'b, S: BlockStore + ?Sized>(
    db: &'a mut DagBuilderHelper<'b, S>,
    max_depth: Option<usize>,
) -> BoxFuture<'a, Result<BuiltNode, UnixFsError>>
where
    'b: 'a,
{
    async move {
        // Also covers the empty input: the first leaf is then empty.
        let first = db.new_leaf_data_node().await?;
        if db.done().await? {
            return Ok(first);
        }

        let mut node = FileNodeBuilder::new();
        node.add_child(first, db).await?;
        db.fill_node_layer(&mut node).await?;

        let mut depth = 1;
        while max_depth.map_or(true, |max| depth < max) {
            if db.done().await? {
                break;
            }
            let mut repeat = 0;
            while repeat < LAYER_REPEAT && !db.done().await? {
                let child = fill_trickle_rec(&mut *db, Some(depth)).await?;
                node.add_child(child, db).await?;
                repeat += 1;
            }
            depth += 1;
        }
        node.commit(db)
    }
    .boxed()
}
