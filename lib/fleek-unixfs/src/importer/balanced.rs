//! Balanced layout.
//!
//! Every internal node is filled up to `max_links` children before a sibling is started, and the
//! tree only grows a level when the current one is full:
//!
//! ```text
//!                                +-------------+
//!                                |   Root 4    |
//!                                +-------------+
//!                                      |
//!           +--------------------------+----------------------------+
//!           |                                                       |
//!     +-------------+                                         +-------------+
//!     |   Node 2    |                                         |   Node 5    |
//!     +-------------+                                         +-------------+
//!           |                                                       |
//!   +-------+------+                                                |
//!   |              |                                                |
//! +===+          +===+                                            +===+
//! | 1 |          | 3 |                                            | 6 |
//! +===+          +===+                                            +===+
//! ```
//!
//! Only the rightmost path can hold fewer than `max_links` children. A single chunk is returned
//! as the root itself, an empty input as an empty leaf.
use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::debug;

use super::helpers::{DagBuilderHelper, FileNodeBuilder};
use crate::dag_pb::BuiltNode;
use crate::errors::UnixFsError;
use crate::store::BlockStore;

pub async fn layout<S: BlockStore + ?Sized>(
    mut db: DagBuilderHelper<'_, S>,
) -> Result<BuiltNode, UnixFsError> {
    // Empty input yields an empty leaf, a single chunk yields the leaf itself.
    let mut root = db.new_leaf_data_node().await?;
    let mut depth = 1;
    while !db.done().await? {
        // The current root is full: it becomes the first child of a new, deeper root.
        let mut new_root = FileNodeBuilder::new();
        new_root.add_child(root, &mut db).await?;
        root = fill_node_rec(&mut db, new_root, depth).await?;
        depth += 1;
    }
    let nodes = db.nodes() + 1;
    let root = db.finish(root).await?;
    debug!(
        "balanced layout: root {} depth {} size {} nodes {nodes}",
        root.cid(),
        depth - 1,
        root.file_size()
    );
    Ok(root)
}

/// Fill `node` with children of `depth - 1` (leaves at depth 1) until it is full or the chunks
/// run out.
fn fill_node_rec<'a, 'b, S: BlockStore + ?Sized>(
    db: &'a mut DagBuilderHelper<'b, S>,
    mut node: FileNodeBuilder,
    depth: usize,
) -> BoxFuture<'a, Result<BuiltNode, UnixFsError>>
where
    'b: 'a,
{
    async move {
        debug_assert!(depth >= 1);
        while node.num_children() < db.max_links() && !db.done().await? {
            let child = if depth == 1 {
                db.new_leaf_data_node().await?
            } else {
                fill_node_rec(&mut *db, FileNodeBuilder::new(), depth - 1).await?
            };
            node.add_child(child, db).await?;
        }
        node.commit(db)
    }
    .boxed()
}
