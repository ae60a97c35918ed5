//! File importer: turns a chunk stream into a UnixFS DAG.
//!
//! Both layouts share [`helpers::DagBuilderHelper`]. Blocks are written children first, so a
//! store never holds a parent whose children are missing. The root is the last block written;
//! when a build fails, no root is returned and none is persisted.
pub mod balanced;
pub mod helpers;
pub mod trickle;

use tokio::io::AsyncRead;
use tracing::{debug, info};

use crate::chunker::{SizeSplitter, Splitter};
use crate::config::{Config, Layout};
use crate::dag_pb::BuiltNode;
use crate::errors::UnixFsError;
pub use crate::importer::helpers::DagBuilderParams;
use crate::store::BlockStore;

/// Build a balanced DAG over the chunks of `splitter`.
pub async fn build_balanced<S: BlockStore + ?Sized>(
    store: &S,
    splitter: impl Splitter,
    params: &DagBuilderParams,
) -> Result<BuiltNode, UnixFsError> {
    balanced::layout(params.new_helper(store, splitter)).await
}

/// Build a trickle DAG over the chunks of `splitter`.
pub async fn build_trickle<S: BlockStore + ?Sized>(
    store: &S,
    splitter: impl Splitter,
    params: &DagBuilderParams,
) -> Result<BuiltNode, UnixFsError> {
    trickle::layout(params.new_helper(store, splitter)).await
}

/// Chunk `reader` with fixed-size chunks and build the layout selected by `config`.
pub async fn import<S, R>(store: &S, reader: R, config: &Config) -> Result<BuiltNode, UnixFsError>
where
    S: BlockStore + ?Sized,
    R: AsyncRead + Unpin + Send,
{
    let params = DagBuilderParams::from_config(config)?;
    let splitter = SizeSplitter::new(reader, config.chunk_size);
    debug!(
        "importing with {:?} layout, chunk size {}, max links {}",
        config.layout, config.chunk_size, params.max_links
    );
    let root = match config.layout {
        Layout::Balanced => build_balanced(store, splitter, &params).await?,
        Layout::Trickle => build_trickle(store, splitter, &params).await?,
    };
    info!("imported {} bytes as {}", root.file_size(), root.cid());
    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag_pb::Node;
    use crate::store::{get_node, MemoryBlockStore};
    use crate::unixfs::NodeView;

    #[tokio::test]
    async fn test_single_chunk_is_the_root() {
        for layout in [Layout::Balanced, Layout::Trickle] {
            let store = MemoryBlockStore::default();
            let config = Config {
                layout,
                chunk_size: 64,
                ..Default::default()
            };
            let root = import(&store, &b"short"[..], &config).await.unwrap();
            assert!(root.is_leaf());
            assert_eq!(root.file_size(), 5);
            assert_eq!(store.len(), 1);
        }
    }

    #[tokio::test]
    async fn test_raw_leaves_under_internal_root() {
        let store = MemoryBlockStore::default();
        let config = Config {
            chunk_size: 4,
            raw_leaves: true,
            cid_version: 1,
            ..Default::default()
        };
        let root = import(&store, &b"0123456789"[..], &config).await.unwrap();
        assert_eq!(root.file_size(), 10);
        assert_eq!(root.node().links().len(), 3);
        for link in root.node().links() {
            let child = get_node(&store, link.cid()).await.unwrap();
            assert!(matches!(child, Node::Raw(_)));
        }
        match NodeView::of(root.node()) {
            NodeView::File(_, fs) => assert_eq!(fs.block_sizes(), &[4, 4, 2]),
            other => panic!("unexpected root {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_balanced_grows_a_level_when_full() {
        let store = MemoryBlockStore::default();
        let params = DagBuilderParams::builder().max_links(2).build();
        let data = [3u8; 5];
        let root = build_balanced(&store, SizeSplitter::new(&data[..], 1), &params)
            .await
            .unwrap();
        // 5 leaves with 2 links per node: root -> [[[1, 2], [3, 4]], [[5]]]
        assert_eq!(root.node().links().len(), 2);
        let left = get_node(&store, root.node().links()[0].cid()).await.unwrap();
        assert_eq!(left.links().len(), 2);
        match NodeView::of(root.node()) {
            NodeView::File(_, fs) => assert_eq!(fs.block_sizes(), &[4, 1]),
            other => panic!("unexpected root {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_trickle_leaf_layer_then_repeats() {
        let store = MemoryBlockStore::default();
        let params = DagBuilderParams::builder().max_links(2).build();
        let data = [9u8; 7];
        let root = build_trickle(&store, SizeSplitter::new(&data[..], 1), &params)
            .await
            .unwrap();
        // Two leaves, then depth-1 subtrees of two leaves each, the last one collapsed.
        let links = root.node().links();
        assert_eq!(links.len(), 5);
        let sizes = match NodeView::of(root.node()) {
            NodeView::File(_, fs) => fs.block_sizes().to_vec(),
            other => panic!("unexpected root {other:?}"),
        };
        assert_eq!(sizes, vec![1, 1, 2, 2, 1]);
        let last = get_node(&store, links[4].cid()).await.unwrap();
        assert!(last.links().is_empty());
        let third = get_node(&store, links[2].cid()).await.unwrap();
        assert_eq!(third.links().len(), 2);
    }
}
