use std::io::SeekFrom;
use std::path::PathBuf;

use fleek_unixfs::store::{FsBlockStore, FsStoreConfig};
use fleek_unixfs::{import, Config, DagReader, Layout};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let path = std::env::args().nth(1).map(PathBuf::from);
    let data = match &path {
        Some(path) => tokio::fs::read(path).await?,
        None => (0..1_000_000u32).map(|i| (i % 251) as u8).collect(),
    };

    let store = FsBlockStore::init(FsStoreConfig::default()).await?;
    for layout in [Layout::Balanced, Layout::Trickle] {
        let config = Config {
            layout,
            chunk_size: 64 * 1024,
            ..Default::default()
        };
        let root = import(&store, &data[..], &config).await?;
        println!("{layout:?}: {} ({} bytes)", root.cid(), root.file_size());

        let mut reader = DagReader::open(*root.cid(), store.clone())
            .await?
            .with_timeout(config.fetch_timeout);
        let middle = reader.size() / 2;
        reader.seek(SeekFrom::Start(middle))?;
        let tail = reader.read_to_end().await?;
        anyhow::ensure!(tail.as_ref() == &data[middle as usize..], "content mismatch");
    }
    Ok(())
}
