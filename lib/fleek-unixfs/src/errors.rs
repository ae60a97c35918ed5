use ipld_core::cid::Cid;
use thiserror::Error;

/// Error type for UnixFS operations
#[derive(Debug, Error)]
pub enum UnixFsError {
    #[error("UnixFS error: Malformed node - Cid {0} - {1}")]
    MalformedNode(Cid, String),

    #[error("UnixFS error: Error parsing Cid {0}")]
    Cid(#[from] ipld_core::cid::Error),

    #[error("UnixFS error: Error decoding DAG-PB data {0}")]
    DagPb(#[from] ipld_dagpb::Error),

    #[error("UnixFS error: Error decoding UnixFS data {0}")]
    Protobuf(#[from] quick_protobuf::Error),

    #[error("UnixFS error: Unsupported codec - Cid {0}")]
    UnsupportedCodec(Cid),

    #[error("UnixFS error: Entry {0} not found")]
    NotFound(String),

    #[error("UnixFS error: No link named {0}")]
    NoSuchLink(String),

    #[error("UnixFS error: Cannot resolve an empty path")]
    EmptyPath,

    #[error("UnixFS error: Invalid offset {0}")]
    InvalidOffset(i128),

    #[error("UnixFS error: Node is not a file - Cid {0}")]
    NotAFile(Cid),

    #[error("UnixFS error: Block not found - Cid {0}")]
    BlockNotFound(Cid),

    #[error("UnixFS error: Block store failure {0}")]
    Store(#[from] std::io::Error),

    #[error("UnixFS error: Error fetching block from gateway {0}")]
    Http(#[from] reqwest::Error),

    #[error("UnixFS error: Gateway answered with status {0}")]
    HttpStatus(reqwest::StatusCode),

    #[error("UnixFS error: Error gateway URL {0}")]
    Url(#[from] url::ParseError),

    #[error("UnixFS error: Block store is read only")]
    ReadOnlyStore,

    #[error("UnixFS error: Error validating hash - Cid {0}")]
    HashMismatch(Cid),

    #[error("UnixFS error: Unsupported multihash code {0}")]
    UnsupportedHash(u64),

    #[error("UnixFS error: Error building multihash {0}")]
    Multihash(#[from] multihash::Error),

    #[error("UnixFS error: Invalid HAMT shard - {0}")]
    InvalidShard(String),

    #[error("UnixFS error: Operation cancelled")]
    Cancelled,

    #[error("UnixFS error: Deadline exceeded while fetching Cid {0}")]
    DeadlineExceeded(Cid),

    #[error("UnixFS error: Reader is closed")]
    Closed,

    #[error("UnixFS error: Error reading chunk {0}")]
    Chunker(std::io::Error),

    #[error("UnixFS error: Invalid configuration - {0}")]
    InvalidConfig(String),
}

impl UnixFsError {
    /// Whether the error is a negative lookup result rather than a fault.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::NoSuchLink(_) | Self::BlockNotFound(_)
        )
    }
}
