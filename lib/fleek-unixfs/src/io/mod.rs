//! Reading imported content back: the seekable file reader and path resolution.
mod reader;
mod resolve;

pub use reader::DagReader;
pub use resolve::{resolve_once, resolve_path};
