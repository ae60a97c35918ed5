//! UnixFS file DAGs over a content addressed block store.
//!
//! [`importer`] chunks a byte stream and lays it out as a balanced or trickle DAG,
//! [`io::DagReader`] reads it back with random access and [`io::resolve_once`] walks
//! directories, sharded or not.
pub mod chunker;
pub mod config;
pub mod dag_pb;
pub mod errors;
pub mod hamt;
pub mod importer;
pub mod io;
pub mod prefix;
pub mod store;
pub mod unixfs;

pub use config::{Config, Layout};
pub use errors::UnixFsError;
pub use importer::{build_balanced, build_trickle, import, DagBuilderParams};
pub use io::{resolve_once, resolve_path, DagReader};
