//! Discovery: listing a prefix and keeping the backlog of work for it.

pub mod file_source;
pub mod lister;
pub mod local;

pub use file_source::FileSource;
pub use lister::{Listing, MemoryLister, ObjectLister};
pub use local::LocalLister;
