//! Blob store that keeps one file per object under a local directory.
//!
//! Objects are written to a `.part` file and renamed into place once the
//! full payload has been received, so readers never observe a partial
//! object.

mod store;

pub use store::FsBlobStore;
