pub mod body;
pub mod error;
pub mod store;
pub mod testing;

pub use body::BlobBody;
pub use error::BlobError;
pub use store::BlobStore;
