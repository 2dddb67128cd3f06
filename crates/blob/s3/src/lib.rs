//! Blob store backed by Amazon S3 or any S3-compatible service (`MinIO`,
//! `LocalStack`).
//!
//! The store's namespace is the bucket name. Object keys are the caller's
//! keys with an optional configured prefix.

pub mod auth;
pub mod config;
pub mod error;
mod store;

pub use config::S3BlobConfig;
pub use store::S3BlobStore;
