//! The expiring-object lifecycle manager.
//!
//! [`LifecycleManager`] binds a generated [`ObjectId`](vanish_core::ObjectId)
//! to a payload in a [`BlobStore`](vanish_blob::BlobStore) and a deadline in a
//! [`MetadataStore`](vanish_metadata::MetadataStore), and reclaims both halves
//! once the deadline passes. [`Reaper`] drives reclamation on a fixed
//! interval without ever overlapping passes.

pub mod builder;
pub mod clock;
pub mod config;
pub mod error;
pub mod manager;
pub mod metrics;
pub mod reaper;
pub mod reclaim;
pub mod retry;

pub use builder::LifecycleBuilder;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{LifecycleConfig, TtlPolicy};
pub use error::{LifecycleError, StoreKind};
pub use manager::{FetchedObject, LifecycleManager, NewObject};
pub use metrics::{LifecycleMetrics, MetricsSnapshot};
pub use reaper::{PassOutcome, Reaper, ReaperConfig, ReaperHandle};
pub use reclaim::{ReclaimFailure, ReclaimReport, ReclaimStage};
pub use retry::RetryStrategy;
