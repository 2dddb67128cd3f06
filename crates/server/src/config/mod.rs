mod lifecycle;
mod server;
mod storage;
mod telemetry;

#[cfg(test)]
mod tests;

pub use lifecycle::*;
pub use server::*;
pub use storage::*;
pub use telemetry::*;

use serde::Deserialize;

/// Top-level configuration for the Vanish server, loaded from a TOML file.
#[derive(Debug, Default, Deserialize)]
pub struct VanishConfig {
    /// HTTP server bind configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// TTL policy, store timeouts and reclamation tuning.
    #[serde(default)]
    pub lifecycle: LifecycleServerConfig,
    /// Reaper schedule.
    #[serde(default)]
    pub reaper: ReaperServerConfig,
    /// Payload store backend.
    #[serde(default)]
    pub blob: BlobConfig,
    /// Binding record store backend.
    #[serde(default)]
    pub metadata: MetadataConfig,
    /// Log output configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}
