use serde::Deserialize;

/// Log output configuration.
///
/// `RUST_LOG`, when set, takes precedence over `level`.
///
/// ```toml
/// [telemetry]
/// level = "vanish_lifecycle=debug,info"
/// json = true
/// ```
#[derive(Debug, Deserialize)]
pub struct TelemetryConfig {
    /// Default filter directive.
    #[serde(default = "default_level")]
    pub level: String,
    /// Emit one JSON object per line instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

fn default_level() -> String {
    "info".to_owned()
}
