use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Connection settings for an S3-compatible blob store.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct S3BlobConfig {
    /// Bucket holding all objects. Created on startup if missing.
    pub bucket: String,

    /// AWS region (e.g. `"us-east-1"`).
    pub region: String,

    /// Endpoint override for `MinIO`, `LocalStack` and similar services.
    pub endpoint_url: Option<String>,

    /// Prefix prepended to every object key (e.g. `"uploads/"`).
    pub prefix: Option<String>,

    /// Address buckets as `endpoint/bucket` instead of `bucket.endpoint`.
    /// Most self-hosted services need this.
    pub force_path_style: bool,

    /// Optional IAM role ARN to assume via STS.
    pub role_arn: Option<String>,

    /// Per-operation timeout applied by the SDK, in seconds.
    pub operation_timeout_secs: u64,
}

impl std::fmt::Debug for S3BlobConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3BlobConfig")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint_url", &self.endpoint_url)
            .field("prefix", &self.prefix)
            .field("force_path_style", &self.force_path_style)
            .field("role_arn", &self.role_arn.as_ref().map(|_| "[REDACTED]"))
            .field("operation_timeout_secs", &self.operation_timeout_secs)
            .finish()
    }
}

impl S3BlobConfig {
    /// Create a config for `bucket` in the default region.
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            ..Self::default()
        }
    }

    /// Set the region.
    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Set the endpoint URL override. Enables path-style addressing.
    #[must_use]
    pub fn with_endpoint_url(mut self, endpoint_url: impl Into<String>) -> Self {
        self.endpoint_url = Some(endpoint_url.into());
        self.force_path_style = true;
        self
    }

    /// Set the key prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Set the IAM role ARN to assume.
    #[must_use]
    pub fn with_role_arn(mut self, role_arn: impl Into<String>) -> Self {
        self.role_arn = Some(role_arn.into());
        self
    }

    /// SDK operation timeout as a [`Duration`].
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }
}

impl Default for S3BlobConfig {
    fn default() -> Self {
        Self {
            bucket: "vanish".to_owned(),
            region: "us-east-1".to_owned(),
            endpoint_url: None,
            prefix: None,
            force_path_style: false,
            role_arn: None,
            operation_timeout_secs: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = S3BlobConfig::default();
        assert_eq!(config.bucket, "vanish");
        assert_eq!(config.region, "us-east-1");
        assert!(!config.force_path_style);
        assert_eq!(config.operation_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn endpoint_override_implies_path_style() {
        let config = S3BlobConfig::new("uploads").with_endpoint_url("http://localhost:9000");
        assert_eq!(config.bucket, "uploads");
        assert_eq!(config.endpoint_url.as_deref(), Some("http://localhost:9000"));
        assert!(config.force_path_style);
    }

    #[test]
    fn debug_redacts_role_arn() {
        let config = S3BlobConfig::new("b").with_role_arn("arn:aws:iam::123456789012:role/blob");
        let debug = format!("{config:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("123456789012"));
    }

    #[test]
    fn partial_config_fills_defaults() {
        let config: S3BlobConfig =
            serde_json::from_str(r#"{"bucket": "files", "prefix": "tmp/"}"#).unwrap();
        assert_eq!(config.bucket, "files");
        assert_eq!(config.prefix.as_deref(), Some("tmp/"));
        assert_eq!(config.region, "us-east-1");
    }
}
