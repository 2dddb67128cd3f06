use tracing::{debug, info};

use crate::config::S3BlobConfig;

/// Build an S3 client from `config`.
///
/// Credentials come from the standard AWS environment chain. When
/// `role_arn` is set, the role is assumed via STS with automatic refresh.
pub async fn build_client(config: &S3BlobConfig) -> aws_sdk_s3::Client {
    let region = aws_config::Region::new(config.region.clone());
    let timeouts = aws_config::timeout::TimeoutConfig::builder()
        .operation_timeout(config.operation_timeout())
        .build();

    let mut loader = aws_config::from_env()
        .region(region.clone())
        .timeout_config(timeouts.clone());
    if let Some(endpoint) = &config.endpoint_url {
        debug!(endpoint = %endpoint, "using custom S3 endpoint");
        loader = loader.endpoint_url(endpoint);
    }
    let mut sdk_config = loader.load().await;

    if let Some(role_arn) = &config.role_arn {
        info!(role_arn = %role_arn, "assuming IAM role via STS for blob storage");
        let provider = aws_config::sts::AssumeRoleProvider::builder(role_arn)
            .session_name("vanish-blob-store")
            .region(region.clone())
            .configure(&sdk_config)
            .build()
            .await;

        let mut loader = aws_config::from_env()
            .region(region)
            .timeout_config(timeouts)
            .credentials_provider(provider);
        if let Some(endpoint) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        sdk_config = loader.load().await;
    }

    let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
        .force_path_style(config.force_path_style)
        .build();
    aws_sdk_s3::Client::from_conf(s3_config)
}
