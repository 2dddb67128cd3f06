use async_trait::async_trait;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use tokio_util::io::ReaderStream;
use tracing::{debug, error, info, instrument};

use vanish_blob::{BlobBody, BlobError, BlobStore};

use crate::auth::build_client;
use crate::config::S3BlobConfig;
use crate::error::classify_sdk_error;

/// [`BlobStore`] backed by an S3 bucket.
pub struct S3BlobStore {
    config: S3BlobConfig,
    client: aws_sdk_s3::Client,
}

impl std::fmt::Debug for S3BlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3BlobStore")
            .field("config", &self.config)
            .field("client", &"<S3Client>")
            .finish()
    }
}

impl S3BlobStore {
    /// Build a store and its SDK client from `config`.
    pub async fn new(config: S3BlobConfig) -> Self {
        let client = build_client(&config).await;
        Self { config, client }
    }

    /// Create a store with a pre-built client.
    pub fn with_client(config: S3BlobConfig, client: aws_sdk_s3::Client) -> Self {
        Self { config, client }
    }

    fn object_key(&self, key: &str) -> Result<String, BlobError> {
        if key.is_empty() {
            return Err(BlobError::InvalidKey(key.to_owned()));
        }
        Ok(match &self.config.prefix {
            Some(prefix) => format!("{prefix}{key}"),
            None => key.to_owned(),
        })
    }

    fn sdk_error<E, R>(&self, op: &str, err: &SdkError<E, R>) -> BlobError
    where
        E: std::error::Error + ProvideErrorMetadata + 'static,
        R: std::fmt::Debug,
    {
        let code = err.as_service_error().and_then(|e| e.code());
        let err_str = DisplayErrorContext(err).to_string();
        error!(operation = op, code = ?code, error = %err_str, "S3 request failed");
        classify_sdk_error(code, &err_str, self.config.operation_timeout())
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    fn namespace(&self) -> &str {
        &self.config.bucket
    }

    #[instrument(skip(self), fields(bucket = %self.config.bucket))]
    async fn ensure_namespace(&self) -> Result<(), BlobError> {
        let bucket = &self.config.bucket;
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => {
                debug!("bucket exists");
                return Ok(());
            }
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => {}
            Err(e) => return Err(self.sdk_error("head_bucket", &e)),
        }

        let mut request = self.client.create_bucket().bucket(bucket);
        // us-east-1 rejects an explicit location constraint.
        if self.config.region != "us-east-1" {
            let location = aws_sdk_s3::types::CreateBucketConfiguration::builder()
                .location_constraint(aws_sdk_s3::types::BucketLocationConstraint::from(
                    self.config.region.as_str(),
                ))
                .build();
            request = request.create_bucket_configuration(location);
        }

        match request.send().await {
            Ok(_) => {
                info!("bucket created");
                Ok(())
            }
            Err(e)
                if e
                    .as_service_error()
                    .is_some_and(|se| se.is_bucket_already_owned_by_you()) =>
            {
                Ok(())
            }
            Err(e) => Err(self.sdk_error("create_bucket", &e)),
        }
    }

    #[instrument(skip(self, body), fields(bucket = %self.config.bucket))]
    async fn put(
        &self,
        key: &str,
        body: BlobBody,
        size: u64,
        content_type: &str,
    ) -> Result<(), BlobError> {
        let object_key = self.object_key(key)?;
        let content_length = i64::try_from(size).map_err(|_| BlobError::SizeMismatch {
            expected: size,
            actual: 0,
        })?;

        // The request is signed over a known length, so the declared size is
        // verified before anything is sent.
        let data = body.collect_exact(size).await?;

        self.client
            .put_object()
            .bucket(&self.config.bucket)
            .key(&object_key)
            .content_type(content_type)
            .content_length(content_length)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| self.sdk_error("put_object", &e))?;

        debug!(key = %object_key, size, "object uploaded");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<BlobBody, BlobError> {
        let object_key = self.object_key(key)?;
        let result = self
            .client
            .get_object()
            .bucket(&self.config.bucket)
            .key(&object_key)
            .send()
            .await;

        match result {
            Ok(output) => {
                let reader = output.body.into_async_read();
                Ok(BlobBody::from_stream(ReaderStream::new(reader)))
            }
            Err(e) if e.as_service_error().is_some_and(|se| se.is_no_such_key()) => {
                Err(BlobError::NotFound(key.to_owned()))
            }
            Err(e) => Err(self.sdk_error("get_object", &e)),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), BlobError> {
        let object_key = self.object_key(key)?;
        // S3 reports success whether or not the key existed.
        self.client
            .delete_object()
            .bucket(&self.config.bucket)
            .key(&object_key)
            .send()
            .await
            .map_err(|e| self.sdk_error("delete_object", &e))?;
        debug!(key = %object_key, "object deleted");
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, BlobError> {
        let object_key = self.object_key(key)?;
        match self
            .client
            .head_object()
            .bucket(&self.config.bucket)
            .key(&object_key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => Ok(false),
            Err(e) => Err(self.sdk_error("head_object", &e)),
        }
    }
}


#[cfg(all(test, feature = "integration"))]
mod integration_tests {
    use vanish_blob::testing::run_blob_store_conformance_tests;

    use super::*;

    // Requires an S3-compatible endpoint, e.g. `docker run -p 9000:9000 minio/minio`.
    #[tokio::test]
    async fn conformance() {
        let endpoint = std::env::var("VANISH_S3_ENDPOINT")
            .unwrap_or_else(|_| "http://localhost:9000".to_owned());
        let config = S3BlobConfig::new("vanish-conformance")
            .with_endpoint_url(endpoint)
            .with_prefix(format!("run-{}/", std::process::id()));
        let store = S3BlobStore::new(config).await;
        store.ensure_namespace().await.unwrap();
        run_blob_store_conformance_tests(&store)
            .await
            .expect("conformance tests should pass");
    }
}
