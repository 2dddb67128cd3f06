use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, info};

use vanish_core::{Binding, ObjectId};
use vanish_metadata::{MetadataError, MetadataStore};

use crate::config::PostgresConfig;
use crate::migrations;

type BindingRow = (String, String, String, i64, DateTime<Utc>, DateTime<Utc>);

const COLUMNS: &str = "id, original_name, content_type, size, created_at, expires_at";

/// Build `PgConnectOptions` from a [`PostgresConfig`], applying SSL settings
/// when configured.
fn build_connect_options(
    config: &PostgresConfig,
) -> Result<sqlx::postgres::PgConnectOptions, MetadataError> {
    let mut options: sqlx::postgres::PgConnectOptions = config
        .url
        .parse()
        .map_err(|e: sqlx::Error| MetadataError::Connection(e.to_string()))?;

    if let Some(ref mode) = config.ssl_mode {
        let ssl_mode = match mode.as_str() {
            "disable" => sqlx::postgres::PgSslMode::Disable,
            "prefer" => sqlx::postgres::PgSslMode::Prefer,
            "require" => sqlx::postgres::PgSslMode::Require,
            "verify-ca" => sqlx::postgres::PgSslMode::VerifyCa,
            "verify-full" => sqlx::postgres::PgSslMode::VerifyFull,
            other => {
                return Err(MetadataError::Connection(format!(
                    "unknown ssl_mode: {other}"
                )));
            }
        };
        options = options.ssl_mode(ssl_mode);
    }

    if let Some(ref path) = config.ssl_root_cert {
        options = options.ssl_root_cert(path);
    }

    if let Some(ref path) = config.ssl_cert {
        options = options.ssl_client_cert(path);
    }

    if let Some(ref path) = config.ssl_key {
        options = options.ssl_client_key(path);
    }

    Ok(options)
}

/// Map a driver error onto the metadata error taxonomy.
fn classify(err: sqlx::Error, acquire_timeout: Duration) -> MetadataError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            MetadataError::Conflict(db.message().to_owned())
        }
        sqlx::Error::PoolTimedOut => MetadataError::Timeout(acquire_timeout),
        sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::PoolClosed => {
            MetadataError::Connection(err.to_string())
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            MetadataError::Serialization(err.to_string())
        }
        _ => MetadataError::Backend(err.to_string()),
    }
}

fn binding_from_row(row: BindingRow) -> Result<Binding, MetadataError> {
    let (id, original_name, content_type, size, created_at, expires_at) = row;
    let id = ObjectId::parse(&id).map_err(|e| MetadataError::Serialization(e.to_string()))?;
    let size = u64::try_from(size)
        .map_err(|_| MetadataError::Serialization(format!("negative size {size} for {id}")))?;
    Ok(Binding {
        id,
        original_name,
        content_type,
        size,
        created_at,
        expires_at,
    })
}

/// PostgreSQL-backed implementation of [`MetadataStore`].
///
/// One row per binding. The reclamation query is a range scan on the
/// `expires_at` index with keyset paging on the primary key.
pub struct PostgresMetadataStore {
    pool: PgPool,
    config: Arc<PostgresConfig>,
}

impl PostgresMetadataStore {
    /// Connect, create the pool and run migrations.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::Connection`] if pool creation fails, or
    /// [`MetadataError::Backend`] if migrations fail.
    pub async fn new(config: PostgresConfig) -> Result<Self, MetadataError> {
        let connect_options = build_connect_options(&config)?;
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(config.pool_size)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect_with(connect_options)
            .await
            .map_err(|e| MetadataError::Connection(e.to_string()))?;

        Self::from_pool(pool, config).await
    }

    /// Create a store from an existing pool. Runs migrations.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::Backend`] if migrations fail.
    pub async fn from_pool(pool: PgPool, config: PostgresConfig) -> Result<Self, MetadataError> {
        migrations::run_migrations(&pool, &config)
            .await
            .map_err(|e| MetadataError::Backend(e.to_string()))?;
        info!(table = %config.bindings_table(), "metadata migrations applied");

        Ok(Self {
            pool,
            config: Arc::new(config),
        })
    }

    fn map_err(&self, err: sqlx::Error) -> MetadataError {
        classify(err, Duration::from_secs(self.config.acquire_timeout_secs))
    }
}

#[async_trait]
impl MetadataStore for PostgresMetadataStore {
    async fn save(&self, binding: &Binding) -> Result<(), MetadataError> {
        let table = self.config.bindings_table();
        let size = i64::try_from(binding.size).map_err(|_| {
            MetadataError::Serialization(format!("size {} exceeds BIGINT", binding.size))
        })?;

        let query = format!("INSERT INTO {table} ({COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6)");
        sqlx::query(&query)
            .bind(binding.id.as_str())
            .bind(&binding.original_name)
            .bind(&binding.content_type)
            .bind(size)
            .bind(binding.created_at)
            .bind(binding.expires_at)
            .execute(&self.pool)
            .await
            .map_err(|e| self.map_err(e))?;

        debug!(object_id = %binding.id, "binding saved");
        Ok(())
    }

    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<Binding>, MetadataError> {
        let table = self.config.bindings_table();
        let query = format!("SELECT {COLUMNS} FROM {table} WHERE id = $1");

        let row: Option<BindingRow> = sqlx::query_as(&query)
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| self.map_err(e))?;

        row.map(binding_from_row).transpose()
    }

    async fn find_expired_before(
        &self,
        before: DateTime<Utc>,
        after: Option<&ObjectId>,
        limit: usize,
    ) -> Result<Vec<Binding>, MetadataError> {
        let table = self.config.bindings_table();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let query = format!(
            "SELECT {COLUMNS} FROM {table} \
             WHERE expires_at < $1 AND ($2::TEXT IS NULL OR id > $2) \
             ORDER BY id LIMIT $3"
        );

        let rows: Vec<BindingRow> = sqlx::query_as(&query)
            .bind(before)
            .bind(after.map(ObjectId::as_str))
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| self.map_err(e))?;

        rows.into_iter().map(binding_from_row).collect()
    }

    async fn delete_by_id(&self, id: &ObjectId) -> Result<bool, MetadataError> {
        let table = self.config.bindings_table();
        let query = format!("DELETE FROM {table} WHERE id = $1");

        let result = sqlx::query(&query)
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| self.map_err(e))?;

        Ok(result.rows_affected() > 0)
    }
}
