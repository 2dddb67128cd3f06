use sqlx::PgPool;

use crate::config::PostgresConfig;

/// Run database migrations, creating the bindings table if it does not exist.
///
/// # Errors
///
/// Returns a [`sqlx::Error`] if any DDL statement fails.
pub async fn run_migrations(pool: &PgPool, config: &PostgresConfig) -> Result<(), sqlx::Error> {
    let bindings_table = config.bindings_table();

    let create_bindings = format!(
        "CREATE TABLE IF NOT EXISTS {bindings_table} (
            id TEXT PRIMARY KEY,
            original_name TEXT NOT NULL,
            content_type TEXT NOT NULL,
            size BIGINT NOT NULL CHECK (size >= 0),
            created_at TIMESTAMPTZ NOT NULL,
            expires_at TIMESTAMPTZ NOT NULL,
            CHECK (expires_at > created_at)
        )"
    );

    // Serves the reclamation range scan.
    let create_expires_idx = format!(
        "CREATE INDEX IF NOT EXISTS {}bindings_expires_at_idx ON {bindings_table} (expires_at)",
        config.table_prefix
    );

    sqlx::query(&create_bindings).execute(pool).await?;
    sqlx::query(&create_expires_idx).execute(pool).await?;

    Ok(())
}
