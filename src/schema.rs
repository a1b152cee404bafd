//! Database schema management for the PostgreSQL backend.
//!
//! Ensures the temperature table and its indexes exist before serving
//! requests. Applied once on startup when the postgres backend is selected.

use sqlx::PgPool;

use crate::error::Result;

// ---

/// Create the temperature table if missing (idempotent).
///
/// `table` must already be a validated identifier; see `config`.
pub async fn create_schema(pool: &PgPool, table: &str) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            date          DATE             NOT NULL,
            station_code  TEXT             NOT NULL,
            municipality  TEXT             NOT NULL,
            department    TEXT             NOT NULL,
            latitude      DOUBLE PRECISION NOT NULL,
            longitude     DOUBLE PRECISION NOT NULL,
            temp_min      DOUBLE PRECISION,
            temp_avg      DOUBLE PRECISION,
            temp_max      DOUBLE PRECISION
        );
        "#
    ))
    .execute(&mut *tx)
    .await?;

    // Index names cannot be schema-qualified.
    let index_prefix = table.replace('.', "_");

    sqlx::query(&format!(
        "CREATE INDEX IF NOT EXISTS idx_{index_prefix}_station_code ON {table} (station_code);"
    ))
    .execute(&mut *tx)
    .await?;

    sqlx::query(&format!(
        "CREATE INDEX IF NOT EXISTS idx_{index_prefix}_municipality_date ON {table} (municipality, date);"
    ))
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
