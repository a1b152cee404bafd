//! PostgreSQL backend through `sqlx`.

use sqlx::{postgres::PgPoolOptions, PgPool};

use super::column_list;
use crate::error::{AppError, Result};
use crate::models::{Column, ColumnValue, NewObservation, RawObservation};
use crate::schema;

pub struct PgTable {
    pool: PgPool,
    table: String,
}

impl PgTable {
    /// Connect, then make sure the table exists.
    pub async fn connect(db_url: &str, max_connections: u32, table: &str) -> Result<Self> {
        // ---
        tracing::info!("Attempting to connect to database");

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(db_url)
            .await
            .map_err(|e| AppError::Query(format!("Failed to connect to database: {e}")))?;

        tracing::info!("Successfully connected to database");

        schema::create_schema(&pool, table).await?;
        Ok(PgTable {
            pool,
            table: table.to_string(),
        })
    }

    pub async fn fetch_all(&self) -> Result<Vec<RawObservation>> {
        // ---
        // Dates come back as text so every backend feeds normalization alike.
        let sql = format!(
            "SELECT date::text AS date, station_code, municipality, department, \
             latitude, longitude, temp_min, temp_avg, temp_max FROM {}",
            self.table
        );
        Ok(sqlx::query_as::<_, RawObservation>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }

    pub async fn insert(&self, row: &NewObservation) -> Result<u64> {
        // ---
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            self.table,
            column_list()
        );
        let result = sqlx::query(&sql)
            .bind(row.date)
            .bind(&row.station_code)
            .bind(&row.municipality)
            .bind(&row.department)
            .bind(row.latitude)
            .bind(row.longitude)
            .bind(row.temp_min)
            .bind(row.temp_avg)
            .bind(row.temp_max)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn update(&self, station_code: &str, column: Column, value: &ColumnValue) -> Result<u64> {
        // ---
        let sql = update_statement(&self.table, column);
        let query = sqlx::query(&sql);
        let query = match value {
            ColumnValue::Text(s) => query.bind(s.clone()),
            ColumnValue::Number(n) => query.bind(*n),
            ColumnValue::Date(d) => query.bind(*d),
        };
        let result = query.bind(station_code).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    pub async fn delete(&self, station_code: &str) -> Result<u64> {
        // ---
        let sql = format!("DELETE FROM {} WHERE station_code = $1", self.table);
        let result = sqlx::query(&sql)
            .bind(station_code)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

fn update_statement(table: &str, column: Column) -> String {
    format!(
        "UPDATE {} SET {} = $1 WHERE station_code = $2",
        table,
        column.name()
    )
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_update_statement_binds_value_and_station() {
        // ---
        assert_eq!(
            update_statement("temps", Column::TempAvg),
            "UPDATE temps SET temp_avg = $1 WHERE station_code = $2"
        );
    }
}
