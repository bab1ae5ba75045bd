//! Warehouse schema definitions and the schema initializer
//!
//! The DDL is a full-refresh reset: drop-if-exists then create, so a run
//! always starts from empty tables. The orchestrator validates source
//! files before this runs; see `pipeline`.

use tracing::info;

use crate::db::WarehouseDb;
use crate::error::{EtlError, EtlResult};

/// Schema for the staging, dimension and fact tables
pub struct WarehouseSchema;

impl WarehouseSchema {
    /// DDL for all warehouse tables (PostgreSQL syntax)
    pub fn create_tables() -> &'static str {
        r#"
-- Full refresh: drop facts first, then dimensions, then staging
DROP TABLE IF EXISTS fact_demo;
DROP TABLE IF EXISTS fact_temp;
DROP TABLE IF EXISTS dim_date;
DROP TABLE IF EXISTS dim_city;
DROP TABLE IF EXISTS stage_demo;
DROP TABLE IF EXISTS stage_temp;

-- Staging: demographics extract, one row per projected source record
CREATE TABLE stage_demo (
    city VARCHAR NOT NULL,
    record_timestamp DATE NOT NULL,
    number_of_veterans BIGINT,
    male_population BIGINT,
    foreign_born BIGINT,
    average_household_size DOUBLE PRECISION,
    median_age DOUBLE PRECISION,
    total_population BIGINT,
    female_population BIGINT
);

-- Staging: US temperature readings
CREATE TABLE stage_temp (
    dt DATE NOT NULL,
    avg_temp DOUBLE PRECISION,
    city VARCHAR NOT NULL
);

-- Calendar dimension, one row per distinct staged date
CREATE TABLE dim_date (
    date_key DATE PRIMARY KEY,
    day INTEGER NOT NULL,
    month INTEGER NOT NULL,
    year INTEGER NOT NULL,
    weekday INTEGER NOT NULL
);

-- City dimension, natural key unique after each load
CREATE TABLE dim_city (
    city_key BIGSERIAL PRIMARY KEY,
    city VARCHAR NOT NULL UNIQUE
);

-- Demographic measurements resolved against the dimensions
CREATE TABLE fact_demo (
    demo_key BIGSERIAL PRIMARY KEY,
    date_key DATE NOT NULL REFERENCES dim_date(date_key),
    city_key BIGINT NOT NULL REFERENCES dim_city(city_key),
    median_age DOUBLE PRECISION,
    male_population BIGINT,
    female_population BIGINT,
    total_population BIGINT,
    number_of_veterans BIGINT,
    foreign_born BIGINT,
    average_household_size DOUBLE PRECISION
);

-- Temperature measurements resolved against the dimensions
CREATE TABLE fact_temp (
    temp_key BIGSERIAL PRIMARY KEY,
    date_key DATE NOT NULL REFERENCES dim_date(date_key),
    city_key BIGINT NOT NULL REFERENCES dim_city(city_key),
    avg_temp DOUBLE PRECISION
);
"#
    }
}

/// (Re)create all warehouse tables from the fixed DDL script
///
/// Destructive: all prior data in these tables is destroyed. Any DDL
/// error is fatal; a partial schema is never acceptable.
pub async fn initialize_schema(db: &WarehouseDb) -> EtlResult<()> {
    info!("Initializing warehouse schema (full refresh)");

    db.batch_execute(WarehouseSchema::create_tables())
        .await
        .map_err(|e| EtlError::Schema(e.to_string()))?;

    info!("Warehouse schema ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ddl_contains_all_tables() {
        let ddl = WarehouseSchema::create_tables();
        for table in [
            "stage_demo",
            "stage_temp",
            "dim_date",
            "dim_city",
            "fact_demo",
            "fact_temp",
        ] {
            assert!(
                ddl.contains(&format!("CREATE TABLE {table}")),
                "missing CREATE for {table}"
            );
            assert!(
                ddl.contains(&format!("DROP TABLE IF EXISTS {table}")),
                "missing DROP for {table}"
            );
        }
    }

    #[test]
    fn test_ddl_drops_facts_before_dimensions() {
        // Foreign keys require facts to go first on reset.
        let ddl = WarehouseSchema::create_tables();
        let drop_fact = ddl.find("DROP TABLE IF EXISTS fact_demo").unwrap();
        let drop_dim = ddl.find("DROP TABLE IF EXISTS dim_date").unwrap();
        assert!(drop_fact < drop_dim);
    }

    #[test]
    fn test_dimension_natural_keys_are_unique() {
        let ddl = WarehouseSchema::create_tables();
        assert!(ddl.contains("city VARCHAR NOT NULL UNIQUE"));
        assert!(ddl.contains("date_key DATE PRIMARY KEY"));
    }
}
