//! Stage loaders: source file → projected rows → bulk append
//!
//! One loader per source type. Each loader parses its raw file,
//! projects the records into the fixed staging column set, serializes
//! the result as delimited text (comma-separated, empty string as the
//! null sentinel, no header) and appends it to the staging table with a
//! single `COPY ... FROM STDIN`, preserving source order.

mod demo;
mod temp;

pub use demo::{DemoRow, EFFECTIVE_DATE, project_demo_records};
pub use temp::{TempRow, US_COUNTRY, read_temp_rows};

use std::path::Path;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::db::{TableName, WarehouseDb};
use crate::error::{EtlError, EtlResult};

/// Report from a single stage load
#[derive(Debug, Clone)]
pub struct StageReport {
    /// Target staging table
    pub table: String,
    /// Rows appended, as reported by COPY
    pub rows_staged: u64,
    /// Source records dropped by the projection (missing required fields)
    pub rows_dropped: usize,
    /// Wall-clock duration of the load
    pub duration: Duration,
}

impl StageReport {
    /// One-line summary for log output
    pub fn summary(&self) -> String {
        format!(
            "{}: {} rows staged, {} dropped in {}ms",
            self.table,
            self.rows_staged,
            self.rows_dropped,
            self.duration.as_millis()
        )
    }
}

/// A projected row that can be serialized for COPY
pub trait StageRow {
    /// Staging column names, in COPY order
    const COLUMNS: &'static [&'static str];

    /// The row as text fields; `None` becomes the null sentinel
    fn fields(&self) -> Vec<Option<String>>;
}

/// Serialize projected rows as comma-separated text with no header
fn serialize_rows<R: StageRow>(rows: &[R]) -> EtlResult<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    for row in rows {
        let record: Vec<String> = row
            .fields()
            .into_iter()
            .map(|f| f.unwrap_or_default())
            .collect();
        writer
            .write_record(&record)
            .map_err(|e| EtlError::load("<buffer>", e.to_string()))?;
    }

    writer
        .into_inner()
        .map_err(|e| EtlError::load("<buffer>", e.to_string()))
}

/// Bulk-append projected rows and assemble the report
async fn append_rows<R: StageRow>(
    db: &WarehouseDb,
    table: &TableName,
    rows: &[R],
    rows_dropped: usize,
    start: Instant,
) -> EtlResult<StageReport> {
    let data = serialize_rows(rows)?;

    let rows_staged = db
        .copy_in_csv(table, R::COLUMNS, data)
        .await
        .map_err(|e| EtlError::load(table.as_str(), e.to_string()))?;

    if rows_dropped > 0 {
        warn!(
            table = table.as_str(),
            rows_dropped, "Source records dropped by projection (missing required fields)"
        );
    }

    let report = StageReport {
        table: table.as_str().to_string(),
        rows_staged,
        rows_dropped,
        duration: start.elapsed(),
    };
    info!(summary = %report.summary(), "Stage load complete");
    Ok(report)
}

/// Load the demographics JSON extract into `stage_demo`
pub async fn load_stage_demo(db: &WarehouseDb, source: &Path) -> EtlResult<StageReport> {
    let start = Instant::now();
    info!(file = %source.display(), "Loading demographics stage");

    let content = std::fs::read_to_string(source)?;
    let records: Vec<serde_json::Value> = serde_json::from_str(&content)
        .map_err(|e| EtlError::load("stage_demo", format!("unparseable JSON: {e}")))?;

    let (rows, dropped) = project_demo_records(&records);

    let table = TableName::new("stage_demo")?;
    append_rows(db, &table, &rows, dropped, start).await
}

/// Load the temperature CSV extract into `stage_temp`
pub async fn load_stage_temp(db: &WarehouseDb, source: &Path) -> EtlResult<StageReport> {
    let start = Instant::now();
    info!(file = %source.display(), "Loading temperature stage");

    let rows = read_temp_rows(source)?;

    let table = TableName::new("stage_temp")?;
    append_rows(db, &table, &rows, 0, start).await
}
