//! Temperature CSV projection
//!
//! The global temperature extract covers every country; only US rows are
//! staged. Columns are projected and renamed to {dt, avg_temp, city}.

use std::path::Path;

use chrono::NaiveDate;

use super::StageRow;
use crate::error::{EtlError, EtlResult};

/// Country filter applied before staging
pub const US_COUNTRY: &str = "United States";

/// One projected row for `stage_temp`
#[derive(Debug, Clone, PartialEq)]
pub struct TempRow {
    pub dt: NaiveDate,
    pub avg_temp: Option<f64>,
    pub city: String,
}

impl StageRow for TempRow {
    const COLUMNS: &'static [&'static str] = &["dt", "avg_temp", "city"];

    fn fields(&self) -> Vec<Option<String>> {
        vec![
            Some(self.dt.format("%Y-%m-%d").to_string()),
            self.avg_temp.map(|t| t.to_string()),
            Some(self.city.clone()),
        ]
    }
}

/// Column positions resolved from the CSV header
struct TempColumns {
    dt: usize,
    avg_temp: usize,
    city: usize,
    country: usize,
}

impl TempColumns {
    fn resolve(headers: &csv::StringRecord) -> EtlResult<Self> {
        let position = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| EtlError::load("stage_temp", format!("missing column '{name}'")))
        };

        Ok(Self {
            dt: position("dt")?,
            avg_temp: position("AverageTemperature")?,
            city: position("City")?,
            country: position("Country")?,
        })
    }
}

/// Read the temperature CSV, filter to US rows and project the columns
///
/// Malformed content (unreadable CSV, unparseable date or temperature) is
/// fatal; no partial-row recovery is attempted.
pub fn read_temp_rows(source: &Path) -> EtlResult<Vec<TempRow>> {
    let mut reader = csv::Reader::from_path(source)
        .map_err(|e| EtlError::load("stage_temp", e.to_string()))?;

    let columns = TempColumns::resolve(
        reader
            .headers()
            .map_err(|e| EtlError::load("stage_temp", e.to_string()))?,
    )?;

    let mut rows = Vec::new();
    for (index, result) in reader.records().enumerate() {
        let record = result.map_err(|e| {
            EtlError::load("stage_temp", format!("row {}: {}", index + 1, e))
        })?;

        if record.get(columns.country) != Some(US_COUNTRY) {
            continue;
        }

        let dt_text = record.get(columns.dt).unwrap_or_default();
        let dt = NaiveDate::parse_from_str(dt_text, "%Y-%m-%d").map_err(|e| {
            EtlError::load(
                "stage_temp",
                format!("row {}: invalid date '{}': {}", index + 1, dt_text, e),
            )
        })?;

        let temp_text = record.get(columns.avg_temp).unwrap_or_default();
        let avg_temp = if temp_text.is_empty() {
            None
        } else {
            Some(temp_text.parse::<f64>().map_err(|e| {
                EtlError::load(
                    "stage_temp",
                    format!("row {}: invalid temperature '{}': {}", index + 1, temp_text, e),
                )
            })?)
        };

        rows.push(TempRow {
            dt,
            avg_temp,
            city: record.get(columns.city).unwrap_or_default().to_string(),
        });
    }

    Ok(rows)
}
