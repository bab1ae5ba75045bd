//! Row-count reconciliation between staging and fact tables
//!
//! A mismatch is a quality signal, not a gate: it indicates either
//! duplicate/dropped rows during staging or dimension-resolution join
//! failures that excluded rows from the fact load. The pipeline logs it
//! and continues.

use tracing::{info, warn};

use crate::db::{TableName, WarehouseDb};
use crate::error::{EtlError, EtlResult};

/// Result of one staging/fact reconciliation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    pub stage_table: String,
    pub fact_table: String,
    pub stage_count: i64,
    pub fact_count: i64,
}

impl CheckOutcome {
    /// Whether the two row counts reconcile
    pub fn matches(&self) -> bool {
        self.stage_count == self.fact_count
    }
}

impl std::fmt::Display for CheckOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({} rows) vs {} ({} rows): {}",
            self.stage_table,
            self.stage_count,
            self.fact_table,
            self.fact_count,
            if self.matches() { "match" } else { "MISMATCH" }
        )
    }
}

/// Reconcile row counts between a staging table and its fact table
///
/// Table names pass through [`TableName`] validation before being
/// embedded in the count queries; they are never concatenated unescaped.
/// Returns whether the counts match.
pub async fn check_fact_consistency(
    db: &WarehouseDb,
    stage_table: &str,
    fact_table: &str,
) -> EtlResult<CheckOutcome> {
    let stage = TableName::new(stage_table)?;
    let fact = TableName::new(fact_table)?;

    let stage_count = db
        .count(&stage)
        .await
        .map_err(|e| EtlError::Connection(e.to_string()))?;
    let fact_count = db
        .count(&fact)
        .await
        .map_err(|e| EtlError::Connection(e.to_string()))?;

    let outcome = CheckOutcome {
        stage_table: stage_table.to_string(),
        fact_table: fact_table.to_string(),
        stage_count,
        fact_count,
    };

    if outcome.matches() {
        info!(stage = stage_table, fact = fact_table, rows = stage_count, "Consistency check passed");
    } else {
        warn!(
            stage = stage_table,
            fact = fact_table,
            stage_count,
            fact_count,
            "Row-count mismatch between staging and fact table"
        );
    }

    Ok(outcome)
}
