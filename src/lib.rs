//! Warehouse ETL - batch pipeline from raw extracts to a star schema
//!
//! Provides the staging-to-warehouse pipeline core:
//! - Run configuration and credential loading (`config`)
//! - Single-connection database wrapper (`db`)
//! - Full-refresh schema initializer (`schema`)
//! - Stage loaders for the JSON and CSV extracts (`stage`)
//! - Named set-based SQL transforms (`transform`)
//! - Row-count consistency checks (`quality`)
//! - The sequential orchestrator owning one run (`pipeline`)

pub mod config;
pub mod db;
pub mod error;
pub mod pipeline;
pub mod quality;
pub mod schema;
pub mod stage;
pub mod transform;

// Re-export commonly used types
pub use config::{AppConfig, DatabaseConfig, SourcePaths};
pub use db::{TableName, WarehouseDb};
pub use error::{EtlError, EtlResult};
pub use pipeline::{PipelineRunner, RunReport, RunState, Step};
pub use quality::{CheckOutcome, check_fact_consistency};
pub use schema::{WarehouseSchema, initialize_schema};
pub use stage::{StageReport, load_stage_demo, load_stage_temp};
pub use transform::{Transform, TransformPhase, run_transform};
