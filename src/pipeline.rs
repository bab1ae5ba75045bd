//! Pipeline orchestrator: owns the connection and sequences every step
//!
//! One run is strictly sequential: connect, validate sources, full-refresh
//! the schema, stage both extracts, run the four set transforms
//! (dimensions before facts), reconcile row counts, close. Any fatal
//! error aborts the run; the connection is closed on every exit path.

use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{error, info, info_span};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::db::WarehouseDb;
use crate::error::{EtlError, EtlResult};
use crate::quality::{CheckOutcome, check_fact_consistency};
use crate::schema::initialize_schema;
use crate::stage::{load_stage_demo, load_stage_temp};
use crate::transform::{Transform, run_transform};

/// Lifecycle of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Init,
    Connected,
    SchemaReady,
    Staged,
    Transformed,
    Checked,
    Closed,
    /// Terminal state reachable from any step on fatal error
    Aborted,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::Connected => "connected",
            Self::SchemaReady => "schema_ready",
            Self::Staged => "staged",
            Self::Transformed => "transformed",
            Self::Checked => "checked",
            Self::Closed => "closed",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// The discrete pipeline tasks, in dependency order
///
/// When run under a scheduler each step maps to one task; the ordering
/// here is the same dependency ordering the scheduler enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    CreateSchema,
    StageDemo,
    StageTemp,
    DimDate,
    DimCity,
    FactDemo,
    FactTemp,
    CheckDemo,
    CheckTemp,
}

impl Step {
    /// All steps in execution order
    pub fn all() -> Vec<Self> {
        vec![
            Self::CreateSchema,
            Self::StageDemo,
            Self::StageTemp,
            Self::DimDate,
            Self::DimCity,
            Self::FactDemo,
            Self::FactTemp,
            Self::CheckDemo,
            Self::CheckTemp,
        ]
    }

    /// Step name used in logs and the run report
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateSchema => "create_schema",
            Self::StageDemo => "stage_demo",
            Self::StageTemp => "stage_temp",
            Self::DimDate => "dim_date",
            Self::DimCity => "dim_city",
            Self::FactDemo => "fact_demo",
            Self::FactTemp => "fact_temp",
            Self::CheckDemo => "check_demo",
            Self::CheckTemp => "check_temp",
        }
    }

    /// State the run enters once this step (and its phase) completes
    fn completes_state(&self) -> Option<RunState> {
        match self {
            Self::CreateSchema => Some(RunState::SchemaReady),
            Self::StageTemp => Some(RunState::Staged),
            Self::FactTemp => Some(RunState::Transformed),
            Self::CheckTemp => Some(RunState::Checked),
            _ => None,
        }
    }
}

/// Outcome of one completed step
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub step: &'static str,
    pub duration_ms: u64,
    pub detail: String,
}

/// Report from a pipeline run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub state: RunState,
    pub steps: Vec<StepOutcome>,
    pub checks: Vec<CheckOutcome>,
    pub duration_ms: u64,
}

impl RunReport {
    /// Whether the run completed
    ///
    /// Consistency mismatches do not affect success; they are quality
    /// signals, not gates.
    pub fn is_success(&self) -> bool {
        self.state == RunState::Closed
    }

    /// Print a human-readable summary to stderr
    pub fn print_summary(&self) {
        eprintln!();
        eprintln!("Pipeline run {} - {}", self.run_id, self.state);
        eprintln!("Duration: {}ms", self.duration_ms);
        for outcome in &self.steps {
            eprintln!("  - {}: {} ({}ms)", outcome.step, outcome.detail, outcome.duration_ms);
        }
        if !self.checks.is_empty() {
            eprintln!("Consistency checks:");
            for check in &self.checks {
                eprintln!("  - {check}");
            }
        }
    }
}

/// Orchestrator for one pipeline run
///
/// Exclusively owns the database connection for the run's lifetime; every
/// step borrows it for the duration of a single operation.
pub struct PipelineRunner {
    config: AppConfig,
    state: RunState,
}

impl PipelineRunner {
    /// Create a runner for the given configuration
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            state: RunState::Init,
        }
    }

    /// Current run state
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Validate that every configured source file exists
    ///
    /// Runs on entry to `Connected`, before the destructive schema reset:
    /// a run that cannot complete must not destroy existing warehouse
    /// state.
    fn preflight(&self) -> EtlResult<()> {
        for path in self.config.data.all() {
            if !path.is_file() {
                return Err(EtlError::SourceUnavailable(path.to_path_buf()));
            }
        }
        Ok(())
    }

    /// Run the full pipeline
    pub async fn run(mut self) -> EtlResult<RunReport> {
        let start = Instant::now();
        let started_at = Utc::now();
        let run_id = Uuid::new_v4().to_string();
        let _span = info_span!("pipeline_run", run_id = %run_id).entered();

        info!(run_id = %run_id, "Starting pipeline run");

        let db = match WarehouseDb::connect(&self.config.database).await {
            Ok(db) => db,
            Err(e) => {
                self.state = RunState::Aborted;
                error!(error = %e, "Aborting run: connection failed");
                return Err(e);
            }
        };
        self.state = RunState::Connected;

        if let Err(e) = self.preflight() {
            return Err(self.abort(db, e));
        }

        let mut steps = Vec::new();
        let mut checks = Vec::new();

        for step in Step::all() {
            let _step_span = info_span!("pipeline_step", step = step.name()).entered();
            let step_start = Instant::now();

            let detail = match self.run_step(&db, step, &mut checks).await {
                Ok(detail) => detail,
                Err(e) => return Err(self.abort(db, e)),
            };

            steps.push(StepOutcome {
                step: step.name(),
                duration_ms: step_start.elapsed().as_millis() as u64,
                detail,
            });

            if let Some(state) = step.completes_state() {
                self.state = state;
            }
        }

        db.close();
        self.state = RunState::Closed;

        let report = RunReport {
            run_id,
            started_at,
            state: self.state,
            steps,
            checks,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            run_id = %report.run_id,
            duration_ms = report.duration_ms,
            "Pipeline run complete"
        );
        Ok(report)
    }

    /// Execute one step, returning its report detail
    async fn run_step(
        &self,
        db: &WarehouseDb,
        step: Step,
        checks: &mut Vec<CheckOutcome>,
    ) -> EtlResult<String> {
        match step {
            Step::CreateSchema => {
                initialize_schema(db).await?;
                Ok("schema reset".to_string())
            }
            Step::StageDemo => {
                let report = load_stage_demo(db, &self.config.data.demographic).await?;
                Ok(report.summary())
            }
            Step::StageTemp => {
                let report = load_stage_temp(db, &self.config.data.temperature).await?;
                Ok(report.summary())
            }
            Step::DimDate => run_transform(db, Transform::DimDate)
                .await
                .map(|rows| format!("{rows} rows")),
            Step::DimCity => run_transform(db, Transform::DimCity)
                .await
                .map(|rows| format!("{rows} rows")),
            Step::FactDemo => run_transform(db, Transform::FactDemo)
                .await
                .map(|rows| format!("{rows} rows")),
            Step::FactTemp => run_transform(db, Transform::FactTemp)
                .await
                .map(|rows| format!("{rows} rows")),
            Step::CheckDemo => {
                let outcome = check_fact_consistency(db, "stage_demo", "fact_demo").await?;
                let detail = outcome.to_string();
                checks.push(outcome);
                Ok(detail)
            }
            Step::CheckTemp => {
                let outcome = check_fact_consistency(db, "stage_temp", "fact_temp").await?;
                let detail = outcome.to_string();
                checks.push(outcome);
                Ok(detail)
            }
        }
    }

    /// Abort the run: log the cause, close the connection, enter `Aborted`
    fn abort(&mut self, db: WarehouseDb, cause: EtlError) -> EtlError {
        error!(state = %self.state, error = %cause, "Aborting pipeline run");
        db.close();
        self.state = RunState::Aborted;
        cause
    }
}
