//! Integration tests for configuration loading and the run plan

use std::io::Write;

use tempfile::NamedTempFile;

use warehouse_etl::config::{AppConfig, PASSWORD_ENV_VAR};
use warehouse_etl::error::EtlError;
use warehouse_etl::pipeline::Step;
use warehouse_etl::transform::{Transform, TransformPhase};

#[test]
fn config_password_comes_from_environment_only() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
database:
  host: localhost
  user: etl
  dbname: warehouse
data:
  demographic: demo.json
  temperature: temp.csv
"#
    )
    .unwrap();

    // Environment mutation is process-global; both phases live in one
    // test so they cannot race each other.
    unsafe { std::env::remove_var(PASSWORD_ENV_VAR) };
    let err = AppConfig::load(file.path()).unwrap_err();
    assert!(matches!(err, EtlError::Config(_)));
    assert!(err.to_string().contains(PASSWORD_ENV_VAR));

    unsafe { std::env::set_var(PASSWORD_ENV_VAR, "s3cret") };
    let config = AppConfig::load(file.path()).unwrap();
    assert_eq!(config.database.password, "s3cret");
    assert!(!format!("{:?}", config.database).contains("s3cret"));
    unsafe { std::env::remove_var(PASSWORD_ENV_VAR) };
}

#[test]
fn run_plan_orders_every_scheduler_task() {
    // One discrete task per step, same dependency ordering a scheduler
    // would enforce: schema, two stage loads, four transforms, two checks.
    let names: Vec<&str> = Step::all().iter().map(|s| s.name()).collect();
    assert_eq!(
        names,
        vec![
            "create_schema",
            "stage_demo",
            "stage_temp",
            "dim_date",
            "dim_city",
            "fact_demo",
            "fact_temp",
            "check_demo",
            "check_temp",
        ]
    );
}

#[test]
fn transform_templates_resolve_foreign_keys_from_dimensions() {
    // Both dimension loads read the staging tables; both fact loads join
    // the populated dimensions, so unresolved keys drop out of the facts.
    for transform in Transform::all() {
        match transform.phase() {
            TransformPhase::Dimension => {
                assert!(transform.sql().contains("FROM stage_"));
            }
            TransformPhase::Fact => {
                assert!(transform.sql().contains("JOIN dim_city"));
                assert!(transform.sql().contains("JOIN dim_date"));
            }
        }
    }
}
