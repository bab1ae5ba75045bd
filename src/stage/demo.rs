//! Demographics JSON projection
//!
//! Each source record carries a nested `fields` object holding the
//! demographic attributes; the record's own top-level columns (notably
//! `record_timestamp`) sit beside it. The projection flattens the two
//! into one view and extracts the fixed staging column set.

use chrono::NaiveDate;
use serde_json::{Map, Value};

use super::StageRow;

/// Effective date applied when the source lacks temporal granularity
pub const EFFECTIVE_DATE: NaiveDate = match NaiveDate::from_ymd_opt(2015, 1, 1) {
    Some(d) => d,
    None => unreachable!(),
};

/// One projected row for `stage_demo`
#[derive(Debug, Clone, PartialEq)]
pub struct DemoRow {
    pub city: String,
    pub record_timestamp: NaiveDate,
    pub number_of_veterans: i64,
    pub male_population: i64,
    pub foreign_born: i64,
    pub average_household_size: f64,
    pub median_age: f64,
    pub total_population: i64,
    pub female_population: i64,
}

impl StageRow for DemoRow {
    const COLUMNS: &'static [&'static str] = &[
        "city",
        "record_timestamp",
        "number_of_veterans",
        "male_population",
        "foreign_born",
        "average_household_size",
        "median_age",
        "total_population",
        "female_population",
    ];

    fn fields(&self) -> Vec<Option<String>> {
        vec![
            Some(self.city.clone()),
            Some(self.record_timestamp.format("%Y-%m-%d").to_string()),
            Some(self.number_of_veterans.to_string()),
            Some(self.male_population.to_string()),
            Some(self.foreign_born.to_string()),
            Some(self.average_household_size.to_string()),
            Some(self.median_age.to_string()),
            Some(self.total_population.to_string()),
            Some(self.female_population.to_string()),
        ]
    }
}

/// Flatten a record's nested `fields` object with its top-level columns
///
/// Nested attributes win on name collision, matching the order the
/// original extract concatenates them in.
fn flatten_record(record: &Value) -> Map<String, Value> {
    let mut flat = Map::new();

    if let Some(obj) = record.as_object() {
        for (key, value) in obj {
            if key != "fields" {
                flat.insert(key.clone(), value.clone());
            }
        }
        if let Some(fields) = obj.get("fields").and_then(Value::as_object) {
            for (key, value) in fields {
                flat.insert(key.clone(), value.clone());
            }
        }
    }

    flat
}

fn get_i64(flat: &Map<String, Value>, key: &str) -> Option<i64> {
    flat.get(key).and_then(Value::as_i64)
}

fn get_f64(flat: &Map<String, Value>, key: &str) -> Option<f64> {
    flat.get(key).and_then(Value::as_f64)
}

/// Parse `record_timestamp`, normalizing to [`EFFECTIVE_DATE`] when the
/// value is absent or carries no usable date
fn parse_record_timestamp(flat: &Map<String, Value>) -> NaiveDate {
    flat.get("record_timestamp")
        .and_then(Value::as_str)
        .and_then(|s| {
            chrono::DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.date_naive())
                .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
                .ok()
        })
        .unwrap_or(EFFECTIVE_DATE)
}

/// Project one flattened record into a [`DemoRow`]
///
/// Returns `None` when any required attribute is absent or has the wrong
/// type; the caller counts such records instead of dropping them silently.
fn project_demo_record(record: &Value) -> Option<DemoRow> {
    let flat = flatten_record(record);

    Some(DemoRow {
        city: flat.get("city").and_then(Value::as_str)?.to_string(),
        record_timestamp: parse_record_timestamp(&flat),
        number_of_veterans: get_i64(&flat, "number_of_veterans")?,
        male_population: get_i64(&flat, "male_population")?,
        foreign_born: get_i64(&flat, "foreign_born")?,
        average_household_size: get_f64(&flat, "average_household_size")?,
        median_age: get_f64(&flat, "median_age")?,
        total_population: get_i64(&flat, "total_population")?,
        female_population: get_i64(&flat, "female_population")?,
    })
}

/// Project a parsed JSON array into staging rows
///
/// Returns the projected rows in source order together with the count of
/// records the projection rejected.
pub fn project_demo_records(records: &[Value]) -> (Vec<DemoRow>, usize) {
    let mut rows = Vec::with_capacity(records.len());
    let mut dropped = 0;

    for record in records {
        match project_demo_record(record) {
            Some(row) => rows.push(row),
            None => dropped += 1,
        }
    }

    (rows, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_record() -> Value {
        json!({
            "datasetid": "us-cities-demographics",
            "recordid": "a1b2c3",
            "record_timestamp": "2016-09-14T00:00:00-07:00",
            "fields": {
                "city": "Quincy",
                "state": "Massachusetts",
                "median_age": 41.0,
                "male_population": 44129,
                "female_population": 49500,
                "total_population": 93629,
                "number_of_veterans": 4147,
                "foreign_born": 32935,
                "average_household_size": 2.39,
                "count": 1
            }
        })
    }

    #[test]
    fn test_project_complete_record() {
        let (rows, dropped) = project_demo_records(&[sample_record()]);
        assert_eq!(dropped, 0);
        assert_eq!(rows.len(), 1);

        let row = &rows[0];
        assert_eq!(row.city, "Quincy");
        assert_eq!(
            row.record_timestamp,
            NaiveDate::from_ymd_opt(2016, 9, 14).unwrap()
        );
        assert_eq!(row.total_population, 93629);
        assert_eq!(row.median_age, 41.0);
    }

    #[test]
    fn test_missing_timestamp_normalizes_to_effective_date() {
        let mut record = sample_record();
        record.as_object_mut().unwrap().remove("record_timestamp");

        let (rows, dropped) = project_demo_records(&[record]);
        assert_eq!(dropped, 0);
        assert_eq!(rows[0].record_timestamp, EFFECTIVE_DATE);
    }

    #[test]
    fn test_record_missing_required_attribute_is_counted() {
        let mut incomplete = sample_record();
        incomplete["fields"]
            .as_object_mut()
            .unwrap()
            .remove("total_population");

        let (rows, dropped) = project_demo_records(&[sample_record(), incomplete]);
        assert_eq!(rows.len(), 1);
        assert_eq!(dropped, 1);
    }

    #[test]
    fn test_record_with_wrong_type_is_counted() {
        let mut bad = sample_record();
        bad["fields"]["male_population"] = json!("not a number");

        let (rows, dropped) = project_demo_records(&[bad]);
        assert!(rows.is_empty());
        assert_eq!(dropped, 1);
    }

    #[test]
    fn test_nested_fields_win_on_collision() {
        let mut record = sample_record();
        // A top-level column with the same name as a nested attribute.
        record
            .as_object_mut()
            .unwrap()
            .insert("city".to_string(), json!("ShouldLose"));

        let (rows, _) = project_demo_records(&[record]);
        assert_eq!(rows[0].city, "Quincy");
    }

    #[test]
    fn test_staged_count_matches_complete_records() {
        // Five records, two of them missing required attributes.
        let mut records = vec![sample_record(), sample_record(), sample_record()];
        for key in ["median_age", "foreign_born"] {
            let mut broken = sample_record();
            broken["fields"].as_object_mut().unwrap().remove(key);
            records.push(broken);
        }

        let (rows, dropped) = project_demo_records(&records);
        assert_eq!(rows.len(), 3);
        assert_eq!(dropped, 2);
    }
}
