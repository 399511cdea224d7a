//! The employee/badge demo schemas and record builders.
//!
//! The employee shape mirrors the built-in CLI schema: `username` as the
//! identifier and six personnel attributes.

use std::collections::BTreeMap;

use serde_json::{Value, json};

use drift_model::{Record, RecordSchema};

/// The full employee schema: `username` identifier plus six attributes.
pub fn employee_schema() -> RecordSchema {
    RecordSchema::new(
        "employee",
        vec!["username".into()],
        vec![
            "name".into(),
            "company".into(),
            "job".into(),
            "ssn".into(),
            "residence".into(),
            "mail".into(),
        ],
    )
}

/// Badge child schema for parent/child scenarios.
pub fn badge_schema() -> RecordSchema {
    RecordSchema::new("badge", vec!["serial".into()], vec!["active".into()])
}

/// Employee schema declaring badges as children, plus the badge schema.
pub fn schemas_with_badges() -> Vec<RecordSchema> {
    vec![
        employee_schema().with_children(vec!["badge".into()]),
        badge_schema(),
    ]
}

/// A fully-populated employee record with deterministic canned values.
pub fn employee(username: &str) -> Record {
    employee_at(username, "Initech")
}

/// An employee record with an explicit company, for update scenarios.
pub fn employee_at(username: &str, company: &str) -> Record {
    let fields: BTreeMap<String, Value> = BTreeMap::from([
        ("username".to_string(), json!(username)),
        ("name".to_string(), json!(format!("Test {username}"))),
        ("company".to_string(), json!(company)),
        ("job".to_string(), json!("Engineer")),
        ("ssn".to_string(), json!("000-00-0000")),
        ("residence".to_string(), json!("1 Main St")),
        ("mail".to_string(), json!(format!("{username}@example.com"))),
    ]);
    Record::from_fields(&employee_schema(), fields).unwrap()
}

/// A badge record attached to an employee parent.
pub fn badge(serial: &str, owner: &str, active: bool) -> Record {
    let fields = BTreeMap::from([
        ("serial".to_string(), json!(serial)),
        ("active".to_string(), json!(active)),
    ]);
    Record::from_fields(&badge_schema(), fields)
        .unwrap()
        .with_parent("employee", owner)
}
