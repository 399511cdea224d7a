//! Record schema and instance model for driftsync.
//!
//! A [`RecordSchema`] names the identifier fields, attribute fields, and
//! declared child types of one record type. A [`Record`] is a flat
//! field-name to value mapping conforming to such a schema. Stable
//! identifier keys (uids) are derived by joining identifier-field values,
//! which is what the diff engine and store adapters key everything by.

pub mod error;
pub mod record;
pub mod schema;

pub use error::{Error, Result};
pub use record::{ParentRef, Record};
pub use schema::RecordSchema;
