//! Shared test fixtures for the driftsync workspace.
//!
//! Canned schemas, record builders, and pre-seeded adapters used across
//! crate test suites. Dev-dependency only — never published.
//!
//! # Modules
//!
//! - [`fixtures`] — the employee/badge demo schemas and record builders
//! - [`store`] — seeded adapters and on-disk JSON snapshot helpers

pub mod fixtures;
pub mod store;
