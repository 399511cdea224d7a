//! Store adapters for driftsync.
//!
//! A [`StoreAdapter`] wraps one backing collection of records and exposes it
//! through a uniform in-memory view: `load` rebuilds the index wholesale,
//! reads are synchronous lookups against the index, and the side-effecting
//! operations (`add`/`update`/`remove`) also perform the matching external
//! write on live backends.
//!
//! Three backends are provided:
//!
//! - [`MemoryStore`] — index only, no external source
//! - [`JsonFileStore`] — loads a JSON snapshot file; writes stay in-memory
//! - [`RedisStore`] — hash-per-record in a Redis instance

pub mod adapter;
pub mod error;
pub mod index;
pub mod json_file;
pub mod memory;
pub mod redis_store;

pub use adapter::StoreAdapter;
pub use error::{Error, Result};
pub use index::StoreIndex;
pub use json_file::JsonFileStore;
pub use memory::MemoryStore;
pub use redis_store::{RedisConfig, RedisStore};
