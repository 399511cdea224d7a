//! Error types for drift-engine

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The two adapters disagree on a record type's schema; the whole diff
    /// aborts, no partial Delta is produced
    #[error("Schema mismatch for type '{type_name}' between '{source_adapter}' and '{target_adapter}'")]
    TypeMismatch {
        type_name: String,
        source_adapter: String,
        target_adapter: String,
    },

    /// A requested record type is not declared on an adapter
    #[error("Record type '{type_name}' is not declared on adapter '{adapter}'")]
    UnknownType { type_name: String, adapter: String },

    #[error(transparent)]
    Store(#[from] drift_store::Error),

    #[error(transparent)]
    Model(#[from] drift_model::Error),
}
