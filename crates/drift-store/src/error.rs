//! Error types for drift-store

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// One or more requested identifier keys are absent
    #[error("Record(s) of type '{type_name}' not found: {uids:?}")]
    NotFound { type_name: String, uids: Vec<String> },

    /// The identifier key is already indexed
    #[error("Record '{uid}' of type '{type_name}' already exists")]
    AlreadyExists { type_name: String, uid: String },

    /// The source fed into `load` is malformed; the prior index is untouched
    #[error("Malformed source '{source_name}': {message}")]
    MalformedSource { source_name: String, message: String },

    /// Record type not declared on this adapter
    #[error("Unknown record type: {type_name}")]
    UnknownType { type_name: String },

    /// The backing store is fatally unavailable (connection lost)
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Non-fatal backing store failure
    #[error("Store backend error: {0}")]
    Backend(String),

    #[error(transparent)]
    Model(#[from] drift_model::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for a single-uid `NotFound`.
    pub fn not_found(type_name: impl Into<String>, uid: impl Into<String>) -> Self {
        Self::NotFound {
            type_name: type_name.into(),
            uids: vec![uid.into()],
        }
    }

    /// Whether this error means the adapter cannot service further calls.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
            Self::Unavailable(err.to_string())
        } else {
            Self::Backend(err.to_string())
        }
    }
}
