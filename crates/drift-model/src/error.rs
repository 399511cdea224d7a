//! Error types for drift-model

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Record of type '{type_name}' is missing identifier field '{field}'")]
    MissingIdentifier { type_name: String, field: String },

    #[error("Field '{field}' is not declared by schema '{type_name}'")]
    UndeclaredField { type_name: String, field: String },

    #[error("Schema '{type_name}' declares no identifier fields")]
    NoIdentifiers { type_name: String },
}
