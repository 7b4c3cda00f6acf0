//! Error types for store definition, construction and access.

use thiserror::Error;

/// Boxed error raised by user code (state initializers, setup functions, actions).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Everything that can go wrong while defining, building or using a store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no registry is reachable from the current context")]
    MissingContext,

    #[error("store id must be a non-empty string")]
    EmptyId,

    #[error("store `{id}`: field `{field}` is declared more than once")]
    FieldCollision { id: String, field: String },

    #[error("store `{id}`: field name `{field}` is reserved (names starting with `$`)")]
    ReservedField { id: String, field: String },

    #[error("store `{id}`: state initializer must return an object, got {found}")]
    InvalidState { id: String, found: &'static str },

    #[error("store `{id}` has no field `{field}`")]
    UnknownField { id: String, field: String },

    #[error("store `{id}`: field `{field}` is read-only")]
    ReadOnly { id: String, field: String },

    #[error("store `{id}`: field `{field}` is not an action")]
    NotAnAction { id: String, field: String },

    #[error("action `{name}` is asynchronous and must be awaited")]
    AsyncAction { name: String },

    #[error("store `{id}` no longer exists")]
    StoreDropped { id: String },

    #[error("store `{id}` has been disposed")]
    Disposed { id: String },

    #[error("store `{id}` was defined with a setup function and cannot be reset")]
    ResetUnsupported { id: String },

    #[error("store `{id}` is already registered from a different definition")]
    Redefined { id: String },

    #[error("the registry has been torn down")]
    RegistryStopped,

    #[error("expected {expected}, got {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error(transparent)]
    Failed(BoxError),

    #[error("json serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("msgpack encoding failed: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
}

impl StoreError {
    /// Wrap an error raised by user code.
    pub fn failed<E>(error: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Failed(error.into())
    }
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

/// Name of a JSON value's kind, for error messages.
pub(crate) fn json_kind(value: &serde_json::Value) -> &'static str {
    use serde_json::Value;
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
