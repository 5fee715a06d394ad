// src/atn/error.rs
use thiserror::Error;

/// Fatal deserialization failures. All of these abandon the partially built
/// graph; there is no partial return.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AtnError {
    /// Payload was produced by a schema this runtime does not understand
    /// (wrong version, unknown UUID), or asks for a rewrite the graph shape
    /// does not support.
    #[error("unsupported ATN schema: {0}")]
    UnsupportedSchema(String),

    /// Payload content is malformed: unknown state or transition tag,
    /// truncated unit stream, or an index pointing outside a table.
    #[error("invalid ATN payload: {0}")]
    InvalidArgument(String),

    /// The assembled graph violates a structural invariant.
    #[error("ATN structure violation: {0}")]
    Structural(String),
}
