//! Error handling for the equation engine.
//!
//! Variants are intentionally coarse-grained: a snapshot error is fatal to
//! that single import only, while [`EquationError::NodeTypeNotRegistered`]
//! indicates a misconfigured host and should abort initialisation. Render
//! failures are not represented here at all; they are recovered locally as a
//! controller state transition (see [`crate::render::RenderFailure`]).

use crate::node::EQUATION_NODE_TYPE;

/// Error type for the equation engine.
#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum EquationError {
    /// The host document was built without registering the equation node
    /// type. This is a programming error in the host, not bad user input,
    /// so callers are expected to fail fast on it.
    #[error("node type {EQUATION_NODE_TYPE:?} is not registered with the document")]
    NodeTypeNotRegistered,

    /// A serialized snapshot carried a `type` tag other than `"equation"`.
    #[error("snapshot node type {0:?} does not match {EQUATION_NODE_TYPE:?}")]
    SnapshotTypeMismatch(String),

    /// A serialized snapshot carried a schema revision this engine does not
    /// understand.
    #[error("unsupported snapshot version {0}")]
    UnsupportedSnapshotVersion(u32),

    /// A snapshot failed to deserialize (missing, extra, or mistyped fields).
    #[error("malformed equation snapshot: {0}")]
    MalformedSnapshot(#[from] serde_json::Error),
}

/// Convenient alias used throughout the crate.
pub type Result<T, E = EquationError> = core::result::Result<T, E>;
