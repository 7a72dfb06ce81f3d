//! The equation node and its serialized snapshot format.
//!
//! An [`EquationNode`] is the document-resident representation of one
//! equation: raw TeX source plus an inline/block mode flag. Nodes carry no
//! behavior beyond read and atomic whole-text replacement; everything
//! stateful lives in [`crate::controller::EquationEditController`].

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::error::{EquationError, Result};

/// Node type tag used in the host registry and in snapshots.
pub const EQUATION_NODE_TYPE: &str = "equation";

/// Snapshot schema revision this engine reads and writes.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Opaque, stable identity of a node within a document.
///
/// Keys are assigned by the document at creation and never reused, so a
/// stale key simply fails to locate anything (the benign "target vanished"
/// outcome) rather than aliasing a different node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey(pub(crate) u64);

impl std::fmt::Display for NodeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One equation: raw source text plus rendering mode.
///
/// `inline` is immutable post-construction. Switching between inline and
/// block changes the surrounding structural container, so a mode change is
/// modelled as node replacement, never mutation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EquationNode {
    equation: SmolStr,
    inline: bool,
}

impl EquationNode {
    /// Create a node with the given source text and mode.
    pub fn new(equation: impl Into<SmolStr>, inline: bool) -> Self {
        Self {
            equation: equation.into(),
            inline,
        }
    }

    /// Raw TeX source. May be empty for a freshly inserted node.
    pub fn equation(&self) -> &str {
        &self.equation
    }

    /// Whether this node renders as an inline span (`true`) or a display
    /// block (`false`).
    pub fn inline(&self) -> bool {
        self.inline
    }

    /// Atomic whole-text replacement. Only reachable through a document
    /// transaction; see [`crate::document::DocumentTxn::set_equation`].
    pub(crate) fn set_equation(&mut self, equation: impl Into<SmolStr>) {
        self.equation = equation.into();
    }

    /// Parse a node from its serialized snapshot.
    ///
    /// The snapshot must match the exact shape emitted by
    /// [`EquationNode::to_snapshot`]; unknown fields, a wrong `type` tag, or
    /// an unknown `version` fail this single import with a schema error.
    pub fn from_snapshot(json: &str) -> Result<Self> {
        let snapshot: SerializedEquationNode = serde_json::from_str(json)?;
        if snapshot.node_type != EQUATION_NODE_TYPE {
            return Err(EquationError::SnapshotTypeMismatch(snapshot.node_type));
        }
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(EquationError::UnsupportedSnapshotVersion(snapshot.version));
        }
        Ok(Self::new(snapshot.equation, snapshot.inline))
    }

    /// Serialize to the versioned snapshot format.
    ///
    /// Always emits `version: 1` for this schema revision.
    pub fn to_snapshot(&self) -> Result<String> {
        let snapshot = SerializedEquationNode {
            node_type: EQUATION_NODE_TYPE.to_owned(),
            equation: self.equation.to_string(),
            inline: self.inline,
            version: SNAPSHOT_VERSION,
        };
        Ok(serde_json::to_string(&snapshot)?)
    }
}

/// Wire shape of a persisted equation node.
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct SerializedEquationNode {
    #[serde(rename = "type")]
    node_type: String,
    equation: String,
    inline: bool,
    version: u32,
}
