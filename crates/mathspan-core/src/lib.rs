//! mathspan-core: equation node lifecycle and text-equation transforms.
//!
//! This crate provides:
//! - `EquationNode` - the document-resident equation (text + inline/block mode)
//!   with a versioned JSON snapshot format
//! - `Document` - a minimal host-document collaborator (node registry,
//!   atomic transactions, selection, transform/command registration)
//! - `EquationEditController` - the draft/committed/validity state machine
//!   with the save/discard protocol
//! - delimiter transforms mapping `$...$` plain text to/from nodes
//! - `RenderAdapter` - the boundary to an external math renderer
//!
//! All state transitions run on the host's serialized update path: mutation
//! happens only inside `Document::update` transactions, so no reader ever
//! observes a half-applied edit. Render attempts are fire-and-forget per
//! draft change; a stale outcome is simply overwritten by the next attempt.

pub mod command;
pub mod controller;
pub mod document;
pub mod error;
pub mod node;
pub mod render;
pub mod transform;

pub use command::{Command, CommandPriority, register_equation_support};
pub use controller::{EditSignal, EquationEditController, OpenOutcome};
pub use document::{Document, DocumentTxn, Segment};
pub use error::EquationError;
pub use node::{EQUATION_NODE_TYPE, EquationNode, NodeKey, SNAPSHOT_VERSION};
pub use render::{DeferredAdapter, EquationView, RenderAdapter, RenderFailure, render_view};
pub use smol_str::SmolStr;
