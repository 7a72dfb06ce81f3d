//! Command surface and plugin registration.
//!
//! The engine exposes exactly one command to the host: insert a new
//! equation node at the current selection. [`register_equation_support`]
//! installs that command handler plus the text-transform rules, and fails
//! fast if the host never registered the equation node type — that is a
//! misconfigured host, not bad user input.

use crate::document::Document;
use crate::error::{EquationError, Result};
use crate::node::EQUATION_NODE_TYPE;
use crate::transform;

/// Commands dispatched through the host document.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Insert a new equation node at the current selection.
    ///
    /// Valid only with an active selection; otherwise the dispatch is a
    /// no-op acknowledged negatively, never an error.
    InsertEquation { equation: String, inline: bool },
}

/// Priority tier for command handlers. Higher tiers are consulted first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum CommandPriority {
    Editor,
    Low,
    Normal,
    High,
    Critical,
}

/// Install equation support on a host document.
///
/// Registers, in one go:
/// - the [`Command::InsertEquation`] handler at the editor tier,
/// - the as-you-type `$...$` delimiter transform,
/// - the trigger-word rule (a run equal to `"equation"` becomes an empty
///   block equation).
///
/// # Errors
///
/// [`EquationError::NodeTypeNotRegistered`] when the host document was
/// built without the equation node type. Callers should treat this as
/// fatal at initialisation.
pub fn register_equation_support(doc: &mut Document) -> Result<()> {
    if !doc.has_node_type(EQUATION_NODE_TYPE) {
        return Err(EquationError::NodeTypeNotRegistered);
    }

    doc.register_command_handler(
        CommandPriority::Editor,
        Box::new(|txn, command| {
            let Command::InsertEquation { equation, inline } = command;
            txn.insert_equation_at_selection(equation, *inline).is_some()
        }),
    );
    doc.register_text_transform(Box::new(transform::delimiter_typed_transform));
    doc.register_text_transform(Box::new(transform::trigger_word_transform));

    tracing::debug!("equation support registered");
    Ok(())
}
