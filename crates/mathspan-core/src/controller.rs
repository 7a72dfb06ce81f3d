//! Per-instance edit state machine for one equation node.
//!
//! The controller owns the negotiation between "what is rendered" and "what
//! the user is typing": the committed text mirrored from the node at mount,
//! the in-progress draft, the last known render validity, and whether the
//! edit surface is open. It is the only component that writes equation
//! state back into the document, and it does so exclusively through
//! `save`/`discard` transactions.
//!
//! At most one controller should be active per node; the engine assumes a
//! single edit surface per node and relies on last-write-wins for stale
//! render outcomes (see the concurrency notes in the crate docs).

use smol_str::SmolStr;

use crate::document::Document;
use crate::node::NodeKey;

/// Result of trying to bind the edit surface to its node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpenOutcome {
    /// The edit surface is now bound and visible.
    Opened,
    /// The node is no longer in the document. Benign; not an error.
    TargetVanished,
}

/// Signals arriving from the edit surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditSignal {
    /// Escape key: revert edits, restore the caret after the node.
    Escape,
    /// Enter key: commit the draft, restore the caret after the node.
    Enter,
    /// Explicit confirm action (same protocol as Enter).
    Confirm,
    /// Dismissal outside the surface (focus loss, click elsewhere): revert
    /// edits without touching the caret.
    Dismiss,
}

/// Edit state machine for one mounted equation node.
pub struct EquationEditController {
    key: NodeKey,
    inline: bool,
    committed: SmolStr,
    draft: SmolStr,
    valid: bool,
    anchor: Option<NodeKey>,
}

impl EquationEditController {
    /// Mount a controller on a node, mirroring its committed text.
    ///
    /// A freshly inserted node with no text auto-opens its editor: an empty
    /// equation is never silently rendered. Returns `None` if the node is
    /// not in the document.
    pub fn mount(doc: &Document, key: NodeKey) -> Option<Self> {
        let node = doc.node(key)?;
        let committed = SmolStr::new(node.equation());
        let mut controller = Self {
            key,
            inline: node.inline(),
            committed: committed.clone(),
            draft: committed,
            valid: true,
            anchor: None,
        };
        if controller.draft.is_empty() {
            controller.open(doc);
        }
        Some(controller)
    }

    /// Key of the node this controller edits.
    pub fn key(&self) -> NodeKey {
        self.key
    }

    /// Rendering mode of the node (immutable for its lifetime).
    pub fn inline(&self) -> bool {
        self.inline
    }

    /// Committed text as of the last successful save (or mount).
    pub fn committed(&self) -> &str {
        &self.committed
    }

    /// The in-progress draft text.
    pub fn draft(&self) -> &str {
        &self.draft
    }

    /// Last known render outcome. Optimistically `true` until a render
    /// failure is reported.
    pub fn valid(&self) -> bool {
        self.valid
    }

    /// Whether the edit surface is currently bound.
    pub fn editing(&self) -> bool {
        self.anchor.is_some()
    }

    /// Bind the edit surface to the node's current anchor.
    ///
    /// A no-op when the node can no longer be located, e.g. it was removed
    /// concurrently; that outcome is reported but never an error.
    pub fn open(&mut self, doc: &Document) -> OpenOutcome {
        if doc.node(self.key).is_none() {
            tracing::debug!(key = %self.key, "open: target vanished");
            return OpenOutcome::TargetVanished;
        }
        self.anchor = Some(self.key);
        OpenOutcome::Opened
    }

    /// Replace the draft text. Validity resets to `true` (optimistic until
    /// a render proves otherwise), and an empty draft forces the editor
    /// open.
    pub fn on_draft_change(&mut self, doc: &Document, text: &str) {
        self.draft = SmolStr::new(text);
        self.valid = true;
        if self.draft.is_empty() {
            self.open(doc);
        }
    }

    /// Record a render failure for the current draft. Pure state
    /// transition; never fails, and the draft is left untouched so the user
    /// can correct it.
    pub fn on_render_failure(&mut self) {
        self.valid = false;
    }

    /// Commit the draft: close the surface, then in one transaction either
    /// replace the node's text (non-empty draft) or remove the node (empty
    /// draft), optionally restoring the caret to just after the node.
    ///
    /// A vanished node makes this a no-op. Saving the same unchanged draft
    /// twice produces the same committed state as saving it once.
    pub fn save(&mut self, doc: &mut Document, restore_selection: bool) {
        self.anchor = None;
        let key = self.key;
        let draft = self.draft.clone();
        let applied = doc.update(|txn| {
            if txn.node(key).is_none() {
                return false;
            }
            if draft.is_empty() {
                if restore_selection {
                    txn.select_after(key);
                }
                txn.remove_node(key);
            } else {
                txn.set_equation(key, &draft);
                if restore_selection {
                    txn.select_after(key);
                }
            }
            true
        });
        if applied {
            tracing::debug!(key = %key, removed = draft.is_empty(), "equation saved");
            self.committed = draft;
        }
    }

    /// Cancel editing: close the surface and revert the draft to the
    /// committed text.
    ///
    /// When `restore_selection` is set, or when the committed text is
    /// empty, a transaction runs: the caret is optionally restored and a
    /// never-populated node is removed. Closing an empty equation without
    /// edits always deletes it. Otherwise this is a purely local reset.
    pub fn discard(&mut self, doc: &mut Document, restore_selection: bool) {
        self.anchor = None;
        self.draft = self.committed.clone();
        let committed_empty = self.committed.is_empty();
        if restore_selection || committed_empty {
            let key = self.key;
            doc.update(|txn| {
                if txn.node(key).is_none() {
                    return;
                }
                if restore_selection {
                    txn.select_after(key);
                }
                if committed_empty {
                    txn.remove_node(key);
                }
            });
            tracing::debug!(key = %key, removed = committed_empty, "equation edit discarded");
        }
    }

    /// Apply the edit-surface keyboard protocol.
    pub fn handle(&mut self, doc: &mut Document, signal: EditSignal) {
        match signal {
            EditSignal::Escape => self.discard(doc, true),
            EditSignal::Enter | EditSignal::Confirm => self.save(doc, true),
            EditSignal::Dismiss => self.discard(doc, false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Document with one text run and one mounted equation node.
    fn doc_with_equation(equation: &str, inline: bool) -> (Document, NodeKey) {
        let mut doc = Document::new();
        let key = doc
            .update(|txn| {
                txn.set_selection(Some(0));
                txn.insert_text("around");
                txn.set_selection(Some(3));
                txn.insert_equation_at_selection(equation, inline)
            })
            .unwrap();
        (doc, key)
    }

    #[test]
    fn test_mount_mirrors_committed() {
        let (doc, key) = doc_with_equation("a+b", true);
        let ctl = EquationEditController::mount(&doc, key).unwrap();
        assert_eq!(ctl.committed(), "a+b");
        assert_eq!(ctl.draft(), "a+b");
        assert!(ctl.valid());
        assert!(!ctl.editing());
    }

    #[test]
    fn test_mount_empty_auto_opens() {
        let (doc, key) = doc_with_equation("", false);
        let ctl = EquationEditController::mount(&doc, key).unwrap();
        assert!(ctl.editing());
    }

    #[test]
    fn test_mount_missing_node() {
        let (mut doc, key) = doc_with_equation("x", true);
        doc.update(|txn| txn.remove_node(key));
        assert!(EquationEditController::mount(&doc, key).is_none());
    }

    #[test]
    fn test_empty_draft_forces_editing() {
        let (doc, key) = doc_with_equation("a+b", true);
        let mut ctl = EquationEditController::mount(&doc, key).unwrap();
        assert!(!ctl.editing());
        ctl.on_draft_change(&doc, "");
        assert!(ctl.editing());
    }

    #[test]
    fn test_draft_change_resets_validity() {
        let (doc, key) = doc_with_equation("a+b", true);
        let mut ctl = EquationEditController::mount(&doc, key).unwrap();
        ctl.on_render_failure();
        assert!(!ctl.valid());
        ctl.on_draft_change(&doc, "\\frac{1}{2}");
        assert!(ctl.valid());
    }

    #[test]
    fn test_save_commits_draft() {
        let (mut doc, key) = doc_with_equation("a+b", true);
        let mut ctl = EquationEditController::mount(&doc, key).unwrap();
        ctl.open(&doc);
        ctl.on_draft_change(&doc, "a+b+c");
        ctl.save(&mut doc, true);
        assert!(!ctl.editing());
        assert_eq!(ctl.committed(), "a+b+c");
        assert_eq!(doc.node(key).unwrap().equation(), "a+b+c");
        // Caret restored just after the node.
        assert_eq!(doc.selection(), Some(doc.node_position(key).unwrap() + 1));
    }

    #[test]
    fn test_save_is_idempotent() {
        let (mut doc, key) = doc_with_equation("a+b", true);
        let mut ctl = EquationEditController::mount(&doc, key).unwrap();
        ctl.on_draft_change(&doc, "c");
        ctl.save(&mut doc, false);
        let after_first = doc.node(key).unwrap().clone();
        ctl.save(&mut doc, false);
        assert_eq!(doc.node(key).unwrap(), &after_first);
        assert_eq!(ctl.committed(), "c");
    }

    #[test]
    fn test_save_empty_draft_removes_node() {
        let (mut doc, key) = doc_with_equation("a+b", true);
        let position = doc.node_position(key).unwrap();
        let mut ctl = EquationEditController::mount(&doc, key).unwrap();
        ctl.on_draft_change(&doc, "");
        ctl.handle(&mut doc, EditSignal::Enter);
        assert!(doc.node(key).is_none());
        // Caret placed where the node used to be.
        assert_eq!(doc.selection(), Some(position));
        assert_eq!(doc.to_plain_text(), "around");
    }

    #[test]
    fn test_save_on_vanished_node_is_noop() {
        let (mut doc, key) = doc_with_equation("a+b", true);
        let mut ctl = EquationEditController::mount(&doc, key).unwrap();
        ctl.on_draft_change(&doc, "changed");
        doc.update(|txn| txn.remove_node(key));
        ctl.save(&mut doc, true);
        // Nothing to commit against; committed text stays as mounted.
        assert_eq!(ctl.committed(), "a+b");
    }

    #[test]
    fn test_discard_reverts_draft() {
        let (mut doc, key) = doc_with_equation("a+b", true);
        let mut ctl = EquationEditController::mount(&doc, key).unwrap();
        ctl.open(&doc);
        ctl.on_draft_change(&doc, "garbage");
        ctl.handle(&mut doc, EditSignal::Escape);
        assert!(!ctl.editing());
        assert_eq!(ctl.draft(), "a+b");
        assert_eq!(doc.node(key).unwrap().equation(), "a+b");
    }

    #[test]
    fn test_dismiss_without_edits_keeps_document_untouched() {
        let (mut doc, key) = doc_with_equation("a+b", true);
        doc.update(|txn| txn.set_selection(Some(0)));
        let mut ctl = EquationEditController::mount(&doc, key).unwrap();
        ctl.open(&doc);
        ctl.handle(&mut doc, EditSignal::Dismiss);
        // No caret restore on dismissal.
        assert_eq!(doc.selection(), Some(0));
        assert!(doc.node(key).is_some());
    }

    #[test]
    fn test_discard_deletes_never_populated_node() {
        let (mut doc, key) = doc_with_equation("", true);
        let mut ctl = EquationEditController::mount(&doc, key).unwrap();
        assert!(ctl.editing());
        ctl.handle(&mut doc, EditSignal::Dismiss);
        assert!(doc.node(key).is_none());
    }

    #[test]
    fn test_open_after_removal_reports_vanished() {
        let (mut doc, key) = doc_with_equation("a+b", true);
        let mut ctl = EquationEditController::mount(&doc, key).unwrap();
        doc.update(|txn| txn.remove_node(key));
        assert_eq!(ctl.open(&doc), OpenOutcome::TargetVanished);
        assert!(!ctl.editing());
    }
}
