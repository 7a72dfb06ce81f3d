//! Minimal host-document collaborator model.
//!
//! The equation engine does not own a rich-text engine; it consumes a small
//! contract from one: locate a node by key, run an atomic update
//! transaction, query/set the selection, register text-transform rules, and
//! register command handlers with a priority tier. This module carries an
//! in-memory implementation of exactly that contract so the engine is
//! testable and embeddable without a UI harness.
//!
//! A document is a flat sequence of [`Segment`]s: text runs and equation
//! nodes. Positions are measured in units where one text character and one
//! equation node each count as one unit, so the caret is a single absolute
//! offset, as in a plain text buffer.
//!
//! All mutation goes through [`Document::update`], which hands out a
//! [`DocumentTxn`] guard. Readers holding `&Document` can never observe a
//! partially-applied transaction; updates are serialized by `&mut`
//! discipline.

use std::collections::HashMap;
use std::ops::Range;

use smol_str::SmolStr;

use crate::command::{Command, CommandPriority};
use crate::node::{EquationNode, NodeKey};
use crate::transform;

/// A text-transform rule: invoked with the index of the text run that was
/// just edited, returns whether it restructured the document. Rules run in
/// registration order and the first restructuring rule ends the pass; the
/// runner is re-invoked on subsequent mutations.
pub type TextTransform = Box<dyn Fn(&mut DocumentTxn<'_>, usize) -> bool>;

/// A command handler: returns whether it consumed the command.
pub type CommandHandler = Box<dyn FnMut(&mut DocumentTxn<'_>, &Command) -> bool>;

/// One entry in a document's flat content sequence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    /// A run of plain text.
    Text(String),
    /// An equation node, stored by key in the node registry.
    Equation(NodeKey),
}

impl Segment {
    /// Width of this segment in caret units.
    fn units(&self) -> usize {
        match self {
            Segment::Text(s) => s.chars().count(),
            Segment::Equation(_) => 1,
        }
    }
}

/// In-memory document: segment sequence, node registry, caret selection,
/// and the registration surfaces the equation plugin consumes.
#[derive(Default)]
pub struct Document {
    segments: Vec<Segment>,
    nodes: HashMap<NodeKey, EquationNode>,
    selection: Option<usize>,
    node_types: Vec<&'static str>,
    transforms: Vec<TextTransform>,
    handlers: Vec<(CommandPriority, CommandHandler)>,
    next_key: u64,
}

impl Document {
    /// Create an empty document with no registered node types.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node type with the host. Hosts must register
    /// [`crate::node::EQUATION_NODE_TYPE`] before equation support can be
    /// installed.
    pub fn register_node_type(&mut self, node_type: &'static str) {
        if !self.node_types.contains(&node_type) {
            self.node_types.push(node_type);
        }
    }

    /// Whether a node type has been registered.
    pub fn has_node_type(&self, node_type: &str) -> bool {
        self.node_types.contains(&node_type)
    }

    /// Register a text-transform rule, run after text edits on the edited
    /// run. Registering from within a running transform is unsupported.
    pub fn register_text_transform(&mut self, transform: TextTransform) {
        self.transforms.push(transform);
    }

    /// Register a command handler at the given priority tier. Higher tiers
    /// are consulted first; within a tier, registration order wins.
    pub fn register_command_handler(&mut self, priority: CommandPriority, handler: CommandHandler) {
        self.handlers.push((priority, handler));
        self.handlers.sort_by(|a, b| b.0.cmp(&a.0));
    }

    /// The content sequence.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Locate a node by key. `None` means the node is no longer in the
    /// document (the benign "target vanished" case).
    pub fn node(&self, key: NodeKey) -> Option<&EquationNode> {
        self.nodes.get(&key)
    }

    /// Current caret position in units, if any.
    pub fn selection(&self) -> Option<usize> {
        self.selection
    }

    /// Document length in caret units.
    pub fn len_units(&self) -> usize {
        self.segments.iter().map(Segment::units).sum()
    }

    /// Absolute unit position of a node's segment.
    pub fn node_position(&self, key: NodeKey) -> Option<usize> {
        let mut acc = 0;
        for seg in &self.segments {
            if let Segment::Equation(k) = seg
                && *k == key
            {
                return Some(acc);
            }
            acc += seg.units();
        }
        None
    }

    /// The text of a run, if segment `seg` is a text run.
    pub fn text_run(&self, seg: usize) -> Option<&str> {
        match self.segments.get(seg) {
            Some(Segment::Text(s)) => Some(s),
            _ => None,
        }
    }

    /// Caret offset local to segment `seg`, if the caret sits inside it or
    /// on one of its boundaries.
    pub fn selection_in_segment(&self, seg: usize) -> Option<usize> {
        let sel = self.selection?;
        let start: usize = self.segments.get(..seg)?.iter().map(Segment::units).sum();
        let units = self.segments.get(seg)?.units();
        (start..=start + units).contains(&sel).then(|| sel - start)
    }

    /// Serialize the whole document as plain text, equations in `$...$`
    /// delimiter form. Block mode is lossy through this form.
    pub fn to_plain_text(&self) -> String {
        let mut out = String::new();
        for seg in &self.segments {
            match seg {
                Segment::Text(s) => out.push_str(s),
                Segment::Equation(key) => {
                    if let Some(node) = self.nodes.get(key) {
                        out.push_str(&transform::export_node(node));
                    }
                }
            }
        }
        out
    }

    /// Run an atomic update transaction.
    ///
    /// All mutators live on the [`DocumentTxn`] guard; the closure is the
    /// only place mutation can happen, so readers between updates always
    /// see a fully-applied state.
    pub fn update<R>(&mut self, f: impl FnOnce(&mut DocumentTxn<'_>) -> R) -> R {
        let mut txn = DocumentTxn { doc: self };
        f(&mut txn)
    }

    /// Dispatch a command through the registered handlers, highest priority
    /// tier first. Returns whether any handler consumed it.
    pub fn dispatch(&mut self, command: &Command) -> bool {
        let mut handlers = std::mem::take(&mut self.handlers);
        let handled = self.update(|txn| {
            handlers
                .iter_mut()
                .any(|(_, handler)| handler(txn, command))
        });
        self.handlers = handlers;
        tracing::trace!(?command, handled, "command dispatched");
        handled
    }

    fn alloc_key(&mut self) -> NodeKey {
        let key = NodeKey(self.next_key);
        self.next_key += 1;
        key
    }

    /// Byte offset of the `char_idx`-th character of `s`.
    fn byte_of(s: &str, char_idx: usize) -> usize {
        s.char_indices()
            .nth(char_idx)
            .map(|(b, _)| b)
            .unwrap_or(s.len())
    }
}

/// Mutation guard for one atomic document update.
///
/// Dereferences to [`Document`] for reads; every mutator lives here, so the
/// borrow checker enforces the "mutate only inside transactions" contract.
pub struct DocumentTxn<'a> {
    doc: &'a mut Document,
}

impl std::ops::Deref for DocumentTxn<'_> {
    type Target = Document;

    fn deref(&self) -> &Document {
        self.doc
    }
}

impl DocumentTxn<'_> {
    /// Move the caret, clamped to the document length.
    pub fn set_selection(&mut self, selection: Option<usize>) {
        self.doc.selection = selection.map(|sel| sel.min(self.doc.len_units()));
    }

    /// Place the caret immediately after the given node. Returns `false` if
    /// the node is not in the document.
    pub fn select_after(&mut self, key: NodeKey) -> bool {
        match self.doc.node_position(key) {
            Some(pos) => {
                self.doc.selection = Some(pos + 1);
                true
            }
            None => false,
        }
    }

    /// Atomically replace a node's committed equation text. Returns `false`
    /// if the node is not in the document.
    pub fn set_equation(&mut self, key: NodeKey, equation: &str) -> bool {
        match self.doc.nodes.get_mut(&key) {
            Some(node) => {
                node.set_equation(SmolStr::new(equation));
                true
            }
            None => false,
        }
    }

    /// Remove a node from the document, merging the text runs left adjacent
    /// at the seam and pulling the caret back across the removed unit.
    pub fn remove_node(&mut self, key: NodeKey) -> bool {
        let Some(idx) = self
            .doc
            .segments
            .iter()
            .position(|seg| matches!(seg, Segment::Equation(k) if *k == key))
        else {
            return false;
        };
        let pos = self
            .doc
            .node_position(key)
            .unwrap_or_default();

        self.doc.segments.remove(idx);
        self.doc.nodes.remove(&key);

        // Merge text runs that became adjacent. Merging does not shift unit
        // positions, so no further caret fixup is needed for it.
        if idx > 0 && idx < self.doc.segments.len() {
            if let (Segment::Text(_), Segment::Text(next)) =
                (&self.doc.segments[idx - 1], &self.doc.segments[idx])
            {
                let next = next.clone();
                self.doc.segments.remove(idx);
                if let Segment::Text(prev) = &mut self.doc.segments[idx - 1] {
                    prev.push_str(&next);
                }
            }
        }

        if let Some(sel) = self.doc.selection
            && sel > pos
        {
            self.doc.selection = Some(sel - 1);
        }
        tracing::debug!(%key, "node removed");
        true
    }

    /// Create an equation node at the caret, splitting the surrounding text
    /// run if needed. The caret ends up after the new node. Returns `None`
    /// when there is no selection (a negative acknowledgement, not an
    /// error).
    pub fn insert_equation_at_selection(
        &mut self,
        equation: &str,
        inline: bool,
    ) -> Option<NodeKey> {
        let sel = self.doc.selection?.min(self.doc.len_units());
        let key = self.doc.alloc_key();
        self.doc
            .nodes
            .insert(key, EquationNode::new(equation, inline));

        let mut acc = 0;
        let mut placed = false;
        for i in 0..self.doc.segments.len() {
            match &self.doc.segments[i] {
                Segment::Text(s) => {
                    let units = s.chars().count();
                    if sel <= acc + units {
                        let off = sel - acc;
                        if off == 0 {
                            self.doc.segments.insert(i, Segment::Equation(key));
                        } else if off == units {
                            self.doc.segments.insert(i + 1, Segment::Equation(key));
                        } else {
                            let byte = Document::byte_of(s, off);
                            let after = s[byte..].to_owned();
                            let before = s[..byte].to_owned();
                            self.doc.segments.splice(
                                i..=i,
                                [
                                    Segment::Text(before),
                                    Segment::Equation(key),
                                    Segment::Text(after),
                                ],
                            );
                        }
                        placed = true;
                        break;
                    }
                    acc += units;
                }
                Segment::Equation(_) => {
                    if sel <= acc {
                        self.doc.segments.insert(i, Segment::Equation(key));
                        placed = true;
                        break;
                    }
                    acc += 1;
                }
            }
        }
        if !placed {
            self.doc.segments.push(Segment::Equation(key));
        }
        self.doc.selection = Some(sel + 1);
        tracing::debug!(%key, inline, "equation inserted at selection");
        Some(key)
    }

    /// Replace a character span of text run `seg` with a new equation node
    /// seeded from `equation`. Used by the delimiter import transform.
    ///
    /// A caret inside the replaced span lands after the new node; positions
    /// past the span shift by the unit delta.
    pub fn replace_text_span_with_equation(
        &mut self,
        seg: usize,
        char_range: Range<usize>,
        equation: &str,
        inline: bool,
    ) -> Option<NodeKey> {
        let seg_start: usize = self
            .doc
            .segments
            .get(..seg)?
            .iter()
            .map(Segment::units)
            .sum();
        let Some(Segment::Text(s)) = self.doc.segments.get(seg) else {
            return None;
        };
        let units = s.chars().count();
        if char_range.start >= char_range.end || char_range.end > units {
            return None;
        }

        let before = s[..Document::byte_of(s, char_range.start)].to_owned();
        let after = s[Document::byte_of(s, char_range.end)..].to_owned();
        let key = self.doc.alloc_key();
        self.doc
            .nodes
            .insert(key, EquationNode::new(equation, inline));

        let mut replacement = Vec::with_capacity(3);
        if !before.is_empty() {
            replacement.push(Segment::Text(before));
        }
        let node_pos = seg_start + char_range.start;
        replacement.push(Segment::Equation(key));
        if !after.is_empty() {
            replacement.push(Segment::Text(after));
        }
        self.doc.segments.splice(seg..=seg, replacement);

        let span = char_range.end - char_range.start;
        if let Some(sel) = self.doc.selection {
            let moved = if sel > seg_start + char_range.end {
                sel + 1 - span
            } else if sel > seg_start + char_range.start {
                node_pos + 1
            } else {
                sel
            };
            self.doc.selection = Some(moved);
        }
        tracing::debug!(%key, seg, ?char_range, "text span replaced with equation");
        Some(key)
    }

    /// Insert text at the caret, then run the registered text transforms on
    /// the edited run. Returns `false` without a selection.
    pub fn insert_text(&mut self, text: &str) -> bool {
        let Some(sel) = self.doc.selection.map(|s| s.min(self.doc.len_units())) else {
            return false;
        };
        if text.is_empty() {
            return false;
        }

        let mut acc = 0;
        let mut edited = None;
        for i in 0..self.doc.segments.len() {
            match &mut self.doc.segments[i] {
                Segment::Text(s) => {
                    let units = s.chars().count();
                    if sel <= acc + units {
                        let byte = Document::byte_of(s, sel - acc);
                        s.insert_str(byte, text);
                        edited = Some(i);
                        break;
                    }
                    acc += units;
                }
                Segment::Equation(_) => {
                    if sel <= acc {
                        self.doc.segments.insert(i, Segment::Text(text.to_owned()));
                        edited = Some(i);
                        break;
                    }
                    acc += 1;
                }
            }
        }
        let edited = edited.unwrap_or_else(|| {
            self.doc.segments.push(Segment::Text(text.to_owned()));
            self.doc.segments.len() - 1
        });

        self.doc.selection = Some(sel + text.chars().count());
        self.run_text_transforms(edited);
        true
    }

    /// Run registered text transforms against the given run. The first rule
    /// that restructures the document ends the pass; it will have adjusted
    /// segments itself, so later rules wait for the next mutation.
    pub fn run_text_transforms(&mut self, seg: usize) {
        let transforms = std::mem::take(&mut self.doc.transforms);
        for rule in &transforms {
            if rule(self, seg) {
                tracing::trace!(seg, "text transform restructured the document");
                break;
            }
        }
        self.doc.transforms = transforms;
    }
}
