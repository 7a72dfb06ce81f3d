//! Bidirectional mapping between `$...$` plain text and equation nodes.
//!
//! Export produces `$equation$` for any node mode; there is no distinct
//! block marker in plain text, so block mode is lossy through this form,
//! and interior `$` characters are not escaped. Both are documented
//! limitations inherited from the delimiter syntax, not silently fixed.
//!
//! Import has two variants sharing one pattern: a scan form used when
//! importing whole text runs, and an end-anchored form used as-you-type so
//! that only text ending at the caret converts. The delimiters must
//! enclose one or more non-`$` characters, so empty `$$` sequences stay
//! literal and a span never swallows a delimiter. Only the first
//! well-formed span per scan converts; later ones wait for the next pass.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use smol_str::SmolStr;

use crate::document::DocumentTxn;
use crate::node::EquationNode;

/// Character that makes the as-you-type matcher worth running at all.
pub const DELIMITER_TRIGGER: char = '$';

/// Literal token replaced by a fresh, empty block equation.
pub const TRIGGER_WORD: &str = "equation";

static IMPORT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$([^$]+)\$").expect("delimiter import pattern"));

static TYPED_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$([^$]+)\$$").expect("delimiter typed pattern"));

/// A well-formed delimiter span found in a text run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DelimiterMatch {
    /// Character range of the whole `$...$` span within the run.
    pub range: Range<usize>,
    /// The captured equation source, delimiters stripped.
    pub equation: SmolStr,
}

/// Serialize a node to its plain-text delimiter form.
pub fn export_node(node: &EquationNode) -> String {
    format!("${}$", node.equation())
}

/// First well-formed `$...$` span in `text`, if any.
///
/// Overlapping or malformed delimiter sequences are not matched and stay
/// literal; a later scan pass picks up anything the restructuring exposed.
pub fn find_import_match(text: &str) -> Option<DelimiterMatch> {
    to_char_match(text, IMPORT_PATTERN.captures(text)?)
}

/// Well-formed `$...$` span ending exactly at character offset `caret`, if
/// any. This is the as-you-type variant: requiring the match to end at the
/// typing position avoids retroactively converting unrelated text.
pub fn find_typed_match(text: &str, caret: usize) -> Option<DelimiterMatch> {
    let byte = text
        .char_indices()
        .nth(caret)
        .map(|(b, _)| b)
        .unwrap_or(text.len());
    to_char_match(text, TYPED_PATTERN.captures(&text[..byte])?)
}

fn to_char_match(text: &str, captures: regex::Captures<'_>) -> Option<DelimiterMatch> {
    let whole = captures.get(0)?;
    let equation = captures.get(1)?.as_str();
    let start = text[..whole.start()].chars().count();
    let len = whole.as_str().chars().count();
    Some(DelimiterMatch {
        range: start..start + len,
        equation: SmolStr::new(equation),
    })
}

/// Import transform over a whole text run: replaces the first well-formed
/// delimiter span with an inline equation node. Returns whether the run was
/// restructured.
pub fn delimiter_import_transform(txn: &mut DocumentTxn<'_>, seg: usize) -> bool {
    let Some(found) = txn.text_run(seg).and_then(find_import_match) else {
        return false;
    };
    txn.replace_text_span_with_equation(seg, found.range, &found.equation, true)
        .is_some()
}

/// As-you-type transform: converts a delimiter span that ends at the caret.
pub fn delimiter_typed_transform(txn: &mut DocumentTxn<'_>, seg: usize) -> bool {
    let Some(caret) = txn.selection_in_segment(seg) else {
        return false;
    };
    let Some(found) = txn
        .text_run(seg)
        .filter(|text| text.contains(DELIMITER_TRIGGER))
        .and_then(|text| find_typed_match(text, caret))
    else {
        return false;
    };
    txn.replace_text_span_with_equation(seg, found.range, &found.equation, true)
        .is_some()
}

/// Trigger-word rule: a text run exactly equal to [`TRIGGER_WORD`] becomes
/// an empty block equation, which then auto-opens its editor.
pub fn trigger_word_transform(txn: &mut DocumentTxn<'_>, seg: usize) -> bool {
    match txn.text_run(seg) {
        Some(text) if text == TRIGGER_WORD => {
            let len = TRIGGER_WORD.chars().count();
            txn.replace_text_span_with_equation(seg, 0..len, "", false)
                .is_some()
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Document, Segment};

    #[test]
    fn test_export_both_modes() {
        assert_eq!(export_node(&EquationNode::new("x^2", true)), "$x^2$");
        assert_eq!(export_node(&EquationNode::new("x^2", false)), "$x^2$");
    }

    #[test]
    fn test_export_interior_dollar_not_escaped() {
        // Known limitation: interior delimiters break round-trip fidelity.
        assert_eq!(export_node(&EquationNode::new("a$b", true)), "$a$b$");
    }

    #[test]
    fn test_import_match_basic() {
        let m = find_import_match("before $a+b$ after").unwrap();
        assert_eq!(m.equation, "a+b");
        assert_eq!(m.range, 7..12);
    }

    #[test]
    fn test_import_match_rejects_malformed_delimiters() {
        assert!(find_import_match("$$").is_none());
        assert!(find_import_match("$").is_none());
        assert!(find_import_match("a$$b").is_none());
        // A leading `$$` is not a span start, but the second `$` can still
        // open a well-formed one.
        let m = find_import_match("$$ab$").unwrap();
        assert_eq!(m.equation, "ab");
        assert_eq!(m.range, 1..5);
    }

    #[test]
    fn test_import_match_single_char() {
        let m = find_import_match("$x$").unwrap();
        assert_eq!(m.equation, "x");
    }

    #[test]
    fn test_import_match_first_wins() {
        let m = find_import_match("$a$$b$").unwrap();
        assert_eq!(m.equation, "a");
        assert_eq!(m.range, 0..3);
    }

    #[test]
    fn test_typed_match_only_at_caret() {
        let text = "see $a+b$ done";
        assert!(find_typed_match(text, text.chars().count()).is_none());
        let m = find_typed_match(text, 9).unwrap();
        assert_eq!(m.equation, "a+b");
        assert_eq!(m.range, 4..9);
    }

    #[test]
    fn test_typed_match_multibyte() {
        let text = "é$αβ$";
        let m = find_typed_match(text, 5).unwrap();
        assert_eq!(m.equation, "αβ");
        assert_eq!(m.range, 1..5);
    }

    #[test]
    fn test_import_transform_round_trip() {
        let node = EquationNode::new("e^{i\\pi}", true);
        let mut doc = Document::new();
        doc.update(|txn| {
            txn.set_selection(Some(0));
            txn.insert_text(&export_node(&node));
        });
        doc.update(|txn| {
            assert!(delimiter_import_transform(txn, 0));
        });
        let [Segment::Equation(key)] = doc.segments() else {
            panic!("expected a single equation segment");
        };
        let imported = doc.node(*key).unwrap();
        assert_eq!(imported, &node);
    }

    #[test]
    fn test_import_transform_block_mode_is_lossy() {
        let node = EquationNode::new("\\sum_i i", false);
        let mut doc = Document::new();
        doc.update(|txn| {
            txn.set_selection(Some(0));
            txn.insert_text(&export_node(&node));
        });
        doc.update(|txn| {
            assert!(delimiter_import_transform(txn, 0));
        });
        let [Segment::Equation(key)] = doc.segments() else {
            panic!("expected a single equation segment");
        };
        let imported = doc.node(*key).unwrap();
        assert_eq!(imported.equation(), node.equation());
        // Plain text has no block marker: the mode comes back inline.
        assert!(imported.inline());
    }

    #[test]
    fn test_import_transform_leaves_malformed_text() {
        let mut doc = Document::new();
        doc.update(|txn| {
            txn.set_selection(Some(0));
            txn.insert_text("$$ an unclosed span");
        });
        doc.update(|txn| {
            assert!(!delimiter_import_transform(txn, 0));
        });
        assert_eq!(doc.to_plain_text(), "$$ an unclosed span");
    }

    #[test]
    fn test_trigger_word_exact_match_only() {
        let mut doc = Document::new();
        doc.update(|txn| {
            txn.set_selection(Some(0));
            txn.insert_text("an equation here");
        });
        doc.update(|txn| {
            assert!(!trigger_word_transform(txn, 0));
        });
        assert_eq!(doc.to_plain_text(), "an equation here");
    }
}
