//! Boundary to the external math renderer.
//!
//! The renderer is a black box: text in, rendered markup out, or a
//! reported failure. A failure is never allowed to escape as a fault; it
//! is converted into the controller's render-failure transition. Empty
//! text is never submitted at all — the view layer maps it to a "needs
//! input" affordance, which is distinct from "invalid input".
//!
//! [`DeferredAdapter`] models a lazily loaded renderer as an explicit
//! three-state wrapper (not loaded / ready / failed) so the failure path
//! is deterministic and testable without simulating module loading.

use crate::controller::EquationEditController;

/// A render failure reported by the adapter.
///
/// Carries the renderer's own message; the engine never inspects it beyond
/// display, and never retries.
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
#[error("equation render failed: {message}")]
pub struct RenderFailure {
    message: String,
}

impl RenderFailure {
    /// Wrap a renderer-reported message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The renderer's message, verbatim.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Contract for a math renderer backend.
///
/// Rendering is synchronous from the caller's perspective and produces one
/// definitive outcome per invocation. Callers must not pass empty text.
pub trait RenderAdapter {
    /// Render `equation` to markup, in display mode when `inline` is
    /// `false`.
    fn render(&mut self, equation: &str, inline: bool) -> Result<String, RenderFailure>;
}

enum DeferredState<A> {
    NotLoaded(Box<dyn FnOnce() -> Result<A, RenderFailure> + Send>),
    Ready(A),
    Failed(RenderFailure),
}

/// Wrapper that defers constructing the inner adapter until first use.
///
/// The first render drives the loader exactly once; a loader failure is
/// terminal and every subsequent render reports it again.
pub struct DeferredAdapter<A> {
    state: DeferredState<A>,
}

impl<A: RenderAdapter> DeferredAdapter<A> {
    /// Create a deferred adapter from a loader.
    pub fn new(loader: impl FnOnce() -> Result<A, RenderFailure> + Send + 'static) -> Self {
        Self {
            state: DeferredState::NotLoaded(Box::new(loader)),
        }
    }

    /// Whether the inner adapter has been constructed successfully.
    pub fn is_ready(&self) -> bool {
        matches!(self.state, DeferredState::Ready(_))
    }

    fn ensure_loaded(&mut self) -> Result<&mut A, RenderFailure> {
        if let DeferredState::NotLoaded(_) = self.state {
            // If the loader panics mid-flight, the adapter stays failed.
            let placeholder = DeferredState::Failed(RenderFailure::new("adapter loader panicked"));
            let DeferredState::NotLoaded(loader) = std::mem::replace(&mut self.state, placeholder)
            else {
                unreachable!()
            };
            self.state = match loader() {
                Ok(adapter) => {
                    tracing::debug!("deferred render adapter loaded");
                    DeferredState::Ready(adapter)
                }
                Err(failure) => {
                    tracing::debug!(%failure, "deferred render adapter failed to load");
                    DeferredState::Failed(failure)
                }
            };
        }
        match &mut self.state {
            DeferredState::Ready(adapter) => Ok(adapter),
            DeferredState::Failed(failure) => Err(failure.clone()),
            DeferredState::NotLoaded(_) => unreachable!(),
        }
    }
}

impl<A: RenderAdapter> RenderAdapter for DeferredAdapter<A> {
    fn render(&mut self, equation: &str, inline: bool) -> Result<String, RenderFailure> {
        self.ensure_loaded()?.render(equation, inline)
    }
}

/// What the host should show for an equation node right now.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EquationView {
    /// The node has no text yet: show an "add equation" affordance that
    /// opens the editor.
    NeedsInput { inline: bool },
    /// The draft failed to render: show an "invalid equation" affordance
    /// that reopens the editor with the draft intact.
    Invalid { inline: bool },
    /// Rendered markup from the adapter.
    Rendered(String),
}

impl EquationView {
    /// Affordance label, `None` for rendered output.
    pub fn label(&self) -> Option<String> {
        match self {
            EquationView::NeedsInput { inline } => Some(format!(
                "Add {} TeX equation",
                if *inline { "an inline" } else { "a block" }
            )),
            EquationView::Invalid { inline } => Some(format!(
                "Invalid {} TeX equation",
                if *inline { "inline" } else { "block" }
            )),
            EquationView::Rendered(_) => None,
        }
    }
}

/// Derive the view state for a controller's current draft.
///
/// Empty drafts never reach the adapter; a render failure flips the
/// controller's validity and yields the invalid affordance. The draft is
/// rendered (not the committed text) so in-progress edits preview live.
pub fn render_view(
    controller: &mut EquationEditController,
    adapter: &mut dyn RenderAdapter,
) -> EquationView {
    let inline = controller.inline();
    if controller.draft().is_empty() {
        return EquationView::NeedsInput { inline };
    }
    if !controller.valid() {
        return EquationView::Invalid { inline };
    }
    match adapter.render(controller.draft(), inline) {
        Ok(markup) => EquationView::Rendered(markup),
        Err(failure) => {
            tracing::debug!(%failure, "render failed; marking draft invalid");
            controller.on_render_failure();
            EquationView::Invalid { inline }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::EquationEditController;
    use crate::document::Document;

    /// Test adapter: renders uppercase markup, fails on drafts containing
    /// `!`, and counts invocations.
    struct FakeAdapter {
        calls: usize,
    }

    impl FakeAdapter {
        fn new() -> Self {
            Self { calls: 0 }
        }
    }

    impl RenderAdapter for FakeAdapter {
        fn render(&mut self, equation: &str, inline: bool) -> Result<String, RenderFailure> {
            self.calls += 1;
            if equation.contains('!') {
                return Err(RenderFailure::new("parse error"));
            }
            let tag = if inline { "span" } else { "div" };
            Ok(format!("<{tag}>{}</{tag}>", equation.to_uppercase()))
        }
    }

    fn mounted(equation: &str, inline: bool) -> (Document, EquationEditController) {
        let mut doc = Document::new();
        let key = doc
            .update(|txn| {
                txn.set_selection(Some(0));
                txn.insert_equation_at_selection(equation, inline)
            })
            .unwrap();
        let ctl = EquationEditController::mount(&doc, key).unwrap();
        (doc, ctl)
    }

    #[test]
    fn test_render_view_renders_draft() {
        let (doc, mut ctl) = mounted("x^2", true);
        let mut adapter = FakeAdapter::new();
        ctl.on_draft_change(&doc, "x^3");
        let view = render_view(&mut ctl, &mut adapter);
        assert_eq!(view, EquationView::Rendered("<span>X^3</span>".into()));
    }

    #[test]
    fn test_render_view_empty_never_hits_adapter() {
        let (_, mut ctl) = mounted("", false);
        let mut adapter = FakeAdapter::new();
        let view = render_view(&mut ctl, &mut adapter);
        assert_eq!(view, EquationView::NeedsInput { inline: false });
        assert_eq!(adapter.calls, 0);
    }

    #[test]
    fn test_render_view_failure_flips_validity() {
        let (doc, mut ctl) = mounted("ok", true);
        let mut adapter = FakeAdapter::new();
        ctl.on_draft_change(&doc, "bad!");
        let view = render_view(&mut ctl, &mut adapter);
        assert_eq!(view, EquationView::Invalid { inline: true });
        assert!(!ctl.valid());
        // Draft preserved for correction, and no re-render is attempted
        // while invalid.
        assert_eq!(ctl.draft(), "bad!");
        render_view(&mut ctl, &mut adapter);
        assert_eq!(adapter.calls, 1);
    }

    #[test]
    fn test_view_labels() {
        assert_eq!(
            EquationView::NeedsInput { inline: true }.label().unwrap(),
            "Add an inline TeX equation"
        );
        assert_eq!(
            EquationView::NeedsInput { inline: false }.label().unwrap(),
            "Add a block TeX equation"
        );
        assert_eq!(
            EquationView::Invalid { inline: true }.label().unwrap(),
            "Invalid inline TeX equation"
        );
        assert_eq!(
            EquationView::Invalid { inline: false }.label().unwrap(),
            "Invalid block TeX equation"
        );
        assert!(EquationView::Rendered("x".into()).label().is_none());
    }

    #[test]
    fn test_deferred_adapter_loads_once() {
        let mut adapter = DeferredAdapter::new(|| Ok(FakeAdapter::new()));
        assert!(!adapter.is_ready());
        assert!(adapter.render("ab", true).is_ok());
        assert!(adapter.is_ready());
        assert!(adapter.render("cd", true).is_ok());
    }

    #[test]
    fn test_deferred_adapter_load_failure_is_terminal() {
        let mut adapter: DeferredAdapter<FakeAdapter> =
            DeferredAdapter::new(|| Err(RenderFailure::new("engine unavailable")));
        let err = adapter.render("ab", true).unwrap_err();
        assert_eq!(err.message(), "engine unavailable");
        assert!(!adapter.is_ready());
        // Still failed on the second attempt; the loader is not retried.
        let err = adapter.render("ab", true).unwrap_err();
        assert_eq!(err.message(), "engine unavailable");
    }
}
