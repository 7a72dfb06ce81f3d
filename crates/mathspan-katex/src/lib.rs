//! KaTeX-backed render adapter.
//!
//! Implements [`RenderAdapter`] on top of the `katex` crate, which runs the
//! KaTeX JavaScript engine in-process. Engine initialisation happens on the
//! first render of the thread (the crate keeps one engine per thread), so
//! wrapping a [`KatexAdapter`] in [`mathspan_core::DeferredAdapter`] gives a
//! fully deterministic load-failure path.
//!
//! KaTeX parse errors surface as [`RenderFailure`] values; they never
//! escape as faults and the engine performs no retries.

use mathspan_core::{RenderAdapter, RenderFailure};

/// Render adapter invoking KaTeX with HTML output.
///
/// `inline == false` renders in display mode. Error throwing is left on so
/// that malformed TeX reports a failure instead of producing error markup.
pub struct KatexAdapter {
    inline_opts: katex::Opts,
    block_opts: katex::Opts,
}

impl KatexAdapter {
    /// Build the adapter with its fixed option sets.
    pub fn new() -> Result<Self, RenderFailure> {
        let opts = |display_mode: bool| {
            katex::Opts::builder()
                .display_mode(display_mode)
                .output_type(katex::OutputType::Html)
                .throw_on_error(true)
                .trust(false)
                .build()
                .map_err(|e| RenderFailure::new(e.to_string()))
        };
        Ok(Self {
            inline_opts: opts(false)?,
            block_opts: opts(true)?,
        })
    }
}

impl RenderAdapter for KatexAdapter {
    fn render(&mut self, equation: &str, inline: bool) -> Result<String, RenderFailure> {
        let opts = if inline {
            &self.inline_opts
        } else {
            &self.block_opts
        };
        katex::render_with_opts(equation, opts).map_err(|e| {
            tracing::debug!(error = %e, "katex render failed");
            RenderFailure::new(e.to_string())
        })
    }
}
