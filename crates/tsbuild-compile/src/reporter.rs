//! Diagnostic reporters.
//!
//! Reporters decide how compiler diagnostics reach the diagnostic channel.
//! They never influence the build result.

use tracing::{error, info, warn};

use crate::diagnostic::{Category, Diagnostic};

/// Receives every diagnostic produced by a compilation.
pub trait Reporter: Send + Sync {
    /// Report one diagnostic.
    fn report(&self, diagnostic: &Diagnostic);

    /// Whether diagnostics should have `excerpt` filled in before `report`.
    fn wants_excerpts(&self) -> bool {
        false
    }
}

/// Drops every diagnostic.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn report(&self, _diagnostic: &Diagnostic) {}
}

/// One line per diagnostic, in `tsc` format.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultReporter;

impl DefaultReporter {
    pub fn render(&self, diagnostic: &Diagnostic) -> String {
        diagnostic.to_string()
    }
}

impl Reporter for DefaultReporter {
    fn report(&self, diagnostic: &Diagnostic) {
        emit(diagnostic.category, &self.render(diagnostic));
    }
}

/// The diagnostic line followed by the offending source line and a caret.
#[derive(Debug, Default, Clone, Copy)]
pub struct LongReporter;

impl LongReporter {
    pub fn render(&self, diagnostic: &Diagnostic) -> String {
        let mut out = diagnostic.to_string();

        if let (Some(loc), Some(excerpt)) = (&diagnostic.location, &diagnostic.excerpt) {
            let gutter = loc.line.to_string();
            let pad = " ".repeat(gutter.len());
            let excerpt = excerpt.trim_end();
            // Keep tabs so the caret lines up with the excerpt.
            let indent: String = excerpt
                .chars()
                .take(loc.column.saturating_sub(1) as usize)
                .map(|c| if c == '\t' { '\t' } else { ' ' })
                .collect();

            out.push_str(&format!("\n {} | {}", gutter, excerpt));
            out.push_str(&format!("\n {} | {}^", pad, indent));
        }

        out
    }
}

impl Reporter for LongReporter {
    fn report(&self, diagnostic: &Diagnostic) {
        emit(diagnostic.category, &self.render(diagnostic));
    }

    fn wants_excerpts(&self) -> bool {
        true
    }
}

fn emit(category: Category, rendered: &str) {
    match category {
        Category::Error => error!(target: "tsbuild::diagnostic", "{}", rendered),
        Category::Warning => warn!(target: "tsbuild::diagnostic", "{}", rendered),
        Category::Suggestion | Category::Message => {
            info!(target: "tsbuild::diagnostic", "{}", rendered)
        }
    }
}
