//! Error handling for promptloom.
//!
//! This module provides the closed error taxonomy produced by the resolution
//! pipeline along with a user-friendly presentation layer
//! for the CLI collaborator. The error system is designed around two
//! principles:
//! 1. **Strongly-typed errors** for precise handling in calling code.
//! 2. **User-friendly messages** with actionable suggestions for CLI users.
//!
//! [`PromptloomError`] is the enumerated set of everything that can go wrong
//! while loading, merging, theming, importing, or resolving a template.
//! [`ErrorContext`] wraps any error with an optional suggestion and details
//! string and knows how to print itself in color.

use std::fmt;
use std::path::PathBuf;

use colored::Colorize;
use thiserror::Error;

/// All failure modes of the resolution pipeline.
///
/// Every variant corresponds to one named error kind. None of them are
/// recovered locally inside the pipeline; they are
/// surfaced to the caller, which decides what the user sees.
#[derive(Error, Debug)]
pub enum PromptloomError {
    /// A referenced source file could not be opened.
    #[error("source not found: {path}")]
    MissingSource {
        /// The path that was requested.
        path: PathBuf,
    },

    /// A source file was found but failed to parse.
    #[error("failed to parse {path}: {detail}")]
    MalformedSource {
        /// The path of the offending file.
        path: PathBuf,
        /// Parser-provided detail.
        detail: String,
    },

    /// A source file's kind could not be determined.
    #[error("could not classify source kind: {path}")]
    UnknownKind {
        /// The path whose kind is ambiguous.
        path: PathBuf,
    },

    /// A structural rule was violated (e.g. a template missing `{prompt}`).
    #[error("schema violation: {detail}")]
    SchemaViolation {
        /// Human-readable description of the violated rule.
        detail: String,
    },

    /// The inheritance chain is malformed (too deep, or an incompatible
    /// parent/child kind pairing).
    #[error("inheritance error: {detail}")]
    InheritanceError {
        /// Human-readable description.
        detail: String,
    },

    /// An import cycle was detected while resolving placeholders.
    #[error("import cycle detected: {}", format_stack(.stack))]
    CycleError {
        /// The full path stack, in visitation order, ending back at the
        /// source that closed the cycle.
        stack: Vec<PathBuf>,
    },

    /// Import recursion exceeded the configured depth limit.
    #[error("import recursion depth exceeded (limit {limit})")]
    DepthError {
        /// The limit that was exceeded.
        limit: usize,
    },

    /// A selector expression could not be parsed, or a selector was
    /// combined with a `:part` suffix on the same reference.
    #[error("could not parse selector '{fragment}'")]
    SelectorSyntax {
        /// The offending selector fragment (without the enclosing brackets).
        fragment: String,
    },

    /// A template referenced a placeholder with no corresponding import, or
    /// a fixed-value override named a placeholder absent from the resolved
    /// context.
    #[error("placeholder '{name}' has no import declaration")]
    UnknownPlaceholder {
        /// The undeclared placeholder name.
        name: String,
    },

    /// A selector or fixed-value override named a variation key that does
    /// not exist in the placeholder's resolved variation set.
    #[error("unknown variation '{requested}' for placeholder '{name}'")]
    UnknownVariationKey {
        /// The placeholder name.
        name: String,
        /// The key that was requested.
        requested: String,
        /// The keys that actually exist, in insertion order.
        available: Vec<String>,
    },

    /// A `{Name:part}` reference named a part that does not exist on the
    /// chosen variation.
    #[error("unknown part '{part}' for placeholder '{name}' (variation '{variation_key}')")]
    UnknownPart {
        /// The placeholder name.
        name: String,
        /// The variation key whose part was missing.
        variation_key: String,
        /// The part that was requested.
        part: String,
        /// The parts that actually exist on that variation.
        available_parts: Vec<String>,
    },

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn format_stack(stack: &[PathBuf]) -> String {
    let mut parts: Vec<String> = stack.iter().map(|p| p.display().to_string()).collect();
    if let Some(first) = stack.first() {
        parts.push(first.display().to_string());
    }
    parts.join(" -> ")
}

/// Non-fatal diagnostics collected while running the pipeline.
///
/// Warnings never abort resolution; they accumulate on [`crate::types::ResolvedConfig`]
/// and [`crate::types::ResolvedContext`] for the caller to display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// A parent template had no `{prompt}` marker, so its text was replaced
    /// wholesale instead of having the child injected into it.
    ParentPromptMarkerMissing {
        /// The parent source path.
        parent: PathBuf,
    },
    /// A weight was specified (`$N`) on a placeholder that never appears in
    /// the final template text.
    UnusedWeight {
        /// The placeholder name.
        placeholder: String,
    },
    /// An import was resolved but its placeholder never appears in the
    /// template text.
    UnusedImport {
        /// The placeholder name.
        placeholder: String,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::ParentPromptMarkerMissing { parent } => {
                write!(f, "parent '{}' has no {{prompt}} marker; its template was replaced entirely", parent.display())
            }
            Warning::UnusedWeight { placeholder } => {
                write!(f, "weight specified on placeholder '{placeholder}' which is never referenced")
            }
            Warning::UnusedImport { placeholder } => {
                write!(f, "import '{placeholder}' was loaded but never referenced in the template")
            }
        }
    }
}

/// Wraps a [`PromptloomError`] with an optional suggestion and extra detail
/// for display to an end user.
///
/// Keeps the typed error terse for pattern matching, while the context
/// adds prose for the terminal.
#[derive(Debug)]
pub struct ErrorContext {
    error: PromptloomError,
    suggestion: Option<String>,
    details: Option<String>,
}

impl ErrorContext {
    /// Wrap an error with no extra context yet.
    pub fn new(error: PromptloomError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Attach an actionable suggestion.
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Attach background details.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error, details, and suggestion to stderr in color.
    pub fn display(&self) {
        eprintln!("{} {}", "error:".red().bold(), self.error);
        if let Some(details) = &self.details {
            eprintln!("  {details}");
        }
        if let Some(suggestion) = &self.suggestion {
            eprintln!("{} {}", "help:".cyan().bold(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "error: {}", self.error)?;
        if let Some(details) = &self.details {
            writeln!(f, "  {details}")?;
        }
        if let Some(suggestion) = &self.suggestion {
            write!(f, "help: {suggestion}")?;
        }
        Ok(())
    }
}

/// Convert a [`PromptloomError`] into a user-friendly [`ErrorContext`],
/// filling in suggestions that require knowledge of the error's payload
/// (fuzzy-matching the nearest available key, pointing at the `[Remove]`
/// sentinel, and so on).
pub fn user_friendly_error(error: PromptloomError) -> ErrorContext {
    match &error {
        PromptloomError::MissingSource { path } => {
            ErrorContext::new(error).with_suggestion(format!(
                "check that '{}' exists and is spelled correctly",
                path.display()
            ))
        }
        PromptloomError::UnknownVariationKey {
            available, requested, ..
        } => {
            let suggestion = closest_match(requested, available).map_or_else(
                || format!("available keys: {}", available.join(", ")),
                |best| format!("did you mean '{best}'? available keys: {}", available.join(", ")),
            );
            ErrorContext::new(error).with_suggestion(suggestion)
        }
        PromptloomError::UnknownPlaceholder { name } => ErrorContext::new(error)
            .with_suggestion(format!("declare '{name}' in the template's imports map")),
        PromptloomError::CycleError { .. } => ErrorContext::new(error)
            .with_suggestion("remove the import that closes the cycle, or extract the shared content into a leaf variation set"),
        PromptloomError::SelectorSyntax { .. } => ErrorContext::new(error).with_suggestion(
            "a selector (`[...]`) and a part (`:part`) cannot be combined on the same reference",
        ),
        _ => ErrorContext::new(error),
    }
}

/// Find the available key closest (by edit distance) to `requested`, if any
/// is reasonably close.
fn closest_match(requested: &str, available: &[String]) -> Option<String> {
    available
        .iter()
        .map(|candidate| (candidate, strsim::normalized_levenshtein(requested, candidate)))
        .filter(|(_, score)| *score > 0.5)
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(candidate, _)| candidate.clone())
}
