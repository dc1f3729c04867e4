//! Env-file templates with secret lookups
//!
//! A template is read line by line. Each non-empty line may contain
//! `{{ kv "<reference>" }}` actions, which are replaced by whatever the
//! caller's [`Lookup`] returns for the reference:
//!
//! ```
//! use std::io::Cursor;
//!
//! let mut lookup = |reference: &str| -> Result<String, std::convert::Infallible> {
//!     Ok(format!("<{reference}>"))
//! };
//! let mut out = Vec::new();
//! vaultenv_template::filter(
//!     &mut lookup,
//!     Cursor::new("USER=admin\nPASSWORD={{ kv \"https://v/secrets/pass\" }}\n"),
//!     &mut out,
//! )
//! .unwrap();
//! assert_eq!(
//!     String::from_utf8(out).unwrap(),
//!     "USER=admin\nPASSWORD=<https://v/secrets/pass>\n"
//! );
//! ```

mod filter;
pub mod parse;

pub use filter::{Lookup, LookupError, filter, render_line};
pub use parse::{LOOKUP_FUNCTIONS, Node, Span, SyntaxError, Template};

use thiserror::Error;

/// Error types for template rendering
#[derive(Debug, Error)]
pub enum TemplateError {
    /// A line could not be parsed
    #[error("line {line}, column {column}: {error}")]
    Syntax {
        /// 1-based line number
        line: usize,
        /// 1-based column, in characters
        column: usize,
        /// The offending line, for diagnostics
        source_line: String,
        /// The parse failure, with its span inside `source_line`
        #[source]
        error: SyntaxError,
    },

    /// A lookup returned an error
    #[error("line {line}: failed to resolve {reference}")]
    Lookup {
        /// 1-based line number
        line: usize,
        /// The reference passed to the lookup
        reference: String,
        /// The lookup's error
        #[source]
        source: LookupError,
    },

    /// The input could not be read
    #[error("failed to read template line {line}")]
    Read {
        /// 1-based line number
        line: usize,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The output could not be written
    #[error("failed to write output")]
    Write(#[source] std::io::Error),
}

impl TemplateError {
    /// The 1-based input line the error belongs to, if any
    #[must_use]
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::Syntax { line, .. } | Self::Lookup { line, .. } | Self::Read { line, .. } => {
                Some(*line)
            }
            Self::Write(_) => None,
        }
    }
}
