//!
//! # Overview
//!
//! This module defines the unified, `miette`-based error type for the qualifier passes.
//! Every fallible collaborator (the semantic oracle, expansion policies, configuration
//! loading) reports failures as a [`QualifierError`]. The passes themselves never hand a
//! `QualifierError` back to their caller: they downgrade it into an annotation on the tree.
//!
//! # Error Construction Macros
//!
//! - **Use `err_msg!` for simple, message-only errors.**
//!   - `err_msg!(Oracle, "reduction crashed")`
//!
//! - **Use `err_ctx!` for errors that point at a span, optionally with help.**
//!   - `err_ctx!(Expansion, "symbol vanished", span)`
//!   - `err_ctx!(Config, "unknown shape", span, "expected one of ...")`
//!
//! - **Pass `span` directly.** Never pass a `usize` as a span; build a `Span`.

use std::any::Any;

use miette::{Diagnostic, LabeledSpan};
use thiserror::Error;

use crate::ast::Span;

/// Type-safe error classification that corresponds to `QualifierError` variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorType {
    /// The semantic oracle failed (diagnostics, model, or reduction).
    Oracle,
    /// A single node could not be expanded.
    Expansion,
    /// Configuration could not be read or was invalid.
    Config,
    /// Invariant violations inside this crate.
    Internal,
    /// The caller cancelled an oracle call mid-pass.
    Cancelled,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::Oracle => "Oracle",
            ErrorType::Expansion => "Expansion",
            ErrorType::Config => "Config",
            ErrorType::Internal => "Internal",
            ErrorType::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for ErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Minimal, composable error context for diagnostics.
#[derive(Debug, Default, Clone)]
pub struct ErrorContext {
    /// The span in the translated tree this error refers to (if any).
    pub span: Option<Span>,
    /// An optional help message.
    pub help: Option<String>,
}

impl ErrorContext {
    /// Returns an empty error context.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_span(span: Span) -> Self {
        Self {
            span: Some(span),
            help: None,
        }
    }

    pub fn with_span_and_help(span: Span, help: String) -> Self {
        Self {
            span: Some(span),
            help: Some(help),
        }
    }
}

type BoxedSource = Option<Box<dyn std::error::Error + Send + Sync + 'static>>;

/// Unified error type for every failure a qualifier collaborator can report.
#[derive(Debug, Error)]
pub enum QualifierError {
    #[error("Oracle error: {message}")]
    Oracle {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("Expansion error: {message}")]
    Expansion {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("Cancelled: {message}")]
    Cancelled {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
}

impl QualifierError {
    fn get_ctx(&self) -> &ErrorContext {
        match self {
            QualifierError::Oracle { ctx, .. } => ctx,
            QualifierError::Expansion { ctx, .. } => ctx,
            QualifierError::Config { ctx, .. } => ctx,
            QualifierError::Internal { ctx, .. } => ctx,
            QualifierError::Cancelled { ctx, .. } => ctx,
        }
    }

    fn message(&self) -> &str {
        match self {
            QualifierError::Oracle { message, .. } => message,
            QualifierError::Expansion { message, .. } => message,
            QualifierError::Config { message, .. } => message,
            QualifierError::Internal { message, .. } => message,
            QualifierError::Cancelled { message, .. } => message,
        }
    }

    pub fn error_type(&self) -> ErrorType {
        match self {
            QualifierError::Oracle { .. } => ErrorType::Oracle,
            QualifierError::Expansion { .. } => ErrorType::Expansion,
            QualifierError::Config { .. } => ErrorType::Config,
            QualifierError::Internal { .. } => ErrorType::Internal,
            QualifierError::Cancelled { .. } => ErrorType::Cancelled,
        }
    }

    /// The span this error points at, if the reporter supplied one.
    pub fn span(&self) -> Option<Span> {
        self.get_ctx().span
    }

    /// Attaches an underlying cause, keeping the variant and context.
    pub fn with_source(
        mut self,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        let boxed: BoxedSource = Some(Box::new(cause));
        match &mut self {
            QualifierError::Oracle { source, .. }
            | QualifierError::Expansion { source, .. }
            | QualifierError::Config { source, .. }
            | QualifierError::Internal { source, .. }
            | QualifierError::Cancelled { source, .. } => *source = boxed,
        }
        self
    }

    /// True when the error invalidates the whole pass rather than one node.
    pub fn aborts_pass(&self) -> bool {
        matches!(self.error_type(), ErrorType::Oracle | ErrorType::Cancelled)
    }

    /// Renders the error and its cause chain on one line, for annotation payloads.
    pub fn chain_text(&self) -> String {
        let mut text = self.to_string();
        let mut cause = std::error::Error::source(self);
        while let Some(err) = cause {
            text.push_str(": ");
            text.push_str(&err.to_string());
            cause = err.source();
        }
        text
    }
}

/// The message of a caught panic, when it carried one.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "no panic message"
    }
}

impl Diagnostic for QualifierError {
    fn code<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        Some(Box::new(format!("qualifier::{}", self.error_type())))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        self.get_ctx()
            .help
            .as_ref()
            .map(|h| Box::new(h) as Box<dyn std::fmt::Display + 'a>)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let span = self.get_ctx().span?;
        let len = if span.end > span.start {
            span.end - span.start
        } else {
            1
        };
        let label = LabeledSpan::new(Some(self.message().to_string()), span.start, len);
        Some(Box::new(std::iter::once(label)))
    }
}

/// Constructs a QualifierError variant with a formatted message and no context.
#[macro_export]
macro_rules! err_msg {
    ($variant:ident, $msg:literal $(, $arg:expr)* $(,)?) => {
        $crate::QualifierError::$variant {
            message: format!($msg $(, $arg)*),
            ctx: $crate::ErrorContext::none(),
            source: None,
        }
    };
    ($variant:ident, $msg:expr) => {
        $crate::QualifierError::$variant {
            message: format!("{}", $msg),
            ctx: $crate::ErrorContext::none(),
            source: None,
        }
    };
}

/// Constructs a QualifierError variant with a message, a span, and optional help.
#[macro_export]
macro_rules! err_ctx {
    ($variant:ident, $msg:expr, $span:expr, $help:expr) => {
        $crate::QualifierError::$variant {
            message: $msg.to_string(),
            ctx: $crate::ErrorContext::with_span_and_help($span, format!("{}", $help)),
            source: None,
        }
    };
    ($variant:ident, $msg:expr, $span:expr) => {
        $crate::QualifierError::$variant {
            message: $msg.to_string(),
            ctx: $crate::ErrorContext::with_span($span),
            source: None,
        }
    };
}
