pub use crate::diagnostics::{ErrorContext, ErrorType, QualifierError};
pub use crate::pipeline::{Conversion, Pipeline};

pub mod ast;
pub mod config;
pub mod diagnostics;
pub mod expand;
pub mod oracle;
pub mod pipeline;
pub mod rules;
pub mod simplify;
