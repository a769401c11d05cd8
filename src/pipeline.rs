//! Two-phase name normalization for translated documents.
//!
//! Each document is expanded (fully qualified) and then simplified, strictly in that
//! order: simplification asks the oracle for diagnostics on the expanded snapshot, never
//! on the input. Documents share nothing, so a batch is converted in parallel.
//!
//! Oracle calls may block while the analyzer works. A caller that needs to stop a
//! conversion makes its oracle return [`QualifierError::Cancelled`]; [`Pipeline::try_convert`]
//! hands that back, while [`Pipeline::convert`] records it on the document like any other
//! failure.

use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use rayon::prelude::*;
use tracing::{info, warn};

use crate::ast::{AnnotationRecord, Grammar, SyntaxTree, Warning};
use crate::config::PipelineConfig;
use crate::diagnostics::panic_message;
use crate::expand::{try_expand, GrammarPolicy};
use crate::oracle::SemanticOracle;
use crate::simplify::try_simplify;
use crate::{err_msg, QualifierError};

/// The converted tree and every warning annotation it carries.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    pub tree: SyntaxTree,
    pub warnings: Vec<Warning>,
}

impl Conversion {
    fn of(tree: SyntaxTree) -> Self {
        let warnings = tree.warnings();
        Self { tree, warnings }
    }
}

pub struct Pipeline<O> {
    oracle: O,
    config: PipelineConfig,
}

impl<O: SemanticOracle> Pipeline<O> {
    pub fn new(oracle: O) -> Self {
        Self::with_config(oracle, PipelineConfig::default())
    }

    pub fn with_config(oracle: O, config: PipelineConfig) -> Self {
        Self { oracle, config }
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Expands then simplifies one document.
    ///
    /// Fails only when the oracle reports cancellation; every other failure is an
    /// annotation on the returned tree.
    pub fn try_convert(&self, tree: &SyntaxTree) -> Result<Conversion, QualifierError> {
        let grammar = tree.grammar();

        let start = Instant::now();
        let expanded = if self.config.expand {
            try_expand(tree, &self.oracle, &GrammarPolicy::for_grammar(grammar))?
        } else {
            tree.clone()
        };
        self.log_stage("expand", grammar, start);

        let start = Instant::now();
        let simplified = if self.config.simplify {
            try_simplify(
                &expanded,
                &self.oracle,
                &self.config.shape_table(grammar),
                self.config.unresolved_diagnostic_id(grammar),
            )?
        } else {
            expanded
        };
        self.log_stage("simplify", grammar, start);

        Ok(Conversion::of(simplified))
    }

    /// Like [`Pipeline::try_convert`], but never fails.
    ///
    /// Cancellation, and any panic that escapes the passes, leave the input unchanged
    /// with one warning on its root.
    pub fn convert(&self, tree: &SyntaxTree) -> Conversion {
        let err = match panic::catch_unwind(AssertUnwindSafe(|| self.try_convert(tree))) {
            Ok(Ok(conversion)) => return conversion,
            Ok(Err(err)) => err,
            Err(payload) => err_msg!(
                Internal,
                "conversion panicked: {}",
                panic_message(payload.as_ref())
            ),
        };
        warn!(
            target: "qualifier::pipeline",
            grammar = %tree.grammar(),
            error = %err,
            "conversion abandoned for document"
        );
        Conversion::of(tree.annotate_root(AnnotationRecord::conversion_warning(format!(
            "Conversion warning: name conversion was abandoned for this document. {}",
            err.chain_text()
        ))))
    }

    /// Converts independent documents in parallel, preserving input order.
    pub fn convert_all(&self, trees: &[SyntaxTree]) -> Vec<Conversion>
    where
        O: Sync,
    {
        trees.par_iter().map(|tree| self.convert(tree)).collect()
    }

    fn log_stage(&self, stage: &'static str, grammar: Grammar, start: Instant) {
        if self.config.trace_stages {
            let elapsed_us = start.elapsed().as_micros() as u64;
            info!(
                target: "qualifier::pipeline",
                stage = stage,
                grammar = %grammar,
                status = "ok",
                elapsed_us
            );
        }
    }
}
