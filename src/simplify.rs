//! Selective name simplification.
//!
//! Decides which nodes the oracle may reduce to their minimal form and asks it to do so.
//! Selection is a pruning descent: imports whose names failed to resolve, known-unsafe
//! shapes and bare expressions are visited but never descended into. Any flagged or
//! unsafe candidate excludes itself and its whole ancestor chain.
//!
//! ## Error Handling
//!
//! `simplify` never fails. If the oracle cannot produce diagnostics, or fails or panics
//! during reduction, the input tree is returned unmarked with one document-level warning.
//! `try_simplify` does the same except that a cancelled oracle call is returned as `Err`.

use std::collections::{BTreeSet, HashSet};
use std::convert::Infallible;
use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, warn};

use crate::ast::{AnnotationRecord, NodeId, NodeKind, SyntaxTree, TreeIndex};
use crate::diagnostics::{panic_message, ErrorType};
use crate::oracle::SemanticOracle;
use crate::rules::{UnsafeShapeRules, UNSAFE_SHAPES_VERSION};
use crate::{err_msg, QualifierError};

/// The selection computed for one tree snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimplifyPlan {
    /// Nodes visited by the pruning descent, in preorder.
    pub candidates: Vec<NodeId>,
    /// Import directives enclosing an unresolved-name diagnostic.
    pub flagged_imports: HashSet<NodeId>,
    /// Flagged or unsafe candidates together with all their ancestors.
    pub excluded: HashSet<NodeId>,
    /// Candidates that will carry a reduce marker.
    pub eligible: BTreeSet<NodeId>,
}

/// Simplifies qualified names in `tree` wherever it is known to be safe.
pub fn simplify<O, R>(tree: &SyntaxTree, oracle: &O, rules: &R, unresolved_id: &str) -> SyntaxTree
where
    O: SemanticOracle + ?Sized,
    R: UnsafeShapeRules + ?Sized,
{
    try_simplify(tree, oracle, rules, unresolved_id)
        .unwrap_or_else(|err| document_failure(tree, &err))
}

/// Like [`simplify`], but returns a cancelled oracle call as `Err`.
pub fn try_simplify<O, R>(
    tree: &SyntaxTree,
    oracle: &O,
    rules: &R,
    unresolved_id: &str,
) -> Result<SyntaxTree, QualifierError>
where
    O: SemanticOracle + ?Sized,
    R: UnsafeShapeRules + ?Sized,
{
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        simplify_document(tree, oracle, rules, unresolved_id)
    }))
    .unwrap_or_else(|payload| {
        Err(err_msg!(Oracle, "simplification panicked: {}", panic_message(payload.as_ref())))
    });
    match outcome {
        Ok(simplified) => Ok(simplified),
        Err(err) if err.error_type() == ErrorType::Cancelled => Err(err),
        Err(err) => Ok(document_failure(tree, &err)),
    }
}

fn simplify_document<O, R>(
    tree: &SyntaxTree,
    oracle: &O,
    rules: &R,
    unresolved_id: &str,
) -> Result<SyntaxTree, QualifierError>
where
    O: SemanticOracle + ?Sized,
    R: UnsafeShapeRules + ?Sized,
{
    let index = TreeIndex::build(tree);
    let plan = plan_simplification(tree, &index, oracle, rules, unresolved_id)?;

    debug!(
        target: "qualifier::simplify",
        grammar = %tree.grammar(),
        rules_version = UNSAFE_SHAPES_VERSION,
        candidates = plan.candidates.len(),
        flagged_imports = plan.flagged_imports.len(),
        excluded = plan.excluded.len(),
        eligible = plan.eligible.len(),
        "selected nodes for simplification"
    );

    if plan.eligible.is_empty() {
        return Ok(tree.clone());
    }

    let marked = match tree.rewrite::<Infallible, _>(&index, &plan.eligible, |_, node| {
        Ok(node.with_reduce_request())
    }) {
        Ok(marked) => marked,
        Err(never) => match never {},
    };

    let reduced = oracle.reduce_to_minimal_form(&marked)?;
    Ok(reduced.clear_reduce_requests())
}

/// Computes candidates, exclusions and the eligible set without rewriting anything.
pub fn plan_simplification<O, R>(
    tree: &SyntaxTree,
    index: &TreeIndex,
    oracle: &O,
    rules: &R,
    unresolved_id: &str,
) -> Result<SimplifyPlan, QualifierError>
where
    O: SemanticOracle + ?Sized,
    R: UnsafeShapeRules + ?Sized,
{
    let diagnostics = oracle.diagnostics(tree)?;
    let flagged_imports: HashSet<NodeId> = diagnostics
        .iter()
        .filter(|d| d.id == unresolved_id && d.in_source)
        .filter_map(|d| index.find_node(d.span))
        .filter_map(|id| index.ancestor_or_self_of_kind(id, NodeKind::ImportDirective))
        .collect();

    let is_blocked =
        |id: NodeId| flagged_imports.contains(&id) || rules.is_unsafe_to_simplify(index.node(id));

    let mut candidates = Vec::new();
    collect_candidates(index, NodeId::ROOT, &is_blocked, &mut candidates);

    let mut excluded = HashSet::new();
    for id in candidates.iter().copied().filter(|id| is_blocked(*id)) {
        for ancestor in index.ancestors_and_self(id) {
            // An ancestor already present had its own chain inserted.
            if !excluded.insert(ancestor) {
                break;
            }
        }
    }

    let eligible = candidates
        .iter()
        .copied()
        .filter(|id| !excluded.contains(id))
        .collect();

    Ok(SimplifyPlan {
        candidates,
        flagged_imports,
        excluded,
        eligible,
    })
}

// Visits the descendants of `id`; blocked nodes and expressions are visited, not entered.
fn collect_candidates<F>(index: &TreeIndex, id: NodeId, is_blocked: &F, out: &mut Vec<NodeId>)
where
    F: Fn(NodeId) -> bool,
{
    for child in index.children(id).iter().copied() {
        out.push(child);
        let kind = index.node(child).kind;
        if kind.is_expression() || is_blocked(child) {
            continue;
        }
        collect_candidates(index, child, is_blocked, out);
    }
}

fn document_failure(tree: &SyntaxTree, err: &QualifierError) -> SyntaxTree {
    warn!(
        target: "qualifier::simplify",
        grammar = %tree.grammar(),
        error = %err,
        "name simplification failed for document"
    );
    tree.annotate_root(AnnotationRecord::conversion_warning(format!(
        "Conversion warning: name simplification failed for this document. {}",
        err.chain_text()
    )))
}
