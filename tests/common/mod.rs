//! # Qualifier Test Fixtures
//!
//! A scripted semantic oracle and a few tree helpers shared by the integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use difference::Changeset;
use qualifier::ast::{Grammar, Node, NodeId, NodeKind, SyntaxTree, TreeIndex};
use qualifier::err_msg;
use qualifier::oracle::{Diagnostic, SemanticModel, SemanticOracle, Symbol, SymbolKind};
use qualifier::QualifierError;

/// Resolves names by their printed text, or by the qualified name they expand to.
#[derive(Debug, Clone, Default)]
pub struct FixtureModel {
    by_text: Arc<HashMap<String, Symbol>>,
}

impl SemanticModel for FixtureModel {
    fn symbol_info(&self, node: &Node) -> Option<Symbol> {
        if !node.kind.is_name() {
            return None;
        }
        let text = node.pretty();
        if let Some(symbol) = self.by_text.get(&text) {
            return Some(symbol.clone());
        }
        self.by_text
            .values()
            .find(|symbol| symbol.qualified_name() == text)
            .cloned()
    }
}

/// A semantic oracle driven entirely by the test.
///
/// Reduction shortens marked dotted names whose prefix is imported by the document. For
/// the `Basic` grammar it also reproduces the known defect of dropping the parentheses of
/// a marked call-site with no arguments.
#[derive(Debug, Default)]
pub struct FixtureOracle {
    symbols: HashMap<String, Symbol>,
    diagnostics: Vec<Diagnostic>,
    fail_model: bool,
    fail_diagnostics: bool,
    fail_reduce: bool,
    panic_reduce: bool,
    cancel: bool,
    panic_on: Option<String>,
    pub reduce_calls: AtomicUsize,
    pub model_calls: AtomicUsize,
}

impl FixtureOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_symbol(mut self, text: &str, symbol: Symbol) -> Self {
        self.symbols.insert(text.to_string(), symbol);
        self
    }

    pub fn with_type(self, name: &str, container: &str) -> Self {
        let symbol = Symbol::new(name, SymbolKind::Type, Some(container));
        self.with_symbol(name, symbol)
    }

    pub fn with_static_method(self, name: &str, container: &str) -> Self {
        let mut symbol = Symbol::new(name, SymbolKind::Method, Some(container));
        symbol.is_static = true;
        self.with_symbol(name, symbol)
    }

    pub fn with_diagnostic(mut self, diagnostic: Diagnostic) -> Self {
        self.diagnostics.push(diagnostic);
        self
    }

    pub fn failing_model(mut self) -> Self {
        self.fail_model = true;
        self
    }

    pub fn failing_diagnostics(mut self) -> Self {
        self.fail_diagnostics = true;
        self
    }

    pub fn failing_reduce(mut self) -> Self {
        self.fail_reduce = true;
        self
    }

    pub fn panicking_reduce(mut self) -> Self {
        self.panic_reduce = true;
        self
    }

    /// Every oracle call reports that the caller's cancellation token fired.
    pub fn cancelled(mut self) -> Self {
        self.cancel = true;
        self
    }

    /// Panics while computing the model of any document whose text contains `marker`.
    pub fn panicking_on(mut self, marker: &str) -> Self {
        self.panic_on = Some(marker.to_string());
        self
    }

    fn check_cancelled(&self) -> Result<(), QualifierError> {
        if self.cancel {
            return Err(err_msg!(Cancelled, "analysis cancelled by caller"));
        }
        Ok(())
    }

    pub fn reduce_count(&self) -> usize {
        self.reduce_calls.load(Ordering::SeqCst)
    }
}

impl SemanticOracle for FixtureOracle {
    type Model = FixtureModel;

    fn diagnostics(&self, _tree: &SyntaxTree) -> Result<Vec<Diagnostic>, QualifierError> {
        self.check_cancelled()?;
        if self.fail_diagnostics {
            return Err(err_msg!(Oracle, "diagnostics unavailable"));
        }
        Ok(self.diagnostics.clone())
    }

    fn semantic_model(&self, tree: &SyntaxTree) -> Result<FixtureModel, QualifierError> {
        self.model_calls.fetch_add(1, Ordering::SeqCst);
        self.check_cancelled()?;
        if let Some(marker) = &self.panic_on {
            if tree.pretty().contains(marker.as_str()) {
                panic!("analyzer crashed on `{marker}`");
            }
        }
        if self.fail_model {
            return Err(err_msg!(Oracle, "semantic model could not be computed"));
        }
        Ok(FixtureModel {
            by_text: Arc::new(self.symbols.clone()),
        })
    }

    fn reduce_to_minimal_form(&self, tree: &SyntaxTree) -> Result<SyntaxTree, QualifierError> {
        self.reduce_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_reduce {
            return Err(err_msg!(Oracle, "reduction threw on node"));
        }
        if self.panic_reduce {
            panic!("reducer index out of range");
        }
        let imports: HashSet<String> = tree
            .root()
            .children
            .iter()
            .filter(|child| child.kind == NodeKind::ImportDirective)
            .filter_map(|child| child.child(0).map(Node::pretty))
            .collect();
        let root = reduce(tree.root(), tree.grammar(), &imports, false);
        Ok(tree.with_root(Arc::new(root)))
    }
}

fn reduce(node: &Node, grammar: Grammar, imports: &HashSet<String>, active: bool) -> Node {
    if node.kind == NodeKind::ImportDirective {
        return node.clone();
    }
    let active = active || node.reduce_requested;
    if active {
        if let Some(shorter) = shorten(node, imports) {
            return shorter;
        }
        let is_empty_call = node.kind == NodeKind::Invocation
            && node.argument_list().is_some_and(|list| list.children.is_empty());
        if grammar == Grammar::Basic && is_empty_call {
            if let Some(callee) = node.callee() {
                return reduce(callee, grammar, imports, active);
            }
        }
    }
    let children = node
        .children
        .iter()
        .map(|child| Arc::new(reduce(child, grammar, imports, active)))
        .collect();
    node.with_children(children)
}

fn shorten(node: &Node, imports: &HashSet<String>) -> Option<Node> {
    if !matches!(node.kind, NodeKind::QualifiedName | NodeKind::MemberAccess) {
        return None;
    }
    let (prefix, last) = (node.child(0)?, node.child(1)?);
    if !imports.contains(&prefix.pretty()) {
        return None;
    }
    Some(Node {
        annotations: node.annotations.clone(),
        ..last.clone()
    })
}

/// The id of the first node of `kind` printing as `text`.
pub fn find(tree: &SyntaxTree, kind: NodeKind, text: &str) -> NodeId {
    let index = TreeIndex::build(tree);
    let found = index
        .iter()
        .find(|(_, entry)| entry.node.kind == kind && entry.node.pretty() == text)
        .map(|(id, _)| id);
    match found {
        Some(id) => id,
        None => panic!("no {kind:?} printing as {text:?} in:\n{}", tree.pretty()),
    }
}

/// Asserts two rendered documents are equal, printing a line diff when they are not.
pub fn assert_text_eq(expected: &str, actual: &str) {
    let changeset = Changeset::new(expected, actual, "\n");
    if changeset.distance != 0 {
        panic!("rendered document differs from expectation:\n{changeset}");
    }
}
