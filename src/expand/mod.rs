//! Qualified-name expansion.
//!
//! Rewrites name references to their fully-qualified form so simplification starts from a
//! known-complete tree. What gets expanded is decided by a grammar-specific
//! [`ExpansionPolicy`]; the traversal and failure handling live here.
//!
//! ## Error Handling
//!
//! `expand` never fails:
//! - a policy error on one node leaves that node unexpanded with a warning annotation;
//!   siblings are still rewritten.
//! - a failure of the semantic model itself (computing it, an `Oracle` error surfacing
//!   from a policy mid-pass, or a panic in either) discards every rewrite of the pass and
//!   annotates the root.
//!
//! `try_expand` behaves the same except that a cancelled oracle call is handed back to
//! the caller instead of becoming an annotation.

use std::collections::{BTreeSet, HashSet};
use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, warn};

use crate::ast::builder::{dotted, dotted_expression, ident, respan};
use crate::ast::{
    AnnotationRecord, Grammar, Node, NodeId, NodeKind, Span, SyntaxTree, TreeIndex,
};
use crate::diagnostics::{panic_message, ErrorType};
use crate::oracle::{SemanticModel, SemanticOracle, Symbol, SymbolKind};
use crate::{err_ctx, err_msg, QualifierError};

pub mod basic;
pub mod curly;

pub use basic::BasicExpander;
pub use curly::CurlyExpander;

/// Grammar-specific decisions for the expansion pass.
///
/// `scope` is the document being expanded: its root plus facts computed once per pass.
pub trait ExpansionPolicy {
    /// Whether the traversal continues into `node`'s children.
    fn should_expand_within_node<M: SemanticModel + ?Sized>(
        &self,
        node: &Node,
        scope: &DocumentScope<'_>,
        model: &M,
    ) -> bool;

    /// Whether `node` itself is rewritten.
    fn should_expand_node<M: SemanticModel + ?Sized>(
        &self,
        node: &Node,
        scope: &DocumentScope<'_>,
        model: &M,
    ) -> bool;

    /// The fully-qualified replacement for `node`, whose descendants are already rewritten.
    fn expand_node<M: SemanticModel + ?Sized>(
        &self,
        node: &Node,
        scope: &DocumentScope<'_>,
        model: &M,
    ) -> Result<Node, QualifierError>;
}

/// The policy for a document, selected once by its grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrammarPolicy {
    Basic(BasicExpander),
    Curly(CurlyExpander),
}

impl GrammarPolicy {
    pub fn for_grammar(grammar: Grammar) -> Self {
        match grammar {
            Grammar::Basic => GrammarPolicy::Basic(BasicExpander),
            Grammar::Curly => GrammarPolicy::Curly(CurlyExpander),
        }
    }
}

impl ExpansionPolicy for GrammarPolicy {
    fn should_expand_within_node<M: SemanticModel + ?Sized>(
        &self,
        node: &Node,
        scope: &DocumentScope<'_>,
        model: &M,
    ) -> bool {
        match self {
            GrammarPolicy::Basic(p) => p.should_expand_within_node(node, scope, model),
            GrammarPolicy::Curly(p) => p.should_expand_within_node(node, scope, model),
        }
    }

    fn should_expand_node<M: SemanticModel + ?Sized>(
        &self,
        node: &Node,
        scope: &DocumentScope<'_>,
        model: &M,
    ) -> bool {
        match self {
            GrammarPolicy::Basic(p) => p.should_expand_node(node, scope, model),
            GrammarPolicy::Curly(p) => p.should_expand_node(node, scope, model),
        }
    }

    fn expand_node<M: SemanticModel + ?Sized>(
        &self,
        node: &Node,
        scope: &DocumentScope<'_>,
        model: &M,
    ) -> Result<Node, QualifierError> {
        match self {
            GrammarPolicy::Basic(p) => p.expand_node(node, scope, model),
            GrammarPolicy::Curly(p) => p.expand_node(node, scope, model),
        }
    }
}

/// The document root with the structural facts policies ask about, gathered in one walk.
#[derive(Debug)]
pub struct DocumentScope<'a> {
    root: &'a Node,
    member_halves: HashSet<*const Node>,
    shadowing_names: HashSet<&'a str>,
}

impl<'a> DocumentScope<'a> {
    pub fn new(root: &'a Node) -> Self {
        let mut scope = Self {
            root,
            member_halves: HashSet::new(),
            shadowing_names: HashSet::new(),
        };
        scope.collect(root, false);
        scope
    }

    pub fn root(&self) -> &'a Node {
        self.root
    }

    /// True when `node` is the member half of a dotted name or member access.
    ///
    /// Rewriting that half alone would nest a qualified path inside another one. Nodes
    /// are compared by identity, so `node` must come from this scope's root.
    pub fn is_member_half(&self, node: &Node) -> bool {
        self.member_halves.contains(&(node as *const Node))
    }

    /// True when a declaration in the document shadows the first segment of `path`.
    ///
    /// Types shadow at any level; namespaces only when nested, since a top-level namespace
    /// of that name is the very namespace the path starts with.
    pub fn is_shadowed(&self, path: &str) -> bool {
        let first = path.split('.').next().unwrap_or(path);
        self.shadowing_names.contains(first)
    }

    fn collect(&mut self, node: &'a Node, top_level: bool) {
        match node.kind {
            NodeKind::MemberAccess | NodeKind::QualifiedName | NodeKind::AliasQualifiedName => {
                if let Some(right) = node.child(1) {
                    self.member_halves.insert(right as *const Node);
                }
            }
            NodeKind::TypeDecl => self.declare(node),
            NodeKind::NamespaceDecl if !top_level => self.declare(node),
            _ => {}
        }
        let children_top_level = node.kind == NodeKind::CompilationUnit;
        for child in node.children.iter() {
            self.collect(child, children_top_level);
        }
    }

    fn declare(&mut self, node: &'a Node) {
        if let Some(name) = node.text.as_deref() {
            self.shadowing_names.insert(name);
        }
    }
}

// =============================
// Public API for expansion
// =============================

/// Fully qualifies every name reference `policy` selects.
pub fn expand<O, P>(tree: &SyntaxTree, oracle: &O, policy: &P) -> SyntaxTree
where
    O: SemanticOracle + ?Sized,
    P: ExpansionPolicy + ?Sized,
{
    try_expand(tree, oracle, policy).unwrap_or_else(|err| document_failure(tree, &err))
}

/// Like [`expand`], but returns a cancelled oracle call as `Err`.
pub fn try_expand<O, P>(tree: &SyntaxTree, oracle: &O, policy: &P) -> Result<SyntaxTree, QualifierError>
where
    O: SemanticOracle + ?Sized,
    P: ExpansionPolicy + ?Sized,
{
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| expand_document(tree, oracle, policy)))
        .unwrap_or_else(|payload| {
            Err(err_msg!(Oracle, "expansion panicked: {}", panic_message(payload.as_ref())))
        });
    match outcome {
        Ok(expanded) => Ok(expanded),
        Err(err) if err.error_type() == ErrorType::Cancelled => Err(err),
        Err(err) => Ok(document_failure(tree, &err)),
    }
}

// =============================
// Shared policy helpers
// =============================

/// The resolved symbol of `node` when it is a name with a static path to expand.
pub(crate) fn expandable_symbol<M: SemanticModel + ?Sized>(node: &Node, model: &M) -> Option<Symbol> {
    if !node.kind.is_name() {
        return None;
    }
    model.symbol_info(node).filter(|symbol| symbol.has_static_path())
}

/// Shared descent rule: never enter imports or nodes that are rewritten whole.
pub(crate) fn default_expand_within<P, M>(
    policy: &P,
    node: &Node,
    scope: &DocumentScope<'_>,
    model: &M,
) -> bool
where
    P: ExpansionPolicy + ?Sized,
    M: SemanticModel + ?Sized,
{
    node.kind != NodeKind::ImportDirective && !policy.should_expand_node(node, scope, model)
}

/// Builds the fully-qualified replacement for `node`.
///
/// `escape` wraps the qualified name when its first segment is shadowed in the document.
/// The replacement and everything synthesized under it keep `node`'s span.
pub(crate) fn qualify<M, F>(
    node: &Node,
    scope: &DocumentScope<'_>,
    model: &M,
    escape: F,
) -> Result<Node, QualifierError>
where
    M: SemanticModel + ?Sized,
    F: FnOnce(Node, Span) -> Node,
{
    let Some(symbol) = model.symbol_info(node) else {
        return Err(err_ctx!(
            Expansion,
            format!("`{}` no longer resolves to a symbol", node.pretty()),
            node.span
        ));
    };
    if !symbol.has_static_path() {
        return Err(err_ctx!(
            Expansion,
            format!("{} `{}` has no static qualified form", symbol.kind, symbol.name),
            node.span
        ));
    }

    let qualified = symbol.qualified_name();
    if qualified.split('.').any(str::is_empty) {
        return Err(err_ctx!(
            Expansion,
            format!("malformed qualified name `{qualified}`"),
            node.span,
            "the semantic model reported an empty container segment"
        ));
    }
    if node.pretty() == qualified {
        return Ok(node.clone());
    }

    let span = node.span;
    let is_type_context = matches!(symbol.kind, SymbolKind::Namespace | SymbolKind::Type)
        && node.kind != NodeKind::MemberAccess;
    let mut replacement = if is_type_context {
        dotted(&qualified, span)
    } else {
        dotted_expression(&qualified, span)
    };
    if scope.is_shadowed(&qualified) {
        replacement = escape(replacement, span);
    }
    let mut replacement = respan(replacement, span);
    replacement.annotations = node.annotations.clone();
    Ok(replacement)
}

/// Prefixes `name` with a root alias keyword, as `Keyword.Name` in dotted form.
pub(crate) fn prefix_segment(keyword: &str, name: Node, span: Span) -> Node {
    let kind = match name.kind {
        NodeKind::MemberAccess => NodeKind::MemberAccess,
        _ => NodeKind::QualifiedName,
    };
    Node::branch(kind, span, [ident(keyword, span), name])
}

// =============================
// Internal helpers
// =============================

fn expand_document<O, P>(tree: &SyntaxTree, oracle: &O, policy: &P) -> Result<SyntaxTree, QualifierError>
where
    O: SemanticOracle + ?Sized,
    P: ExpansionPolicy + ?Sized,
{
    let model = oracle.semantic_model(tree)?;

    let index = TreeIndex::build(tree);
    let scope = DocumentScope::new(index.node(NodeId::ROOT).as_ref());

    let mut visited = Vec::new();
    let descend = |node: &Node| policy.should_expand_within_node(node, &scope, &model);
    collect_visited(&index, NodeId::ROOT, &descend, &mut visited);

    let selected: BTreeSet<NodeId> = visited
        .iter()
        .copied()
        .filter(|id| policy.should_expand_node(index.node(*id), &scope, &model))
        .collect();

    debug!(
        target: "qualifier::expand",
        grammar = %tree.grammar(),
        visited = visited.len(),
        selected = selected.len(),
        "selected nodes for expansion"
    );

    let mut node_failures = 0usize;
    let expanded = tree.rewrite(&index, &selected, |id, node| {
        match policy.expand_node(&node, &scope, &model) {
            Ok(replacement) => Ok(replacement),
            Err(err) if err.aborts_pass() => Err(err),
            Err(err) => {
                node_failures += 1;
                Ok(node_failure(id, node, &model, &err))
            }
        }
    })?;

    if node_failures > 0 {
        debug!(
            target: "qualifier::expand",
            failures = node_failures,
            "expansion kept annotated nodes"
        );
    }
    Ok(expanded)
}

// Visits the descendants of `id` while `descend` allows entering a node.
fn collect_visited<F>(index: &TreeIndex, id: NodeId, descend: &F, out: &mut Vec<NodeId>)
where
    F: Fn(&Node) -> bool,
{
    if !descend(index.node(id)) {
        return;
    }
    for child in index.children(id).iter().copied() {
        out.push(child);
        collect_visited(index, child, descend, out);
    }
}

fn node_failure<M: SemanticModel + ?Sized>(
    id: NodeId,
    node: Node,
    model: &M,
    err: &QualifierError,
) -> Node {
    let kind = model
        .symbol_info(&node)
        .map(|symbol| symbol.kind.to_string())
        .unwrap_or_else(|| "name".to_string());
    let text = node.pretty();
    warn!(
        target: "qualifier::expand",
        node = %id,
        symbol_kind = %kind,
        text = %text,
        error = %err,
        "qualified name expansion failed for node"
    );
    node.with_annotation(AnnotationRecord::conversion_warning(format!(
        "Conversion warning: qualified name expansion failed for this {kind} `{text}`. {}",
        err.chain_text()
    )))
}

fn document_failure(tree: &SyntaxTree, err: &QualifierError) -> SyntaxTree {
    warn!(
        target: "qualifier::expand",
        grammar = %tree.grammar(),
        error = %err,
        "qualified name expansion failed for document"
    );
    tree.annotate_root(AnnotationRecord::conversion_warning(format!(
        "Conversion warning: qualified name expansion failed for this document. {}",
        err.chain_text()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builder::*;

    #[test]
    fn scope_records_member_halves_by_identity() {
        let root = unit([stmt(member(ident("clock", Span::new(0, 5)), "Now", Span::new(0, 9)))]);
        let scope = DocumentScope::new(&root);
        let access = root.children[0].children[0].clone();
        assert!(scope.is_member_half(&access.children[1]));
        assert!(!scope.is_member_half(&access.children[0]));
        // Same text, different node.
        assert!(!scope.is_member_half(&ident("Now", Span::new(6, 9))));
    }

    #[test]
    fn scope_shadowing_ignores_top_level_namespaces() {
        let root = unit([
            namespace("Acme", Span::new(0, 10), [type_decl("System", Span::new(2, 8), [])]),
            namespace("Shop", Span::new(11, 30), [namespace("Tools", Span::new(12, 20), [])]),
        ]);
        let scope = DocumentScope::new(&root);
        assert!(!scope.is_shadowed("Acme.Ui.Widget"));
        assert!(scope.is_shadowed("System.IO.File"));
        assert!(scope.is_shadowed("Tools.Log"));
        assert!(!scope.is_shadowed("Shop.Cart"));
    }

    #[test]
    fn replacement_keeps_the_replaced_span() {
        struct Widgets;
        impl SemanticModel for Widgets {
            fn symbol_info(&self, node: &Node) -> Option<Symbol> {
                (node.pretty() == "W").then(|| Symbol::new("W", SymbolKind::Type, Some("Acme.Ui")))
            }
        }
        let root = unit([namespace("Shop", Span::new(0, 40), [namespace("Acme", Span::new(5, 15), [])])]);
        let scope = DocumentScope::new(&root);
        let node = ident("W", Span::new(20, 21));
        let expanded = qualify(&node, &scope, &Widgets, |name, span| {
            prefix_segment("Global", name, span)
        })
        .unwrap();
        assert_eq!(expanded.pretty(), "Global.Acme.Ui.W");
        let index = TreeIndex::build(&SyntaxTree::new(Grammar::Basic, expanded));
        assert!(index.iter().all(|(_, entry)| entry.node.span == Span::new(20, 21)));
    }
}
