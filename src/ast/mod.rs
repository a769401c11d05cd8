//! Syntax tree module for translated documents
//!
//! This module provides the persistent, immutable syntax tree the qualifier passes
//! operate on. Nodes are shared through `Arc` and children live in an `im::Vector`,
//! so every rewrite produces a new tree that shares all untouched substructure with
//! the snapshot it came from.

// ============================================================================
// IMPORTS
// ============================================================================

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

// ============================================================================
// CORE DATA STRUCTURES
// ============================================================================

/// Represents a span in the translated source text.
///
/// # Examples
///
/// ```rust
/// use qualifier::ast::Span;
/// let outer = Span { start: 0, end: 10 };
/// assert!(outer.contains(Span { start: 2, end: 5 }));
/// assert!(!outer.contains(Span { start: 8, end: 12 }));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// True when `other` lies entirely within this span.
    pub fn contains(&self, other: Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Target grammar a translated document is written in.
///
/// `Basic` is the keyword-heavy grammar whose call-sites may omit an empty argument
/// list; `Curly` is the braced grammar where call parentheses are mandatory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Grammar {
    Basic,
    Curly,
}

impl Grammar {
    pub fn as_str(&self) -> &'static str {
        match self {
            Grammar::Basic => "basic",
            Grammar::Curly => "curly",
        }
    }
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Grammar construct a node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    CompilationUnit,
    /// `import`/`using` style directive; its single child is the imported name.
    ImportDirective,
    NamespaceDecl,
    TypeDecl,
    MethodDecl,
    Block,
    ExpressionStatement,
    LocalDecl,
    ReturnStatement,
    /// Call-site: `[callee?, ArgumentList]`. The callee is absent in conditional forms.
    Invocation,
    ArgumentList,
    Argument,
    /// Construction expression: `[type, ArgumentList?]`.
    ObjectCreation,
    /// Dotted type or namespace name: `[left, right]`.
    QualifiedName,
    /// Alias-rooted name such as `global::X`: `[alias, name]`.
    AliasQualifiedName,
    /// Member access on an expression: `[receiver, name]`.
    MemberAccess,
    IdentifierName,
    /// `this`/`Me` style receiver keyword.
    InstanceKeyword,
    Literal,
    Other,
}

impl NodeKind {
    /// Bare reference expressions are rewritten as a whole, never piecewise.
    pub fn is_expression(&self) -> bool {
        matches!(
            self,
            NodeKind::Invocation
                | NodeKind::ObjectCreation
                | NodeKind::QualifiedName
                | NodeKind::AliasQualifiedName
                | NodeKind::MemberAccess
                | NodeKind::IdentifierName
                | NodeKind::InstanceKeyword
                | NodeKind::Literal
        )
    }

    /// Kinds that name a symbol and can therefore be expanded or simplified.
    pub fn is_name(&self) -> bool {
        matches!(
            self,
            NodeKind::IdentifierName | NodeKind::QualifiedName | NodeKind::MemberAccess
        )
    }
}

/// Shared handle to an immutable node.
pub type NodeRef = Arc<Node>;

/// Identity of a node within one tree snapshot: its preorder position.
///
/// Two structurally equal nodes at different positions always have different ids.
/// Ids are only meaningful for the snapshot (and [`TreeIndex`]) they were computed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A typed, immutable syntax tree element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
    /// Token text for leaves, declared name for declarations.
    pub text: Option<String>,
    pub children: im::Vector<NodeRef>,
    /// Out-of-band warnings; never change the node's text.
    pub annotations: im::Vector<AnnotationRecord>,
    /// Deferred instruction for the oracle's reduction step.
    pub reduce_requested: bool,
}

/// A syntax tree snapshot together with the grammar it is written in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntaxTree {
    grammar: Grammar,
    root: NodeRef,
}

// ============================================================================
// NODE API
// ============================================================================

impl Node {
    /// Creates a leaf node carrying token text.
    pub fn token(kind: NodeKind, text: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            span,
            text: Some(text.into()),
            children: im::Vector::new(),
            annotations: im::Vector::new(),
            reduce_requested: false,
        }
    }

    /// Creates an interior node without text.
    pub fn branch(kind: NodeKind, span: Span, children: impl IntoIterator<Item = Node>) -> Self {
        Self {
            kind,
            span,
            text: None,
            children: children.into_iter().map(Arc::new).collect(),
            annotations: im::Vector::new(),
            reduce_requested: false,
        }
    }

    /// Creates a declaration node: a name plus member children.
    pub fn named(
        kind: NodeKind,
        name: impl Into<String>,
        span: Span,
        children: impl IntoIterator<Item = Node>,
    ) -> Self {
        Self {
            text: Some(name.into()),
            ..Self::branch(kind, span, children)
        }
    }

    pub fn child(&self, index: usize) -> Option<&Node> {
        self.children.get(index).map(|c| c.as_ref())
    }

    /// The callee of a call-site, absent for conditional invocations.
    pub fn callee(&self) -> Option<&Node> {
        if self.kind != NodeKind::Invocation {
            return None;
        }
        self.children
            .iter()
            .map(|c| c.as_ref())
            .find(|c| c.kind != NodeKind::ArgumentList)
    }

    /// The argument list of a call-site or construction expression.
    pub fn argument_list(&self) -> Option<&Node> {
        self.children
            .iter()
            .map(|c| c.as_ref())
            .find(|c| c.kind == NodeKind::ArgumentList)
    }

    pub fn with_children(&self, children: im::Vector<NodeRef>) -> Node {
        Node {
            children,
            ..self.clone()
        }
    }

    pub fn with_annotation(&self, record: AnnotationRecord) -> Node {
        let mut annotated = self.clone();
        annotated.annotations.push_back(record);
        annotated
    }

    pub fn with_reduce_request(&self) -> Node {
        Node {
            reduce_requested: true,
            ..self.clone()
        }
    }

    /// Pretty-prints the node as canonical source text.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use qualifier::ast::builder::{dotted, ident};
    /// use qualifier::ast::Span;
    /// assert_eq!(dotted("System.IO.File", Span::default()).pretty(), "System.IO.File");
    /// assert_eq!(ident("x", Span::default()).pretty(), "x");
    /// ```
    pub fn pretty(&self) -> String {
        let child = |i: usize| self.child(i).map(Node::pretty).unwrap_or_default();
        match self.kind {
            NodeKind::CompilationUnit => self.pretty_children("\n"),
            NodeKind::ImportDirective => format!("import {};", child(0)),
            NodeKind::NamespaceDecl => self.pretty_braced("namespace"),
            NodeKind::TypeDecl => self.pretty_braced("type"),
            NodeKind::MethodDecl => self.pretty_braced("method"),
            NodeKind::Block => Self::braced_body(&self.pretty_children(" ")),
            NodeKind::ExpressionStatement => format!("{};", child(0)),
            NodeKind::LocalDecl => self.pretty_local(),
            NodeKind::ReturnStatement if self.children.is_empty() => "return;".to_string(),
            NodeKind::ReturnStatement => format!("return {};", child(0)),
            NodeKind::Invocation => {
                let args = self.argument_list().map(Node::pretty).unwrap_or_default();
                let callee = self.callee().map(Node::pretty).unwrap_or_default();
                format!("{callee}{args}")
            }
            NodeKind::ArgumentList => format!("({})", self.pretty_children(", ")),
            NodeKind::Argument => child(0),
            NodeKind::ObjectCreation => {
                let args = self.argument_list().map(Node::pretty).unwrap_or_default();
                format!("new {}{}", child(0), args)
            }
            NodeKind::QualifiedName | NodeKind::MemberAccess => {
                format!("{}.{}", child(0), child(1))
            }
            NodeKind::AliasQualifiedName => format!("{}::{}", child(0), child(1)),
            NodeKind::IdentifierName | NodeKind::InstanceKeyword | NodeKind::Literal => {
                self.text.clone().unwrap_or_default()
            }
            NodeKind::Other => {
                let body = self.pretty_children(" ");
                match (&self.text, body.is_empty()) {
                    (Some(text), true) => text.clone(),
                    (Some(text), false) => format!("{text} {body}"),
                    (None, _) => body,
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // Pretty-printing helpers
    // ------------------------------------------------------------------------

    fn pretty_children(&self, separator: &str) -> String {
        self.children
            .iter()
            .map(|c| c.pretty())
            .collect::<Vec<_>>()
            .join(separator)
    }

    fn pretty_braced(&self, keyword: &str) -> String {
        let name = self.text.as_deref().unwrap_or("_");
        let body = Self::braced_body(&self.pretty_children(" "));
        format!("{keyword} {name} {body}")
    }

    fn braced_body(body: &str) -> String {
        if body.is_empty() {
            "{}".to_string()
        } else {
            format!("{{ {body} }}")
        }
    }

    /// `[initializer]` or `[type, initializer]`.
    fn pretty_local(&self) -> String {
        let name = self.text.as_deref().unwrap_or("_");
        match (self.child(0), self.child(1)) {
            (Some(ty), Some(init)) => format!("let {name}: {} = {};", ty.pretty(), init.pretty()),
            (Some(init), None) => format!("let {name} = {};", init.pretty()),
            _ => format!("let {name};"),
        }
    }
}

// ============================================================================
// TREE API
// ============================================================================

impl SyntaxTree {
    pub fn new(grammar: Grammar, root: Node) -> Self {
        Self {
            grammar,
            root: Arc::new(root),
        }
    }

    pub fn grammar(&self) -> Grammar {
        self.grammar
    }

    pub fn root(&self) -> &NodeRef {
        &self.root
    }

    /// A new snapshot with the same grammar and a different root.
    pub fn with_root(&self, root: NodeRef) -> Self {
        Self {
            grammar: self.grammar,
            root,
        }
    }

    /// A new snapshot whose root carries one more annotation.
    pub fn annotate_root(&self, record: AnnotationRecord) -> Self {
        self.with_root(Arc::new(self.root.with_annotation(record)))
    }

    pub fn pretty(&self) -> String {
        self.root.pretty()
    }

    /// Replaces every node in `targets`, bottom-up.
    ///
    /// `rewrite` receives each target with its descendants already rewritten. Subtrees
    /// containing no target are shared with `self`. `index` must be built from `self`.
    pub fn rewrite<E, F>(
        &self,
        index: &TreeIndex,
        targets: &BTreeSet<NodeId>,
        mut rewrite: F,
    ) -> Result<SyntaxTree, E>
    where
        F: FnMut(NodeId, Node) -> Result<Node, E>,
    {
        debug_assert!(Arc::ptr_eq(index.node(NodeId::ROOT), &self.root));
        if targets.is_empty() {
            return Ok(self.clone());
        }
        let root = rewrite_subtree(&self.root, NodeId::ROOT, index, targets, &mut rewrite)?;
        Ok(self.with_root(root))
    }

    /// Every annotation in the tree, in preorder.
    pub fn warnings(&self) -> Vec<Warning> {
        TreeIndex::build(self)
            .iter()
            .flat_map(|(id, entry)| {
                entry.node.annotations.iter().map(move |record| Warning {
                    node: id,
                    kind: entry.node.kind,
                    text: entry.node.pretty(),
                    record: record.clone(),
                })
            })
            .collect()
    }

    pub fn has_reduce_requests(&self) -> bool {
        has_reduce_requests(&self.root)
    }

    /// Removes reduce markers the oracle left behind.
    pub fn clear_reduce_requests(&self) -> SyntaxTree {
        if !self.has_reduce_requests() {
            return self.clone();
        }
        self.with_root(clear_reduce_requests(&self.root))
    }
}

// ============================================================================
// TRAVERSAL HELPERS (INTERNAL)
// ============================================================================

fn rewrite_subtree<E, F>(
    node: &NodeRef,
    id: NodeId,
    index: &TreeIndex,
    targets: &BTreeSet<NodeId>,
    rewrite: &mut F,
) -> Result<NodeRef, E>
where
    F: FnMut(NodeId, Node) -> Result<Node, E>,
{
    if targets.range(id..index.subtree_end(id)).next().is_none() {
        return Ok(Arc::clone(node));
    }

    let mut children = node.children.clone();
    let mut changed = false;
    for (position, child_id) in index.children(id).iter().enumerate() {
        let original = &node.children[position];
        let rewritten = rewrite_subtree(original, *child_id, index, targets, rewrite)?;
        if !Arc::ptr_eq(&rewritten, original) {
            children.set(position, rewritten);
            changed = true;
        }
    }

    let rebuilt = if changed {
        node.with_children(children)
    } else {
        (**node).clone()
    };
    if targets.contains(&id) {
        return Ok(Arc::new(rewrite(id, rebuilt)?));
    }
    Ok(Arc::new(rebuilt))
}

fn has_reduce_requests(node: &Node) -> bool {
    node.reduce_requested || node.children.iter().any(|c| has_reduce_requests(c))
}

fn clear_reduce_requests(node: &NodeRef) -> NodeRef {
    if !has_reduce_requests(node) {
        return Arc::clone(node);
    }
    let children = node.children.iter().map(clear_reduce_requests).collect();
    Arc::new(Node {
        reduce_requested: false,
        ..node.with_children(children)
    })
}

// ============================================================================
// MODULE EXPORTS
// ============================================================================

pub mod annotation;
pub mod builder;
pub mod index;

pub use annotation::{AnnotationKind, AnnotationRecord, Warning};
pub use index::{IndexedNode, TreeIndex};
