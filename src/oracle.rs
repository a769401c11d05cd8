//! Interface to the semantic analyzer the passes consult.
//!
//! The oracle is an external collaborator: it resolves symbols, reports diagnostics and
//! performs the final minimal-form reduction. Nothing here assumes it is correct; the
//! passes treat every `Err` it returns as a downgradable failure.

use serde::{Deserialize, Serialize};

use crate::ast::{Node, Span, SyntaxTree};
use crate::QualifierError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Severity {
    Hidden,
    Info,
    Warning,
    Error,
}

/// A semantic-analysis finding for one tree snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub id: String,
    pub span: Span,
    pub severity: Severity,
    /// False for locations synthesized by the analyzer rather than found in the tree.
    #[serde(default = "in_source_default")]
    pub in_source: bool,
}

fn in_source_default() -> bool {
    true
}

impl Diagnostic {
    pub fn new(id: impl Into<String>, span: Span, severity: Severity) -> Self {
        Self {
            id: id.into(),
            span,
            severity,
            in_source: true,
        }
    }

    pub fn synthesized(mut self) -> Self {
        self.in_source = false;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SymbolKind {
    Namespace,
    Type,
    Method,
    Field,
    Property,
    Event,
    Local,
    Parameter,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Namespace => "namespace",
            SymbolKind::Type => "type",
            SymbolKind::Method => "method",
            SymbolKind::Field => "field",
            SymbolKind::Property => "property",
            SymbolKind::Event => "event",
            SymbolKind::Local => "local",
            SymbolKind::Parameter => "parameter",
        }
    }

    pub fn is_member(&self) -> bool {
        matches!(
            self,
            SymbolKind::Method | SymbolKind::Field | SymbolKind::Property | SymbolKind::Event
        )
    }
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved symbol as reported by the semantic model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    /// Fully-qualified name of the containing namespace or type.
    #[serde(default)]
    pub container: Option<String>,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub is_generic_method: bool,
    #[serde(default)]
    pub is_extension: bool,
}

impl Symbol {
    pub fn new(name: impl Into<String>, kind: SymbolKind, container: Option<&str>) -> Self {
        Self {
            name: name.into(),
            kind,
            container: container.map(str::to_string),
            is_static: false,
            is_generic_method: false,
            is_extension: false,
        }
    }

    /// The dotted fully-qualified name: container path plus own name.
    ///
    /// ```rust
    /// use qualifier::oracle::{Symbol, SymbolKind};
    /// let file = Symbol::new("File", SymbolKind::Type, Some("System.IO"));
    /// assert_eq!(file.qualified_name(), "System.IO.File");
    /// ```
    pub fn qualified_name(&self) -> String {
        match &self.container {
            Some(container) if !container.is_empty() => format!("{container}.{}", self.name),
            _ => self.name.clone(),
        }
    }

    /// Types, namespaces and static members can be written fully qualified.
    pub fn has_static_path(&self) -> bool {
        match self.kind {
            SymbolKind::Namespace | SymbolKind::Type => true,
            kind if kind.is_member() => self.is_static && !self.is_extension,
            _ => false,
        }
    }
}

/// Per-snapshot semantic information, opaque to the passes except for symbol lookup.
pub trait SemanticModel {
    /// The symbol `node` refers to, if the analyzer can resolve it.
    fn symbol_info(&self, node: &Node) -> Option<Symbol>;
}

/// The semantic analyzer the passes consult.
pub trait SemanticOracle {
    type Model: SemanticModel;

    fn diagnostics(&self, tree: &SyntaxTree) -> Result<Vec<Diagnostic>, QualifierError>;

    fn semantic_model(&self, tree: &SyntaxTree) -> Result<Self::Model, QualifierError>;

    /// Resolves every reduce marker in `tree` to its minimal legal form.
    fn reduce_to_minimal_form(&self, tree: &SyntaxTree) -> Result<SyntaxTree, QualifierError>;
}

impl<O: SemanticOracle + ?Sized> SemanticOracle for &O {
    type Model = O::Model;

    fn diagnostics(&self, tree: &SyntaxTree) -> Result<Vec<Diagnostic>, QualifierError> {
        (**self).diagnostics(tree)
    }

    fn semantic_model(&self, tree: &SyntaxTree) -> Result<Self::Model, QualifierError> {
        (**self).semantic_model(tree)
    }

    fn reduce_to_minimal_form(&self, tree: &SyntaxTree) -> Result<SyntaxTree, QualifierError> {
        (**self).reduce_to_minimal_form(tree)
    }
}
