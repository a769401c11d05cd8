//! Expansion policy for the `Curly` grammar.
//!
//! Alias-qualified names (`global::X`, `Alias::X`) are already rooted and never entered.
//! Extension methods called in instance form have no static path and stay as written.

use crate::ast::{Node, NodeKind, Span};
use crate::ast::builder::ident;
use crate::oracle::SemanticModel;
use crate::QualifierError;

use super::{default_expand_within, expandable_symbol, qualify, DocumentScope, ExpansionPolicy};

const GLOBAL_ALIAS: &str = "global";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CurlyExpander;

impl ExpansionPolicy for CurlyExpander {
    fn should_expand_within_node<M: SemanticModel + ?Sized>(
        &self,
        node: &Node,
        scope: &DocumentScope<'_>,
        model: &M,
    ) -> bool {
        node.kind != NodeKind::AliasQualifiedName && default_expand_within(self, node, scope, model)
    }

    fn should_expand_node<M: SemanticModel + ?Sized>(
        &self,
        node: &Node,
        scope: &DocumentScope<'_>,
        model: &M,
    ) -> bool {
        if expandable_symbol(node, model).is_none() {
            return false;
        }
        !(node.kind == NodeKind::IdentifierName && scope.is_member_half(node))
    }

    fn expand_node<M: SemanticModel + ?Sized>(
        &self,
        node: &Node,
        scope: &DocumentScope<'_>,
        model: &M,
    ) -> Result<Node, QualifierError> {
        qualify(node, scope, model, global_alias)
    }
}

fn global_alias(name: Node, span: Span) -> Node {
    let alias_span = Span::new(span.start, span.start + GLOBAL_ALIAS.len());
    let joined = Span::new(span.start, name.span.end);
    Node::branch(
        NodeKind::AliasQualifiedName,
        joined,
        [ident(GLOBAL_ALIAS, alias_span), name],
    )
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::ast::builder::*;
    use crate::oracle::{Symbol, SymbolKind};

    struct TextModel(HashMap<String, Symbol>);

    impl SemanticModel for TextModel {
        fn symbol_info(&self, node: &Node) -> Option<Symbol> {
            self.0.get(&node.pretty()).cloned()
        }
    }

    fn model(entries: impl IntoIterator<Item = (&'static str, Symbol)>) -> TextModel {
        TextModel(
            entries
                .into_iter()
                .map(|(text, symbol)| (text.to_string(), symbol))
                .collect(),
        )
    }

    #[test]
    fn static_member_access_becomes_dotted_expression() {
        let mut empty = Symbol::new("Empty", SymbolKind::Field, Some("System.String"));
        empty.is_static = true;
        let model = model([("String.Empty", empty)]);
        let node = member(ident("String", Span::new(0, 6)), "Empty", Span::new(0, 12));
        let root = unit([stmt(node.clone())]);
        let scope = DocumentScope::new(&root);
        assert!(CurlyExpander.should_expand_node(&node, &scope, &model));
        assert!(!CurlyExpander.should_expand_within_node(&node, &scope, &model));
        let expanded = CurlyExpander.expand_node(&node, &scope, &model).unwrap();
        assert_eq!(expanded.kind, NodeKind::MemberAccess);
        assert_eq!(expanded.pretty(), "System.String.Empty");
    }

    #[test]
    fn instance_members_and_locals_are_left_alone() {
        let model = model([
            ("items.Count", Symbol::new("Count", SymbolKind::Property, Some("System.Collections.Generic.List"))),
            ("items", Symbol::new("items", SymbolKind::Local, None)),
        ]);
        let node = member(ident("items", Span::new(0, 5)), "Count", Span::new(0, 11));
        let root = unit([stmt(node.clone())]);
        let scope = DocumentScope::new(&root);
        assert!(!CurlyExpander.should_expand_node(&node, &scope, &model));
        assert!(CurlyExpander.should_expand_within_node(&node, &scope, &model));
        assert!(!CurlyExpander.should_expand_node(&ident("items", Span::new(0, 5)), &scope, &model));
    }

    #[test]
    fn extension_calls_are_not_expanded() {
        let mut any = Symbol::new("Any", SymbolKind::Method, Some("System.Linq.Enumerable"));
        any.is_static = true;
        any.is_extension = true;
        let model = model([("Any", any)]);
        assert!(!CurlyExpander.should_expand_node(&ident("Any", Span::new(0, 3)), &DocumentScope::new(&unit([])), &model));
    }

    #[test]
    fn alias_qualified_names_are_not_entered() {
        let model = model([]);
        let node = alias_qualified("global", "Acme.Widget", Span::new(0, 19));
        assert!(!CurlyExpander.should_expand_within_node(&node, &DocumentScope::new(&unit([])), &model));
    }

    #[test]
    fn shadowed_root_is_escaped_with_global_alias() {
        let model = model([("Widget", Symbol::new("Widget", SymbolKind::Type, Some("Acme.Ui")))]);
        let root = unit([namespace(
            "Shop",
            Span::new(0, 30),
            [namespace("Acme", Span::new(10, 20), [])],
        )]);
        let scope = DocumentScope::new(&root);
        let expanded = CurlyExpander
            .expand_node(&ident("Widget", Span::new(40, 46)), &scope, &model)
            .unwrap();
        assert_eq!(expanded.pretty(), "global::Acme.Ui.Widget");

        let top_level = unit([namespace("Acme", Span::new(0, 10), [])]);
        let expanded = CurlyExpander
            .expand_node(&ident("Widget", Span::new(40, 46)), &DocumentScope::new(&top_level), &model)
            .unwrap();
        assert_eq!(expanded.pretty(), "Acme.Ui.Widget");
    }
}
