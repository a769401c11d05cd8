//! Expansion policy for the `Basic` grammar.

use crate::ast::{Node, NodeKind, Span};
use crate::oracle::SemanticModel;
use crate::QualifierError;

use super::{
    default_expand_within, expandable_symbol, prefix_segment, qualify,
    DocumentScope, ExpansionPolicy,
};

/// Root namespace keyword used when a declaration shadows the first path segment.
const GLOBAL_KEYWORD: &str = "Global";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BasicExpander;

impl ExpansionPolicy for BasicExpander {
    fn should_expand_within_node<M: SemanticModel + ?Sized>(
        &self,
        node: &Node,
        scope: &DocumentScope<'_>,
        model: &M,
    ) -> bool {
        // The analyzer mis-resolves members reached through `Me`/`MyBase` receivers.
        !is_instance_member_access(node) && default_expand_within(self, node, scope, model)
    }

    fn should_expand_node<M: SemanticModel + ?Sized>(
        &self,
        node: &Node,
        scope: &DocumentScope<'_>,
        model: &M,
    ) -> bool {
        if is_instance_member_access(node) {
            return false;
        }
        let Some(symbol) = expandable_symbol(node, model) else {
            return false;
        };
        // Qualifying a generic method drops its inferred type arguments.
        if symbol.is_generic_method {
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
        qualify(node, scope, model, |name, span: Span| {
            prefix_segment(GLOBAL_KEYWORD, name, span)
        })
    }
}

fn is_instance_member_access(node: &Node) -> bool {
    node.kind == NodeKind::MemberAccess
        && node
            .child(0)
            .is_some_and(|receiver| receiver.kind == NodeKind::InstanceKeyword)
}
