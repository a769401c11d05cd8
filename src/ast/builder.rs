//! # Tree Builder Helpers
//!
//! ## Purpose
//! Small constructors for the node shapes the qualifier passes care about. Used by the
//! expansion policies to materialize fully-qualified names and by tests to build trees.
//!
//! ## Invariants
//! - Never mutates input
//! - Dotted names get per-segment spans derived from the span of the whole text

use super::{Node, NodeKind, Span};

pub fn ident(name: impl Into<String>, span: Span) -> Node {
    Node::token(NodeKind::IdentifierName, name, span)
}

pub fn literal(text: impl Into<String>, span: Span) -> Node {
    Node::token(NodeKind::Literal, text, span)
}

pub fn instance_keyword(text: impl Into<String>, span: Span) -> Node {
    Node::token(NodeKind::InstanceKeyword, text, span)
}

/// A dotted type/namespace name: `A.B.C` becomes `QualifiedName(QualifiedName(A, B), C)`.
pub fn dotted(name: &str, span: Span) -> Node {
    fold_segments(name, span, NodeKind::QualifiedName)
}

/// A dotted expression: `A.B.C` becomes `MemberAccess(MemberAccess(A, B), C)`.
pub fn dotted_expression(name: &str, span: Span) -> Node {
    fold_segments(name, span, NodeKind::MemberAccess)
}

pub fn member(receiver: Node, name: &str, span: Span) -> Node {
    let name_start = span.end.saturating_sub(name.len());
    Node::branch(
        NodeKind::MemberAccess,
        span,
        [receiver, ident(name, Span::new(name_start, span.end))],
    )
}

pub fn alias_qualified(alias: &str, name: &str, span: Span) -> Node {
    let alias_span = Span::new(span.start, span.start + alias.len());
    let name_start = alias_span.end + 2;
    Node::branch(
        NodeKind::AliasQualifiedName,
        span,
        [ident(alias, alias_span), dotted(name, Span::new(name_start, span.end))],
    )
}

pub fn arguments(args: impl IntoIterator<Item = Node>, span: Span) -> Node {
    let wrapped = args
        .into_iter()
        .map(|arg| Node::branch(NodeKind::Argument, arg.span, [arg]));
    Node::branch(NodeKind::ArgumentList, span, wrapped)
}

/// A call-site. Its argument list spans from the callee's end to the call's end.
pub fn call(callee: Node, args: impl IntoIterator<Item = Node>, span: Span) -> Node {
    let list = arguments(args, Span::new(callee.span.end, span.end));
    Node::branch(NodeKind::Invocation, span, [callee, list])
}

/// A call-site without a callee, as produced for conditional invocations.
pub fn conditional_call(args: impl IntoIterator<Item = Node>, span: Span) -> Node {
    Node::branch(NodeKind::Invocation, span, [arguments(args, span)])
}

pub fn new_object(ty: Node, args: impl IntoIterator<Item = Node>, span: Span) -> Node {
    let list = arguments(args, Span::new(ty.span.end, span.end));
    Node::branch(NodeKind::ObjectCreation, span, [ty, list])
}

pub fn stmt(expr: Node) -> Node {
    let span = Span::new(expr.span.start, expr.span.end + 1);
    Node::branch(NodeKind::ExpressionStatement, span, [expr])
}

pub fn call_stmt(callee: Node, args: impl IntoIterator<Item = Node>, span: Span) -> Node {
    stmt(call(callee, args, span))
}

pub fn local(name: &str, ty: Option<Node>, init: Node, span: Span) -> Node {
    Node::named(NodeKind::LocalDecl, name, span, ty.into_iter().chain([init]))
}

pub fn ret(value: Option<Node>, span: Span) -> Node {
    Node::branch(NodeKind::ReturnStatement, span, value)
}

pub fn import(name: &str, span: Span) -> Node {
    let name_start = span.start + "import ".len();
    Node::branch(
        NodeKind::ImportDirective,
        span,
        [dotted(name, Span::new(name_start, name_start + name.len()))],
    )
}

pub fn method(name: &str, span: Span, statements: impl IntoIterator<Item = Node>) -> Node {
    Node::named(NodeKind::MethodDecl, name, span, statements)
}

pub fn type_decl(name: &str, span: Span, members: impl IntoIterator<Item = Node>) -> Node {
    Node::named(NodeKind::TypeDecl, name, span, members)
}

pub fn namespace(name: &str, span: Span, members: impl IntoIterator<Item = Node>) -> Node {
    Node::named(NodeKind::NamespaceDecl, name, span, members)
}

/// A compilation unit spanning all of its children.
pub fn unit(children: impl IntoIterator<Item = Node>) -> Node {
    let children: Vec<Node> = children.into_iter().collect();
    let span = match (children.first(), children.last()) {
        (Some(first), Some(last)) => Span::new(first.span.start, last.span.end),
        _ => Span::default(),
    };
    Node::branch(NodeKind::CompilationUnit, span, children)
}

/// Gives every node of a synthesized subtree the span of the node it replaces.
///
/// Synthesized text has no source position of its own; reusing the replaced span keeps
/// the subtree inside its parent's span and clear of its siblings.
pub fn respan(node: Node, span: Span) -> Node {
    let children = node
        .children
        .iter()
        .map(|child| std::sync::Arc::new(respan((**child).clone(), span)))
        .collect();
    Node {
        span,
        children,
        ..node
    }
}

// ----------------------------------------------------------------------------
// Utility functions
// ----------------------------------------------------------------------------

fn fold_segments(name: &str, span: Span, kind: NodeKind) -> Node {
    let mut offset = span.start;
    let mut segments = name.split('.').map(|segment| {
        let segment_span = Span::new(offset, offset + segment.len());
        offset += segment.len() + 1;
        ident(segment, segment_span)
    });
    let Some(first) = segments.next() else {
        return ident(name, span);
    };
    segments.fold(first, |left, right| {
        let joined = Span::new(left.span.start, right.span.end);
        Node::branch(kind, joined, [left, right])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotted_assigns_segment_spans() {
        let name = dotted("System.IO.File", Span::new(10, 24));
        assert_eq!(name.kind, NodeKind::QualifiedName);
        assert_eq!(name.span, Span::new(10, 24));
        let right = name.child(1).unwrap();
        assert_eq!(right.text.as_deref(), Some("File"));
        assert_eq!(right.span, Span::new(20, 24));
        let left = name.child(0).unwrap();
        assert_eq!(left.pretty(), "System.IO");
        assert_eq!(left.span, Span::new(10, 19));
    }

    #[test]
    fn single_segment_is_identifier() {
        let name = dotted("List", Span::new(0, 4));
        assert_eq!(name.kind, NodeKind::IdentifierName);
    }

    #[test]
    fn call_shapes() {
        let invocation = call(ident("Run", Span::new(0, 3)), [], Span::new(0, 5));
        assert_eq!(invocation.callee().map(Node::pretty).as_deref(), Some("Run"));
        assert_eq!(invocation.argument_list().map(|l| l.children.len()), Some(0));
        assert_eq!(invocation.pretty(), "Run()");

        let conditional = conditional_call([literal("1", Span::new(2, 3))], Span::new(0, 4));
        assert!(conditional.callee().is_none());
        assert_eq!(conditional.pretty(), "(1)");
    }

    #[test]
    fn alias_and_construction_render() {
        let name = alias_qualified("global", "Acme.Widget", Span::new(0, 19));
        assert_eq!(name.pretty(), "global::Acme.Widget");
        let created = new_object(dotted("Acme.Widget", Span::new(4, 15)), [], Span::new(0, 17));
        assert_eq!(created.pretty(), "new Acme.Widget()");
        let declared = local("w", Some(ident("Widget", Span::new(7, 13))), created, Span::new(0, 30));
        assert_eq!(declared.pretty(), "let w: Widget = new Acme.Widget();");
    }

    #[test]
    fn respan_covers_every_synthesized_node() {
        let name = respan(dotted("Acme.Types.Alpha", Span::new(21, 37)), Span::new(21, 26));
        assert_eq!(name.pretty(), "Acme.Types.Alpha");
        assert_eq!(name.span, Span::new(21, 26));
        let left = name.child(0).unwrap();
        assert_eq!(left.span, Span::new(21, 26));
        assert_eq!(left.child(1).unwrap().span, Span::new(21, 26));
    }
}
