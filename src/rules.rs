//! Known-unsafe simplification shapes.
//!
//! The oracle's minimal-form reduction is locally type-correct but changes behaviour for a
//! handful of node shapes. Those shapes are listed here per grammar and consulted, never
//! derived: a newly discovered defect is a new table entry and a version bump.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::ast::{Grammar, Node, NodeKind};

/// Bumped whenever a table below changes.
pub const UNSAFE_SHAPES_VERSION: u32 = 3;

/// A node shape the oracle is known to simplify incorrectly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnsafeShape {
    /// Call-site with zero arguments: reduction drops the empty argument list, turning
    /// an invocation into a reference.
    EmptyCallSite,
    /// Call-site with no callee (conditional invocation): reduction throws on it.
    CalleelessCallSite,
    /// Construction expression: reduction may produce an inferred-field form that is
    /// illegal inside a construction.
    Construction,
}

impl UnsafeShape {
    pub const ALL: [UnsafeShape; 3] = [
        UnsafeShape::EmptyCallSite,
        UnsafeShape::CalleelessCallSite,
        UnsafeShape::Construction,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            UnsafeShape::EmptyCallSite => "empty-call-site",
            UnsafeShape::CalleelessCallSite => "calleeless-call-site",
            UnsafeShape::Construction => "construction",
        }
    }

    pub fn from_name(name: &str) -> Option<UnsafeShape> {
        SHAPES_BY_NAME.get(name).copied()
    }

    pub fn matches(&self, node: &Node) -> bool {
        match self {
            UnsafeShape::EmptyCallSite => {
                node.kind == NodeKind::Invocation
                    && node
                        .argument_list()
                        .map_or(true, |list| list.children.is_empty())
            }
            UnsafeShape::CalleelessCallSite => {
                node.kind == NodeKind::Invocation && node.callee().is_none()
            }
            UnsafeShape::Construction => node.kind == NodeKind::ObjectCreation,
        }
    }
}

static SHAPES_BY_NAME: Lazy<HashMap<&'static str, UnsafeShape>> = Lazy::new(|| {
    UnsafeShape::ALL
        .iter()
        .map(|shape| (shape.name(), *shape))
        .collect()
});

pub const BASIC_UNSAFE_SHAPES: &[UnsafeShape] = &[
    UnsafeShape::EmptyCallSite,
    UnsafeShape::CalleelessCallSite,
    UnsafeShape::Construction,
];

pub const CURLY_UNSAFE_SHAPES: &[UnsafeShape] = &[];

/// Decides whether the oracle may be asked to simplify a node.
pub trait UnsafeShapeRules {
    fn is_unsafe_to_simplify(&self, node: &Node) -> bool;
}

/// Table-backed rules: the grammar's built-in shapes plus any configured extras.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeTable {
    shapes: Vec<UnsafeShape>,
}

impl ShapeTable {
    pub fn for_grammar(grammar: Grammar) -> Self {
        let builtin = match grammar {
            Grammar::Basic => BASIC_UNSAFE_SHAPES,
            Grammar::Curly => CURLY_UNSAFE_SHAPES,
        };
        Self {
            shapes: builtin.to_vec(),
        }
    }

    pub fn with_shapes(mut self, extra: impl IntoIterator<Item = UnsafeShape>) -> Self {
        for shape in extra {
            if !self.shapes.contains(&shape) {
                self.shapes.push(shape);
            }
        }
        self
    }

    pub fn shapes(&self) -> &[UnsafeShape] {
        &self.shapes
    }

    /// The first listed shape `node` matches.
    pub fn matching_shape(&self, node: &Node) -> Option<UnsafeShape> {
        self.shapes.iter().copied().find(|shape| shape.matches(node))
    }
}

impl UnsafeShapeRules for ShapeTable {
    fn is_unsafe_to_simplify(&self, node: &Node) -> bool {
        self.matching_shape(node).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builder::*;
    use crate::ast::Span;

    fn span() -> Span {
        Span::default()
    }

    #[test]
    fn basic_call_sites() {
        let rules = ShapeTable::for_grammar(Grammar::Basic);
        let empty = call(ident("Refresh", span()), [], span());
        let with_args = call(ident("Refresh", span()), [literal("1", span())], span());
        let conditional = conditional_call([literal("1", span())], span());
        assert_eq!(rules.matching_shape(&empty), Some(UnsafeShape::EmptyCallSite));
        assert!(!rules.is_unsafe_to_simplify(&with_args));
        assert_eq!(
            rules.matching_shape(&conditional),
            Some(UnsafeShape::CalleelessCallSite)
        );
    }

    #[test]
    fn basic_construction() {
        let rules = ShapeTable::for_grammar(Grammar::Basic);
        let created = new_object(dotted("Acme.Widget", span()), [literal("1", span())], span());
        assert!(rules.is_unsafe_to_simplify(&created));
        assert!(!rules.is_unsafe_to_simplify(&dotted("Acme.Widget", span())));
    }

    #[test]
    fn curly_has_no_builtin_shapes() {
        let rules = ShapeTable::for_grammar(Grammar::Curly);
        assert!(rules.shapes().is_empty());
        assert!(!rules.is_unsafe_to_simplify(&call(ident("Run", span()), [], span())));
        assert!(!rules.is_unsafe_to_simplify(&new_object(ident("W", span()), [], span())));
    }

    #[test]
    fn tables_can_be_extended_without_duplicates() {
        let rules = ShapeTable::for_grammar(Grammar::Curly)
            .with_shapes([UnsafeShape::Construction, UnsafeShape::Construction]);
        assert_eq!(rules.shapes(), &[UnsafeShape::Construction]);
        assert!(rules.is_unsafe_to_simplify(&new_object(ident("W", span()), [], span())));
    }

    #[test]
    fn shape_names_round_trip() {
        for shape in UnsafeShape::ALL {
            assert_eq!(UnsafeShape::from_name(shape.name()), Some(shape));
        }
        assert_eq!(UnsafeShape::from_name("lambda"), None);
    }
}
