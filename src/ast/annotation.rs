//! Out-of-band node metadata.
//!
//! Annotations never alter a node's text. The qualifier passes use them for one thing:
//! recording a non-fatal conversion warning on the node (or root) where a rewrite failed,
//! so the failure travels with the converted tree instead of a side log.

use serde::{Deserialize, Serialize};

use super::{NodeId, NodeKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnnotationKind {
    ConversionWarning,
}

impl AnnotationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnnotationKind::ConversionWarning => "conversion-warning",
        }
    }
}

/// A single annotation attached to a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnnotationRecord {
    pub kind: AnnotationKind,
    /// Human-readable warning text.
    pub payload: String,
}

impl AnnotationRecord {
    pub fn conversion_warning(payload: impl Into<String>) -> Self {
        Self {
            kind: AnnotationKind::ConversionWarning,
            payload: payload.into(),
        }
    }
}

/// An annotation as surfaced to the caller, with the node it was found on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Warning {
    pub node: NodeId,
    pub kind: NodeKind,
    /// Pretty-printed text of the annotated node.
    pub text: String,
    pub record: AnnotationRecord,
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {}: {}", self.record.kind.as_str(), self.node, self.record.payload)
    }
}
