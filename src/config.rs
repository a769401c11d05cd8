//! Pipeline configuration.
//!
//! Configuration is read from YAML or JSON. Documents may hold the settings at the top
//! level or under a `qualifier:` section, so the block can live inside a larger converter
//! configuration file:
//!
//! ```yaml
//! qualifier:
//!   trace-stages: true
//!   unresolved-diagnostic-ids:
//!     curly: CS0246
//!   extra-unsafe-shapes:
//!     curly: [construction]
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::ast::Grammar;
use crate::diagnostics::{ErrorContext, QualifierError};
use crate::err_msg;
use crate::rules::{ShapeTable, UnsafeShape};

const SECTION: &str = "qualifier";

/// Resolved settings for one [`crate::Pipeline`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Run the expansion phase.
    pub expand: bool,
    /// Run the simplification phase.
    pub simplify: bool,
    /// Log per-stage timings at `info` level.
    pub trace_stages: bool,
    unresolved_ids: HashMap<Grammar, String>,
    extra_shapes: HashMap<Grammar, Vec<UnsafeShape>>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let mut unresolved_ids = HashMap::new();
        unresolved_ids.insert(Grammar::Basic, "BC30002".to_string());
        unresolved_ids.insert(Grammar::Curly, "CS0246".to_string());
        Self {
            expand: true,
            simplify: true,
            trace_stages: false,
            unresolved_ids,
            extra_shapes: HashMap::new(),
        }
    }
}

impl PipelineConfig {
    /// Diagnostic id the oracle reports for an unresolvable type or namespace name.
    pub fn unresolved_diagnostic_id(&self, grammar: Grammar) -> &str {
        self.unresolved_ids
            .get(&grammar)
            .map(String::as_str)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn with_unresolved_diagnostic_id(mut self, grammar: Grammar, id: impl Into<String>) -> Self {
        self.unresolved_ids.insert(grammar, id.into());
        self
    }

    #[must_use]
    pub fn with_extra_shapes(
        mut self,
        grammar: Grammar,
        shapes: impl IntoIterator<Item = UnsafeShape>,
    ) -> Self {
        let entry = self.extra_shapes.entry(grammar).or_default();
        for shape in shapes {
            if !entry.contains(&shape) {
                entry.push(shape);
            }
        }
        self
    }

    /// The grammar's built-in unsafe shapes plus the configured extras.
    pub fn shape_table(&self, grammar: Grammar) -> ShapeTable {
        let extra = self.extra_shapes.get(&grammar).cloned().unwrap_or_default();
        ShapeTable::for_grammar(grammar).with_shapes(extra)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, QualifierError> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        let value: serde_yaml::Value = serde_yaml::from_str(contents)
            .map_err(|err| err_msg!(Config, "invalid YAML configuration").with_source(err))?;
        let section = match value {
            serde_yaml::Value::Mapping(ref mapping) if mapping.contains_key(SECTION) => {
                mapping.get(SECTION).cloned().unwrap_or_default()
            }
            other => other,
        };
        if section.is_null() {
            return Ok(Self::default());
        }
        let raw: RawConfigDocument = serde_yaml::from_value(section)
            .map_err(|err| err_msg!(Config, "malformed qualifier configuration").with_source(err))?;
        Self::default().apply(raw)
    }

    pub fn from_json_str(contents: &str) -> Result<Self, QualifierError> {
        let mut value: serde_json::Value = serde_json::from_str(contents)
            .map_err(|err| err_msg!(Config, "invalid JSON configuration").with_source(err))?;
        if let Some(section) = value.get_mut(SECTION).map(serde_json::Value::take) {
            value = section;
        }
        if value.is_null() {
            return Ok(Self::default());
        }
        let raw: RawConfigDocument = serde_json::from_value(value)
            .map_err(|err| err_msg!(Config, "malformed qualifier configuration").with_source(err))?;
        Self::default().apply(raw)
    }

    /// Loads a `.json` file as JSON and anything else as YAML.
    pub fn load(path: &Path) -> Result<Self, QualifierError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            err_msg!(Config, "failed to read configuration '{}'", path.display()).with_source(err)
        })?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&contents)
        } else {
            Self::from_yaml_str(&contents)
        }
    }

    fn apply(mut self, raw: RawConfigDocument) -> Result<Self, QualifierError> {
        if let Some(expand) = raw.expand {
            self.expand = expand;
        }
        if let Some(simplify) = raw.simplify {
            self.simplify = simplify;
        }
        if let Some(trace) = raw.trace_stages {
            self.trace_stages = trace;
        }
        for (grammar, id) in raw.unresolved_diagnostic_ids {
            self = self.with_unresolved_diagnostic_id(grammar, id);
        }
        for (grammar, names) in raw.extra_unsafe_shapes {
            let shapes = names
                .iter()
                .map(|name| parse_shape(grammar, name))
                .collect::<Result<Vec<_>, _>>()?;
            self = self.with_extra_shapes(grammar, shapes);
        }
        Ok(self)
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct RawConfigDocument {
    #[serde(default)]
    expand: Option<bool>,
    #[serde(default)]
    simplify: Option<bool>,
    #[serde(default)]
    trace_stages: Option<bool>,
    #[serde(default)]
    unresolved_diagnostic_ids: HashMap<Grammar, String>,
    #[serde(default)]
    extra_unsafe_shapes: HashMap<Grammar, Vec<String>>,
}

fn parse_shape(grammar: Grammar, name: &str) -> Result<UnsafeShape, QualifierError> {
    UnsafeShape::from_name(name).ok_or_else(|| {
        let known = UnsafeShape::ALL.map(|shape| shape.name()).join(", ");
        QualifierError::Config {
            message: format!("unknown unsafe shape '{name}' for {grammar} grammar"),
            ctx: ErrorContext {
                span: None,
                help: Some(format!("known shapes: {known}")),
            },
            source: None,
        }
    })
}
