// src/core/populator.rs

//! # Populator
//!
//! Resolves the markers of a raw data record for one `(stage, region)` in two passes:
//!
//! 1. **Templates.** A string leaf that is exactly `$${name}` is replaced wholesale by the JSON
//!    fragment `templates[name]`, so a template can expand to an object or an array. Unknown names are
//!    reported as warnings and the marker is left untouched.
//! 2. **Variables.** Every `${name}` inside a string leaf (unless the string starts with `$$`) is
//!    substituted in place with the value resolved from [`Meta`], region first, then stage, then
//!    global. An unknown name is fatal. The reserved names `name`, `functionName`, `endpointName`
//!    and `eventName` resolve from the record itself when it sets them, ahead of the store.
//!
//! The template pass always completes before the variable pass starts, because template fragments
//! may carry variable markers of their own.

use crate::core::meta::Meta;
use crate::core::templates::Templates;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde_json::Value;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

/// Keys holding child collections. They are populated per child by the caller, never walked here.
pub const CHILD_COLLECTION_KEYS: [&str; 5] =
    ["components", "modules", "functions", "endpoints", "events"];

/// Variables taken from the record being populated rather than from [`Meta`].
pub const RESERVED_VARIABLES: [&str; 4] = ["name", "functionName", "endpointName", "eventName"];

/// Nested template expansions deeper than this are left unexpanded.
const MAX_TEMPLATE_DEPTH: u32 = 32;

lazy_static! {
    static ref TEMPLATE_RE: Regex =
        Regex::new(r"^\$\$\{([^}]+)\}$").expect("template marker regex is valid");
    static ref VARIABLE_RE: Regex =
        Regex::new(r"\$\{([^}]+)\}").expect("variable marker regex is valid");
}

/// Fatal population errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PopulateError {
    /// `get_populated` was called without a stage or a region.
    #[error("Both \"stage\" and \"region\" are required to populate.")]
    MissingStageOrRegion,
    /// A `${name}` marker is not defined in any scope.
    #[error("Variable '{name}' is not defined for stage '{stage}' and region '{region}' (nor globally).")]
    UndefinedVariable {
        /// The unresolved variable.
        name: String,
        /// Stage used for the lookup.
        stage: String,
        /// Region used for the lookup.
        region: String,
    },
}

/// Non-fatal findings of the template pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PopulateWarning {
    /// A `$${name}` marker has no template; the marker was kept.
    UndefinedTemplate {
        /// The missing template name.
        name: String,
    },
    /// A `$${module.template}` marker used the deprecated dotted form.
    DeprecatedTemplateSyntax {
        /// The marker as written.
        marker: String,
    },
    /// Templates nested deeper than the expansion limit; the innermost marker was kept.
    TemplateDepthExceeded {
        /// The template that was not expanded.
        name: String,
    },
}

/// A warning together with the node it was raised for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeWarning {
    /// sPath of the node (empty for the project).
    pub s_path: String,
    /// What was found.
    pub warning: PopulateWarning,
}

/// Collects the warnings of every populator run during one tree population. Safe to share between
/// the threads populating sibling nodes.
#[derive(Debug, Default)]
pub struct WarningLog {
    entries: Mutex<Vec<NodeWarning>>,
}

impl WarningLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the warnings raised for the node at `s_path`.
    pub fn record(&self, s_path: &str, warnings: &[PopulateWarning]) {
        if warnings.is_empty() {
            return;
        }
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.extend(warnings.iter().cloned().map(|warning| NodeWarning {
            s_path: s_path.to_string(),
            warning,
        }));
    }

    /// Everything recorded so far, in recording order.
    pub fn into_warnings(self) -> Vec<NodeWarning> {
        self.entries
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// The stage and region a record is populated for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PopulateOptions {
    /// Target stage.
    pub stage: Option<String>,
    /// Target region.
    pub region: Option<String>,
}

impl PopulateOptions {
    /// Options targeting `stage` and `region`.
    pub fn new(stage: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            stage: Some(stage.into()),
            region: Some(region.into()),
        }
    }

    /// Both scope keys, or [`PopulateError::MissingStageOrRegion`].
    pub fn require(&self) -> Result<(&str, &str), PopulateError> {
        match (self.stage.as_deref(), self.region.as_deref()) {
            (Some(stage), Some(region)) if !stage.is_empty() && !region.is_empty() => {
                Ok((stage, region))
            }
            _ => Err(PopulateError::MissingStageOrRegion),
        }
    }
}

/// Removes the child-collection keys from a record.
pub fn strip_child_collections(record: &mut Value) {
    if let Value::Object(map) = record {
        for key in CHILD_COLLECTION_KEYS {
            map.shift_remove(key);
        }
    }
}

/// One population run over one template scope.
#[derive(Debug)]
pub struct Populator<'a> {
    meta: &'a Meta,
    templates: &'a Templates,
    stage: &'a str,
    region: &'a str,
    reserved: Vec<(&'static str, Value)>,
    warnings: Vec<PopulateWarning>,
}

impl<'a> Populator<'a> {
    /// Creates a populator for `(stage, region)` with an already-merged template scope.
    pub fn new(meta: &'a Meta, templates: &'a Templates, stage: &'a str, region: &'a str) -> Self {
        Self {
            meta,
            templates,
            stage,
            region,
            reserved: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Runs both passes over `record` (child collections removed first) and returns the result.
    pub fn populate(&mut self, mut record: Value) -> Result<Value, PopulateError> {
        strip_child_collections(&mut record);
        self.apply_templates(&mut record, 0);
        self.reserved = reserved_variables(&record);
        self.apply_variables(&mut record)?;
        Ok(record)
    }

    /// Warnings collected so far.
    pub fn warnings(&self) -> &[PopulateWarning] {
        &self.warnings
    }

    fn warn(&mut self, warning: PopulateWarning) {
        match &warning {
            PopulateWarning::UndefinedTemplate { name } => {
                log::warn!("Template '{}' is not defined; leaving '$${{{}}}' as is.", name, name);
            }
            PopulateWarning::DeprecatedTemplateSyntax { marker } => {
                log::warn!(
                    "'{}' uses the deprecated 'module.template' syntax; use '$${{template}}' instead.",
                    marker
                );
            }
            PopulateWarning::TemplateDepthExceeded { name } => {
                log::warn!(
                    "Template '{}' is nested more than {} levels deep and was not expanded.",
                    name,
                    MAX_TEMPLATE_DEPTH
                );
            }
        }
        self.warnings.push(warning);
    }

    // --- Pass 1: templates ---

    fn apply_templates(&mut self, value: &mut Value, depth: u32) {
        match value {
            Value::Object(map) => {
                for child in map.values_mut() {
                    self.apply_templates(child, depth);
                }
            }
            Value::Array(items) => {
                for child in items.iter_mut() {
                    self.apply_templates(child, depth);
                }
            }
            Value::String(s) => {
                let Some(name) = template_name(s) else {
                    return;
                };
                let name = if let Some((_, plain)) = name.rsplit_once('.') {
                    self.warn(PopulateWarning::DeprecatedTemplateSyntax { marker: s.clone() });
                    plain.to_string()
                } else {
                    name
                };
                if depth >= MAX_TEMPLATE_DEPTH {
                    self.warn(PopulateWarning::TemplateDepthExceeded { name });
                    return;
                }
                let templates: &'a Templates = self.templates;
                match templates.get(&name) {
                    Some(fragment) => {
                        *value = fragment.clone();
                        self.apply_templates(value, depth + 1);
                    }
                    None => self.warn(PopulateWarning::UndefinedTemplate { name }),
                }
            }
            _ => {}
        }
    }

    // --- Pass 2: variables ---

    fn apply_variables(&self, value: &mut Value) -> Result<(), PopulateError> {
        match value {
            Value::Object(map) => {
                for child in map.values_mut() {
                    self.apply_variables(child)?;
                }
            }
            Value::Array(items) => {
                for child in items.iter_mut() {
                    self.apply_variables(child)?;
                }
            }
            Value::String(s) => {
                if s.starts_with("$$") || !VARIABLE_RE.is_match(s) {
                    return Ok(());
                }
                if let Some(replacement) = self.substitute(s)? {
                    *value = replacement;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Interpolates every marker of `s`. A string that is a single marker bound to a non-string value
    /// becomes that value.
    fn substitute(&self, s: &str) -> Result<Option<Value>, PopulateError> {
        if let Some(caps) = VARIABLE_RE.captures(s)
            && caps.get(0).is_some_and(|m| m.as_str() == s)
        {
            let resolved = self.lookup(&caps)?;
            if !resolved.is_string() {
                return Ok(Some(resolved.clone()));
            }
        }

        let mut failure = None;
        let interpolated = VARIABLE_RE.replace_all(s, |caps: &Captures<'_>| {
            match self.lookup(caps) {
                Ok(Value::String(text)) => text.clone(),
                Ok(other) => other.to_string(),
                Err(e) => {
                    failure.get_or_insert(e);
                    String::new()
                }
            }
        });
        match failure {
            Some(e) => Err(e),
            None => Ok(Some(Value::String(interpolated.into_owned()))),
        }
    }

    fn lookup(&self, caps: &Captures<'_>) -> Result<&Value, PopulateError> {
        let name = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
        if let Some((_, value)) = self.reserved.iter().find(|(key, _)| *key == name) {
            return Ok(value);
        }
        self.meta
            .resolve(name, self.stage, self.region)
            .ok_or_else(|| PopulateError::UndefinedVariable {
                name: name.to_string(),
                stage: self.stage.to_string(),
                region: self.region.to_string(),
            })
    }
}

/// The reserved variables `record` sets to a non-empty string.
fn reserved_variables(record: &Value) -> Vec<(&'static str, Value)> {
    RESERVED_VARIABLES
        .iter()
        .filter_map(|&key| {
            record
                .get(key)
                .filter(|v| v.as_str().is_some_and(|s| !s.is_empty()))
                .map(|v| (key, v.clone()))
        })
        .collect()
}

fn template_name(s: &str) -> Option<String> {
    TEMPLATE_RE
        .captures(s)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta() -> Meta {
        let mut meta = Meta::new();
        meta.set_global_variable("project", "acme");
        meta.set_global_variable("memory", 512);
        meta.set_global_variable("empty", "");
        meta.set_stage_variable("dev", "bucket", "acme-dev");
        meta.set_region_variable("dev", "us-east-1", "table", "users-use1");
        meta
    }

    fn templates() -> Templates {
        let mut templates = Templates::new();
        templates.insert("apiRequest", json!({"application/json": "{\"stage\": \"${bucket}\"}"}));
        templates.insert("list", json!(["a", "$${apiRequest}"]));
        templates
    }

    #[test]
    fn test_template_then_variable() {
        let (meta, templates) = (meta(), templates());
        let mut populator = Populator::new(&meta, &templates, "dev", "us-east-1");
        let record = json!({"requestTemplates": "$${apiRequest}", "name": "${project}-${table}"});

        let result = populator.populate(record).unwrap();

        assert_eq!(
            result,
            json!({
                "requestTemplates": {"application/json": "{\"stage\": \"acme-dev\"}"},
                "name": "acme-users-use1"
            })
        );
        assert!(populator.warnings().is_empty());
    }

    #[test]
    fn test_nested_templates_expand() {
        let (meta, templates) = (meta(), templates());
        let mut populator = Populator::new(&meta, &templates, "dev", "us-east-1");
        let result = populator.populate(json!({"x": "$${list}"})).unwrap();
        assert_eq!(
            result,
            json!({"x": ["a", {"application/json": "{\"stage\": \"acme-dev\"}"}]})
        );
    }

    #[test]
    fn test_undefined_variable_is_fatal() {
        let (meta, templates) = (meta(), templates());
        let mut populator = Populator::new(&meta, &templates, "dev", "us-east-1");
        let err = populator.populate(json!({"a": "x-${missing}"})).unwrap_err();
        assert_eq!(
            err,
            PopulateError::UndefinedVariable {
                name: "missing".to_string(),
                stage: "dev".to_string(),
                region: "us-east-1".to_string(),
            }
        );
    }

    #[test]
    fn test_undefined_template_warns_and_keeps_marker() {
        let (meta, templates) = (meta(), templates());
        let mut populator = Populator::new(&meta, &templates, "dev", "us-east-1");
        let result = populator.populate(json!({"a": "$${missingTemplate}"})).unwrap();

        assert_eq!(result, json!({"a": "$${missingTemplate}"}));
        assert_eq!(
            populator.warnings(),
            &[PopulateWarning::UndefinedTemplate {
                name: "missingTemplate".to_string()
            }]
        );
    }

    #[test]
    fn test_deprecated_dotted_template_name() {
        let (meta, templates) = (meta(), templates());
        let mut populator = Populator::new(&meta, &templates, "dev", "us-east-1");
        let result = populator.populate(json!({"a": "$${users.list}"})).unwrap();

        assert_eq!(result["a"][0], json!("a"));
        assert!(matches!(
            populator.warnings().first(),
            Some(PopulateWarning::DeprecatedTemplateSyntax { .. })
        ));
    }

    #[test]
    fn test_empty_string_is_defined() {
        let (meta, templates) = (meta(), templates());
        let mut populator = Populator::new(&meta, &templates, "dev", "us-east-1");
        let result = populator.populate(json!({"a": "pre${empty}post"})).unwrap();
        assert_eq!(result, json!({"a": "prepost"}));
    }

    #[test]
    fn test_whole_marker_keeps_value_type() {
        let (meta, templates) = (meta(), templates());
        let mut populator = Populator::new(&meta, &templates, "dev", "us-east-1");
        let result = populator
            .populate(json!({"memorySize": "${memory}", "label": "mem-${memory}"}))
            .unwrap();
        assert_eq!(result, json!({"memorySize": 512, "label": "mem-512"}));
    }

    #[test]
    fn test_population_is_idempotent_without_markers() {
        let (meta, templates) = (meta(), templates());
        let mut populator = Populator::new(&meta, &templates, "dev", "us-east-1");
        let record = json!({"a": 1, "b": ["x", {"c": null, "d": "$ {not}"}], "e": "$$ plain"});
        assert_eq!(populator.populate(record.clone()).unwrap(), record);
    }

    #[test]
    fn test_child_collections_are_stripped() {
        let (meta, templates) = (meta(), templates());
        let mut populator = Populator::new(&meta, &templates, "dev", "us-east-1");
        let record = json!({"name": "api", "modules": {"m": {"x": "${missing}"}}});
        assert_eq!(populator.populate(record).unwrap(), json!({"name": "api"}));
    }

    #[test]
    fn test_reserved_variables_come_from_the_record() {
        let templates = Templates::new();
        let empty = Meta::new();
        let mut populator = Populator::new(&empty, &templates, "dev", "us-east-1");
        let result = populator
            .populate(json!({"name": "list", "customName": "svc-${name}"}))
            .unwrap();
        assert_eq!(result["customName"], json!("svc-list"));

        let mut meta = meta();
        meta.set_global_variable("name", "from-store");
        meta.set_global_variable("eventName", "from-store");
        let mut populator = Populator::new(&meta, &templates, "dev", "us-east-1");
        let result = populator
            .populate(json!({"name": "list", "a": "${name}", "b": "${eventName}"}))
            .unwrap();
        assert_eq!(result["a"], json!("list"));
        assert_eq!(result["b"], json!("from-store"));
    }

    #[test]
    fn test_warning_log_keeps_node_and_order() {
        let log = WarningLog::new();
        log.record("api", &[]);
        log.record(
            "api/users",
            &[PopulateWarning::UndefinedTemplate {
                name: "t".to_string(),
            }],
        );
        let warnings = log.into_warnings();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].s_path, "api/users");
    }

    #[test]
    fn test_require_stage_and_region() {
        assert_eq!(
            PopulateOptions::default().require(),
            Err(PopulateError::MissingStageOrRegion)
        );
        let only_stage = PopulateOptions {
            stage: Some("dev".to_string()),
            region: None,
        };
        assert_eq!(only_stage.require(), Err(PopulateError::MissingStageOrRegion));
        assert_eq!(
            PopulateOptions::new("dev", "us-east-1").require(),
            Ok(("dev", "us-east-1"))
        );
    }
}
