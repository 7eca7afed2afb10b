// src/core/spath.rs

//! # sPath addressing
//!
//! Every node of a project tree is named by a single string, its *sPath*:
//!
//! ```text
//! component[/module[/function[@endpointPath[~method]]]]
//! component/module/function#eventName
//! ```
//!
//! The hierarchy is separated by `/`, an endpoint path is introduced by `@`, its HTTP method by `~`
//! and an event name by `#`. Endpoint paths may contain `/` themselves, so the endpoint and event
//! suffixes are split off before the hierarchy is.

use crate::constants::FUNCTION_DESCRIPTOR_FILENAME;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

const HIERARCHY_SEPARATOR: char = '/';
const ENDPOINT_PATH_SEPARATOR: char = '@';
const ENDPOINT_METHOD_SEPARATOR: char = '~';
const EVENT_SEPARATOR: char = '#';

/// The closed set of node kinds in a project tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// The root of the tree.
    Project,
    /// `component`
    Component,
    /// `component/module`
    Module,
    /// `component/module/function`
    Function,
    /// `component/module/function@path~method`
    Endpoint,
    /// `component/module/function#name`
    Event,
}

impl EntityKind {
    /// Lower-case name used in messages and on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Component => "component",
            Self::Module => "module",
            Self::Function => "function",
            Self::Endpoint => "endpoint",
            Self::Event => "event",
        }
    }

    /// Parses a kind from its lower-case name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "project" => Some(Self::Project),
            "component" => Some(Self::Component),
            "module" => Some(Self::Module),
            "function" => Some(Self::Function),
            "endpoint" => Some(Self::Endpoint),
            "event" => Some(Self::Event),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while validating an sPath.
#[derive(Error, Debug)]
pub enum PathError {
    /// The string does not follow the grammar expected for its kind.
    #[error("Invalid {kind} path '{s_path}': {reason}")]
    InvalidPath {
        /// The offending sPath.
        s_path: String,
        /// The kind it was validated against.
        kind: EntityKind,
        /// Which rule was broken.
        reason: String,
    },
    /// The sPath is well formed but names nothing on disk.
    #[error("Path '{s_path}' does not exist in the project (expected '{expected}').")]
    PathNotFound {
        /// The sPath that was looked up.
        s_path: String,
        /// The descriptor file that was probed.
        expected: PathBuf,
    },
}

/// The individual parts of an sPath. Absent parts are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SPathParts {
    /// First hierarchy segment.
    pub component: Option<String>,
    /// Second hierarchy segment.
    pub module: Option<String>,
    /// Third hierarchy segment.
    pub function: Option<String>,
    /// Text after `@`.
    pub endpoint_path: Option<String>,
    /// Text after `~`.
    pub endpoint_method: Option<String>,
    /// Text after `#`.
    pub event_name: Option<String>,
}

impl SPathParts {
    /// Parts addressing a component.
    pub fn component(component: &str) -> Self {
        Self {
            component: Some(component.to_string()),
            ..Default::default()
        }
    }

    /// Parts addressing a module.
    pub fn module(component: &str, module: &str) -> Self {
        Self {
            module: Some(module.to_string()),
            ..Self::component(component)
        }
    }

    /// Parts addressing a function.
    pub fn function(component: &str, module: &str, function: &str) -> Self {
        Self {
            function: Some(function.to_string()),
            ..Self::module(component, module)
        }
    }

    /// Overlays every part set in `other` on top of `self`.
    pub fn merge(&mut self, other: &Self) {
        fn overlay(target: &mut Option<String>, source: &Option<String>) {
            if source.is_some() {
                target.clone_from(source);
            }
        }
        overlay(&mut self.component, &other.component);
        overlay(&mut self.module, &other.module);
        overlay(&mut self.function, &other.function);
        overlay(&mut self.endpoint_path, &other.endpoint_path);
        overlay(&mut self.endpoint_method, &other.endpoint_method);
        overlay(&mut self.event_name, &other.event_name);
    }

    /// The hierarchy segments that are present, in order.
    pub fn hierarchy(&self) -> Vec<&str> {
        [&self.component, &self.module, &self.function]
            .into_iter()
            .map_while(|part| part.as_deref())
            .collect()
    }
}

/// Builds an sPath from its parts. Absent parts are omitted; never fails.
pub fn build(parts: &SPathParts) -> String {
    let mut s_path = String::new();

    for segment in [&parts.component, &parts.module, &parts.function]
        .into_iter()
        .flatten()
    {
        if !s_path.is_empty() {
            s_path.push(HIERARCHY_SEPARATOR);
        }
        s_path.push_str(segment);
    }
    if let Some(path) = &parts.endpoint_path {
        s_path.push(ENDPOINT_PATH_SEPARATOR);
        s_path.push_str(path);
    }
    if let Some(method) = &parts.endpoint_method {
        s_path.push(ENDPOINT_METHOD_SEPARATOR);
        s_path.push_str(method);
    }
    if let Some(event) = &parts.event_name {
        s_path.push(EVENT_SEPARATOR);
        s_path.push_str(event);
    }

    s_path
}

/// Splits an sPath back into its parts. Parts that are missing or empty come back as `None`.
pub fn parse(s_path: &str) -> SPathParts {
    fn non_empty(s: &str) -> Option<String> {
        (!s.is_empty()).then(|| s.to_string())
    }

    let (rest, event_name) = match s_path.split_once(EVENT_SEPARATOR) {
        Some((head, event)) => (head, non_empty(event)),
        None => (s_path, None),
    };
    let (rest, endpoint_method) = match rest.split_once(ENDPOINT_METHOD_SEPARATOR) {
        Some((head, method)) => (head, non_empty(method)),
        None => (rest, None),
    };
    let (hierarchy, endpoint_path) = match rest.split_once(ENDPOINT_PATH_SEPARATOR) {
        Some((head, path)) => (head, non_empty(path)),
        None => (rest, None),
    };

    let mut segments = hierarchy.splitn(3, HIERARCHY_SEPARATOR);
    SPathParts {
        component: segments.next().and_then(non_empty),
        module: segments.next().and_then(non_empty),
        function: segments.next().and_then(non_empty),
        endpoint_path,
        endpoint_method,
        event_name,
    }
}

/// Validates `s_path` against the grammar of `kind`, returning its parts.
///
/// Function paths are additionally checked for existence: the function's descriptor must be present
/// under `project_root`.
pub fn validate(project_root: &Path, s_path: &str, kind: EntityKind) -> Result<SPathParts, PathError> {
    let invalid = |reason: &str| PathError::InvalidPath {
        s_path: s_path.to_string(),
        kind,
        reason: reason.to_string(),
    };

    if s_path.trim().is_empty() {
        return Err(invalid("path is empty"));
    }

    let has_endpoint_path = s_path.contains(ENDPOINT_PATH_SEPARATOR);
    let has_endpoint_method = s_path.contains(ENDPOINT_METHOD_SEPARATOR);
    let has_event = s_path.contains(EVENT_SEPARATOR);
    let has_suffix = has_endpoint_path || has_endpoint_method || has_event;
    let segment_count = hierarchy_part(s_path).split(HIERARCHY_SEPARATOR).count();

    match kind {
        EntityKind::Project => return Err(invalid("the project root has no sPath")),
        EntityKind::Component => {
            if segment_count != 1 || has_suffix {
                return Err(invalid("expected a single segment"));
            }
        }
        EntityKind::Module => {
            if segment_count != 2 {
                return Err(invalid("expected exactly two '/'-separated segments"));
            }
            if has_suffix {
                return Err(invalid("module paths cannot contain '@', '~' or '#'"));
            }
        }
        EntityKind::Function => {
            if segment_count != 3 || has_suffix {
                return Err(invalid("expected 'component/module/function'"));
            }
            let expected = project_root
                .join(relative_dir(s_path))
                .join(FUNCTION_DESCRIPTOR_FILENAME);
            if !expected.is_file() {
                return Err(PathError::PathNotFound {
                    s_path: s_path.to_string(),
                    expected,
                });
            }
        }
        EntityKind::Endpoint => {
            if !(has_endpoint_path && has_endpoint_method) {
                return Err(invalid("endpoint paths need both '@path' and '~method'"));
            }
            let at = s_path.find(ENDPOINT_PATH_SEPARATOR);
            let tilde = s_path.find(ENDPOINT_METHOD_SEPARATOR);
            if at > tilde {
                return Err(invalid("'@path' must come before '~method'"));
            }
        }
        EntityKind::Event => {
            if !has_event || has_endpoint_path || has_endpoint_method {
                return Err(invalid("event paths look like 'component/module/function#name'"));
            }
            if segment_count != 3 {
                return Err(invalid("events must belong to a function"));
            }
        }
    }

    Ok(parse(s_path))
}

/// The hierarchy portion of an sPath (everything before `@`, `~` or `#`).
pub fn hierarchy_part(s_path: &str) -> &str {
    s_path
        .split([ENDPOINT_PATH_SEPARATOR, ENDPOINT_METHOD_SEPARATOR, EVENT_SEPARATOR])
        .next()
        .unwrap_or(s_path)
}

/// The directory of an entity relative to the project root.
pub fn relative_dir(s_path: &str) -> PathBuf {
    hierarchy_part(s_path)
        .split(HIERARCHY_SEPARATOR)
        .filter(|segment| !segment.is_empty())
        .collect()
}

/// The directory of an entity on disk. Pure function of the root and the sPath.
pub fn full_path(project_root: &Path, s_path: &str) -> PathBuf {
    project_root.join(relative_dir(s_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn endpoint_parts() -> SPathParts {
        SPathParts {
            endpoint_path: Some("users/list".to_string()),
            endpoint_method: Some("GET".to_string()),
            ..SPathParts::function("api", "users", "list")
        }
    }

    #[test]
    fn test_build_joins_present_parts() {
        assert_eq!(build(&SPathParts::component("api")), "api");
        assert_eq!(build(&SPathParts::module("api", "users")), "api/users");
        assert_eq!(build(&endpoint_parts()), "api/users/list@users/list~GET");
        assert_eq!(build(&SPathParts::default()), "");
    }

    #[test]
    fn test_parse_is_inverse_of_build() {
        let cases = [
            SPathParts::component("api"),
            SPathParts::module("api", "users"),
            SPathParts::function("api", "users", "list"),
            endpoint_parts(),
            SPathParts {
                event_name: Some("nightly".to_string()),
                ..SPathParts::function("api", "jobs", "cleanup")
            },
        ];
        for parts in cases {
            assert_eq!(parse(&build(&parts)), parts);
        }
    }

    #[test]
    fn test_parse_leaves_absent_parts_empty() {
        let parts = parse("api/users");
        assert_eq!(parts.function, None);
        assert_eq!(parts.endpoint_path, None);
        assert_eq!(parts.endpoint_method, None);
        assert_eq!(parts.event_name, None);
    }

    #[test]
    fn test_merge_overlays_only_set_parts() {
        let mut parts = SPathParts::function("api", "users", "list");
        parts.merge(&SPathParts {
            module: Some("accounts".to_string()),
            ..Default::default()
        });
        assert_eq!(build(&parts), "api/accounts/list");
    }

    #[test]
    fn test_validate_module_rejects_third_segment() {
        let root = Path::new("/nonexistent");
        assert!(validate(root, "api/users", EntityKind::Module).is_ok());
        let err = validate(root, "api/users/list", EntityKind::Module).unwrap_err();
        assert!(matches!(err, PathError::InvalidPath { .. }));
        let err = validate(root, "api/users@x~GET", EntityKind::Module).unwrap_err();
        assert!(matches!(err, PathError::InvalidPath { .. }));
    }

    #[test]
    fn test_validate_function_checks_filesystem() {
        let dir = tempdir().unwrap();
        let err = validate(dir.path(), "api/users/list", EntityKind::Function).unwrap_err();
        assert!(matches!(err, PathError::PathNotFound { .. }));

        let fn_dir = dir.path().join("api").join("users").join("list");
        fs::create_dir_all(&fn_dir).unwrap();
        fs::write(fn_dir.join(FUNCTION_DESCRIPTOR_FILENAME), "{}").unwrap();
        let parts = validate(dir.path(), "api/users/list", EntityKind::Function).unwrap();
        assert_eq!(parts.function.as_deref(), Some("list"));
    }

    #[test]
    fn test_validate_endpoint_requires_both_markers() {
        let root = Path::new("/nonexistent");
        assert!(validate(root, "api/users/list@users~GET", EntityKind::Endpoint).is_ok());
        assert!(validate(root, "api/users/list@users", EntityKind::Endpoint).is_err());
        assert!(validate(root, "api/users/list~GET", EntityKind::Endpoint).is_err());
    }

    #[test]
    fn test_full_path_ignores_suffixes() {
        let root = Path::new("/project");
        assert_eq!(
            full_path(root, "api/users/list@users/list~GET"),
            Path::new("/project/api/users/list")
        );
        assert_eq!(
            full_path(root, "api/users/list#nightly"),
            Path::new("/project/api/users/list")
        );
    }
}
