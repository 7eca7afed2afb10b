// src/core/entity/mod.rs

//! # Entity tree
//!
//! A project is a tree of nodes: `Project → Component → Module → Function → {Endpoint, Event}`.
//! Every node carries a [`NodeConfig`] (its sPath parts, the sPath string and its directory), a data
//! record and, for containers, its children keyed by name.
//!
//! All nodes share the same lifecycle:
//!
//! - `load` reads the node's descriptor and recursively discovers its children on disk.
//! - `get` returns a deep copy of the data with children nested under their collection key.
//! - `get_populated` resolves templates and variables for a stage and region.
//! - `save` writes the descriptor (and optionally the whole subtree) back to disk.
//!
//! Project-wide state (the project root, the variable store and the node factory) travels in an
//! explicit [`ResolutionContext`] passed to each of these operations.

mod component;
mod endpoint;
mod event;
mod function;
mod module;
mod project;

pub use component::Component;
pub use endpoint::Endpoint;
pub use event::{Event, FunctionHandle};
pub use function::Function;
pub use module::Module;
pub use project::Project;

use crate::core::meta::{Meta, MetaError};
use crate::core::populator::{PopulateError, PopulateWarning, WarningLog};
use crate::core::repository::{Repository, RepositoryError};
use crate::core::spath::{self, EntityKind, PathError, SPathParts};
use crate::models;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised by entity operations.
#[derive(Error, Debug)]
pub enum EntityError {
    /// A node was constructed without one of the sPath parts its kind requires.
    #[error("Missing required config for {kind}: '{field}'.")]
    MissingRequiredConfig {
        /// Kind being constructed.
        kind: EntityKind,
        /// The missing part.
        field: &'static str,
    },
    /// A factory returned a node of another kind than the one requested.
    #[error("Expected a {expected} node but the factory produced a {found}.")]
    UnexpectedNodeKind {
        /// Kind requested.
        expected: EntityKind,
        /// Kind produced.
        found: EntityKind,
    },
    /// A descriptor parsed as JSON but not as a record of its kind.
    #[error("Invalid {kind} descriptor at '{s_path}': {source}")]
    InvalidDescriptor {
        /// Kind being loaded.
        kind: EntityKind,
        /// sPath of the node.
        s_path: String,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
    /// No node is addressed by the sPath.
    #[error("Nothing at '{0}' in the loaded project.")]
    NodeNotFound(String),
    /// Reading or writing the project directory failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    /// An sPath was rejected.
    #[error(transparent)]
    Path(#[from] PathError),
    /// Population failed.
    #[error(transparent)]
    Populate(#[from] PopulateError),
    /// The variable store failed.
    #[error(transparent)]
    Meta(#[from] MetaError),
}

impl EntityError {
    /// `true` when the error only means the node's descriptor is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Repository(RepositoryError::NotFound { .. }))
    }
}

pub(crate) type EntityResult<T> = Result<T, EntityError>;

// --- RESOLUTION CONTEXT ---

/// Project-wide state handed to every load, save and populate call.
#[derive(Clone, Copy)]
pub struct ResolutionContext<'a> {
    project_root: Option<&'a Path>,
    meta: &'a Meta,
    factory: &'a dyn NodeFactory,
    warnings: Option<&'a WarningLog>,
}

static DEFAULT_FACTORY: DefaultNodeFactory = DefaultNodeFactory;

impl<'a> ResolutionContext<'a> {
    /// A context using the default node factory.
    pub fn new(project_root: Option<&'a Path>, meta: &'a Meta) -> Self {
        Self {
            project_root,
            meta,
            factory: &DEFAULT_FACTORY,
            warnings: None,
        }
    }

    /// Replaces the factory used to create child nodes during `load`.
    pub fn with_factory(mut self, factory: &'a dyn NodeFactory) -> Self {
        self.factory = factory;
        self
    }

    /// Collects population warnings into `log` in addition to logging them.
    pub fn with_warning_log(mut self, log: &'a WarningLog) -> Self {
        self.warnings = Some(log);
        self
    }

    /// Hands the warnings raised while populating the node at `s_path` to the warning log, if any.
    pub(crate) fn report_warnings(&self, s_path: &str, warnings: &[PopulateWarning]) {
        if let Some(log) = self.warnings {
            log.record(s_path, warnings);
        }
    }

    /// The project root, if known.
    pub fn project_root(&self) -> Option<&'a Path> {
        self.project_root
    }

    /// The variable store.
    pub fn meta(&self) -> &'a Meta {
        self.meta
    }

    /// The node factory.
    pub fn factory(&self) -> &'a dyn NodeFactory {
        self.factory
    }

    /// Filesystem access, or [`RepositoryError::MissingProjectPath`] without a project root.
    pub fn repository(&self) -> Result<Repository, RepositoryError> {
        self.project_root
            .map(Repository::new)
            .ok_or(RepositoryError::MissingProjectPath)
    }
}

impl fmt::Debug for ResolutionContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolutionContext")
            .field("project_root", &self.project_root)
            .field("factory", &self.factory)
            .field("warnings", &self.warnings)
            .finish_non_exhaustive()
    }
}

/// Options for `save`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveOptions {
    /// Also save every descendant.
    pub deep: bool,
}

impl SaveOptions {
    /// Saves the node and its whole subtree.
    pub fn deep() -> Self {
        Self { deep: true }
    }
}

// --- NODE CONFIG ---

/// Where a node sits in the tree. The sPath and directory are always derived from the parts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeConfig {
    parts: SPathParts,
    s_path: String,
    full_path: Option<PathBuf>,
}

impl NodeConfig {
    /// A config for `parts`, resolving its directory when the project root is known.
    pub fn new(parts: SPathParts, project_root: Option<&Path>) -> Self {
        let mut config = Self {
            parts,
            ..Default::default()
        };
        config.recompute(project_root);
        config
    }

    /// Overlays the parts set in `partial` and recomputes the sPath and directory.
    ///
    /// Without a project root the directory is cleared rather than left pointing at the old location.
    pub fn update(&mut self, partial: &SPathParts, project_root: Option<&Path>) {
        self.parts.merge(partial);
        self.recompute(project_root);
    }

    fn recompute(&mut self, project_root: Option<&Path>) {
        self.s_path = spath::build(&self.parts);
        self.full_path = project_root.map(|root| spath::full_path(root, &self.s_path));
    }

    /// The sPath parts.
    pub fn parts(&self) -> &SPathParts {
        &self.parts
    }

    /// The sPath string.
    pub fn s_path(&self) -> &str {
        &self.s_path
    }

    /// The node's directory, if the project root was known.
    pub fn full_path(&self) -> Option<&Path> {
        self.full_path.as_deref()
    }

    pub(crate) fn require(&self, kind: EntityKind, field: &'static str) -> EntityResult<&str> {
        let value = match field {
            "component" => &self.parts.component,
            "module" => &self.parts.module,
            "function" => &self.parts.function,
            "endpointPath" => &self.parts.endpoint_path,
            "endpointMethod" => &self.parts.endpoint_method,
            "event" => &self.parts.event_name,
            _ => &None,
        };
        value
            .as_deref()
            .filter(|v| !v.is_empty())
            .ok_or(EntityError::MissingRequiredConfig { kind, field })
    }
}

// --- NODE FACTORY ---

/// Creates empty nodes of each kind. `load` asks the context's factory for every child it discovers,
/// so a custom factory can substitute its own defaults.
pub trait NodeFactory: Send + Sync + fmt::Debug {
    /// Creates a node of `kind` at `parts`, filled with default data.
    fn create(
        &self,
        kind: EntityKind,
        parts: &SPathParts,
        project_root: Option<&Path>,
    ) -> EntityResult<EntityNode>;
}

/// The factory that builds nodes with the provider defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultNodeFactory;

impl NodeFactory for DefaultNodeFactory {
    fn create(
        &self,
        kind: EntityKind,
        parts: &SPathParts,
        project_root: Option<&Path>,
    ) -> EntityResult<EntityNode> {
        let parts = parts.clone();
        Ok(match kind {
            EntityKind::Project => EntityNode::Project(Project::new(project_root)),
            EntityKind::Component => EntityNode::Component(Component::new(parts, project_root)?),
            EntityKind::Module => EntityNode::Module(Module::new(parts, project_root)?),
            EntityKind::Function => EntityNode::Function(Function::new(parts, project_root)?),
            EntityKind::Endpoint => EntityNode::Endpoint(Endpoint::new(parts, project_root)?),
            EntityKind::Event => EntityNode::Event(Event::new(parts, project_root)?),
        })
    }
}

// --- NODES ---

/// Any node of the tree, owned.
#[derive(Debug, Clone)]
#[allow(missing_docs)]
pub enum EntityNode {
    Project(Project),
    Component(Component),
    Module(Module),
    Function(Function),
    Endpoint(Endpoint),
    Event(Event),
}

impl EntityNode {
    /// The node's kind.
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Project(_) => EntityKind::Project,
            Self::Component(_) => EntityKind::Component,
            Self::Module(_) => EntityKind::Module,
            Self::Function(_) => EntityKind::Function,
            Self::Endpoint(_) => EntityKind::Endpoint,
            Self::Event(_) => EntityKind::Event,
        }
    }

    /// Deep copy of the node's data with its children nested.
    pub fn get(&self) -> EntityResult<Value> {
        self.as_ref().get()
    }

    /// Borrows the node.
    pub fn as_ref(&self) -> EntityRef<'_> {
        match self {
            Self::Project(n) => EntityRef::Project(n),
            Self::Component(n) => EntityRef::Component(n),
            Self::Module(n) => EntityRef::Module(n),
            Self::Function(n) => EntityRef::Function(n),
            Self::Endpoint(n) => EntityRef::Endpoint(n),
            Self::Event(n) => EntityRef::Event(n),
        }
    }

    fn unexpected(self, expected: EntityKind) -> EntityError {
        EntityError::UnexpectedNodeKind {
            expected,
            found: self.kind(),
        }
    }

    /// Unwraps a project node.
    pub fn into_project(self) -> EntityResult<Project> {
        match self {
            Self::Project(n) => Ok(n),
            other => Err(other.unexpected(EntityKind::Project)),
        }
    }

    /// Unwraps a component node.
    pub fn into_component(self) -> EntityResult<Component> {
        match self {
            Self::Component(n) => Ok(n),
            other => Err(other.unexpected(EntityKind::Component)),
        }
    }

    /// Unwraps a module node.
    pub fn into_module(self) -> EntityResult<Module> {
        match self {
            Self::Module(n) => Ok(n),
            other => Err(other.unexpected(EntityKind::Module)),
        }
    }

    /// Unwraps a function node.
    pub fn into_function(self) -> EntityResult<Function> {
        match self {
            Self::Function(n) => Ok(n),
            other => Err(other.unexpected(EntityKind::Function)),
        }
    }

    /// Unwraps a endpoint node.
    pub fn into_endpoint(self) -> EntityResult<Endpoint> {
        match self {
            Self::Endpoint(n) => Ok(n),
            other => Err(other.unexpected(EntityKind::Endpoint)),
        }
    }

    /// Unwraps a event node.
    pub fn into_event(self) -> EntityResult<Event> {
        match self {
            Self::Event(n) => Ok(n),
            other => Err(other.unexpected(EntityKind::Event)),
        }
    }
}

/// Any node of the tree, borrowed. Returned by [`Project::find`].
#[derive(Debug, Clone, Copy)]
#[allow(missing_docs)]
pub enum EntityRef<'a> {
    Project(&'a Project),
    Component(&'a Component),
    Module(&'a Module),
    Function(&'a Function),
    Endpoint(&'a Endpoint),
    Event(&'a Event),
}

impl<'a> EntityRef<'a> {
    /// The node's kind.
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Project(_) => EntityKind::Project,
            Self::Component(_) => EntityKind::Component,
            Self::Module(_) => EntityKind::Module,
            Self::Function(_) => EntityKind::Function,
            Self::Endpoint(_) => EntityKind::Endpoint,
            Self::Event(_) => EntityKind::Event,
        }
    }

    /// The node's sPath (empty for the project).
    pub fn s_path(&self) -> &'a str {
        match self {
            Self::Project(_) => "",
            Self::Component(n) => n.s_path(),
            Self::Module(n) => n.s_path(),
            Self::Function(n) => n.s_path(),
            Self::Endpoint(n) => n.s_path(),
            Self::Event(n) => n.s_path(),
        }
    }

    /// Deep copy of the node's data with its children nested.
    pub fn get(&self) -> EntityResult<Value> {
        match self {
            Self::Project(n) => n.get(),
            Self::Component(n) => n.get(),
            Self::Module(n) => n.get(),
            Self::Function(n) => n.get(),
            Self::Endpoint(n) => n.get(),
            Self::Event(n) => n.get(),
        }
    }
}

// --- SHARED HELPERS ---

/// Serializes a data record, dropping `_`-prefixed keys.
pub(crate) fn record_value<T: Serialize>(data: &T) -> EntityResult<Value> {
    let mut value = serde_json::to_value(data).map_err(RepositoryError::JsonSerialize)?;
    models::strip_private_keys(&mut value);
    Ok(value)
}

/// Inserts `children` under `key` in a serialized record.
pub(crate) fn nest(record: &mut Value, key: &str, children: Value) {
    if let Value::Object(map) = record {
        map.insert(key.to_string(), children);
    }
}

/// Loads a child through the context's factory. `Ok(None)` means the directory carried no descriptor.
pub(crate) fn load_child<T>(
    ctx: &ResolutionContext<'_>,
    kind: EntityKind,
    parts: &SPathParts,
    convert: impl FnOnce(EntityNode) -> EntityResult<T>,
    load: impl FnOnce(&mut T, &ResolutionContext<'_>) -> EntityResult<()>,
) -> EntityResult<Option<T>> {
    let node = ctx.factory().create(kind, parts, ctx.project_root())?;
    let mut child = convert(node)?;
    match load(&mut child, ctx) {
        Ok(()) => Ok(Some(child)),
        Err(e) if e.is_not_found() => {
            log::debug!("Skipping '{}': {}", spath::build(parts), e);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::core::meta::Meta;
    use serde_json::Value;
    use std::fs;
    use std::path::Path;

    /// Writes `value` as JSON at `root/rel`, creating directories.
    pub fn write(root: &Path, rel: &str, value: Value) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, serde_json::to_string_pretty(&value).unwrap()).unwrap();
    }

    /// A store defining the variables the default project template refers to.
    pub fn dev_meta() -> Meta {
        let mut meta = Meta::new();
        meta.set_global_variable("project", "demo");
        meta.set_stage_variable("dev", "stage", "dev");
        meta.set_region_variable("dev", "us-east-1", "region", "us-east-1");
        meta
    }
}
