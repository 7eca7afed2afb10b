// src/core/entity/project.rs

use super::{
    Component, EntityError, EntityNode, EntityRef, EntityResult, Function, Module, NodeConfig,
    ResolutionContext, SaveOptions, load_child, nest, record_value,
};
use crate::core::aggregator::{self, ResourceTemplate};
use crate::core::populator::{PopulateOptions, Populator};
use crate::core::spath::{self, EntityKind, SPathParts};
use crate::core::templates::Templates;
use crate::models::{self, Attributes, ProjectData};
use indexmap::IndexMap;
use rayon::prelude::*;
use serde_json::{Map, Value};
use std::path::Path;

const DEFAULT_PROJECT_NAME: &str = "project";

/// The root of the tree, backed by `s-project.json` at the project root.
#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    config: NodeConfig,
    data: ProjectData,
    templates: Templates,
    components: IndexMap<String, Component>,
}

impl Project {
    /// Creates a project with default data, named after its root directory when one is given.
    pub fn new(project_root: Option<&Path>) -> Self {
        let name = project_root
            .and_then(Path::file_name)
            .and_then(|name| name.to_str())
            .unwrap_or(DEFAULT_PROJECT_NAME);
        Self {
            config: NodeConfig::new(SPathParts::default(), project_root),
            data: ProjectData::with_defaults(name),
            templates: Templates::new(),
            components: IndexMap::new(),
        }
    }

    /// Creates a project and loads it, with its whole tree, from the context's root.
    pub fn open(ctx: &ResolutionContext<'_>) -> EntityResult<Self> {
        let mut project = ctx
            .factory()
            .create(EntityKind::Project, &SPathParts::default(), ctx.project_root())?
            .into_project()?;
        project.load(ctx)?;
        Ok(project)
    }

    /// Where the project sits on disk.
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// The project name.
    pub fn name(&self) -> &str {
        &self.data.name
    }

    /// The data record.
    pub fn data(&self) -> &ProjectData {
        &self.data
    }

    /// Mutable access to the non-identifying attributes.
    pub fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.data.attributes
    }

    /// The project's own templates.
    pub fn templates(&self) -> &Templates {
        &self.templates
    }

    /// Replaces the project's own templates.
    pub fn set_templates(&mut self, templates: Templates) {
        self.templates = templates;
    }

    /// The templates of every component, keyed by component name (each one keyed by module).
    pub fn get_templates(&self) -> Value {
        Value::Object(
            self.components
                .iter()
                .map(|(name, component)| (name.clone(), component.get_templates()))
                .collect(),
        )
    }

    /// Components keyed by name.
    pub fn components(&self) -> &IndexMap<String, Component> {
        &self.components
    }

    /// The component named `name`.
    pub fn component(&self, name: &str) -> Option<&Component> {
        self.components.get(name)
    }

    /// Mutable access to the component named `name`.
    pub fn component_mut(&mut self, name: &str) -> Option<&mut Component> {
        self.components.get_mut(name)
    }

    /// Adds or replaces a component, keyed by its name.
    pub fn set_component(&mut self, component: Component) {
        self.components.insert(component.name().to_string(), component);
    }

    /// Removes the component named `name`.
    pub fn remove_component(&mut self, name: &str) -> Option<Component> {
        self.components.shift_remove(name)
    }

    /// Re-roots the project and every descendant at `project_root`.
    pub fn update_config(&mut self, project_root: Option<&Path>) {
        self.config.update(&SPathParts::default(), project_root);
        for component in self.components.values_mut() {
            component.update_config(&SPathParts::default(), project_root);
        }
    }

    fn component_at(&self, segment: Option<&str>) -> Option<&Component> {
        let segment = segment?;
        self.components
            .values()
            .find(|c| c.config().parts().component.as_deref() == Some(segment))
    }

    /// Resolves an sPath to the node it addresses. The empty path is the project itself.
    pub fn find(&self, s_path: &str) -> Option<EntityRef<'_>> {
        if s_path.is_empty() {
            return Some(EntityRef::Project(self));
        }
        let parts = spath::parse(s_path);
        let component = self.component_at(parts.component.as_deref())?;
        let Some(module_name) = parts.module.as_deref() else {
            return Some(EntityRef::Component(component));
        };
        let module = module_at(component, module_name)?;
        let Some(function_name) = parts.function.as_deref() else {
            return Some(EntityRef::Module(module));
        };
        let function = function_at(module, function_name)?;

        if let Some(event) = parts.event_name.as_deref() {
            return function.event(event).map(EntityRef::Event);
        }
        match (parts.endpoint_path.as_deref(), parts.endpoint_method.as_deref()) {
            (Some(path), Some(method)) => function.endpoint(path, method).map(EntityRef::Endpoint),
            (None, None) => Some(EntityRef::Function(function)),
            _ => None,
        }
    }

    /// The function at `s_path` (`component/module/function`).
    pub fn function(&self, s_path: &str) -> Option<&Function> {
        match self.find(s_path)? {
            EntityRef::Function(function) => Some(function),
            _ => None,
        }
    }

    /// Reads `s-project.json`, the optional templates file, then every component directory.
    pub fn load(&mut self, ctx: &ResolutionContext<'_>) -> EntityResult<()> {
        let repo = ctx.repository()?;
        self.config.update(&SPathParts::default(), ctx.project_root());
        let raw: Map<String, Value> = repo.read_descriptor(EntityKind::Project, "")?;
        let data: ProjectData = serde_json::from_value(Value::Object(raw)).map_err(|source| {
            EntityError::InvalidDescriptor {
                kind: EntityKind::Project,
                s_path: String::new(),
                source,
            }
        })?;
        if !data.name.is_empty() {
            self.data.name = data.name;
        }
        models::assign(&mut self.data.attributes, data.attributes);
        self.data.attributes.shift_remove("components");
        self.templates = repo.read_templates("")?;

        self.components.clear();
        for dir in repo.list_child_dirs("")? {
            let parts = SPathParts::component(&dir);
            if let Some(component) = load_child(
                ctx,
                EntityKind::Component,
                &parts,
                EntityNode::into_component,
                Component::load,
            )? {
                self.set_component(component);
            }
        }

        log::info!(
            "Loaded project '{}' from '{}' ({} component(s))",
            self.data.name,
            repo.root().display(),
            self.components.len()
        );
        Ok(())
    }

    /// Deep copy of the project's data with its components nested under `components`.
    pub fn get(&self) -> EntityResult<Value> {
        let mut record = record_value(&self.data)?;
        let mut components = Map::new();
        for (name, component) in &self.components {
            components.insert(name.clone(), component.get()?);
        }
        nest(&mut record, "components", Value::Object(components));
        Ok(record)
    }

    /// The whole tree populated for a stage and region.
    pub fn get_populated(
        &self,
        ctx: &ResolutionContext<'_>,
        options: &PopulateOptions,
    ) -> EntityResult<Value> {
        let (stage, region) = options.require()?;
        ctx.repository()?;
        let scope = &self.templates;
        let mut populator = Populator::new(ctx.meta(), scope, stage, region);
        let mut record = populator.populate(record_value(&self.data)?)?;
        ctx.report_warnings("", populator.warnings());

        let components = self
            .components
            .par_iter()
            .map(|(name, component)| {
                component
                    .get_populated(ctx, options, scope)
                    .map(|value| (name.clone(), value))
            })
            .collect::<EntityResult<Vec<_>>>()?;
        nest(&mut record, "components", Value::Object(components.into_iter().collect()));
        Ok(record)
    }

    /// The subtree at `s_path` populated for a stage and region, with the template scope of all
    /// its ancestors applied.
    pub fn get_populated_at(
        &self,
        ctx: &ResolutionContext<'_>,
        options: &PopulateOptions,
        s_path: &str,
    ) -> EntityResult<Value> {
        if s_path.is_empty() {
            return self.get_populated(ctx, options);
        }
        let not_found = || EntityError::NodeNotFound(s_path.to_string());
        let parts = spath::parse(s_path);

        let component = self.component_at(parts.component.as_deref()).ok_or_else(not_found)?;
        let Some(module_name) = parts.module.as_deref() else {
            return component.get_populated(ctx, options, &self.templates);
        };
        let scope = Templates::merged([&self.templates, component.templates()]);
        let module = module_at(component, module_name).ok_or_else(not_found)?;
        let Some(function_name) = parts.function.as_deref() else {
            return module.get_populated(ctx, options, &scope);
        };
        let scope = Templates::merged([&scope, module.get_templates()]);
        let function = function_at(module, function_name).ok_or_else(not_found)?;

        match self.find(s_path).ok_or_else(not_found)? {
            EntityRef::Function(_) => function.get_populated(ctx, options, &scope),
            EntityRef::Endpoint(endpoint) => {
                let scope = Templates::merged([&scope, function.get_templates()]);
                endpoint.get_populated(ctx, options, &scope)
            }
            EntityRef::Event(event) => {
                let scope = Templates::merged([&scope, function.get_templates()]);
                event.get_populated(ctx, options, &scope)
            }
            _ => Err(not_found()),
        }
    }

    /// The deployable CloudFormation template for a stage and region.
    pub fn get_resources(
        &self,
        ctx: &ResolutionContext<'_>,
        options: &PopulateOptions,
    ) -> EntityResult<ResourceTemplate> {
        let populated = self.get_populated(ctx, options)?;
        Ok(aggregator::aggregate(&populated))
    }

    /// Writes `s-project.json` and the templates file; with `deep`, the whole tree as well.
    pub fn save(&self, ctx: &ResolutionContext<'_>, options: SaveOptions) -> EntityResult<()> {
        let repo = ctx.repository()?;
        repo.write_descriptor(EntityKind::Project, "", &record_value(&self.data)?)?;
        repo.write_templates("", &self.templates)?;
        if options.deep {
            for component in self.components.values() {
                component.save(ctx, options)?;
            }
        }
        Ok(())
    }
}

fn module_at<'a>(component: &'a Component, segment: &str) -> Option<&'a Module> {
    component
        .modules()
        .values()
        .find(|m| m.config().parts().module.as_deref() == Some(segment))
}

fn function_at<'a>(module: &'a Module, segment: &str) -> Option<&'a Function> {
    module
        .functions()
        .values()
        .find(|f| f.config().parts().function.as_deref() == Some(segment))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::entity::test_support::{dev_meta, write};
    use crate::core::entity::{DefaultNodeFactory, Endpoint, Event, NodeFactory};
    use crate::core::meta::Meta;
    use crate::core::populator::{NodeWarning, PopulateError, PopulateWarning, WarningLog};
    use crate::core::repository::RepositoryError;
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    /// api/users/{list,create} with templates at every level.
    fn sample_tree(root: &Path) -> Project {
        let mut project = Project::new(Some(root));
        let mut project_templates = Templates::new();
        project_templates.insert("bar", json!("project"));
        project.set_templates(project_templates);

        let mut component = Component::new(SPathParts::component("api"), Some(root)).unwrap();
        let mut component_templates = Templates::new();
        component_templates.insert("bar", json!("component"));
        component.set_templates(component_templates);

        let mut module = Module::new(SPathParts::module("api", "users"), Some(root)).unwrap();
        for name in ["list", "create"] {
            let mut function =
                Function::new(SPathParts::function("api", "users", name), Some(root)).unwrap();
            function
                .attributes_mut()
                .insert("custom".into(), json!({"bar": "$${bar}", "stage": "${stage}"}));
            let mut event = Event::new(
                SPathParts {
                    event_name: Some("nightly".into()),
                    ..SPathParts::function("api", "users", name)
                },
                Some(root),
            )
            .unwrap();
            event
                .attributes_mut()
                .insert("config".into(), json!({"schedule": "${schedule}"}));
            function.set_event(event);
            module.set_function(function);
        }
        if let Some(list) = module.function_mut("list") {
            let mut own = Templates::new();
            own.insert("bar", json!("function"));
            list.set_templates(own);
        }
        component.set_module(module);
        project.set_component(component);
        project
    }

    fn populate_meta() -> Meta {
        let mut meta = dev_meta();
        meta.set_stage_variable("dev", "schedule", "rate(1 hour)");
        meta
    }

    #[test]
    fn test_deep_save_then_load_round_trip() {
        let dir = tempdir().unwrap();
        let meta = Meta::new();
        let ctx = ResolutionContext::new(Some(dir.path()), &meta);
        let project = sample_tree(dir.path());
        project.save(&ctx, SaveOptions::deep()).unwrap();

        assert!(dir.path().join("s-project.json").is_file());
        assert!(dir.path().join("api/s-component.json").is_file());
        assert!(dir.path().join("api/users/s-module.json").is_file());
        assert!(dir.path().join("api/users/list/s-function.json").is_file());
        assert!(dir.path().join("api/users/list/s-templates.json").is_file());
        assert!(!dir.path().join("api/users/create/s-templates.json").exists());

        let loaded = Project::open(&ctx).unwrap();
        assert_eq!(loaded.get().unwrap(), project.get().unwrap());
        assert_eq!(loaded.get_templates(), project.get_templates());
    }

    #[test]
    fn test_save_is_idempotent() {
        let dir = tempdir().unwrap();
        let meta = Meta::new();
        let ctx = ResolutionContext::new(Some(dir.path()), &meta);
        let project = sample_tree(dir.path());
        let descriptor = dir.path().join("api/users/list/s-function.json");

        project.save(&ctx, SaveOptions::deep()).unwrap();
        let first = fs::read(&descriptor).unwrap();
        project.save(&ctx, SaveOptions::deep()).unwrap();
        assert_eq!(fs::read(&descriptor).unwrap(), first);
    }

    #[test]
    fn test_shallow_save_writes_only_own_descriptor() {
        let dir = tempdir().unwrap();
        let meta = Meta::new();
        let ctx = ResolutionContext::new(Some(dir.path()), &meta);
        sample_tree(dir.path()).save(&ctx, SaveOptions::default()).unwrap();

        assert!(dir.path().join("s-project.json").is_file());
        assert!(!dir.path().join("api").exists());
        let saved: Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("s-project.json")).unwrap())
                .unwrap();
        assert!(saved.get("components").is_none());
    }

    #[test]
    fn test_load_skips_directories_without_descriptor() {
        let dir = tempdir().unwrap();
        write(dir.path(), "s-project.json", json!({"name": "demo"}));
        write(dir.path(), "api/s-component.json", json!({"name": "api"}));
        fs::create_dir_all(dir.path().join("node_modules/lodash")).unwrap();
        fs::create_dir_all(dir.path().join("api/lib")).unwrap();
        let meta = Meta::new();
        let ctx = ResolutionContext::new(Some(dir.path()), &meta);

        let project = Project::open(&ctx).unwrap();

        assert_eq!(project.name(), "demo");
        assert_eq!(project.components().keys().collect::<Vec<_>>(), vec!["api"]);
        assert!(project.component("api").unwrap().modules().is_empty());
    }

    #[test]
    fn test_load_without_root_or_descriptor_fails() {
        let meta = Meta::new();
        let ctx = ResolutionContext::new(None, &meta);
        assert!(matches!(
            Project::new(None).load(&ctx),
            Err(EntityError::Repository(RepositoryError::MissingProjectPath))
        ));

        let dir = tempdir().unwrap();
        let ctx = ResolutionContext::new(Some(dir.path()), &meta);
        let err = Project::open(&ctx).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_function_templates_win_over_component() {
        let dir = tempdir().unwrap();
        let meta = populate_meta();
        let ctx = ResolutionContext::new(Some(dir.path()), &meta);
        let project = sample_tree(dir.path());
        let options = PopulateOptions::new("dev", "us-east-1");

        let populated = project.get_populated(&ctx, &options).unwrap();
        let functions = &populated["components"]["api"]["modules"]["users"]["functions"];

        assert_eq!(functions["list"]["custom"], json!({"bar": "function", "stage": "dev"}));
        assert_eq!(functions["create"]["custom"], json!({"bar": "component", "stage": "dev"}));
        assert_eq!(
            functions["list"]["events"][0]["config"],
            json!({"schedule": "rate(1 hour)"})
        );
        assert_eq!(
            populated["cloudFormation"]["Resources"]["IamPolicyLambda"]["Properties"]["PolicyName"],
            json!("dev-demo-lambda")
        );
    }

    #[test]
    fn test_get_populated_at_applies_ancestor_scope() {
        let dir = tempdir().unwrap();
        let meta = populate_meta();
        let ctx = ResolutionContext::new(Some(dir.path()), &meta);
        let project = sample_tree(dir.path());
        let options = PopulateOptions::new("dev", "us-east-1");

        let create = project
            .get_populated_at(&ctx, &options, "api/users/create")
            .unwrap();
        assert_eq!(create["custom"]["bar"], json!("component"));

        let event = project
            .get_populated_at(&ctx, &options, "api/users/list#nightly")
            .unwrap();
        assert_eq!(event["config"]["schedule"], json!("rate(1 hour)"));

        assert!(matches!(
            project.get_populated_at(&ctx, &options, "api/users/missing"),
            Err(EntityError::NodeNotFound(_))
        ));
    }

    #[test]
    fn test_get_populated_reports_warnings_per_node() {
        let dir = tempdir().unwrap();
        let meta = populate_meta();
        let mut project = sample_tree(dir.path());
        if let Some(create) = project
            .component_mut("api")
            .and_then(|c| c.module_mut("users"))
            .and_then(|m| m.function_mut("create"))
        {
            create
                .attributes_mut()
                .insert("role".into(), json!("$${undefinedRole}"));
        }

        let log = WarningLog::new();
        let ctx = ResolutionContext::new(Some(dir.path()), &meta).with_warning_log(&log);
        let populated = project
            .get_populated(&ctx, &PopulateOptions::new("dev", "us-east-1"))
            .unwrap();

        assert_eq!(
            populated["components"]["api"]["modules"]["users"]["functions"]["create"]["role"],
            json!("$${undefinedRole}")
        );
        assert_eq!(
            log.into_warnings(),
            vec![NodeWarning {
                s_path: "api/users/create".to_string(),
                warning: PopulateWarning::UndefinedTemplate {
                    name: "undefinedRole".to_string()
                },
            }]
        );
    }

    #[test]
    fn test_get_populated_errors() {
        let dir = tempdir().unwrap();
        let project = sample_tree(dir.path());

        let meta = populate_meta();
        let ctx = ResolutionContext::new(Some(dir.path()), &meta);
        assert!(matches!(
            project.get_populated(&ctx, &PopulateOptions::default()),
            Err(EntityError::Populate(PopulateError::MissingStageOrRegion))
        ));

        let empty = Meta::new();
        let ctx = ResolutionContext::new(Some(dir.path()), &empty);
        assert!(matches!(
            project.get_populated(&ctx, &PopulateOptions::new("dev", "us-east-1")),
            Err(EntityError::Populate(PopulateError::UndefinedVariable { .. }))
        ));

        let ctx = ResolutionContext::new(None, &meta);
        assert!(matches!(
            project.get_populated(&ctx, &PopulateOptions::new("dev", "us-east-1")),
            Err(EntityError::Repository(RepositoryError::MissingProjectPath))
        ));
    }

    #[test]
    fn test_find_resolves_every_kind() {
        let dir = tempdir().unwrap();
        let project = sample_tree(dir.path());

        assert_eq!(project.find("").unwrap().kind(), EntityKind::Project);
        assert_eq!(project.find("api").unwrap().kind(), EntityKind::Component);
        assert_eq!(project.find("api/users").unwrap().kind(), EntityKind::Module);
        assert_eq!(project.find("api/users/list").unwrap().kind(), EntityKind::Function);
        assert_eq!(
            project.find("api/users/list@users/list~GET").unwrap().kind(),
            EntityKind::Endpoint
        );
        assert_eq!(project.find("api/users/list#nightly").unwrap().kind(), EntityKind::Event);
        assert!(project.find("api/users/list@users/list~DELETE").is_none());
        assert!(project.find("web").is_none());
    }

    #[test]
    fn test_event_handle_resolves_owning_function() {
        let dir = tempdir().unwrap();
        let project = sample_tree(dir.path());
        let function = project.function("api/users/list").unwrap();
        let event = function.event("nightly").unwrap();

        let owner = event.function().resolve(&project).unwrap();
        assert_eq!(owner.s_path(), "api/users/list");
    }

    #[test]
    fn test_get_resources_merges_component_and_module_fragments() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        let mut project = Project::new(Some(root));
        let mut component = Component::new(SPathParts::component("api"), Some(root)).unwrap();
        component
            .attributes_mut()
            .insert("cloudFormation".into(), json!({"resources": {"Bucket": "v1"}}));
        let mut module = Module::new(SPathParts::module("api", "core"), Some(root)).unwrap();
        module.attributes_mut().insert(
            "cloudFormation".into(),
            json!({
                "resources": {"Bucket": "v2"},
                "lambdaIamPolicyDocumentStatements": [{"Effect": "Allow", "Action": ["s3:*"], "Resource": "*"}]
            }),
        );
        component.set_module(module);
        project.set_component(component);

        let meta = dev_meta();
        let ctx = ResolutionContext::new(Some(root), &meta);
        let resources = project
            .get_resources(&ctx, &PopulateOptions::new("dev", "us-east-1"))
            .unwrap();

        assert_eq!(resources.template["Resources"]["Bucket"], json!("v2"));
        assert_eq!(resources.collisions.len(), 1);
        assert_eq!(resources.collisions[0].key, "Bucket");
        let statements = resources.template["Resources"]["IamPolicyLambda"]["Properties"]
            ["PolicyDocument"]["Statement"]
            .as_array()
            .unwrap();
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0]["Resource"], json!("arn:aws:logs:us-east-1:*:*"));
    }

    #[derive(Debug)]
    struct PythonFactory;

    impl NodeFactory for PythonFactory {
        fn create(
            &self,
            kind: EntityKind,
            parts: &SPathParts,
            project_root: Option<&Path>,
        ) -> EntityResult<EntityNode> {
            let node = DefaultNodeFactory.create(kind, parts, project_root)?;
            Ok(match node {
                EntityNode::Function(mut function) => {
                    function
                        .attributes_mut()
                        .insert("runtime".into(), json!("python2.7"));
                    EntityNode::Function(function)
                }
                other => other,
            })
        }
    }

    #[test]
    fn test_injected_factory_supplies_defaults() {
        let dir = tempdir().unwrap();
        write(dir.path(), "s-project.json", json!({"name": "demo"}));
        write(dir.path(), "api/s-component.json", json!({"name": "api"}));
        write(dir.path(), "api/users/s-module.json", json!({"name": "users"}));
        write(dir.path(), "api/users/list/s-function.json", json!({"name": "list"}));
        let meta = Meta::new();
        let ctx = ResolutionContext::new(Some(dir.path()), &meta).with_factory(&PythonFactory);

        let project = Project::open(&ctx).unwrap();
        let function = project.function("api/users/list").unwrap();

        assert_eq!(function.data().attributes["runtime"], json!("python2.7"));
        assert!(function.endpoints().is_empty());
    }

    #[test]
    fn test_update_config_re_roots_descendants() {
        let dir = tempdir().unwrap();
        let mut project = sample_tree(dir.path());
        let other = tempdir().unwrap();
        project.update_config(Some(other.path()));

        let function = project.function("api/users/list").unwrap();
        assert_eq!(function.config().full_path(), Some(other.path().join("api/users/list").as_path()));
        let endpoint: &Endpoint = &function.endpoints()[0];
        assert_eq!(
            endpoint.config().full_path(),
            Some(other.path().join("api/users/list").as_path())
        );
    }
}
