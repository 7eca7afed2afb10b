// src/core/entity/module.rs

use super::{
    EntityError, EntityNode, EntityResult, Function, NodeConfig, ResolutionContext, SaveOptions, load_child,
    nest, record_value,
};
use crate::core::populator::{PopulateOptions, Populator};
use crate::core::spath::{EntityKind, SPathParts};
use crate::core::templates::Templates;
use crate::models::{self, Attributes, ModuleData};
use indexmap::IndexMap;
use rayon::prelude::*;
use serde_json::{Map, Value};
use std::path::Path;

/// A group of related functions sharing a CloudFormation fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    config: NodeConfig,
    data: ModuleData,
    templates: Templates,
    functions: IndexMap<String, Function>,
}

impl Module {
    /// Creates a module with default data and no functions.
    pub fn new(parts: SPathParts, project_root: Option<&Path>) -> EntityResult<Self> {
        let config = NodeConfig::new(parts, project_root);
        config.require(EntityKind::Module, "component")?;
        let name = config.require(EntityKind::Module, "module")?;
        let data = ModuleData::with_defaults(name);
        Ok(Self {
            config,
            data,
            templates: Templates::new(),
            functions: IndexMap::new(),
        })
    }

    /// The module's sPath, `component/module`.
    pub fn s_path(&self) -> &str {
        self.config.s_path()
    }

    /// Where the module sits in the tree.
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// The module name.
    pub fn name(&self) -> &str {
        &self.data.name
    }

    /// The data record.
    pub fn data(&self) -> &ModuleData {
        &self.data
    }

    /// Mutable access to the non-identifying attributes.
    pub fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.data.attributes
    }

    /// The module's own templates.
    pub fn get_templates(&self) -> &Templates {
        &self.templates
    }

    /// Replaces the module's own templates.
    pub fn set_templates(&mut self, templates: Templates) {
        self.templates = templates;
    }

    /// Functions keyed by name.
    pub fn functions(&self) -> &IndexMap<String, Function> {
        &self.functions
    }

    /// The function named `name`.
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.get(name)
    }

    /// Mutable access to the function named `name`.
    pub fn function_mut(&mut self, name: &str) -> Option<&mut Function> {
        self.functions.get_mut(name)
    }

    /// Adds or replaces a function, keyed by its name.
    pub fn set_function(&mut self, function: Function) {
        self.functions.insert(function.name().to_string(), function);
    }

    /// Removes the function named `name`.
    pub fn remove_function(&mut self, name: &str) -> Option<Function> {
        self.functions.shift_remove(name)
    }

    /// Overlays `partial` on the module's sPath parts and moves its functions along.
    pub fn update_config(&mut self, partial: &SPathParts, project_root: Option<&Path>) {
        self.config.update(partial, project_root);
        let parts = self.config.parts();
        let hierarchy = SPathParts {
            component: parts.component.clone(),
            module: parts.module.clone(),
            ..Default::default()
        };
        for function in self.functions.values_mut() {
            function.update_config(&hierarchy, project_root);
        }
    }

    /// Reads `s-module.json`, the optional templates file, then every function directory below.
    pub fn load(&mut self, ctx: &ResolutionContext<'_>) -> EntityResult<()> {
        let repo = ctx.repository()?;
        let s_path = self.config.s_path().to_string();
        let raw: Map<String, Value> = repo.read_descriptor(EntityKind::Module, &s_path)?;
        let data: ModuleData =
            serde_json::from_value(Value::Object(raw)).map_err(|source| {
                EntityError::InvalidDescriptor {
                    kind: EntityKind::Module,
                    s_path: s_path.clone(),
                    source,
                }
            })?;
        if !data.name.is_empty() {
            self.data.name = data.name;
        }
        models::assign(&mut self.data.attributes, data.attributes);
        self.data.attributes.shift_remove("functions");
        self.templates = repo.read_templates(&s_path)?;

        self.functions.clear();
        let component = self.config.require(EntityKind::Module, "component")?.to_string();
        let module = self.config.require(EntityKind::Module, "module")?.to_string();
        for dir in repo.list_child_dirs(&s_path)? {
            let parts = SPathParts::function(&component, &module, &dir);
            if let Some(function) = load_child(
                ctx,
                EntityKind::Function,
                &parts,
                EntityNode::into_function,
                Function::load,
            )? {
                self.set_function(function);
            }
        }

        log::debug!("Loaded module '{}' ({} function(s))", s_path, self.functions.len());
        Ok(())
    }

    /// Deep copy of the module's data with its functions nested under `functions`.
    pub fn get(&self) -> EntityResult<Value> {
        let mut record = record_value(&self.data)?;
        let mut functions = Map::new();
        for (name, function) in &self.functions {
            functions.insert(name.clone(), function.get()?);
        }
        nest(&mut record, "functions", Value::Object(functions));
        Ok(record)
    }

    /// The module populated for a stage and region, functions included.
    pub fn get_populated(
        &self,
        ctx: &ResolutionContext<'_>,
        options: &PopulateOptions,
        inherited: &Templates,
    ) -> EntityResult<Value> {
        let (stage, region) = options.require()?;
        ctx.repository()?;
        let scope = Templates::merged([inherited, &self.templates]);
        let mut populator = Populator::new(ctx.meta(), &scope, stage, region);
        let mut record = populator.populate(record_value(&self.data)?)?;
        ctx.report_warnings(self.s_path(), populator.warnings());

        let functions = self
            .functions
            .par_iter()
            .map(|(name, function)| {
                function
                    .get_populated(ctx, options, &scope)
                    .map(|value| (name.clone(), value))
            })
            .collect::<EntityResult<Vec<_>>>()?;
        nest(&mut record, "functions", Value::Object(functions.into_iter().collect()));
        Ok(record)
    }

    /// Writes `s-module.json` and the templates file; with `deep`, every function as well.
    pub fn save(&self, ctx: &ResolutionContext<'_>, options: SaveOptions) -> EntityResult<()> {
        let repo = ctx.repository()?;
        repo.write_descriptor(EntityKind::Module, self.s_path(), &record_value(&self.data)?)?;
        repo.write_templates(self.s_path(), &self.templates)?;
        if options.deep {
            for function in self.functions.values() {
                function.save(ctx, options)?;
            }
        }
        Ok(())
    }
}
