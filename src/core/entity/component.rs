// src/core/entity/component.rs

use super::{
    EntityError, EntityNode, EntityResult, Module, NodeConfig, ResolutionContext, SaveOptions,
    load_child, nest, record_value,
};
use crate::core::populator::{PopulateOptions, Populator};
use crate::core::spath::{EntityKind, SPathParts};
use crate::core::templates::Templates;
use crate::models::{self, Attributes, ComponentData};
use indexmap::IndexMap;
use rayon::prelude::*;
use serde_json::{Map, Value};
use std::path::Path;

/// A top-level grouping of modules sharing a runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    config: NodeConfig,
    data: ComponentData,
    templates: Templates,
    modules: IndexMap<String, Module>,
}

impl Component {
    /// Creates a component with default data and no modules.
    pub fn new(parts: SPathParts, project_root: Option<&Path>) -> EntityResult<Self> {
        let config = NodeConfig::new(parts, project_root);
        let name = config.require(EntityKind::Component, "component")?;
        let data = ComponentData::with_defaults(name);
        Ok(Self {
            config,
            data,
            templates: Templates::new(),
            modules: IndexMap::new(),
        })
    }

    /// The component's sPath (its directory name).
    pub fn s_path(&self) -> &str {
        self.config.s_path()
    }

    /// Where the component sits in the tree.
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// The component name.
    pub fn name(&self) -> &str {
        &self.data.name
    }

    /// The data record.
    pub fn data(&self) -> &ComponentData {
        &self.data
    }

    /// Mutable access to the non-identifying attributes.
    pub fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.data.attributes
    }

    /// The component's own templates.
    pub fn templates(&self) -> &Templates {
        &self.templates
    }

    /// Replaces the component's own templates.
    pub fn set_templates(&mut self, templates: Templates) {
        self.templates = templates;
    }

    /// The templates of every module, keyed by module name.
    pub fn get_templates(&self) -> Value {
        Value::Object(
            self.modules
                .iter()
                .map(|(name, module)| (name.clone(), module.get_templates().to_value()))
                .collect(),
        )
    }

    /// Modules keyed by name.
    pub fn modules(&self) -> &IndexMap<String, Module> {
        &self.modules
    }

    /// The module named `name`.
    pub fn module(&self, name: &str) -> Option<&Module> {
        self.modules.get(name)
    }

    /// Mutable access to the module named `name`.
    pub fn module_mut(&mut self, name: &str) -> Option<&mut Module> {
        self.modules.get_mut(name)
    }

    /// Adds or replaces a module, keyed by its name.
    pub fn set_module(&mut self, module: Module) {
        self.modules.insert(module.name().to_string(), module);
    }

    /// Removes the module named `name`.
    pub fn remove_module(&mut self, name: &str) -> Option<Module> {
        self.modules.shift_remove(name)
    }

    /// Overlays `partial` on the component's sPath parts and moves its modules along.
    pub fn update_config(&mut self, partial: &SPathParts, project_root: Option<&Path>) {
        self.config.update(partial, project_root);
        let hierarchy = SPathParts {
            component: self.config.parts().component.clone(),
            ..Default::default()
        };
        for module in self.modules.values_mut() {
            module.update_config(&hierarchy, project_root);
        }
    }

    /// Reads `s-component.json`, the optional templates file, then every module directory below.
    pub fn load(&mut self, ctx: &ResolutionContext<'_>) -> EntityResult<()> {
        let repo = ctx.repository()?;
        let s_path = self.config.s_path().to_string();
        let raw: Map<String, Value> = repo.read_descriptor(EntityKind::Component, &s_path)?;
        let data: ComponentData =
            serde_json::from_value(Value::Object(raw)).map_err(|source| {
                EntityError::InvalidDescriptor {
                    kind: EntityKind::Component,
                    s_path: s_path.clone(),
                    source,
                }
            })?;
        if !data.name.is_empty() {
            self.data.name = data.name;
        }
        models::assign(&mut self.data.attributes, data.attributes);
        self.data.attributes.shift_remove("modules");
        self.templates = repo.read_templates(&s_path)?;

        self.modules.clear();
        let component = self.config.require(EntityKind::Component, "component")?.to_string();
        for dir in repo.list_child_dirs(&s_path)? {
            let parts = SPathParts::module(&component, &dir);
            if let Some(module) =
                load_child(ctx, EntityKind::Module, &parts, EntityNode::into_module, Module::load)?
            {
                self.set_module(module);
            }
        }

        log::debug!("Loaded component '{}' ({} module(s))", s_path, self.modules.len());
        Ok(())
    }

    /// Deep copy of the component's data with its modules nested under `modules`.
    pub fn get(&self) -> EntityResult<Value> {
        let mut record = record_value(&self.data)?;
        let mut modules = Map::new();
        for (name, module) in &self.modules {
            modules.insert(name.clone(), module.get()?);
        }
        nest(&mut record, "modules", Value::Object(modules));
        Ok(record)
    }

    /// The component populated for a stage and region, modules included.
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

        let modules = self
            .modules
            .par_iter()
            .map(|(name, module)| {
                module
                    .get_populated(ctx, options, &scope)
                    .map(|value| (name.clone(), value))
            })
            .collect::<EntityResult<Vec<_>>>()?;
        nest(&mut record, "modules", Value::Object(modules.into_iter().collect()));
        Ok(record)
    }

    /// Writes `s-component.json` and the templates file; with `deep`, every module as well.
    pub fn save(&self, ctx: &ResolutionContext<'_>, options: SaveOptions) -> EntityResult<()> {
        let repo = ctx.repository()?;
        repo.write_descriptor(EntityKind::Component, self.s_path(), &record_value(&self.data)?)?;
        repo.write_templates(self.s_path(), &self.templates)?;
        if options.deep {
            for module in self.modules.values() {
                module.save(ctx, options)?;
            }
        }
        Ok(())
    }
}
