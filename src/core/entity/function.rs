// src/core/entity/function.rs

use super::{
    Endpoint, EntityError, EntityRef, EntityResult, Event, NodeConfig, Project, ResolutionContext,
    SaveOptions, nest, record_value,
};
use crate::core::populator::{PopulateOptions, Populator};
use crate::core::spath::{self, EntityKind, SPathParts};
use crate::core::templates::Templates;
use crate::models::{self, Attributes, EndpointData, EventData, FunctionData};
use serde_json::{Map, Value};
use std::path::Path;

/// A deployable function. Its endpoints and events live inside its own descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    config: NodeConfig,
    data: FunctionData,
    templates: Templates,
    endpoints: Vec<Endpoint>,
    events: Vec<Event>,
}

impl Function {
    /// Creates a function with default data and a single `GET <module>/<function>` endpoint.
    pub fn new(parts: SPathParts, project_root: Option<&Path>) -> EntityResult<Self> {
        let config = NodeConfig::new(parts, project_root);
        config.require(EntityKind::Function, "component")?;
        let module = config.require(EntityKind::Function, "module")?;
        let name = config.require(EntityKind::Function, "function")?;
        let handler_dir = format!("{}/{}", module, name);
        let data = FunctionData::with_defaults(name, &handler_dir);

        let endpoint = Endpoint::new(
            SPathParts {
                endpoint_path: Some(handler_dir),
                endpoint_method: Some("GET".to_string()),
                ..config.parts().clone()
            },
            project_root,
        )?;

        Ok(Self {
            config,
            data,
            templates: Templates::new(),
            endpoints: vec![endpoint],
            events: Vec::new(),
        })
    }

    /// The function's sPath, `component/module/function`.
    pub fn s_path(&self) -> &str {
        self.config.s_path()
    }

    /// Where the function sits in the tree.
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// The function name.
    pub fn name(&self) -> &str {
        &self.data.name
    }

    /// The data record.
    pub fn data(&self) -> &FunctionData {
        &self.data
    }

    /// Mutable access to the non-identifying attributes.
    pub fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.data.attributes
    }

    /// The function's own templates.
    pub fn get_templates(&self) -> &Templates {
        &self.templates
    }

    /// Replaces the function's own templates.
    pub fn set_templates(&mut self, templates: Templates) {
        self.templates = templates;
    }

    /// The function's endpoints, in descriptor order.
    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    /// The endpoint answering `method` on `path`.
    pub fn endpoint(&self, path: &str, method: &str) -> Option<&Endpoint> {
        self.endpoints.iter().find(|e| e.matches(path, method))
    }

    /// Adds an endpoint. One with the same path and method is replaced in place.
    pub fn set_endpoint(&mut self, endpoint: Endpoint) {
        match self
            .endpoints
            .iter_mut()
            .find(|e| e.matches(endpoint.path(), endpoint.method()))
        {
            Some(existing) => {
                log::warn!(
                    "Function '{}' already has endpoint {} {}; replacing it.",
                    self.config.s_path(),
                    endpoint.method(),
                    endpoint.path()
                );
                *existing = endpoint;
            }
            None => self.endpoints.push(endpoint),
        }
    }

    /// Removes the endpoint answering `method` on `path`.
    pub fn remove_endpoint(&mut self, path: &str, method: &str) -> Option<Endpoint> {
        let index = self.endpoints.iter().position(|e| e.matches(path, method))?;
        Some(self.endpoints.remove(index))
    }

    /// The function's events, in descriptor order.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// The event named `name`.
    pub fn event(&self, name: &str) -> Option<&Event> {
        self.events.iter().find(|e| e.name() == name)
    }

    /// Adds an event. One with the same name is replaced in place.
    pub fn set_event(&mut self, event: Event) {
        match self.events.iter_mut().find(|e| e.name() == event.name()) {
            Some(existing) => {
                log::warn!(
                    "Function '{}' already has event '{}'; replacing it.",
                    self.config.s_path(),
                    event.name()
                );
                *existing = event;
            }
            None => self.events.push(event),
        }
    }

    /// Removes the event named `name`.
    pub fn remove_event(&mut self, name: &str) -> Option<Event> {
        let index = self.events.iter().position(|e| e.name() == name)?;
        Some(self.events.remove(index))
    }

    /// Overlays `partial` on the function's sPath parts and moves its endpoints and events along.
    pub fn update_config(&mut self, partial: &SPathParts, project_root: Option<&Path>) {
        self.config.update(partial, project_root);
        let parts = self.config.parts();
        let hierarchy = SPathParts::function(
            parts.component.as_deref().unwrap_or_default(),
            parts.module.as_deref().unwrap_or_default(),
            parts.function.as_deref().unwrap_or_default(),
        );
        for endpoint in &mut self.endpoints {
            endpoint.update_config(&hierarchy, project_root);
        }
        for event in &mut self.events {
            event.update_config(&hierarchy, project_root);
        }
    }

    /// Reads `s-function.json` and the optional templates file. The descriptor's `endpoints` and
    /// `events` arrays replace the defaults.
    pub fn load(&mut self, ctx: &ResolutionContext<'_>) -> EntityResult<()> {
        let repo = ctx.repository()?;
        let s_path = self.config.s_path().to_string();
        let mut raw: Map<String, Value> = repo.read_descriptor(EntityKind::Function, &s_path)?;

        let endpoints: Vec<EndpointData> = take_array(&mut raw, "endpoints", &s_path)?;
        let events: Vec<EventData> = take_array(&mut raw, "events", &s_path)?;
        let data: FunctionData = serde_json::from_value(Value::Object(raw)).map_err(|source| {
            EntityError::InvalidDescriptor {
                kind: EntityKind::Function,
                s_path: s_path.clone(),
                source,
            }
        })?;
        if !data.name.is_empty() {
            self.data.name = data.name;
        }
        models::assign(&mut self.data.attributes, data.attributes);
        self.templates = repo.read_templates(&s_path)?;

        self.endpoints.clear();
        for record in endpoints {
            let parts = SPathParts {
                endpoint_path: Some(record.path.clone()),
                endpoint_method: Some(record.method.clone()),
                ..self.config.parts().clone()
            };
            let mut endpoint = ctx
                .factory()
                .create(EntityKind::Endpoint, &parts, ctx.project_root())?
                .into_endpoint()?;
            endpoint.set(record, ctx.project_root());
            self.set_endpoint(endpoint);
        }

        self.events.clear();
        for record in events {
            let parts = SPathParts {
                event_name: Some(record.name.clone()),
                ..self.config.parts().clone()
            };
            let mut event = ctx
                .factory()
                .create(EntityKind::Event, &parts, ctx.project_root())?
                .into_event()?;
            event.set(record, ctx.project_root());
            self.set_event(event);
        }

        log::debug!(
            "Loaded function '{}' ({} endpoint(s), {} event(s))",
            s_path,
            self.endpoints.len(),
            self.events.len()
        );
        Ok(())
    }

    /// Deep copy of the function's data with its endpoints and events embedded.
    pub fn get(&self) -> EntityResult<Value> {
        let mut record = record_value(&self.data)?;
        let endpoints = self
            .endpoints
            .iter()
            .map(Endpoint::get)
            .collect::<EntityResult<Vec<_>>>()?;
        let events = self
            .events
            .iter()
            .map(Event::get)
            .collect::<EntityResult<Vec<_>>>()?;
        nest(&mut record, "endpoints", Value::Array(endpoints));
        nest(&mut record, "events", Value::Array(events));
        Ok(record)
    }

    /// The function populated for a stage and region. `inherited` is the merged template scope of
    /// its ancestors; the function's own templates are layered on top.
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

        let endpoints = self
            .endpoints
            .iter()
            .map(|e| e.get_populated(ctx, options, &scope))
            .collect::<EntityResult<Vec<_>>>()?;
        let events = self
            .events
            .iter()
            .map(|e| e.get_populated(ctx, options, &scope))
            .collect::<EntityResult<Vec<_>>>()?;
        nest(&mut record, "endpoints", Value::Array(endpoints));
        nest(&mut record, "events", Value::Array(events));
        Ok(record)
    }

    /// The name the function is deployed under for a stage and region.
    ///
    /// A populated `customName` wins. Otherwise the name is `<project>-<component>[-<module>]-<name>`,
    /// where the module segment is only present when the module directory carries an `s-module.json`.
    pub fn deployed_name(
        &self,
        ctx: &ResolutionContext<'_>,
        project: &Project,
        options: &PopulateOptions,
    ) -> EntityResult<String> {
        options.require()?;
        let repo = ctx.repository()?;

        let has_custom_name = self
            .data
            .attributes
            .get("customName")
            .is_some_and(|v| v.as_str().is_some_and(|s| !s.is_empty()));
        if has_custom_name {
            let populated = match project.function(self.s_path()) {
                Some(_) => project.get_populated_at(ctx, options, self.s_path())?,
                None => self.get_populated(ctx, options, project.templates())?,
            };
            if let Some(name) = populated.get("customName").and_then(Value::as_str) {
                return Ok(name.to_string());
            }
        }

        let parts = self.config.parts();
        let component_segment = self.config.require(EntityKind::Function, "component")?;
        let component = match project.find(component_segment) {
            Some(EntityRef::Component(component)) => component.name(),
            _ => component_segment,
        };
        let mut name = format!("{}-{}", project.name(), component);

        if let Some(module) = parts.module.as_deref()
            && repo.has_descriptor(
                EntityKind::Module,
                &spath::build(&SPathParts::module(component_segment, module)),
            )
        {
            name.push('-');
            name.push_str(module);
        }
        name.push('-');
        name.push_str(self.name());
        Ok(name)
    }

    /// Writes `s-function.json` (with endpoints and events) and the templates file.
    pub fn save(&self, ctx: &ResolutionContext<'_>, _options: SaveOptions) -> EntityResult<()> {
        let repo = ctx.repository()?;
        repo.write_descriptor(EntityKind::Function, self.s_path(), &self.get()?)?;
        repo.write_templates(self.s_path(), &self.templates)?;
        Ok(())
    }
}

/// Removes `key` from a raw descriptor and parses it as an array of records. Absent means empty.
fn take_array<T: serde::de::DeserializeOwned>(
    raw: &mut Map<String, Value>,
    key: &str,
    s_path: &str,
) -> EntityResult<Vec<T>> {
    match raw.shift_remove(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(value) => {
            serde_json::from_value(value).map_err(|source| EntityError::InvalidDescriptor {
                kind: EntityKind::Function,
                s_path: s_path.to_string(),
                source,
            })
        }
    }
}
