// src/core/entity/event.rs

use super::{EntityResult, Function, NodeConfig, Project, ResolutionContext, record_value};
use crate::core::populator::{PopulateOptions, Populator};
use crate::core::spath::{self, EntityKind, SPathParts};
use crate::core::templates::Templates;
use crate::models::{self, Attributes, EventData};
use serde_json::Value;
use std::path::Path;

/// A non-owning reference from an event to the function that owns it.
///
/// Holds the function's sPath and is resolved against the project on demand. It is never
/// serialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionHandle {
    s_path: String,
}

impl FunctionHandle {
    /// A handle to the function at `parts` (only the hierarchy parts are kept).
    pub fn new(parts: &SPathParts) -> Self {
        let function_parts = SPathParts {
            component: parts.component.clone(),
            module: parts.module.clone(),
            function: parts.function.clone(),
            ..Default::default()
        };
        Self {
            s_path: spath::build(&function_parts),
        }
    }

    /// The owning function's sPath.
    pub fn s_path(&self) -> &str {
        &self.s_path
    }

    /// Looks the owning function up in `project`.
    pub fn resolve<'p>(&self, project: &'p Project) -> Option<&'p Function> {
        project.function(&self.s_path)
    }
}

/// A trigger attached to a function (schedule, stream, bucket notification...).
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    config: NodeConfig,
    data: EventData,
    function: FunctionHandle,
}

impl Event {
    /// Creates an event with default data. The function parts and the event name are required.
    pub fn new(parts: SPathParts, project_root: Option<&Path>) -> EntityResult<Self> {
        let config = NodeConfig::new(parts, project_root);
        config.require(EntityKind::Event, "component")?;
        config.require(EntityKind::Event, "module")?;
        config.require(EntityKind::Event, "function")?;
        let name = config.require(EntityKind::Event, "event")?;
        let data = EventData::with_defaults(name);
        let function = FunctionHandle::new(config.parts());
        Ok(Self {
            config,
            data,
            function,
        })
    }

    /// The event's sPath, e.g. `api/users/list#nightly`.
    pub fn s_path(&self) -> &str {
        self.config.s_path()
    }

    /// Where the event sits in the tree.
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// The event name.
    pub fn name(&self) -> &str {
        &self.data.name
    }

    /// The data record.
    pub fn data(&self) -> &EventData {
        &self.data
    }

    /// Mutable access to the non-identifying attributes.
    pub fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.data.attributes
    }

    /// The function that owns this event.
    pub fn function(&self) -> &FunctionHandle {
        &self.function
    }

    /// Overlays a record read from the function descriptor onto the defaults.
    pub fn set(&mut self, data: EventData, project_root: Option<&Path>) {
        if !data.name.is_empty() {
            self.config.update(
                &SPathParts {
                    event_name: Some(data.name.clone()),
                    ..Default::default()
                },
                project_root,
            );
            self.data.name = data.name;
        }
        models::assign(&mut self.data.attributes, data.attributes);
    }

    /// Overlays `partial` on the event's sPath parts and re-points the function handle.
    pub fn update_config(&mut self, partial: &SPathParts, project_root: Option<&Path>) {
        self.config.update(partial, project_root);
        self.function = FunctionHandle::new(self.config.parts());
        if let Some(name) = &self.config.parts().event_name {
            self.data.name.clone_from(name);
        }
    }

    /// Deep copy of the event's data.
    pub fn get(&self) -> EntityResult<Value> {
        record_value(&self.data)
    }

    /// The event populated for a stage and region, within its function's template scope.
    pub fn get_populated(
        &self,
        ctx: &ResolutionContext<'_>,
        options: &PopulateOptions,
        scope: &Templates,
    ) -> EntityResult<Value> {
        let (stage, region) = options.require()?;
        ctx.repository()?;
        let mut populator = Populator::new(ctx.meta(), scope, stage, region);
        let record = populator.populate(self.get()?)?;
        ctx.report_warnings(self.s_path(), populator.warnings());
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event_parts() -> SPathParts {
        SPathParts {
            event_name: Some("nightly".into()),
            ..SPathParts::function("api", "users", "cleanup")
        }
    }

    #[test]
    fn test_handle_points_at_owning_function() {
        let event = Event::new(event_parts(), None).unwrap();
        assert_eq!(event.s_path(), "api/users/cleanup#nightly");
        assert_eq!(event.function().s_path(), "api/users/cleanup");
    }

    #[test]
    fn test_handle_is_not_serialized() {
        let event = Event::new(event_parts(), None).unwrap();
        let value = event.get().unwrap();
        assert_eq!(value["name"], json!("nightly"));
        assert!(value.get("function").is_none());
        assert!(value.get("_function").is_none());
    }

    #[test]
    fn test_update_config_moves_handle() {
        let mut event = Event::new(event_parts(), None).unwrap();
        event.update_config(
            &SPathParts {
                module: Some("accounts".into()),
                ..Default::default()
            },
            None,
        );
        assert_eq!(event.function().s_path(), "api/accounts/cleanup");
    }
}
