// src/core/entity/endpoint.rs

use super::{EntityResult, NodeConfig, ResolutionContext, record_value};
use crate::core::populator::{PopulateOptions, Populator};
use crate::core::spath::{EntityKind, SPathParts};
use crate::core::templates::Templates;
use crate::models::{self, Attributes, EndpointData};
use serde_json::Value;
use std::path::Path;

/// An HTTP endpoint of a function, stored inside the function's descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    config: NodeConfig,
    data: EndpointData,
}

impl Endpoint {
    /// Creates an endpoint with default data. Every part up to the method is required.
    pub fn new(parts: SPathParts, project_root: Option<&Path>) -> EntityResult<Self> {
        let config = NodeConfig::new(parts, project_root);
        config.require(EntityKind::Endpoint, "component")?;
        config.require(EntityKind::Endpoint, "module")?;
        config.require(EntityKind::Endpoint, "function")?;
        let path = config.require(EntityKind::Endpoint, "endpointPath")?;
        let method = config.require(EntityKind::Endpoint, "endpointMethod")?;
        let data = EndpointData::with_defaults(path, method);
        Ok(Self { config, data })
    }

    /// The endpoint's sPath, e.g. `api/users/list@users/list~GET`.
    pub fn s_path(&self) -> &str {
        self.config.s_path()
    }

    /// Where the endpoint sits in the tree.
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// The HTTP path.
    pub fn path(&self) -> &str {
        &self.data.path
    }

    /// The HTTP method.
    pub fn method(&self) -> &str {
        &self.data.method
    }

    /// The data record.
    pub fn data(&self) -> &EndpointData {
        &self.data
    }

    /// Mutable access to the non-identifying attributes.
    pub fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.data.attributes
    }

    /// Overlays a record read from the function descriptor onto the defaults.
    ///
    /// The record's path and method, when present, replace the endpoint's identity.
    pub fn set(&mut self, data: EndpointData, project_root: Option<&Path>) {
        let mut partial = SPathParts::default();
        if !data.path.is_empty() {
            partial.endpoint_path = Some(data.path.clone());
            self.data.path = data.path;
        }
        if !data.method.is_empty() {
            partial.endpoint_method = Some(data.method.clone());
            self.data.method = data.method;
        }
        models::assign(&mut self.data.attributes, data.attributes);
        self.config.update(&partial, project_root);
    }

    /// Overlays `partial` on the endpoint's sPath parts.
    pub fn update_config(&mut self, partial: &SPathParts, project_root: Option<&Path>) {
        self.config.update(partial, project_root);
        if let Some(path) = &self.config.parts().endpoint_path {
            self.data.path.clone_from(path);
        }
        if let Some(method) = &self.config.parts().endpoint_method {
            self.data.method.clone_from(method);
        }
    }

    /// `true` if this endpoint answers `method` on `path`.
    pub fn matches(&self, path: &str, method: &str) -> bool {
        self.data.path == path && self.data.method == method
    }

    /// Deep copy of the endpoint's data.
    pub fn get(&self) -> EntityResult<Value> {
        record_value(&self.data)
    }

    /// The endpoint populated for a stage and region, within its function's template scope.
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
    use crate::core::entity::EntityError;
    use crate::core::meta::Meta;
    use serde_json::json;

    fn endpoint_parts() -> SPathParts {
        SPathParts {
            endpoint_path: Some("users/list".into()),
            endpoint_method: Some("GET".into()),
            ..SPathParts::function("api", "users", "list")
        }
    }

    #[test]
    fn test_new_requires_method() {
        let parts = SPathParts {
            endpoint_path: Some("users".into()),
            ..SPathParts::function("api", "users", "list")
        };
        assert!(matches!(
            Endpoint::new(parts, None),
            Err(EntityError::MissingRequiredConfig {
                kind: EntityKind::Endpoint,
                field: "endpointMethod"
            })
        ));
    }

    #[test]
    fn test_set_overlays_and_moves_identity() {
        let mut endpoint = Endpoint::new(endpoint_parts(), None).unwrap();
        assert_eq!(endpoint.s_path(), "api/users/list@users/list~GET");

        let record: EndpointData = serde_json::from_value(json!({
            "path": "users/list",
            "method": "POST",
            "apiKeyRequired": true
        }))
        .unwrap();
        endpoint.set(record, None);

        assert_eq!(endpoint.s_path(), "api/users/list@users/list~POST");
        let value = endpoint.get().unwrap();
        assert_eq!(value["apiKeyRequired"], json!(true));
        assert_eq!(value["type"], json!("AWS"));
    }

    #[test]
    fn test_get_populated_requires_stage_and_region() {
        let endpoint = Endpoint::new(endpoint_parts(), None).unwrap();
        let meta = Meta::new();
        let ctx = ResolutionContext::new(None, &meta);
        let result = endpoint.get_populated(&ctx, &PopulateOptions::default(), &Templates::new());
        assert!(matches!(result, Err(EntityError::Populate(_))));
    }
}
