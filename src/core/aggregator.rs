// src/core/aggregator.rs

//! # Resource aggregation
//!
//! Merges the CloudFormation fragments of every component and module into the project's base
//! template. Fragments look like:
//!
//! ```json
//! "cloudFormation": {
//!   "lambdaIamPolicyDocumentStatements": [ ... ],
//!   "resources": { "LogicalId": { ... } }
//! }
//! ```
//!
//! Statements are appended to the Lambda execution policy. Resources are merged into `Resources`;
//! a logical ID defined twice keeps the last definition (components before their modules, insertion
//! order within each level) and the overwrite is reported as a [`ResourceCollision`].

use crate::constants::LAMBDA_POLICY_RESOURCE;
use serde_json::{Map, Value};

/// A resource key that was overwritten while merging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceCollision {
    /// The logical ID that was defined more than once.
    pub key: String,
    /// sPath of the entity whose definition won.
    pub entity: String,
}

/// The merged template and the collisions found while building it.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceTemplate {
    /// The deployable template.
    pub template: Value,
    /// Overwritten keys, in the order they were found.
    pub collisions: Vec<ResourceCollision>,
}

/// Builds the resource template from a populated project record.
///
/// The record must carry its children (`components`, then `modules`) as returned by
/// `Project::get_populated`.
pub fn aggregate(project: &Value) -> ResourceTemplate {
    let mut aggregator = Aggregator {
        template: project
            .get("cloudFormation")
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new())),
        collisions: Vec::new(),
    };

    for (component_name, component) in children(project, "components") {
        aggregator.merge_fragment(component_name, component);
        for (module_name, module) in children(component, "modules") {
            let s_path = format!("{}/{}", component_name, module_name);
            aggregator.merge_fragment(&s_path, module);
        }
    }

    ResourceTemplate {
        template: aggregator.template,
        collisions: aggregator.collisions,
    }
}

fn children<'a>(record: &'a Value, key: &str) -> impl Iterator<Item = (&'a str, &'a Value)> {
    record
        .get(key)
        .and_then(Value::as_object)
        .into_iter()
        .flat_map(|map| map.iter().map(|(name, child)| (name.as_str(), child)))
}

struct Aggregator {
    template: Value,
    collisions: Vec<ResourceCollision>,
}

impl Aggregator {
    fn merge_fragment(&mut self, s_path: &str, entity: &Value) {
        let Some(fragment) = entity.get("cloudFormation") else {
            return;
        };

        if let Some(statements) = fragment
            .get("lambdaIamPolicyDocumentStatements")
            .and_then(Value::as_array)
            .filter(|statements| !statements.is_empty())
        {
            log::debug!("Appending {} policy statement(s) from '{}'", statements.len(), s_path);
            if let Some(target) = self.policy_statements() {
                target.extend(statements.iter().cloned());
            }
        }

        let Some(resources) = fragment.get("resources").and_then(Value::as_object) else {
            return;
        };
        let Some(target) = self.resources() else {
            return;
        };
        let mut overwritten = Vec::new();
        for (key, resource) in resources {
            if target.insert(key.clone(), resource.clone()).is_some() {
                log::warn!("Resource '{}' was already defined; '{}' overwrites it.", key, s_path);
                overwritten.push(ResourceCollision {
                    key: key.clone(),
                    entity: s_path.to_string(),
                });
            }
        }
        self.collisions.extend(overwritten);
    }

    fn resources(&mut self) -> Option<&mut Map<String, Value>> {
        ensure_object(&mut self.template);
        let resources = self
            .template
            .as_object_mut()?
            .entry("Resources")
            .or_insert_with(|| Value::Object(Map::new()));
        ensure_object(resources);
        resources.as_object_mut()
    }

    /// `Resources.IamPolicyLambda.Properties.PolicyDocument.Statement`, created if absent.
    fn policy_statements(&mut self) -> Option<&mut Vec<Value>> {
        let mut node = &mut self.template;
        for key in ["Resources", LAMBDA_POLICY_RESOURCE, "Properties", "PolicyDocument"] {
            ensure_object(node);
            node = node
                .as_object_mut()?
                .entry(key)
                .or_insert_with(|| Value::Object(Map::new()));
        }
        ensure_object(node);
        let statement = node
            .as_object_mut()?
            .entry("Statement")
            .or_insert_with(|| Value::Array(Vec::new()));
        if !statement.is_array() {
            *statement = Value::Array(Vec::new());
        }
        statement.as_array_mut()
    }
}

/// Replaces a non-object value with an empty object.
fn ensure_object(value: &mut Value) {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn statement(action: &str) -> Value {
        json!({"Effect": "Allow", "Action": [action], "Resource": "*"})
    }

    #[test]
    fn test_module_overwrites_component_resource() {
        let project = json!({
            "cloudFormation": {"Resources": {}},
            "components": {
                "api": {
                    "cloudFormation": {"resources": {"Bucket": "v1"}},
                    "modules": {
                        "core": {"cloudFormation": {"resources": {"Bucket": "v2"}}}
                    }
                }
            }
        });

        let result = aggregate(&project);

        assert_eq!(result.template["Resources"]["Bucket"], json!("v2"));
        assert_eq!(
            result.collisions,
            vec![ResourceCollision {
                key: "Bucket".into(),
                entity: "api/core".into()
            }]
        );
    }

    #[test]
    fn test_statements_are_appended_in_order_without_dedup() {
        let project = json!({
            "cloudFormation": {
                "Resources": {
                    "IamPolicyLambda": {
                        "Properties": {"PolicyDocument": {"Statement": [statement("logs:*")]}}
                    }
                }
            },
            "components": {
                "api": {
                    "modules": {
                        "a": {"cloudFormation": {"lambdaIamPolicyDocumentStatements": [statement("s3:*")]}},
                        "b": {"cloudFormation": {"lambdaIamPolicyDocumentStatements": [statement("s3:*"), statement("sqs:*")]}}
                    }
                }
            }
        });

        let result = aggregate(&project);
        let statements =
            &result.template["Resources"]["IamPolicyLambda"]["Properties"]["PolicyDocument"]["Statement"];

        assert_eq!(
            statements,
            &json!([statement("logs:*"), statement("s3:*"), statement("s3:*"), statement("sqs:*")])
        );
        assert!(result.collisions.is_empty());
    }

    #[test]
    fn test_missing_policy_path_is_created() {
        let project = json!({
            "components": {
                "api": {"cloudFormation": {"lambdaIamPolicyDocumentStatements": [statement("s3:*")]}}
            }
        });

        let result = aggregate(&project);

        assert_eq!(
            result.template["Resources"]["IamPolicyLambda"]["Properties"]["PolicyDocument"]["Statement"],
            json!([statement("s3:*")])
        );
    }

    #[test]
    fn test_entities_without_fragment_are_skipped() {
        let base = json!({"Resources": {"Existing": {"Type": "AWS::S3::Bucket"}}});
        let project = json!({
            "cloudFormation": base.clone(),
            "components": {"api": {"modules": {"core": {"name": "core"}}}}
        });

        let result = aggregate(&project);

        assert_eq!(result.template, base);
        assert!(result.collisions.is_empty());
    }
}
