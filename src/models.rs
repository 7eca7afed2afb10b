// src/models.rs

//! Data records persisted in the descriptor files.
//!
//! Each record keeps its identifying fields typed and every other attribute in an ordered JSON map.
//! Attributes stay untyped on purpose: until a record is populated for a stage and region, any of
//! them may still hold a `$${template}` or `${variable}` marker in place of its final value.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Non-identifying attributes of a record, in file order.
pub type Attributes = Map<String, Value>;

/// Inserts each `(key, value)` of `defaults` into a fresh attribute map.
fn attributes_from(defaults: Value) -> Attributes {
    match defaults {
        Value::Object(map) => map,
        _ => Attributes::new(),
    }
}

/// Overlays `data` on top of `attributes`, key by key (top-level assignment, no deep merge).
pub fn assign(attributes: &mut Attributes, data: Attributes) {
    for (key, value) in data {
        attributes.insert(key, value);
    }
}

/// Removes implementation-private keys (those starting with `_`) from a record.
pub fn strip_private_keys(record: &mut Value) {
    if let Value::Object(map) = record {
        map.retain(|key, _| !key.starts_with('_'));
    }
}

// --- PROJECT ---

/// The contents of `s-project.json`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct ProjectData {
    /// Project name.
    #[serde(default)]
    pub name: String,
    /// Everything else: version, custom, plugins, cloudFormation...
    #[serde(flatten)]
    pub attributes: Attributes,
}

impl ProjectData {
    /// A new project record with provider defaults, including the base CloudFormation template.
    pub fn with_defaults(name: &str) -> Self {
        Self {
            name: name.to_string(),
            attributes: attributes_from(json!({
                "version": "0.0.1",
                "profile": "serverless-v0.1.0",
                "location": "",
                "author": "",
                "description": "",
                "custom": {},
                "plugins": [],
                "cloudFormation": default_cloud_formation(),
            })),
        }
    }
}

/// The base template every project starts from: the Lambda execution role, its policy and outputs.
pub fn default_cloud_formation() -> Value {
    json!({
        "AWSTemplateFormatVersion": "2010-09-09",
        "Description": "The AWS CloudFormation template for this project's resources outside of Lambdas and Api Gateway",
        "Resources": {
            "IamRoleLambda": {
                "Type": "AWS::IAM::Role",
                "Properties": {
                    "AssumeRolePolicyDocument": {
                        "Version": "2012-10-17",
                        "Statement": [{
                            "Effect": "Allow",
                            "Principal": { "Service": ["lambda.amazonaws.com"] },
                            "Action": ["sts:AssumeRole"]
                        }]
                    },
                    "Path": "/"
                }
            },
            "IamPolicyLambda": {
                "Type": "AWS::IAM::Policy",
                "Properties": {
                    "PolicyName": "${stage}-${project}-lambda",
                    "PolicyDocument": {
                        "Version": "2012-10-17",
                        "Statement": [{
                            "Effect": "Allow",
                            "Action": ["logs:CreateLogGroup", "logs:CreateLogStream", "logs:PutLogEvents"],
                            "Resource": "arn:aws:logs:${region}:*:*"
                        }]
                    },
                    "Roles": [{ "Ref": "IamRoleLambda" }]
                }
            }
        },
        "Outputs": {
            "IamRoleArnLambda": {
                "Description": "ARN of the lambda IAM role",
                "Value": { "Fn::GetAtt": ["IamRoleLambda", "Arn"] }
            }
        }
    })
}

// --- COMPONENT ---

/// The contents of `s-component.json`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct ComponentData {
    /// Component name.
    #[serde(default)]
    pub name: String,
    /// Everything else: runtime, custom, cloudFormation...
    #[serde(flatten)]
    pub attributes: Attributes,
}

impl ComponentData {
    /// A new component record with provider defaults.
    pub fn with_defaults(name: &str) -> Self {
        Self {
            name: name.to_string(),
            attributes: attributes_from(json!({
                "runtime": "nodejs",
                "custom": {},
            })),
        }
    }

    /// The component's runtime, if it is a plain string.
    pub fn runtime(&self) -> Option<&str> {
        self.attributes.get("runtime").and_then(Value::as_str)
    }
}

// --- MODULE ---

/// The contents of `s-module.json`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct ModuleData {
    /// Module name.
    #[serde(default)]
    pub name: String,
    /// Everything else: version, profile, custom, cloudFormation...
    #[serde(flatten)]
    pub attributes: Attributes,
}

impl ModuleData {
    /// A new module record with provider defaults and an empty CloudFormation fragment.
    pub fn with_defaults(name: &str) -> Self {
        Self {
            name: name.to_string(),
            attributes: attributes_from(json!({
                "version": "0.0.1",
                "profile": "aws-v0.1.1",
                "location": "",
                "author": "",
                "description": "",
                "runtime": "nodejs",
                "custom": {},
                "cloudFormation": {
                    "lambdaIamPolicyDocumentStatements": [],
                    "resources": {}
                }
            })),
        }
    }
}

// --- FUNCTION ---

/// The contents of `s-function.json`, minus its embedded `endpoints` and `events` arrays.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct FunctionData {
    /// Function name.
    #[serde(default)]
    pub name: String,
    /// Everything else: handler, runtime, timeout, memorySize, custom...
    #[serde(flatten)]
    pub attributes: Attributes,
}

impl FunctionData {
    /// A new function record. `handler_dir` is the function's directory relative to its component.
    pub fn with_defaults(name: &str, handler_dir: &str) -> Self {
        Self {
            name: name.to_string(),
            attributes: attributes_from(json!({
                "customName": false,
                "customRole": false,
                "handler": format!("{}/handler.handler", handler_dir),
                "runtime": "nodejs",
                "timeout": 6,
                "memorySize": 1024,
                "custom": {
                    "excludePatterns": [],
                    "envVars": []
                },
                "vpc": {
                    "securityGroupIds": [],
                    "subnetIds": []
                }
            })),
        }
    }
}

// --- ENDPOINT ---

/// One entry of a function's `endpoints` array.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct EndpointData {
    /// HTTP path, relative to the API root.
    #[serde(default)]
    pub path: String,
    /// HTTP method.
    #[serde(default)]
    pub method: String,
    /// Everything else: type, authorizationType, apiKeyRequired, requestTemplates, responses...
    #[serde(flatten)]
    pub attributes: Attributes,
}

impl EndpointData {
    /// A new endpoint record with API Gateway defaults.
    pub fn with_defaults(path: &str, method: &str) -> Self {
        Self {
            path: path.to_string(),
            method: method.to_string(),
            attributes: attributes_from(json!({
                "type": "AWS",
                "authorizationType": "none",
                "authorizerFunction": false,
                "apiKeyRequired": false,
                "requestParameters": {},
                "requestTemplates": {
                    "application/json": ""
                },
                "responses": {
                    "400": {
                        "statusCode": "400"
                    },
                    "default": {
                        "statusCode": "200",
                        "responseParameters": {},
                        "responseModels": {},
                        "responseTemplates": {
                            "application/json": ""
                        }
                    }
                }
            })),
        }
    }
}

// --- EVENT ---

/// One entry of a function's `events` array.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct EventData {
    /// Event name, unique within its function.
    #[serde(default)]
    pub name: String,
    /// Everything else: type, config...
    #[serde(flatten)]
    pub attributes: Attributes,
}

impl EventData {
    /// A new event record; defaults to a five-minute schedule.
    pub fn with_defaults(name: &str) -> Self {
        Self {
            name: name.to_string(),
            attributes: attributes_from(json!({
                "type": "schedule",
                "config": {
                    "schedule": "rate(5 minutes)",
                    "enabled": true
                }
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flattened_attributes_round_trip() {
        let raw = json!({"name": "users", "runtime": "python2.7", "unknownKey": {"kept": true}});
        let data: ComponentData = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(data.name, "users");
        assert_eq!(data.runtime(), Some("python2.7"));
        assert_eq!(serde_json::to_value(&data).unwrap(), raw);
    }

    #[test]
    fn test_assign_overwrites_top_level_only() {
        let mut attributes = FunctionData::with_defaults("list", "users/list").attributes;
        let disk = attributes_from(json!({"timeout": 30, "custom": {"envVars": ["A"]}}));
        assign(&mut attributes, disk);

        assert_eq!(attributes["timeout"], json!(30));
        assert_eq!(attributes["memorySize"], json!(1024));
        assert_eq!(attributes["custom"], json!({"envVars": ["A"]}));
    }

    #[test]
    fn test_strip_private_keys() {
        let mut record = json!({"name": "x", "_config": {"sPath": "a"}, "_class": "Function"});
        strip_private_keys(&mut record);
        assert_eq!(record, json!({"name": "x"}));
    }
}
