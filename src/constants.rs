// src/constants.rs

/// The descriptor file of the project root.
pub const PROJECT_DESCRIPTOR_FILENAME: &str = "s-project.json";

/// The descriptor file of a component directory.
pub const COMPONENT_DESCRIPTOR_FILENAME: &str = "s-component.json";

/// The descriptor file of a module directory.
pub const MODULE_DESCRIPTOR_FILENAME: &str = "s-module.json";

/// The descriptor file of a function directory (embeds endpoints and events).
pub const FUNCTION_DESCRIPTOR_FILENAME: &str = "s-function.json";

/// Optional template map stored next to any container descriptor.
pub const TEMPLATES_FILENAME: &str = "s-templates.json";

/// Directory (relative to the project root) holding the variable files.
pub const META_DIR: &str = "_meta";

/// Sub-directory of [`META_DIR`] holding `s-variables-*.json` files.
pub const VARIABLES_DIR: &str = "variables";

/// Prefix shared by every variables file.
pub const VARIABLES_FILE_PREFIX: &str = "s-variables-";

/// Stem of the project-wide variables file (`s-variables-common.json`).
pub const COMMON_VARIABLES_STEM: &str = "common";

/// Environment variable that overrides project root discovery.
pub const PROJECT_PATH_ENV: &str = "LAMBDATREE_PROJECT_PATH";

/// Name of the base-template resource that receives aggregated IAM statements.
pub const LAMBDA_POLICY_RESOURCE: &str = "IamPolicyLambda";
