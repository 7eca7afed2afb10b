// src/cli/handlers/commons.rs

// Shared pieces used by several handlers: project discovery, scope flags and JSON output.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde_json::Value;
use std::path::PathBuf;

use crate::core::{
    entity::{Project, ResolutionContext},
    meta::Meta,
    paths,
    populator::{NodeWarning, PopulateOptions, PopulateWarning},
};

/// Where to find the project.
#[derive(Args, Debug, Default, Clone)]
pub struct ProjectArgs {
    /// Path to the project root. Defaults to $LAMBDATREE_PROJECT_PATH, then the closest parent
    /// directory holding an s-project.json.
    #[arg(long, short = 'p')]
    pub project: Option<PathBuf>,
}

/// The stage and region to populate for.
#[derive(Args, Debug, Default, Clone)]
pub struct ScopeArgs {
    /// Target stage.
    #[arg(long, short)]
    pub stage: String,

    /// Target region within the stage.
    #[arg(long, short)]
    pub region: String,
}

impl ScopeArgs {
    pub fn options(&self) -> PopulateOptions {
        PopulateOptions::new(self.stage.clone(), self.region.clone())
    }
}

/// A project loaded from disk together with its variable store.
#[derive(Debug)]
pub struct Workspace {
    pub root: PathBuf,
    pub meta: Meta,
}

impl Workspace {
    /// Resolves the project root and loads the variable store.
    pub fn open(args: &ProjectArgs) -> Result<Self> {
        let root = paths::resolve_project_root(args.project.as_deref())?;
        let meta = Meta::load(&root)
            .with_context(|| format!("Failed to load variables of '{}'", root.display()))?;
        Ok(Self { root, meta })
    }

    pub fn context(&self) -> ResolutionContext<'_> {
        ResolutionContext::new(Some(&self.root), &self.meta)
    }

    /// Loads the whole project tree.
    pub fn load_project(&self) -> Result<Project> {
        let project = Project::open(&self.context())
            .with_context(|| format!("Failed to load project at '{}'", self.root.display()))?;
        Ok(project)
    }

    /// Fails unless the stage and region are defined in the variable store.
    pub fn check_scope(&self, scope: &ScopeArgs) -> Result<()> {
        self.meta
            .validate_region_exists(&scope.stage, &scope.region)
            .map_err(Into::into)
    }
}

/// Prints a JSON value to stdout, pretty-printed.
pub fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Prints population warnings to stderr, one line each.
pub fn print_warnings(warnings: &[NodeWarning]) {
    for NodeWarning { s_path, warning } in warnings {
        let node = if s_path.is_empty() { "project" } else { s_path.as_str() };
        let message = match warning {
            PopulateWarning::UndefinedTemplate { name } => {
                format!("template '{}' is not defined", name)
            }
            PopulateWarning::DeprecatedTemplateSyntax { marker } => {
                format!("'{}' uses the deprecated dotted template syntax", marker)
            }
            PopulateWarning::TemplateDepthExceeded { name } => {
                format!("template '{}' is nested too deeply", name)
            }
        };
        eprintln!("{} {}: {}", "warning:".yellow().bold(), node.cyan(), message);
    }
}
