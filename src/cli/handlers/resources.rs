use anyhow::Result;
use clap::Parser;
use colored::Colorize;

use super::commons::{self, ProjectArgs, ScopeArgs, Workspace};
use crate::core::populator::WarningLog;

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Prints the CloudFormation template merged from every component and module."
)]
struct ResourcesArgs {
    #[command(flatten)]
    scope: ScopeArgs,

    #[command(flatten)]
    project: ProjectArgs,
}

pub fn handle(args: Vec<String>) -> Result<()> {
    let resources_args = ResourcesArgs::try_parse_from(&args)?;
    let workspace = Workspace::open(&resources_args.project)?;
    workspace.check_scope(&resources_args.scope)?;
    let project = workspace.load_project()?;

    let log = WarningLog::new();
    let resources = project.get_resources(
        &workspace.context().with_warning_log(&log),
        &resources_args.scope.options(),
    )?;
    commons::print_warnings(&log.into_warnings());
    for collision in &resources.collisions {
        eprintln!(
            "{} resource '{}' overwritten by '{}'",
            "warning:".yellow().bold(),
            collision.key,
            collision.entity
        );
    }
    commons::print_json(&resources.template)
}
