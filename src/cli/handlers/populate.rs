use anyhow::Result;
use clap::Parser;

use super::commons::{self, ProjectArgs, ScopeArgs, Workspace};
use crate::core::populator::WarningLog;

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Prints a node populated for a stage and region: templates expanded, variables resolved."
)]
struct PopulateArgs {
    /// The sPath of the node. Defaults to the whole project.
    s_path: Option<String>,

    #[command(flatten)]
    scope: ScopeArgs,

    #[command(flatten)]
    project: ProjectArgs,
}

pub fn handle(args: Vec<String>) -> Result<()> {
    let populate_args = PopulateArgs::try_parse_from(&args)?;
    let workspace = Workspace::open(&populate_args.project)?;
    workspace.check_scope(&populate_args.scope)?;
    let project = workspace.load_project()?;

    let log = WarningLog::new();
    let populated = project.get_populated_at(
        &workspace.context().with_warning_log(&log),
        &populate_args.scope.options(),
        populate_args.s_path.as_deref().unwrap_or_default(),
    )?;
    commons::print_warnings(&log.into_warnings());
    commons::print_json(&populated)
}
