use anyhow::{Result, anyhow};
use clap::Parser;

use super::commons::{self, ProjectArgs, Workspace};

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Prints the raw (unpopulated) data of a node and its children as JSON."
)]
struct GetArgs {
    /// The sPath of the node. Defaults to the whole project.
    s_path: Option<String>,

    #[command(flatten)]
    project: ProjectArgs,
}

pub fn handle(args: Vec<String>) -> Result<()> {
    let get_args = GetArgs::try_parse_from(&args)?;
    let workspace = Workspace::open(&get_args.project)?;
    let project = workspace.load_project()?;

    let s_path = get_args.s_path.unwrap_or_default();
    let node = project
        .find(&s_path)
        .ok_or_else(|| anyhow!("'{}' does not exist in this project.", s_path))?;
    log::debug!("Printing {} '{}'", node.kind(), node.s_path());
    commons::print_json(&node.get()?)
}
