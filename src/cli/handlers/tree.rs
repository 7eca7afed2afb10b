use anyhow::{Result, anyhow};
use clap::Parser;
use colored::Colorize;

use super::commons::{ProjectArgs, Workspace};
use crate::core::graph_display::{self, DisplayOptions};

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Displays the project as a tree of components, modules and functions."
)]
struct TreeArgs {
    /// The sPath to use as the root of the tree. Defaults to the whole project.
    s_path: Option<String>,

    /// Show the directory of each node.
    #[arg(long)]
    paths: bool,

    /// Limit the depth of the tree display.
    #[arg(long, short)]
    depth: Option<usize>,

    #[command(flatten)]
    project: ProjectArgs,
}

pub fn handle(args: Vec<String>) -> Result<()> {
    let tree_args = TreeArgs::try_parse_from(&args)?;
    let workspace = Workspace::open(&tree_args.project)?;
    let project = workspace.load_project()?;

    let display_options = DisplayOptions {
        show_paths: tree_args.paths,
        max_depth: tree_args.depth,
    };
    let rendered =
        graph_display::render_project_tree(&project, tree_args.s_path.as_deref(), &display_options)
            .ok_or_else(|| {
                anyhow!(
                    "'{}' does not exist in this project.",
                    tree_args.s_path.as_deref().unwrap_or_default()
                )
            })?;

    println!("\n{}", format!("Project at {}", workspace.root.display()).dimmed());
    print!("{}", rendered);
    Ok(())
}
