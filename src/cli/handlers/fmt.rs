use anyhow::Result;
use clap::Parser;
use colored::Colorize;

use super::commons::{ProjectArgs, Workspace};
use crate::core::entity::SaveOptions;

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Loads the whole project and writes every descriptor back in canonical form."
)]
struct FmtArgs {
    #[command(flatten)]
    project: ProjectArgs,
}

pub fn handle(args: Vec<String>) -> Result<()> {
    let fmt_args = FmtArgs::try_parse_from(&args)?;
    let workspace = Workspace::open(&fmt_args.project)?;
    let project = workspace.load_project()?;

    project.save(&workspace.context(), SaveOptions::deep())?;

    let functions: usize = project
        .components()
        .values()
        .flat_map(|c| c.modules().values())
        .map(|m| m.functions().len())
        .sum();
    println!(
        "{} Rewrote '{}' ({} component(s), {} function(s)).",
        "✔".green(),
        project.name().cyan(),
        project.components().len(),
        functions
    );
    Ok(())
}
