use anyhow::{Result, anyhow};
use clap::Parser;
use colored::Colorize;

use super::commons::{ProjectArgs, Workspace};
use crate::core::spath::{self, EntityKind};

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Checks that an sPath is well formed for a kind (and, for functions, that it exists)."
)]
struct ValidateArgs {
    /// component, module, function, endpoint or event.
    kind: String,

    /// The sPath to check.
    s_path: String,

    #[command(flatten)]
    project: ProjectArgs,
}

pub fn handle(args: Vec<String>) -> Result<()> {
    let validate_args = ValidateArgs::try_parse_from(&args)?;
    let kind = EntityKind::from_name(&validate_args.kind)
        .ok_or_else(|| anyhow!("Unknown kind '{}'.", validate_args.kind))?;
    let workspace = Workspace::open(&validate_args.project)?;

    let parts = spath::validate(&workspace.root, &validate_args.s_path, kind)?;
    println!(
        "{} '{}' is a valid {} path.",
        "✔".green(),
        validate_args.s_path.cyan(),
        kind
    );
    for (label, value) in [
        ("component", &parts.component),
        ("module", &parts.module),
        ("function", &parts.function),
        ("endpoint path", &parts.endpoint_path),
        ("endpoint method", &parts.endpoint_method),
        ("event", &parts.event_name),
    ] {
        if let Some(value) = value {
            println!("  {:<16} {}", label.dimmed(), value);
        }
    }
    Ok(())
}
