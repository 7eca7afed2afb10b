// src/bin/lambdatree.rs

use anyhow::Result;
use clap::{CommandFactory, Parser};
use colored::*;
use lambdatree::cli::{Cli, handlers};

/// A command, its aliases and the handler that parses the rest of the arguments.
struct CommandDefinition {
    name: &'static str,
    aliases: &'static [&'static str],
    handler: fn(Vec<String>) -> Result<()>,
}

/// Every command the binary knows. Add an entry here to add a command.
static COMMAND_REGISTRY: &[CommandDefinition] = &[
    CommandDefinition {
        name: "fmt",
        aliases: &[],
        handler: handlers::fmt::handle,
    },
    CommandDefinition {
        name: "get",
        aliases: &["show"],
        handler: handlers::get::handle,
    },
    CommandDefinition {
        name: "populate",
        aliases: &["pop"],
        handler: handlers::populate::handle,
    },
    CommandDefinition {
        name: "resources",
        aliases: &["res"],
        handler: handlers::resources::handle,
    },
    CommandDefinition {
        name: "tree",
        aliases: &["ls"],
        handler: handlers::tree::handle,
    },
    CommandDefinition {
        name: "validate",
        aliases: &[],
        handler: handlers::validate::handle,
    },
];

/// Finds a command definition in the registry by its name or alias.
fn find_command(name: &str) -> Option<&'static CommandDefinition> {
    COMMAND_REGISTRY
        .iter()
        .find(|cmd| cmd.name == name || cmd.aliases.contains(&name))
}

fn main() {
    env_logger::init();

    if let Err(e) = run_cli(Cli::parse()) {
        // Argument errors from a handler's parser keep clap's own formatting and exit code.
        if let Some(clap_err) = e.downcast_ref::<clap::Error>() {
            clap_err.exit();
        }
        eprintln!("\n{}: {}", "Error".red().bold(), e);
        for cause in e.chain().skip(1) {
            eprintln!("  {} {}", "caused by:".dimmed(), cause);
        }
        std::process::exit(1);
    }
}

fn run_cli(cli: Cli) -> Result<()> {
    log::debug!("CLI args parsed: {:?}", cli);

    let Some(name) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    match find_command(&name) {
        Some(command) => (command.handler)(cli.args),
        None => anyhow::bail!(
            "Unknown command '{}'. Run 'lambdatree --help' to list the commands.",
            name
        ),
    }
}
