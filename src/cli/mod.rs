use clap::Parser;

pub mod handlers;

const HELP_TEMPLATE: &str = "\
<title>lambdatree</title> {version}
<dim>Hierarchical deployment configuration for serverless projects.</dim>

<title>USAGE:</title>
    <hl>lambdatree</hl> <cmd><COMMAND></cmd> [ARGS...]

<group>INSPECT</group>
    <cmd>tree</cmd>       [S_PATH] [--paths] [--depth N]   Show the project tree
    <cmd>get</cmd>        [S_PATH]                          Print raw node data
    <cmd>validate</cmd>   <KIND> <S_PATH>                   Check an sPath

<group>RESOLVE</group>
    <cmd>populate</cmd>   [S_PATH] -s <STAGE> -r <REGION>   Print a populated node
    <cmd>resources</cmd>  -s <STAGE> -r <REGION>            Print the merged resource template

<group>MAINTAIN</group>
    <cmd>fmt</cmd>                                          Rewrite every descriptor

Every command accepts <hi>-p, --project <PATH></hi> to pick the project root.
Run <hl>lambdatree <COMMAND> --help</hl> for the options of a command.
";

/// Builds the color-aware help string at runtime.
fn build_help_string() -> &'static str {
    let use_colors = colored::control::SHOULD_COLORIZE.should_colorize();

    let title = if use_colors { "\x1b[1;33m" } else { "" }; // Bold Yellow
    let hl = if use_colors { "\x1b[1;36m" } else { "" }; // Bold Cyan
    let hi = if use_colors { "\x1b[1m" } else { "" }; // Bold
    let cmd = if use_colors { "\x1b[36m" } else { "" }; // Cyan
    let group = if use_colors { "\x1b[1;32m" } else { "" }; // Bold Green
    let dim = if use_colors { "\x1b[2m" } else { "" };
    let reset = if use_colors { "\x1b[0m" } else { "" };

    let formatted_string = HELP_TEMPLATE
        .replace("<title>", title)
        .replace("</title>", reset)
        .replace("<hl>", hl)
        .replace("</hl>", reset)
        .replace("<hi>", hi)
        .replace("</hi>", reset)
        .replace("<cmd>", cmd)
        .replace("</cmd>", reset)
        .replace("<group>", group)
        .replace("</group>", reset)
        .replace("<dim>", dim)
        .replace("</dim>", reset);

    Box::leak(formatted_string.into_boxed_str())
}

/// lambdatree: inspect, populate and aggregate a serverless project tree.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about,
    help_template = { build_help_string() },
    styles = clap::builder::Styles::styled()
        .header(clap::builder::styling::AnsiColor::Yellow.on_default().bold())
        .usage(clap::builder::styling::AnsiColor::Yellow.on_default().bold())
        .literal(clap::builder::styling::AnsiColor::Cyan.on_default().bold())
        .placeholder(clap::builder::styling::AnsiColor::Green.on_default()),
)]
#[command(disable_help_subcommand = true)]
#[command(trailing_var_arg = true)]
pub struct Cli {
    /// The command to run.
    #[arg()]
    pub command: Option<String>,

    /// Arguments handed to the command, which parses them itself.
    #[arg(allow_hyphen_values = true)]
    pub args: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_args_are_passed_through() {
        let cli = Cli::try_parse_from(["lambdatree", "populate", "api", "-s", "dev", "-r", "us-east-1"])
            .unwrap();
        assert_eq!(cli.command.as_deref(), Some("populate"));
        assert_eq!(cli.args, vec!["api", "-s", "dev", "-r", "us-east-1"]);
    }
}
