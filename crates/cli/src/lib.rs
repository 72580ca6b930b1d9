pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "facultag",
    about = "Facultag operator CLI",
    long_about = "Inspect configuration, check readiness, apply migrations, and review the category catalog and platform tags.",
    after_help = "Examples:\n  facultag doctor --json\n  facultag config\n  facultag catalog\n  facultag tags"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, channel credentials, catalog, and DB connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Show the category menu exactly as contacts will see it")]
    Catalog,
    #[command(about = "List the tags currently defined on the messaging platform")]
    Tags,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Catalog => commands::catalog::run(),
        Command::Tags => commands::tags::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
