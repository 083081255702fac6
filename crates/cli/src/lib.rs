pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "pedrabotnik",
    about = "Pedrabotnik operator CLI",
    long_about = "Check runtime readiness, inspect configuration, and run single consultations.",
    after_help = "Examples:\n  pedrabotnik doctor --json\n  pedrabotnik config\n  pedrabotnik ask \"Как оплатить обучение?\""
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, knowledge files and contract data")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Run one consultation workflow and print the result as JSON")]
    Ask {
        #[arg(help = "User message")]
        text: String,
        #[arg(long, help = "Chat id passed to the handoff action")]
        chat_id: Option<String>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Ask { text, chat_id } => commands::ask::run(&text, chat_id.as_deref()),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
