pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

use commands::bid::BidCommand;
use commands::request::RequestCommand;

#[derive(Debug, Parser)]
#[command(
    name = "gavel",
    about = "Gavel operator CLI",
    long_about = "Operate the Gavel approval workflow: migrations, reference data, config inspection, readiness checks, approval requests and bids.",
    after_help = "Examples:\n  gavel doctor --json\n  gavel request create-user --sender 1 --jewelry 42\n  gavel request set-state --id 1 --responder 5 --state APPROVED\n  gavel bid place --user 1 --auction 3 --price 825.00"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the reference users, jewelry and auctions")]
    Seed,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Validate config, workflow policy, DB connectivity and schema state")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(subcommand, about = "Create, move and query approval requests")]
    Request(RequestCommand),
    #[command(subcommand, about = "Place bids and read auction history")]
    Bid(BidCommand),
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Request(command) => commands::request::run(command),
        Command::Bid(command) => commands::bid::run(command),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
