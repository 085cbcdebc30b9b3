pub mod commands;

use clap::{Parser, Subcommand};
use parapheur_core::config::{AppConfig, LoadOptions, LogFormat};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "parapheur",
    about = "Parapheur operator CLI",
    long_about = "Operate the approval workflow engine: migrations, fixtures, request \
                  registration, approver decisions and request inspection.",
    after_help = "Examples:\n  parapheur migrate\n  parapheur inbox --user chef.agence\n  parapheur decide CRD/2026/0001 --action approve --user chef.agence --comment \"Dossier complet\""
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load deterministic demo workflow types, circuits and routing rules")]
    Seed,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Register a credit application as a draft request")]
    NewCredit(commands::new_credit::NewCreditArgs),
    #[command(about = "Register incoming correspondence as a draft request")]
    NewMail(commands::new_mail::NewMailArgs),
    #[command(about = "Submit a draft request into its approval circuit")]
    Submit(commands::submit::SubmitArgs),
    #[command(about = "Record an approver decision (approve, reject or return)")]
    Decide(commands::decide::DecideArgs),
    #[command(about = "List pending approvals assigned to a user")]
    Inbox(commands::inbox::InboxArgs),
    #[command(about = "Show one request with its approval ledger and comment thread")]
    Show(commands::show::ShowArgs),
    #[command(about = "Cancel a draft request before submission")]
    Cancel(commands::cancel::CancelArgs),
}

fn init_logging(config: &AppConfig) {
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        LogFormat::Compact => {
            let _ = tracing_subscriber::fmt()
                .with_target(false)
                .with_max_level(log_level)
                .compact()
                .try_init();
        }
        LogFormat::Pretty => {
            let _ = tracing_subscriber::fmt()
                .with_target(false)
                .with_max_level(log_level)
                .pretty()
                .try_init();
        }
        LogFormat::Json => {
            let _ = tracing_subscriber::fmt()
                .with_target(false)
                .with_max_level(log_level)
                .json()
                .try_init();
        }
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    // Commands re-load and report config errors themselves; here a bad
    // config only means logging stays uninitialized.
    if let Ok(config) = AppConfig::load(LoadOptions::default()) {
        init_logging(&config);
    }

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::NewCredit(args) => commands::new_credit::run(args),
        Command::NewMail(args) => commands::new_mail::run(args),
        Command::Submit(args) => commands::submit::run(args),
        Command::Decide(args) => commands::decide::run(args),
        Command::Inbox(args) => commands::inbox::run(args),
        Command::Show(args) => commands::show::run(args),
        Command::Cancel(args) => commands::cancel::run(args),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
