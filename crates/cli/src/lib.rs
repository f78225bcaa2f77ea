pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use quotebridge_core::config::AppConfig;

#[derive(Debug, Parser)]
#[command(
    name = "quotebridge",
    about = "Quote spreadsheet to Bitrix24 synchronization CLI",
    long_about = "Parses quote workbooks exported by the sales template and synchronizes \
                  them into Bitrix24 deals and quotes, recording every attempt in the \
                  submission history.",
    after_help = "Examples:\n  quotebridge sync of-4821.xlsx --send-date 2026-04-02\n  quotebridge sync *.xlsx --close-date 2026-06-30\n  quotebridge doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Parse one or more quote workbooks and submit them to the CRM")]
    Sync {
        #[arg(required = true, help = "Quote workbook files (.xlsx)")]
        files: Vec<PathBuf>,
        #[arg(long, help = "Skip the existence lookup and update this quote id")]
        quote_id: Option<String>,
        #[arg(long, help = "Close date written to the deal and quote (YYYY-MM-DD)")]
        close_date: Option<NaiveDate>,
        #[arg(long, help = "Mail date written to the quote (YYYY-MM-DD)")]
        mail_date: Option<NaiveDate>,
        #[arg(long, help = "Work start date written to the quote (YYYY-MM-DD)")]
        start_date: Option<NaiveDate>,
        #[arg(long, help = "Send date written to the quote (YYYY-MM-DD)")]
        send_date: Option<NaiveDate>,
        #[arg(long, help = "Operator name recorded in the submission history")]
        operator: Option<String>,
        #[arg(long, help = "Path to quotebridge.toml")]
        config: Option<PathBuf>,
    },
    #[command(about = "Validate configuration and reference-data connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
        #[arg(long, help = "Path to quotebridge.toml")]
        config: Option<PathBuf>,
    },
}

pub fn init_logging(config: &AppConfig) {
    use quotebridge_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Sync {
            files,
            quote_id,
            close_date,
            mail_date,
            start_date,
            send_date,
            operator,
            config,
        } => commands::sync::run(commands::sync::SyncArgs {
            files,
            quote_id,
            close_date,
            mail_date,
            start_date,
            send_date,
            operator,
            config,
        }),
        Command::Doctor { json, config } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json, config) }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
