//! CLI entry point for freqkeeper.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use freqkeeper_rebalancer::config::Config;
use freqkeeper_rebalancer::error::Error;
use freqkeeper_rebalancer::execution::{self, LiquidateOptions};

#[derive(Parser)]
#[command(name = "freqkeeper")]
#[command(about = "Account liquidation and update cycles for freqtrade bots")]
#[command(version)]
struct Cli {
    /// Path to freqkeeper.toml
    #[arg(long, default_value = "freqkeeper.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Stop, reset, reboot, reinstall and restart bots (one thread per bot)
    Update {
        /// Only update this bot
        #[arg(long)]
        bot: Option<String>,
    },

    /// Sell every non-reserved asset in a bot's exchange account
    Liquidate {
        #[arg(long)]
        bot: String,

        /// Show the sell plan without submitting orders
        #[arg(long)]
        dry_run: bool,

        /// Skip confirmation prompt (for automation/cron)
        #[arg(long)]
        force: bool,
    },

    /// Show a bot's exchange balances valued in the reference currency
    Balances {
        #[arg(long)]
        bot: String,
    },

    /// Ping every bot's API
    Status,

    /// Append each bot's daily profit and balance to the audit trail
    Report,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {e}");
            process::exit(1);
        }
    };

    let result = match cli.command {
        Command::Update { bot } => execution::run_update(&config, bot.as_deref()),
        Command::Liquidate {
            bot,
            dry_run,
            force,
        } => execution::run_liquidate(&config, &bot, &LiquidateOptions { dry_run, force }),
        Command::Balances { bot } => execution::show_balances(&config, &bot),
        Command::Status => execution::check_status(&config),
        Command::Report => execution::run_report(&config),
    };

    if let Err(e) = result {
        match &e {
            Error::Aborted(msg) => {
                eprintln!("{msg}");
                process::exit(0);
            }
            _ => {
                eprintln!("Error: {e}");
                process::exit(1);
            }
        }
    }
}
