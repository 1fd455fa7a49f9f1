mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::rates::MonthlyRateArgs;
use commands::schedule::ScheduleArgs;

/// Installment-loan amortization schedules
#[derive(Parser)]
#[command(
    name = "amortiza",
    version,
    about = "SAC and PRICE amortization schedules with TR correction",
    long_about = "A CLI for generating installment-loan amortization schedules \
                  with decimal precision. Supports the SAC and PRICE systems, \
                  monthly TR index correction, recurring and one-off extra \
                  payments, and fixed monthly fees."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a month-by-month amortization schedule
    Schedule(ScheduleArgs),
    /// Generate a schedule and report headline figures and a yearly breakdown
    Summary(ScheduleArgs),
    /// Convert an effective annual rate into its monthly equivalent
    MonthlyRate(MonthlyRateArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn main() {
    let cli = Cli::parse();

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Schedule(args) => commands::schedule::run_schedule(args),
        Commands::Summary(args) => commands::schedule::run_summary(args),
        Commands::MonthlyRate(args) => commands::rates::run_monthly_rate(args),
        Commands::Version => {
            println!("amortiza {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
