mod book;
mod commands;
mod input;
mod output;
mod telemetry;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::calculate::CalculateArgs;
use commands::credit::CreditArgs;
use commands::interest::InterestArgs;
use commands::invoicing::{DueDateArgs, GenerateArgs};
use commands::payment::PayArgs;
use commands::review::ReviewArgs;
use commands::sales_order::SalesOrderArgs;
use land_lease_core::config::EngineConfig;

/// Rent calculation and invoicing for municipal land leases
#[derive(Parser)]
#[command(
    name = "leasectl",
    version,
    about = "Rent calculation and invoicing for municipal land leases",
    long_about = "Loads a lease book snapshot (JSON or YAML, from --book or stdin) and \
                  calculates rents, generates and credits invoices, records payments, \
                  computes penalty interest and builds sales orders with decimal precision."
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
    /// Calculate the rent of a lease over a date range
    Calculate(CalculateArgs),
    /// Generate the invoices of one lease for a billing period
    Generate(GenerateArgs),
    /// Generate invoices for every lease with rent due on a date
    RunDueDate(DueDateArgs),
    /// Credit an invoice or an invoice set
    Credit(CreditArgs),
    /// Record a payment against an invoice
    Pay(PayArgs),
    /// Calculate penalty interest of overdue invoices
    Interest(InterestArgs),
    /// Build (and optionally export) sales orders for invoices
    SalesOrder(SalesOrderArgs),
    /// List problems that stop leases from being invoiced
    Review(ReviewArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Yaml,
    Table,
    Csv,
    Minimal,
}

fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let log_level = EngineConfig::from_env()
        .map(|config| config.log_level)
        .unwrap_or_else(|_| EngineConfig::default().log_level);
    if let Err(e) = telemetry::init(&log_level) {
        eprintln!("{}: {}", "warning".yellow().bold(), e);
    }

    let result: commands::CommandResult = match cli.command {
        Commands::Calculate(args) => commands::calculate::run_calculate(args),
        Commands::Generate(args) => commands::invoicing::run_generate(args),
        Commands::RunDueDate(args) => commands::invoicing::run_due_date(args),
        Commands::Credit(args) => commands::credit::run_credit(args),
        Commands::Pay(args) => commands::payment::run_pay(args),
        Commands::Interest(args) => commands::interest::run_interest(args),
        Commands::SalesOrder(args) => commands::sales_order::run_sales_order(args),
        Commands::Review(args) => commands::review::run_review(args),
        Commands::Version => {
            println!("leasectl {}", env!("CARGO_PKG_VERSION"));
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
