use anyhow::Result;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::commands::cpi_densify::CpiDensifyOptions;
use crate::commands::cpi_status::CpiStatusOptions;
use crate::commands::cpi_update::CpiUpdateOptions;
use crate::commands::{self, CommandReport};
use crate::logging;

#[derive(Parser, Debug)]
#[command(
    name = "cpi-sync",
    version,
    about = "Keep the monthly CPI table in sync with BLS and regenerate the daily CPI series"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Output machine-readable JSON")]
    pub json: bool,
    #[arg(long, global = true, help = "Enable debug logging on stderr")]
    pub debug: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Reconcile the monthly table against BLS and regenerate the daily series.
    Update(UpdateArgs),
    /// Regenerate the daily series from the monthly table only.
    Densify(DensifyArgs),
    /// Report gaps and the next fetch window without touching anything.
    Status(StatusArgs),
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    #[arg(long, help = "BLS series id (default: CUUR0000SA0)")]
    pub series_id: Option<String>,
    #[arg(long, help = "Path to the monthly table (default: datasets/CPI_U.csv)")]
    pub table: Option<PathBuf>,
    #[arg(long, help = "Path to the daily series (default: datasets/daily_cpi_inflation.csv)")]
    pub daily: Option<PathBuf>,
    #[arg(long, help = "Last year to fetch (default: current UTC year)")]
    pub end_year: Option<i32>,
    #[arg(long, help = "Always refresh this many recent years to catch revisions (default: 3)")]
    pub lookback_years: Option<u32>,
    #[arg(long, help = "Only fill missing months; never overwrite existing values")]
    pub no_overwrite: bool,
    #[arg(long, help = "Fetch and compute updates without writing files")]
    pub dry_run: bool,
    #[arg(long, value_name = "YYYY-MM-DD", help = "Treat this date as today")]
    pub as_of: Option<NaiveDate>,
}

#[derive(Args, Debug)]
pub struct DensifyArgs {
    #[arg(long)]
    pub table: Option<PathBuf>,
    #[arg(long)]
    pub daily: Option<PathBuf>,
    #[arg(long, value_name = "YYYY-MM-DD", help = "Treat this date as today")]
    pub as_of: Option<NaiveDate>,
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    #[arg(long)]
    pub table: Option<PathBuf>,
    #[arg(long)]
    pub end_year: Option<i32>,
    #[arg(long)]
    pub lookback_years: Option<u32>,
}

fn dispatch(command: Commands) -> Result<CommandReport> {
    match command {
        Commands::Update(args) => commands::cpi_update::run(&CpiUpdateOptions {
            series_id: args.series_id,
            table: args.table,
            daily: args.daily,
            end_year: args.end_year,
            lookback_years: args.lookback_years,
            no_overwrite: args.no_overwrite,
            dry_run: args.dry_run,
            as_of: args.as_of,
        }),
        Commands::Densify(args) => commands::cpi_densify::run(&CpiDensifyOptions {
            table: args.table,
            daily: args.daily,
            as_of: args.as_of,
            dry_run: args.dry_run,
        }),
        Commands::Status(args) => commands::cpi_status::run(&CpiStatusOptions {
            table: args.table,
            end_year: args.end_year,
            lookback_years: args.lookback_years,
        }),
    }
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.debug);

    let report = dispatch(cli.command)?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.render_text());
    }

    if !report.ok {
        anyhow::bail!("{} reported {} issue(s)", report.command, report.issues.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn update_flags_parse() {
        let cli = Cli::try_parse_from([
            "cpi-sync",
            "--json",
            "update",
            "--no-overwrite",
            "--dry-run",
            "--lookback-years",
            "5",
            "--as-of",
            "2024-03-20",
        ])
        .expect("parse");
        assert!(cli.json);
        let Commands::Update(args) = cli.command else {
            panic!("expected update");
        };
        assert!(args.no_overwrite && args.dry_run);
        assert_eq!(args.lookback_years, Some(5));
        assert_eq!(args.as_of, NaiveDate::from_ymd_opt(2024, 3, 20));
    }
}
