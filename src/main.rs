use std::sync::Arc;
use std::time::Duration;

use clap::{arg, Command};
use serde::Deserialize;
use serde::Serialize;

use crate::client::SheetClient;
use crate::logging::LogMode;
use crate::report::Overview;

mod client;
mod error;
mod logging;
mod report;
mod sheet;
mod tui;

#[derive(Serialize, Deserialize)]
struct Config {
    spreadsheet_id: String,
    currency: String,
    cache_ttl_secs: u64,
    refresh_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // The published source this dashboard was built around
            spreadsheet_id: "1IStj3ZAU1yLbCsT6Pa6ioq6UJVdJBDbistzfEnVpK_0".to_string(),
            currency: "INR".to_string(),
            cache_ttl_secs: client::DEFAULT_TTL.as_secs(),
            refresh_secs: 60,
        }
    }
}

fn cli() -> Command {
    Command::new("sheetfolio")
        .about("A terminal dashboard for spreadsheet-published portfolios")
        .arg_required_else_help(true)
        .subcommand(Command::new("config").about("Print the path to the config file"))
        .subcommand(
            Command::new("summary")
                .about("Show the headline figures and per-category totals"),
        )
        .subcommand(
            Command::new("allocation")
                .about("Show how invested value is allocated across categories"),
        )
        .subcommand(
            Command::new("show")
                .about("Render a single sheet as a table")
                .arg(arg!(<SHEET> "Name of the sheet tab to render")),
        )
        .subcommand(Command::new("dashboard").about("Open the interactive dashboard"))
}

fn make_client(cfg: &Config) -> SheetClient {
    SheetClient::new(
        cfg.spreadsheet_id.clone(),
        Duration::from_secs(cfg.cache_ttl_secs),
    )
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let cfg: Config = confy::load("sheetfolio", "config")?;

    let matches = cli().get_matches();

    match matches.subcommand() {
        Some(("config", _)) => {
            println!(
                "Your config file is located here: \n{}",
                confy::get_configuration_file_path("sheetfolio", "config")?.display()
            );
        }
        Some(("summary", _)) => {
            logging::init(LogMode::Console)?;
            let client = make_client(&cfg);
            let overview = Overview::build(&client).await?;
            report::print_summary(&overview, &cfg.currency);
        }
        Some(("allocation", _)) => {
            logging::init(LogMode::Console)?;
            let client = make_client(&cfg);
            let overview = Overview::build(&client).await?;
            report::draw_allocation_chart(&overview);
            report::print_allocation(&overview);
        }
        Some(("show", sub_matches)) => {
            logging::init(LogMode::Console)?;
            let name = sub_matches
                .get_one::<String>("SHEET")
                .map(String::as_str)
                .unwrap_or_default();
            let client = make_client(&cfg);
            let sheet = client.fetch_sheet(name).await?;
            report::print_sheet(&sheet);
        }
        Some(("dashboard", _)) => {
            logging::init(LogMode::FileOnly)?;
            let client = Arc::new(make_client(&cfg));
            tui::run_dashboard(
                client,
                cfg.currency.clone(),
                Duration::from_secs(cfg.refresh_secs),
            )
            .await?;
        }
        _ => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli() {
        let matches = cli().get_matches_from(vec!["sheetfolio", "show", "Stocks Invested"]);
        assert_eq!(matches.subcommand_name(), Some("show"));
        let sub = matches.subcommand_matches("show").unwrap();
        assert_eq!(
            sub.get_one::<String>("SHEET").map(String::as_str),
            Some("Stocks Invested")
        );
    }

    #[test]
    fn test_default_config_ttl_matches_source() {
        let cfg = Config::default();
        assert_eq!(cfg.cache_ttl_secs, 300);
        assert_eq!(cfg.currency, "INR");
    }
}
