use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use ticket_dispatch::config::{Config, ConfigOverrides};
use ticket_dispatch::dispatch::{DispatchReport, Dispatcher};
use ticket_dispatch::geo::GeocodeClient;
use ticket_dispatch::output::csv::{offices_to_csv, report_to_csv, tickets_to_csv};
use ticket_dispatch::output::json::render_json;
use ticket_dispatch::output::table::{
    render_offices_table, render_report_table, render_tickets_table,
};
use ticket_dispatch::server::run_server;
use ticket_dispatch::types::Dataset;
use tracing::info;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Debug, Parser)]
#[command(
    name = "ticket-dispatch",
    about = "Priority-ordered ticket routing across offices"
)]
struct Cli {
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(long = "home-country")]
    home_country: Option<String>,
    #[arg(long = "geocoder-url")]
    geocoder_url: Option<String>,
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Dispatch unassigned tickets from a dataset file.
    Assign {
        #[arg(short, long)]
        input: PathBuf,
        /// Geocode pending offices and tickets before dispatching.
        #[arg(long)]
        geocode: bool,
        /// Write the updated dataset (loads, assignments) back to a file.
        #[arg(long)]
        save: Option<PathBuf>,
    },
    /// Resolve pending office and ticket addresses to coordinates.
    Geocode {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(long)]
        save: Option<PathBuf>,
    },
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value_t = 3001)]
        port: u16,
    },
    Config {
        #[arg(long)]
        init: bool,
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load(Some(&config_path))?;
    config.apply_overrides(ConfigOverrides {
        home_country: cli.home_country.clone(),
        geocoder_base_url: cli.geocoder_url.clone(),
    });

    match &cli.command {
        Commands::Config { init, show } => {
            if *init {
                Config::write_template(&config_path)?;
                println!("Wrote config template to {}", config_path.display());
            }
            if *show || !*init {
                println!("{}", render_json(&config)?);
            }
        }
        Commands::Serve { host, port } => {
            let bind = format!("{host}:{port}");
            let addr: SocketAddr = bind
                .parse()
                .map_err(|e| anyhow!("invalid bind address {bind}: {e}"))?;
            return run_server(config, addr).await;
        }
        Commands::Geocode { input, save } => {
            let mut data = load_dataset(input)?;
            let client = GeocodeClient::new(&config.geocoder)?;
            let offices = client
                .geocode_offices(&mut data.offices, &config.routing.home_country)
                .await;
            let tickets = client.geocode_tickets(&mut data.tickets).await;
            info!("geocoded {offices} offices, {tickets} ticket addresses");
            match cli.output {
                OutputFormat::Table => {
                    println!("{}", render_offices_table(&data.offices));
                    println!("{}", render_tickets_table(&data.tickets));
                }
                OutputFormat::Json => println!("{}", render_json(&data)?),
                OutputFormat::Csv => {
                    print!("{}", offices_to_csv(&data.offices)?);
                    print!("{}", tickets_to_csv(&data.tickets)?);
                }
            }
            if let Some(path) = save {
                save_dataset(path, &data)?;
            }
        }
        Commands::Assign {
            input,
            geocode,
            save,
        } => {
            let mut data = load_dataset(input)?;
            if *geocode {
                let client = GeocodeClient::new(&config.geocoder)?;
                client
                    .geocode_offices(&mut data.offices, &config.routing.home_country)
                    .await;
                client.geocode_tickets(&mut data.tickets).await;
            }
            let mut dispatcher = Dispatcher::new(&config.routing);
            let report = dispatcher.assign(&mut data);
            print_report(&report, &data, cli.output)?;
            if let Some(path) = save {
                save_dataset(path, &data)?;
            }
        }
    }

    Ok(())
}

fn load_dataset(path: &Path) -> Result<Dataset> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed reading dataset: {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("failed parsing dataset JSON: {}", path.display()))
}

fn save_dataset(path: &Path, data: &Dataset) -> Result<()> {
    fs::write(path, render_json(data)?)
        .with_context(|| format!("failed writing dataset: {}", path.display()))
}

fn print_report(report: &DispatchReport, data: &Dataset, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_report_table(report, data)),
        OutputFormat::Json => println!("{}", render_json(report)?),
        OutputFormat::Csv => println!("{}", report_to_csv(report)?),
    }
    Ok(())
}
