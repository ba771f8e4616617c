use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use carbon_portal_retriever::app::App;
use carbon_portal_retriever::config::{ConfigLoader, ResolvedConfig};
use carbon_portal_retriever::domain::ObjectId;
use carbon_portal_retriever::error::PortalError;
use carbon_portal_retriever::ledger::Ledger;
use carbon_portal_retriever::output::JsonOutput;
use carbon_portal_retriever::retrieval::{CsvFetcher, CsvHttpClient};
use carbon_portal_retriever::server::{self, AppState};
use carbon_portal_retriever::sparql::SparqlHttpClient;
use carbon_portal_retriever::temporal::DateWindow;

#[derive(Parser)]
#[command(name = "cp-retriever")]
#[command(about = "Station metadata, dataset metadata and CSV retrieval for the ICOS Carbon Portal")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "People, platforms, instruments and sensors of a station in a date window")]
    Station(StationArgs),
    #[command(about = "Metadata for data objects")]
    Datasets(DatasetsArgs),
    #[command(about = "List data objects of the configured object specs")]
    Objects,
    #[command(about = "Serve CSV content of data objects at /<pid>")]
    Serve(ServeArgs),
    #[command(about = "Update the transfer ledger from the portal")]
    Sync,
    #[command(about = "Download new datasets recorded in the transfer ledger")]
    Populate,
}

#[derive(Args)]
struct StationArgs {
    station: String,

    #[arg(long)]
    start: String,

    #[arg(long)]
    end: String,
}

#[derive(Args)]
struct DatasetsArgs {
    #[arg(required = true)]
    pids: Vec<String>,
}

#[derive(Args)]
struct ServeArgs {
    #[arg(long)]
    bind: Option<SocketAddr>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<PortalError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &PortalError) -> u8 {
    match error {
        PortalError::InvalidStationId(_)
        | PortalError::InvalidPid(_)
        | PortalError::InvalidIri(_)
        | PortalError::InvalidDate(_)
        | PortalError::EmptyObjectSet
        | PortalError::ConfigRead(_)
        | PortalError::ConfigParse(_)
        | PortalError::InvalidConfig(_) => 2,
        PortalError::SparqlHttp(_)
        | PortalError::SparqlStatus { .. }
        | PortalError::SparqlResults(_)
        | PortalError::CsvHttp(_)
        | PortalError::CsvStatus { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();
    let config = ConfigLoader::resolve(cli.config.as_deref())?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Station(args) => {
            let app = build_app(config)?;
            let window = DateWindow::parse(&args.start, &args.end)?;
            let rows = app.station_metadata(&args.station, window)?;
            JsonOutput::print_station(&rows).into_diagnostic()
        }
        Commands::Datasets(args) => {
            let app = build_app(config)?;
            let pids = args
                .pids
                .iter()
                .map(|pid| pid.parse::<ObjectId>())
                .collect::<Result<Vec<_>, PortalError>>()?;
            let records = app.dataset_metadata(pids)?;
            JsonOutput::print_datasets(&records).into_diagnostic()
        }
        Commands::Objects => {
            let app = build_app(config)?;
            let pids = app.list_objects()?;
            JsonOutput::print_objects(&pids).into_diagnostic()
        }
        Commands::Serve(args) => run_serve(config, args.bind),
        Commands::Sync => {
            let mut ledger = Ledger::open(&config.ledger_path)?;
            let app = build_app(config)?;
            let report = app.update_from_portal(&mut ledger)?;
            JsonOutput::print_sync(&report).into_diagnostic()
        }
        Commands::Populate => {
            let mut ledger = Ledger::open(&config.ledger_path)?;
            let app = build_app(config)?;
            let report = app.populate(&mut ledger)?;
            JsonOutput::print_populate(&report).into_diagnostic()
        }
    }
}

fn build_app(config: ResolvedConfig) -> Result<App<SparqlHttpClient, CsvHttpClient>, PortalError> {
    let sparql = SparqlHttpClient::new(config.sparql_endpoint.clone(), config.timeout)?;
    let fetcher = CsvHttpClient::new(config.data_endpoint.clone(), config.timeout)?;
    Ok(App::new(config, sparql, fetcher))
}

fn run_serve(config: ResolvedConfig, bind: Option<SocketAddr>) -> miette::Result<()> {
    let addr = bind.unwrap_or(config.bind);
    // The blocking client owns its own runtime, so it is built and finally
    // dropped outside the async one.
    let fetcher: Arc<dyn CsvFetcher> = Arc::new(CsvHttpClient::new(
        config.data_endpoint.clone(),
        config.timeout,
    )?);
    let runtime = tokio::runtime::Runtime::new().into_diagnostic()?;
    let result = runtime.block_on(server::serve(addr, AppState::new(Arc::clone(&fetcher))));
    drop(runtime);
    drop(fetcher);
    result.map_err(miette::Report::from)
}
