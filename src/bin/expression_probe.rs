use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use expression_probe::app::{App, LogSink};
use expression_probe::config::{CliSettings, ConfigLoader};
use expression_probe::domain::{FeatureColumn, GeoAccession};
use expression_probe::error::ProbeError;
use expression_probe::geo::{GeoHttpClient, fetch_tenx_dataset};
use expression_probe::output::{JsonOutput, OutputMode, TableOutput};
use expression_probe::uniprot::UniprotHttpClient;

#[derive(Parser)]
#[command(name = "expression-probe")]
#[command(about = "Map gene symbols to EnsemblPlants IDs and quantify their single-cell expression")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Resolve symbols and report their expression in a 10x dataset")]
    Quantify(QuantifyArgs),
    #[command(about = "Download the 10x matrix files of a GEO series or sample")]
    FetchGeo(FetchGeoArgs),
}

#[derive(Args)]
struct QuantifyArgs {
    /// Directory holding matrix.mtx(.gz), features.tsv(.gz) and barcodes.tsv(.gz).
    #[arg(long, short = 'd')]
    dataset: Option<String>,

    #[arg(long, short = 's')]
    symbols: Option<String>,

    /// Minimum percentage of expressing cells for EXPRESSED (default 10).
    #[arg(long, short = 't')]
    threshold: Option<f64>,

    /// Minimum count for a cell to count as expressing (default 1).
    #[arg(long, allow_negative_numbers = true)]
    min_count: Option<i64>,

    /// Report TSV path; the report goes to stdout when omitted.
    #[arg(long, short = 'o')]
    output: Option<String>,

    #[arg(long)]
    counts_output: Option<String>,

    #[arg(long)]
    mean: bool,

    #[arg(long)]
    xref_db: Option<String>,

    #[arg(long, value_enum)]
    feature_column: Option<FeatureColumn>,

    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Args)]
struct FetchGeoArgs {
    accession: String,

    #[arg(long, short = 'o', default_value = ".")]
    outdir: PathBuf,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(probe) = report.downcast_ref::<ProbeError>() {
            return ExitCode::from(map_exit_code(probe));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &ProbeError) -> u8 {
    match error {
        ProbeError::InvalidSymbol(_)
        | ProbeError::EmptySymbolList
        | ProbeError::InvalidThreshold(_)
        | ProbeError::InvalidMinCount(_)
        | ProbeError::InvalidGeoAccession(_)
        | ProbeError::InvalidXrefDatabase(_)
        | ProbeError::ConfigRead(_)
        | ProbeError::ConfigParse(_)
        | ProbeError::MissingDatasetPath
        | ProbeError::DatasetNotFound(_)
        | ProbeError::MissingDatasetFile { .. }
        | ProbeError::MalformedDataset { .. }
        | ProbeError::ShapeMismatch(_)
        | ProbeError::EmptyDataset(_) => 2,
        ProbeError::UniprotHttp(_)
        | ProbeError::UniprotStatus { .. }
        | ProbeError::GeoHttp(_)
        | ProbeError::GeoStatus { .. }
        | ProbeError::GeoFilesNotFound(_) => 3,
        ProbeError::NoSymbolResolved(_) => 4,
        ProbeError::Filesystem(_) => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Table
    };

    match cli.command {
        Commands::Quantify(args) => run_quantify(args, output_mode),
        Commands::FetchGeo(args) => run_fetch_geo(args, output_mode),
    }
}

fn run_quantify(args: QuantifyArgs, output_mode: OutputMode) -> miette::Result<()> {
    let file = args
        .config
        .as_deref()
        .map(ConfigLoader::read)
        .transpose()?;
    let settings = CliSettings {
        dataset: args.dataset,
        symbols: args.symbols,
        threshold: args.threshold,
        min_count: args.min_count,
        output: args.output,
        counts_output: args.counts_output,
        include_mean: args.mean,
        xref_database: args.xref_db,
        feature_column: args.feature_column,
    };
    let options = ConfigLoader::resolve(settings, file)?;

    let resolver = UniprotHttpClient::new(options.xref_database.clone())?;
    let app = App::new(resolver);

    match output_mode {
        OutputMode::Json => {
            let result = app.run(&options, &JsonOutput)?;
            JsonOutput::print_run(&result).into_diagnostic()?;
        }
        OutputMode::Table => {
            let result = app.run(&options, &LogSink)?;
            if options.report_path.is_none() {
                TableOutput::print_run(&result, options.include_mean).into_diagnostic()?;
            }
        }
    }
    Ok(())
}

fn run_fetch_geo(args: FetchGeoArgs, output_mode: OutputMode) -> miette::Result<()> {
    let accession: GeoAccession = args.accession.parse()?;
    let client = GeoHttpClient::new()?;
    let result = fetch_tenx_dataset(&client, &accession, &args.outdir)?;

    match output_mode {
        OutputMode::Json => JsonOutput::print_geo(&result).into_diagnostic()?,
        OutputMode::Table => {
            for file in &result.files {
                println!(
                    "{}\t{}\t{}",
                    file.kind.marker(),
                    file.action,
                    file.path.as_deref().unwrap_or("-")
                );
            }
            tracing::info!(directory = %result.directory, "GEO fetch finished");
        }
    }
    Ok(())
}
