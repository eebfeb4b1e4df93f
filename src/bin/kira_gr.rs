use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing::info;
use tracing_subscriber::EnvFilter;

use kira_genome_resolver::app::{App, read_accession_list};
use kira_genome_resolver::classify::{classify_by_pattern, classify_by_signals};
use kira_genome_resolver::config::{ConfigLoader, ConfigOverrides, ResolvedConfig};
use kira_genome_resolver::domain::{GenomeType, TypeSelector};
use kira_genome_resolver::error::KiraError;
use kira_genome_resolver::fasta::inventory;
use kira_genome_resolver::harvester::HarvesterHttpClient;
use kira_genome_resolver::metadata::MetadataRecord;
use kira_genome_resolver::ncbi::NcbiHttpClient;
use kira_genome_resolver::output::{
    Classification, JsonOutput, OutputMode, TracingSink, print_classification_table,
    print_run_summary,
};
use kira_genome_resolver::serialize::{OutputFormat, write_metadata_file, write_records};

const HARVESTER_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Parser)]
#[command(name = "kira-gr")]
#[command(about = "Classify, download and annotate genome accession lists from NCBI")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    non_interactive: bool,

    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Download an accession list and write merged metadata")]
    Fetch(FetchArgs),
    #[command(about = "Resolve metadata for an accession list without downloading")]
    Resolve(ResolveArgs),
    #[command(about = "Show how accessions are classified")]
    Classify(ClassifyArgs),
    #[command(about = "Summarize the FASTA files in a directory")]
    Inventory(InventoryArgs),
}

#[derive(Args, Clone, Default)]
struct SourceArgs {
    /// Try the harvester service before local annotations and NCBI.
    #[arg(long)]
    prefer_remote: bool,

    #[arg(long)]
    harvester_url: Option<String>,

    /// Directory with GenBank annotation files (defaults to the destination).
    #[arg(long)]
    annotation_dir: Option<PathBuf>,

    #[arg(long, value_enum)]
    format: Option<OutputFormat>,
}

#[derive(Args, Clone)]
struct FetchArgs {
    /// Text file with one accession per line.
    input: Utf8PathBuf,

    destination: Utf8PathBuf,

    #[arg(long)]
    workers: Option<usize>,

    #[arg(long = "genome-types", value_enum, value_delimiter = ',')]
    genome_types: Vec<TypeSelector>,

    #[arg(long = "exclude-types", value_delimiter = ',')]
    exclude_types: Vec<GenomeType>,

    /// Keep complete genomes only, classified by accession prefix.
    #[arg(long)]
    complete_only: bool,

    #[arg(long)]
    skip_metadata: bool,

    #[arg(long)]
    max_genomes: Option<usize>,

    /// Disable politeness delays between tasks and batches.
    #[arg(long)]
    no_delay: bool,

    #[command(flatten)]
    sources: SourceArgs,
}

#[derive(Args, Clone)]
struct ResolveArgs {
    input: Utf8PathBuf,

    /// Write the metadata here instead of stdout.
    #[arg(long)]
    output: Option<Utf8PathBuf>,

    #[command(flatten)]
    sources: SourceArgs,
}

#[derive(Args, Clone)]
struct ClassifyArgs {
    #[arg(required = true)]
    accessions: Vec<String>,

    /// Sequence title used by the signal classifier.
    #[arg(long)]
    title: Option<String>,
}

#[derive(Args, Clone)]
struct InventoryArgs {
    directory: Utf8PathBuf,

    #[arg(long, value_enum, default_value_t = OutputFormat::Tsv)]
    format: OutputFormat,

    #[arg(long)]
    output: Option<Utf8PathBuf>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(kira) = report.downcast_ref::<KiraError>() {
            return ExitCode::from(map_exit_code(kira));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &KiraError) -> u8 {
    match error {
        KiraError::AccessionListRead { .. }
        | KiraError::DestinationNotWritable { .. }
        | KiraError::ConfigRead(_)
        | KiraError::ConfigParse(_)
        | KiraError::InvalidAccession(_)
        | KiraError::InvalidGenomeType(_) => 2,
        KiraError::NcbiHttp(_)
        | KiraError::NcbiStatus { .. }
        | KiraError::HarvesterHttp(_)
        | KiraError::HarvesterStatus { .. } => 3,
        _ => 1,
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
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    match cli.command {
        Commands::Fetch(args) => {
            let config = ConfigLoader::resolve(cli.config.as_deref())?;
            run_fetch(args, config, output_mode)
        }
        Commands::Resolve(args) => {
            let config = ConfigLoader::resolve(cli.config.as_deref())?;
            run_resolve(args, config)
        }
        Commands::Classify(args) => run_classify(args, output_mode),
        Commands::Inventory(args) => run_inventory(args),
    }
}

fn source_overrides(sources: SourceArgs) -> ConfigOverrides {
    ConfigOverrides {
        prefer_remote: sources.prefer_remote,
        harvester_url: sources.harvester_url,
        annotation_dir: sources.annotation_dir,
        output_format: sources.format,
        ..ConfigOverrides::default()
    }
}

fn build_app(
    config: &ResolvedConfig,
) -> Result<App<NcbiHttpClient, HarvesterHttpClient>, KiraError> {
    let ncbi = NcbiHttpClient::new()?;
    let harvester = match &config.harvester_url {
        Some(url) => Some(HarvesterHttpClient::new(url, HARVESTER_REQUEST_TIMEOUT)?),
        None => None,
    };
    Ok(App::new(ncbi, harvester))
}

fn run_fetch(args: FetchArgs, config: ResolvedConfig, output_mode: OutputMode) -> miette::Result<()> {
    let config = config.apply(ConfigOverrides {
        workers: args.workers,
        genome_types: args.genome_types,
        exclude_types: args.exclude_types,
        complete_only: args.complete_only,
        skip_metadata: args.skip_metadata,
        max_genomes: args.max_genomes,
        no_delay: args.no_delay,
        ..source_overrides(args.sources)
    });
    let app = build_app(&config)?;
    let report = app.run(&args.input, &args.destination, &config, &TracingSink)?;

    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_report(&report).into_diagnostic()?,
        OutputMode::Interactive => print_run_summary(&report),
    }
    Ok(())
}

fn run_resolve(args: ResolveArgs, config: ResolvedConfig) -> miette::Result<()> {
    let config = config.apply(source_overrides(args.sources));
    let accessions = read_accession_list(&args.input)?;
    let app = build_app(&config)?;
    let working_dir = Utf8PathBuf::from(".");
    let resolution = app.resolve_metadata(&accessions, &config, &working_dir);
    if !resolution.unresolved.is_empty() {
        info!(count = resolution.unresolved.len(), "accessions left unresolved");
    }

    let records: Vec<MetadataRecord> = accessions
        .iter()
        .filter_map(|acc| resolution.records.get(acc).cloned())
        .collect();
    match args.output {
        Some(path) => write_metadata_file(&records, config.output_format, &path)?,
        None => write_records(&records, config.output_format, io::stdout().lock())?,
    }
    Ok(())
}

fn run_classify(args: ClassifyArgs, output_mode: OutputMode) -> miette::Result<()> {
    let items: Vec<Classification> = args
        .accessions
        .iter()
        .map(|accession| Classification {
            accession: accession.clone(),
            title: args.title.clone(),
            pattern: classify_by_pattern(accession),
            signals: classify_by_signals(args.title.as_deref(), accession),
        })
        .collect();
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_classifications(&items).into_diagnostic()?,
        OutputMode::Interactive => print_classification_table(&items),
    }
    Ok(())
}

fn run_inventory(args: InventoryArgs) -> miette::Result<()> {
    let summaries = inventory(args.directory.as_std_path())?;
    let records: Vec<MetadataRecord> = summaries.iter().map(|summary| summary.to_record()).collect();
    match args.output {
        Some(path) => {
            let file = File::create(path.as_std_path()).into_diagnostic()?;
            write_records(&records, args.format, file)?;
        }
        None => write_records(&records, args.format, io::stdout().lock())?,
    }
    Ok(())
}
