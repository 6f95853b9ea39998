use std::collections::BTreeMap;
use std::io;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use kira_genome_catalog::catalog::{Catalog, DatasetRequest, ReleaseFilter, SourceRef};
use kira_genome_catalog::config::ConfigLoader;
use kira_genome_catalog::domain::{DatasetStatus, ReleaseId, parse_uuid};
use kira_genome_catalog::error::CatalogError;
use kira_genome_catalog::output::JsonOutput;
use kira_genome_catalog::seed::SeedDocument;
use kira_genome_catalog::service;

#[derive(Parser)]
#[command(name = "kira-gc")]
#[command(about = "Genome metadata catalog: datasets, lineage and releases")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Create the catalog schema")]
    Init,
    #[command(about = "Load reference data from a JSON seed document")]
    Load { path: Utf8PathBuf },
    #[command(about = "Register and move datasets")]
    Dataset(DatasetArgs),
    #[command(about = "Drive the release lifecycle")]
    Release(ReleaseArgs),
    #[command(about = "Read-only lookups")]
    Query(QueryArgs),
    #[command(about = "Answer JSON requests from stdin, one per line")]
    Serve,
}

#[derive(Args)]
struct DatasetArgs {
    #[command(subcommand)]
    command: DatasetCommand,
}

#[derive(Subcommand)]
enum DatasetCommand {
    #[command(about = "Register a dataset for a genome")]
    Create(CreateArgs),
    #[command(about = "Change dataset status")]
    Transition { dataset: String, status: DatasetStatus },
    #[command(about = "Make a dataset the current one of its lineage")]
    Attach {
        genome: String,
        dataset: String,
        #[arg(long)]
        release: Option<i64>,
    },
    #[command(about = "Spawn child datasets for every child type")]
    Children { dataset: String },
    #[command(about = "Show a dataset and its status history")]
    Show { dataset: String },
}

#[derive(Args)]
struct CreateArgs {
    #[arg(long)]
    genome: String,
    #[arg(long = "type")]
    dataset_type: String,
    #[arg(long)]
    source_type: String,
    #[arg(long)]
    source_name: String,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    version: Option<String>,
    #[arg(long)]
    label: Option<String>,
    #[arg(long)]
    parent: Option<String>,
    /// name=value, repeatable
    #[arg(long = "attribute")]
    attributes: Vec<String>,
}

#[derive(Args)]
struct ReleaseArgs {
    #[command(subcommand)]
    command: ReleaseCommand,
}

#[derive(Subcommand)]
enum ReleaseCommand {
    #[command(about = "Planned -> Preparing")]
    Prepare { release: i64 },
    #[command(about = "Preparing -> Prepared")]
    Prepared { release: i64 },
    #[command(about = "Prepared -> Released")]
    Publish {
        release: i64,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    #[command(about = "Make the release current for its site")]
    Promote { release: i64 },
}

#[derive(Args)]
struct QueryArgs {
    #[command(subcommand)]
    command: QueryCommand,
}

#[derive(Subcommand)]
enum QueryCommand {
    Genome { genome: String },
    Datasets { genome: String },
    Current { genome: String },
    Eligibility { genome: String },
    Releases {
        #[arg(long = "site")]
        sites: Vec<String>,
        #[arg(long = "label")]
        labels: Vec<String>,
        #[arg(long)]
        current_only: bool,
    },
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<CatalogError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &CatalogError) -> u8 {
    match error {
        CatalogError::NotFound { .. } | CatalogError::MissingConfig(_) => 2,
        CatalogError::ConcurrentUpdate { .. } => 4,
        err if err.is_validation() => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ConfigLoader::resolve(cli.config.as_deref())?;
    let mut catalog = Catalog::open(config)?;

    match cli.command {
        Commands::Init => print(&serde_json::json!({
            "database": catalog.config().database_path,
        })),
        Commands::Load { path } => {
            let document = SeedDocument::from_path(&path)?;
            print(&catalog.load_seed(&document)?)
        }
        Commands::Dataset(args) => run_dataset(&mut catalog, args.command),
        Commands::Release(args) => run_release(&mut catalog, args.command),
        Commands::Query(args) => run_query(&catalog, args.command),
        Commands::Serve => {
            let stdin = io::stdin().lock();
            let stdout = io::stdout().lock();
            service::serve(&mut catalog, stdin, stdout)?;
            Ok(())
        }
    }
}

fn run_dataset(catalog: &mut Catalog, command: DatasetCommand) -> miette::Result<()> {
    match command {
        DatasetCommand::Create(args) => {
            let request = DatasetRequest {
                genome_uuid: parse_uuid(&args.genome)?,
                dataset_type: args.dataset_type,
                name: args.name,
                version: args.version,
                label: args.label,
                source: SourceRef {
                    source_type: args.source_type,
                    name: args.source_name,
                },
                parent: args.parent.as_deref().map(parse_uuid).transpose()?,
                attributes: parse_attributes(&args.attributes)?,
            };
            print(&catalog.create_dataset(&request)?)
        }
        DatasetCommand::Transition { dataset, status } => {
            print(&catalog.transition_dataset(&parse_uuid(&dataset)?, status)?)
        }
        DatasetCommand::Attach {
            genome,
            dataset,
            release,
        } => print(&catalog.attach_dataset(
            &parse_uuid(&genome)?,
            &parse_uuid(&dataset)?,
            release.map(ReleaseId),
        )?),
        DatasetCommand::Children { dataset } => {
            print(&catalog.create_child_datasets(&parse_uuid(&dataset)?)?)
        }
        DatasetCommand::Show { dataset } => {
            let uuid = parse_uuid(&dataset)?;
            print(&serde_json::json!({
                "dataset": catalog.dataset(&uuid)?,
                "history": catalog.status_history(&uuid)?,
                "releases": catalog.releases_for_dataset(&uuid)?,
            }))
        }
    }
}

fn run_release(catalog: &mut Catalog, command: ReleaseCommand) -> miette::Result<()> {
    match command {
        ReleaseCommand::Prepare { release } => {
            print(&catalog.prepare_release(ReleaseId(release))?)
        }
        ReleaseCommand::Prepared { release } => print(&catalog.mark_prepared(ReleaseId(release))?),
        ReleaseCommand::Publish { release, date } => {
            print(&catalog.publish_release(ReleaseId(release), date)?)
        }
        ReleaseCommand::Promote { release } => {
            print(&catalog.promote_release(ReleaseId(release))?)
        }
    }
}

fn run_query(catalog: &Catalog, command: QueryCommand) -> miette::Result<()> {
    match command {
        QueryCommand::Genome { genome } => print(&catalog.genome(&parse_uuid(&genome)?)?),
        QueryCommand::Datasets { genome } => {
            print(&catalog.datasets_for_genome(&parse_uuid(&genome)?)?)
        }
        QueryCommand::Current { genome } => {
            print(&catalog.current_datasets(&parse_uuid(&genome)?)?)
        }
        QueryCommand::Eligibility { genome } => {
            print(&catalog.eligibility_report(&parse_uuid(&genome)?)?)
        }
        QueryCommand::Releases {
            sites,
            labels,
            current_only,
        } => print(&catalog.releases(&ReleaseFilter {
            site_names: sites,
            labels,
            current_only,
        })?),
    }
}

fn parse_attributes(values: &[String]) -> miette::Result<BTreeMap<String, String>> {
    values
        .iter()
        .map(|value| match value.split_once('=') {
            Some((name, value)) => Ok((name.trim().to_string(), value.trim().to_string())),
            None => Err(miette::miette!("attribute must be name=value, got {value:?}")),
        })
        .collect()
}

fn print<T: Serialize>(value: &T) -> miette::Result<()> {
    JsonOutput::print(value).into_diagnostic()
}
