use std::path::PathBuf;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use aviset::bing::BingHttpClient;
use aviset::classify::{ClassifierClient, HttpClassifierClient};
use aviset::collector::{Collector, CollectorOptions};
use aviset::config::{load_species, resolve_api_key};
use aviset::dataset::{prune_invalid, split_train_test};
use aviset::domain::Category;
use aviset::downloader::{Downloader, HttpImageFetcher};
use aviset::error::AvisetError;
use aviset::store::Store;

#[derive(Parser)]
#[command(name = "aviset")]
#[command(about = "Collect, download and split bird image datasets")]
#[command(version, author)]
struct Cli {
    /// Root directory holding urls/ and images/ (defaults to the current directory)
    #[arg(long, global = true)]
    root: Option<Utf8PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Collect image URLs for every species (resumable)")]
    Collect(CollectArgs),
    #[command(about = "Download collected URLs into per-species directories")]
    Download(DownloadArgs),
    #[command(about = "Delete files that fail to decode as images")]
    Prune,
    #[command(about = "Move images into train/ and test/ subsets (destructive)")]
    Split(SplitArgs),
    #[command(about = "Classify a local image against the model service")]
    Classify(ClassifyArgs),
}

#[derive(Args)]
struct CollectArgs {
    /// CSV file with a header line and the species name in the first field
    #[arg(long, default_value = "austrian_birds.csv")]
    species_file: PathBuf,

    /// Search API key (falls back to AVISET_API_KEY)
    #[arg(long)]
    api_key: Option<String>,

    /// Maximum URLs to collect per species
    #[arg(long, default_value_t = 1950)]
    max_per_species: u64,
}

#[derive(Args)]
struct DownloadArgs {
    #[arg(long, default_value = "austrian_birds.csv")]
    species_file: PathBuf,
}

#[derive(Args)]
struct SplitArgs {
    /// Fraction of images moved into the test set
    #[arg(long, default_value_t = 0.2)]
    test_fraction: f64,
}

#[derive(Args)]
struct ClassifyArgs {
    image: Utf8PathBuf,

    /// Classification service endpoint
    #[arg(long)]
    endpoint: String,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<AvisetError>() {
            return ExitCode::from(err.exit_code());
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let store = match cli.root {
        Some(root) => Store::new_with_root(root),
        None => Store::new().into_diagnostic()?,
    };

    match cli.command {
        Commands::Collect(args) => run_collect(args, store),
        Commands::Download(args) => run_download(args, store),
        Commands::Prune => {
            let report = prune_invalid(&store.images_root()).into_diagnostic()?;
            println!(
                "checked {} images, removed {}",
                report.checked, report.removed
            );
            Ok(())
        }
        Commands::Split(args) => {
            let report =
                split_train_test(&store.images_root(), args.test_fraction).into_diagnostic()?;
            println!(
                "split {} species: {} train / {} test",
                report.categories, report.train, report.test
            );
            Ok(())
        }
        Commands::Classify(args) => {
            let classifier = HttpClassifierClient::new(args.endpoint).into_diagnostic()?;
            let label = classifier.classify(&args.image).into_diagnostic()?;
            println!("I think this is a: {label}");
            Ok(())
        }
    }
}

fn run_collect(args: CollectArgs, store: Store) -> miette::Result<()> {
    let api_key = resolve_api_key(args.api_key).into_diagnostic()?;
    let species = load_species(&args.species_file).into_diagnostic()?;

    let client = BingHttpClient::new(api_key).into_diagnostic()?;
    let options = CollectorOptions {
        max_per_category: args.max_per_species,
        ..CollectorOptions::default()
    };
    let collector = Collector::new(store, client, options);

    // A provider error only aborts that species; partial progress stays in
    // the ledger and the next invocation resumes from it. The first error
    // is kept so the exit code reflects its class.
    let mut failed = Vec::new();
    let mut first_err = None;
    for category in &species {
        match collector.collect(category) {
            Ok(report) => println!(
                "{}: {} of {} urls ({} calls)",
                report.category, report.collected, report.declared_max, report.calls
            ),
            Err(err) => {
                warn!(category = %category, error = %err, "collection failed");
                failed.push(category.clone());
                first_err.get_or_insert(err);
            }
        }
    }

    match first_err {
        None => Ok(()),
        Some(err) => {
            eprintln!(
                "collection failed for {} species: {}",
                failed.len(),
                join_categories(&failed)
            );
            Err(err.into())
        }
    }
}

fn run_download(args: DownloadArgs, store: Store) -> miette::Result<()> {
    let species = load_species(&args.species_file).into_diagnostic()?;
    let fetcher = HttpImageFetcher::new().into_diagnostic()?;
    let downloader = Downloader::new(store, fetcher);

    let mut failed = Vec::new();
    let mut first_err = None;
    for category in &species {
        match downloader.download_category(category) {
            Ok(report) => println!(
                "{}: {} downloaded, {} placeholders, {} skipped, {} dropped",
                category, report.downloaded, report.placeholders, report.skipped, report.dropped
            ),
            Err(err) => {
                warn!(category = %category, error = %err, "download failed");
                failed.push(category.clone());
                first_err.get_or_insert(err);
            }
        }
    }

    match first_err {
        None => Ok(()),
        Some(err) => {
            eprintln!(
                "download failed for {} species: {}",
                failed.len(),
                join_categories(&failed)
            );
            Err(err.into())
        }
    }
}

fn join_categories(categories: &[Category]) -> String {
    categories
        .iter()
        .map(|category| category.as_str().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
