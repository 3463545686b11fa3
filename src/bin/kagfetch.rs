use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use kagfetch::app::{App, FetchOptions, FetchResult};
use kagfetch::config::{ConfigLoader, DEFAULT_DESTINATION, ResolvedConfig};
use kagfetch::credentials::Credentials;
use kagfetch::domain::DatasetSpecifier;
use kagfetch::error::FetchError;
use kagfetch::kaggle::KaggleHttpClient;
use kagfetch::output::{JsonOutput, OutputMode};
use kagfetch::progress::ProgressReporter;
use kagfetch::store::Store;

#[derive(Parser)]
#[command(name = "kagfetch")]
#[command(about = "Fetch Kaggle competition and dataset archives into a local data directory")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    non_interactive: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Fetch datasets (default when no subcommand is given)")]
    Fetch(FetchArgs),
}

#[derive(Args, Clone, Default)]
struct FetchArgs {
    /// `competition:<slug>` or `dataset:<owner>/<name>`; reads kagfetch.json when omitted
    specifier: Option<String>,

    #[arg(long)]
    config: Option<String>,

    /// Data root directory (default from config, else `data`)
    #[arg(long)]
    dest: Option<String>,

    /// Keep the downloaded archive in the data root after extraction
    #[arg(long)]
    keep_archive: bool,

    #[arg(long)]
    dry_run: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(fetch) = report.downcast_ref::<FetchError>() {
            return ExitCode::from(map_exit_code(fetch));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &FetchError) -> u8 {
    match error {
        FetchError::MissingConfig
        | FetchError::ConfigRead(_)
        | FetchError::ConfigParse(_)
        | FetchError::InvalidSpecifier(_)
        | FetchError::InvalidCompetitionSlug(_)
        | FetchError::InvalidDatasetRef(_)
        | FetchError::CredentialsMissing(_)
        | FetchError::CredentialsInvalid(_)
        | FetchError::Unauthorized { .. } => 2,
        FetchError::Http(_) | FetchError::Status { .. } => 3,
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
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    let args = match cli.command {
        Some(Commands::Fetch(args)) => args,
        None => FetchArgs::default(),
    };
    run_fetch(args, output_mode)
}

fn run_fetch(args: FetchArgs, output_mode: OutputMode) -> miette::Result<()> {
    let specifier = args
        .specifier
        .map(|value| value.parse::<DatasetSpecifier>())
        .transpose()
        .into_diagnostic()?;

    let resolved_config: Option<ResolvedConfig> = if specifier.is_none() {
        ConfigLoader::resolve(args.config.as_deref())
            .into_diagnostic()
            .map(Some)?
    } else {
        None
    };

    let data_root = args
        .dest
        .map(Utf8PathBuf::from)
        .or_else(|| {
            resolved_config
                .as_ref()
                .map(|config| config.destination.clone())
        })
        .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_DESTINATION));
    let store = Store::new(data_root);

    // Credentials resolve before anything touches the filesystem.
    let credentials = Credentials::resolve().into_diagnostic()?;
    let client = KaggleHttpClient::new(credentials).into_diagnostic()?;
    let app = App::new(store, client);

    let fetch_options = FetchOptions {
        keep_archive: args.keep_archive
            || resolved_config
                .as_ref()
                .map(|config| config.keep_archive)
                .unwrap_or(false),
        dry_run: args.dry_run,
    };

    match output_mode {
        OutputMode::NonInteractive => {
            let result = app
                .fetch(
                    specifier,
                    resolved_config.as_ref(),
                    fetch_options,
                    &JsonOutput,
                )
                .into_diagnostic()?;
            JsonOutput::print_fetch(&result).into_diagnostic()?;
            Ok(())
        }
        OutputMode::Interactive => {
            let reporter = ProgressReporter::new();
            let result = app.fetch(specifier, resolved_config.as_ref(), fetch_options, &reporter);
            reporter.finish();
            let result = result.into_diagnostic()?;
            print_fetch_summary(&result);
            Ok(())
        }
    }
}

fn print_fetch_summary(result: &FetchResult) {
    let green = "\x1b[32m";
    let cyan = "\x1b[36m";
    let reset = "\x1b[0m";

    println!("{cyan}kagfetch: {} dataset(s){reset}", result.items.len());
    for item in &result.items {
        println!(
            "{green}  ✔ {} {} -> {} ({}){reset}",
            item.dataset_type, item.id, item.destination, item.action
        );
        if let Some(path) = &item.archive_path {
            println!("    archive kept: {path}");
        }
    }
}
