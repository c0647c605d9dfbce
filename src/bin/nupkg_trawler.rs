use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use async_trait::async_trait;
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use nupkg_trawler::app::{App, ClearResult, FetchResult, ListResult, ReportResult, SearchResult};
use nupkg_trawler::config::{ConfigLoader, ResolvedConfig};
use nupkg_trawler::domain::SearchTerm;
use nupkg_trawler::error::TrawlError;
use nupkg_trawler::output::{JsonOutput, OutputMode};
use nupkg_trawler::registry::{HttpRegistryClient, RegistryClient};
use nupkg_trawler::store::DownloadStore;

#[derive(Parser)]
#[command(name = "nupkg-trawler")]
#[command(about = "Sweep a NuGet-style registry for matching packages and pull their archives")]
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
    #[command(about = "Search the registry without downloading anything")]
    Search(SearchArgs),
    #[command(about = "Search the registry and download every matching archive")]
    Fetch(SearchArgs),
    #[command(about = "Search, download, and write a JSON summary report")]
    Report(ReportArgs),
    #[command(about = "List archives in the download store")]
    List(StoreArgs),
    #[command(about = "Remove the download store")]
    Clear(StoreArgs),
}

#[derive(Args, Clone)]
struct SearchArgs {
    terms: Vec<String>,

    #[arg(long)]
    ignore: Vec<String>,

    #[arg(long)]
    page_size: Option<u32>,

    #[arg(long)]
    concurrency: Option<usize>,

    #[arg(long)]
    max_retries: Option<u32>,

    #[arg(long)]
    download_dir: Option<String>,

    #[arg(long)]
    strict: bool,
}

#[derive(Args, Clone)]
struct ReportArgs {
    terms: Vec<String>,

    #[arg(long)]
    ignore: Vec<String>,

    #[arg(long)]
    page_size: Option<u32>,

    #[arg(long)]
    concurrency: Option<usize>,

    #[arg(long)]
    max_retries: Option<u32>,

    #[arg(long)]
    download_dir: Option<String>,

    #[arg(long)]
    strict: bool,

    #[arg(long, default_value = "nupkg-report.json")]
    out: String,
}

#[derive(Args, Clone)]
struct StoreArgs {
    #[arg(long)]
    download_dir: Option<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(trawl) = report.downcast_ref::<TrawlError>() {
            return ExitCode::from(map_exit_code(trawl));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &TrawlError) -> u8 {
    match error {
        TrawlError::InvalidPackageId(_)
        | TrawlError::InvalidSearchTerm(_)
        | TrawlError::NoSearchTerms
        | TrawlError::ConfigRead(_)
        | TrawlError::ConfigParse(_) => 2,
        TrawlError::RegistryHttp(_)
        | TrawlError::RegistryStatus { .. }
        | TrawlError::SearchParse(_)
        | TrawlError::QueryFailed { .. } => 3,
        _ => 1,
    }
}

#[tokio::main]
async fn run() -> miette::Result<()> {
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
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Search(args) => run_search(args, config_path, output_mode).await,
        Commands::Fetch(args) => run_fetch(args, config_path, output_mode).await,
        Commands::Report(args) => run_report(args, config_path, output_mode).await,
        Commands::List(args) => run_list(args, config_path, output_mode),
        Commands::Clear(args) => run_clear(args, config_path, output_mode),
    }
}

struct RunPlan {
    config: ResolvedConfig,
    terms: Vec<SearchTerm>,
    ignore: Vec<String>,
}

fn resolve_run(config_path: Option<&str>, args: &SearchArgs) -> miette::Result<RunPlan> {
    let mut config = ConfigLoader::resolve(config_path).into_diagnostic()?;

    if let Some(page_size) = args.page_size {
        config.page_size = page_size;
    }
    if let Some(concurrency) = args.concurrency {
        config.query_concurrency = concurrency;
        config.download_concurrency = concurrency;
    }
    if let Some(max_retries) = args.max_retries {
        config.max_retries = max_retries;
    }
    if let Some(dir) = &args.download_dir {
        config.download_dir = Some(Utf8PathBuf::from(dir));
    }
    if args.strict {
        config.strict = true;
    }

    let terms = if args.terms.is_empty() {
        config.search_terms.clone()
    } else {
        args.terms
            .iter()
            .map(|value| value.parse::<SearchTerm>())
            .collect::<Result<Vec<_>, TrawlError>>()
            .into_diagnostic()?
    };
    if terms.is_empty() {
        return Err(TrawlError::NoSearchTerms).into_diagnostic();
    }

    let mut ignore = config.ignore.clone();
    ignore.extend(args.ignore.iter().cloned());

    Ok(RunPlan {
        config,
        terms,
        ignore,
    })
}

fn build_store(config: &ResolvedConfig) -> miette::Result<DownloadStore> {
    match &config.download_dir {
        Some(dir) => Ok(DownloadStore::new_with_root(dir.clone())),
        None => DownloadStore::new().into_diagnostic(),
    }
}

async fn run_search(
    args: SearchArgs,
    config_path: Option<&str>,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let plan = resolve_run(config_path, &args)?;
    let store = build_store(&plan.config)?;
    let client = Arc::new(HttpRegistryClient::new().into_diagnostic()?);
    let app = App::new(client, store, &plan.config);

    let result = app.search(&plan.terms, &plan.ignore).await.into_diagnostic()?;
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_search(&result).into_diagnostic(),
        OutputMode::Interactive => {
            print_search_summary(&result);
            Ok(())
        }
    }
}

async fn run_fetch(
    args: SearchArgs,
    config_path: Option<&str>,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let plan = resolve_run(config_path, &args)?;
    let store = build_store(&plan.config)?;
    let client = Arc::new(HttpRegistryClient::new().into_diagnostic()?);
    let app = App::new(client, store, &plan.config);

    let result = app.fetch(&plan.terms, &plan.ignore).await.into_diagnostic()?;
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_fetch(&result).into_diagnostic(),
        OutputMode::Interactive => {
            print_fetch_summary(&result);
            Ok(())
        }
    }
}

async fn run_report(
    args: ReportArgs,
    config_path: Option<&str>,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let search_args = SearchArgs {
        terms: args.terms,
        ignore: args.ignore,
        page_size: args.page_size,
        concurrency: args.concurrency,
        max_retries: args.max_retries,
        download_dir: args.download_dir,
        strict: args.strict,
    };
    let plan = resolve_run(config_path, &search_args)?;
    let store = build_store(&plan.config)?;
    let client = Arc::new(HttpRegistryClient::new().into_diagnostic()?);
    let app = App::new(client, store, &plan.config);

    let out = Utf8PathBuf::from(args.out);
    let result = app
        .report(&plan.terms, &plan.ignore, &out)
        .await
        .into_diagnostic()?;
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_report(&result).into_diagnostic(),
        OutputMode::Interactive => {
            print_report_summary(&result);
            Ok(())
        }
    }
}

fn run_list(
    args: StoreArgs,
    config_path: Option<&str>,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let app = store_only_app(config_path, args.download_dir.as_deref())?;
    let result = app.list().into_diagnostic()?;
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_list(&result).into_diagnostic(),
        OutputMode::Interactive => {
            print_list_summary(&result);
            Ok(())
        }
    }
}

fn run_clear(
    args: StoreArgs,
    config_path: Option<&str>,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let app = store_only_app(config_path, args.download_dir.as_deref())?;
    let result = app.clear().into_diagnostic()?;
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_clear(&result).into_diagnostic(),
        OutputMode::Interactive => {
            print_clear_summary(&result);
            Ok(())
        }
    }
}

fn store_only_app(
    config_path: Option<&str>,
    download_dir: Option<&str>,
) -> miette::Result<App<NopRegistry>> {
    let mut config = ConfigLoader::resolve(config_path).into_diagnostic()?;
    if let Some(dir) = download_dir {
        config.download_dir = Some(Utf8PathBuf::from(dir));
    }
    let store = build_store(&config)?;
    Ok(App::new(Arc::new(NopRegistry), store, &config))
}

struct NopRegistry;

#[async_trait]
impl RegistryClient for NopRegistry {
    async fn get_text(&self, _url: &str) -> Result<String, TrawlError> {
        Err(TrawlError::RegistryHttp(
            "registry client not configured".to_string(),
        ))
    }

    async fn download_file(&self, _url: &str, _destination: &Path) -> Result<(), TrawlError> {
        Err(TrawlError::RegistryHttp(
            "registry client not configured".to_string(),
        ))
    }
}

const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

fn print_search_summary(result: &SearchResult) {
    println!(
        "{CYAN}🔍 {} package(s) for {}{RESET}",
        result.total,
        result.terms.join(", ")
    );
    for row in &result.packages {
        let downloads = row
            .total_downloads
            .map(|count| format!(" · {count} downloads"))
            .unwrap_or_default();
        println!("{CYAN}• {} {}{downloads}{RESET}", row.id, row.version);
        if let Some(description) = &row.description {
            println!("   {description}");
        }
    }
}

fn print_fetch_summary(result: &FetchResult) {
    println!("{CYAN}📦 nupkg-trawler summary{RESET}");
    println!("{GREEN}✅ Downloaded: {}{RESET}", result.downloaded);
    if result.failed > 0 {
        println!("{RED}✖ Failed: {}{RESET}", result.failed);
    } else {
        println!("{YELLOW}⚠️ Failed: 0{RESET}");
    }

    for item in &result.items {
        match &item.local_path {
            Some(path) => {
                println!("{GREEN}⬇️ {} {}{RESET}", item.id, item.version);
                println!("{GREEN}   📁 {path}{RESET}");
            }
            None => {
                println!("{RED}✖ {} {} (download failed){RESET}", item.id, item.version);
            }
        }
    }
}

fn print_report_summary(result: &ReportResult) {
    println!("{CYAN}🧾 report written: {}{RESET}", result.report_path);
    println!(
        "{GREEN}✅ {} discovered, {} downloaded{RESET}",
        result.discovered, result.downloaded
    );
    if result.failed > 0 {
        println!("{RED}✖ {} failed{RESET}", result.failed);
    }
}

fn print_list_summary(result: &ListResult) {
    println!(
        "{CYAN}🗃️ {} archive(s) in {}{RESET}",
        result.archives.len(),
        result.store_root
    );
    for archive in &result.archives {
        println!("• {archive}");
    }
}

fn print_clear_summary(result: &ClearResult) {
    println!("{GREEN}🧹 cleared {}{RESET}", result.store_root);
}
