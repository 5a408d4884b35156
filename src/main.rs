use std::path::{Path, PathBuf};
use std::{env, io};

use anyhow::Context;
use clap::{CommandFactory, Parser};
use clap_complete::{generate, Shell};
use idps_crawler::{CrawlReport, Crawler, CrawlerConfig, HttpFetcher, RunOptions, Task};
use idps_csv::{CsvStore, CsvWriterConfig, FileMode};
use tokio::runtime;

/// Recursive web crawls extracting typed records
#[derive(Debug, Parser)]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub cmd: SubCommand,
}

#[derive(Debug, clap::Subcommand)]
pub enum SubCommand {
    Run(RunArgs),
    Test(TestArgs),
    Export(ExportArgs),
    /// Print a sample task definition
    Example,
    #[command(hide = true)]
    Completion,
}

/// Crawl a task and store its records as CSV
#[derive(Debug, clap::Args)]
pub struct RunArgs {
    /// Path to the yaml task definition
    #[arg(long, short)]
    pub task: PathBuf,
    /// CSV file receiving the records, stdout when absent
    #[arg(long, short)]
    pub output: Option<PathBuf>,
    /// How an existing output file is handled
    #[arg(value_enum, long, default_value = "create")]
    pub file_mode: OutputMode,
    /// Maximum number of fetched pages
    #[arg(long, short)]
    pub limit: Option<usize>,
    /// Crawl without storing anything
    #[arg(long)]
    pub no_persist: bool,
    /// Optional default crawler yaml configuration file
    #[arg(env = "IDPS_CRAWLER_CONFIG", long)]
    pub crawler_config: Option<PathBuf>,
    /// Override crawler's user agent
    #[arg(long)]
    pub user_agent: Option<String>,
    /// Override crawler's maximum concurrent page downloads
    #[arg(long)]
    pub concurrent_downloads: Option<usize>,
    /// Override crawler's per request timeout
    #[arg(long)]
    pub timeout_secs: Option<u64>,
    /// No SIGINT handling, Ctrl-C aborts without draining downloads
    #[arg(long)]
    pub no_sigint: bool,
    /// When quiet no logs are outputted
    #[arg(long, short)]
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputMode {
    Create,
    Append,
    Truncate,
}

impl From<OutputMode> for FileMode {
    fn from(mode: OutputMode) -> Self {
        match mode {
            OutputMode::Create => FileMode::Create,
            OutputMode::Append => FileMode::Append,
            OutputMode::Truncate => FileMode::Truncate,
        }
    }
}

impl TryFrom<&RunArgs> for CrawlerConfig {
    type Error = anyhow::Error;

    fn try_from(args: &RunArgs) -> Result<Self, Self::Error> {
        let mut conf = if let Some(path) = &args.crawler_config {
            serde_yaml::from_reader(fs_err::File::open(path)?)?
        } else {
            CrawlerConfig {
                handle_sigint: true,
                ..Default::default()
            }
        };
        if let Some(user_agent) = &args.user_agent {
            conf.user_agent = user_agent.to_string();
        }
        if let Some(concurrent_downloads) = args.concurrent_downloads {
            conf.concurrent_downloads = concurrent_downloads;
        }
        if let Some(timeout_secs) = args.timeout_secs {
            conf.timeout_secs = Some(timeout_secs);
        }
        if args.no_sigint {
            conf.handle_sigint = false;
        }
        Ok(conf)
    }
}

fn load_task(path: &Path) -> anyhow::Result<Task> {
    let file = fs_err::File::open(path)?;
    serde_yaml::from_reader(file).with_context(|| format!("Invalid task {}", path.display()))
}

fn summary(task: &Task, report: &CrawlReport) {
    eprintln!(
        "{}: {} records from {} pages ({} failed)",
        task.name,
        report.records.len(),
        report.fetched,
        report.failed_fetches,
    );
    for e in &report.fetch_errors {
        eprintln!("  fetch: {e}");
    }
    for e in &report.extraction_errors {
        eprintln!("  extraction: {e}");
    }
    for e in &report.persistence_errors {
        eprintln!("  persistence: {e}");
    }
    if report.stopped {
        eprintln!("  stopped before the frontier was exhausted");
    }
}

pub fn run(args: RunArgs) -> anyhow::Result<()> {
    let crawler_conf = CrawlerConfig::try_from(&args)?;
    let task = load_task(&args.task)?;
    let csv_conf = CsvWriterConfig::default();
    let store = match &args.output {
        Some(path) => CsvStore::create(&csv_conf, path, args.file_mode.into())
            .with_context(|| format!("Couldn't open {}", path.display()))?,
        None => CsvStore::stdout(&csv_conf),
    };

    let fetcher = HttpFetcher::new(&crawler_conf)?;
    let crawler = Crawler::new(crawler_conf, fetcher).with_store(store);
    let opts = RunOptions::new(args.limit, !args.no_persist);

    let rt = runtime::Builder::new_multi_thread().enable_all().build()?;
    let report = rt.block_on(crawler.run_with(&task, opts))?;
    summary(&task, &report);
    Ok(())
}

/// Fetch a single page of a task and print its records as JSON lines
#[derive(Debug, clap::Args)]
pub struct TestArgs {
    /// Path to the yaml task definition
    #[arg(long, short)]
    pub task: PathBuf,
    /// Custom user agent to download the page
    #[arg(long)]
    pub user_agent: Option<String>,
}

pub fn test(args: TestArgs) -> anyhow::Result<()> {
    let task = load_task(&args.task)?;
    let mut conf = CrawlerConfig::default();
    if let Some(user_agent) = args.user_agent {
        conf.user_agent = user_agent;
    }

    let fetcher = HttpFetcher::new(&conf)?;
    let crawler = Crawler::new(conf, fetcher);
    let rt = runtime::Builder::new_current_thread().enable_all().build()?;
    let report = rt.block_on(crawler.test(&task))?;

    for record in &report.records {
        println!("{}", serde_json::to_string(record)?);
    }
    summary(&task, &report);
    Ok(())
}

/// Validate a task definition and print it back
#[derive(Debug, clap::Args)]
pub struct ExportArgs {
    /// Path to the yaml task definition
    #[arg(long, short)]
    pub task: PathBuf,
}

pub fn export(args: ExportArgs) -> anyhow::Result<()> {
    let task = load_task(&args.task)?;
    task.validate()?;
    print!("{}", task.export()?);
    Ok(())
}

/// The user's `RUST_LOG` when set, `default` otherwise.
fn log_filter(default: &str) -> String {
    env::var("RUST_LOG").unwrap_or_else(|_| default.to_string())
}

fn init_logger(default: &str) {
    env_logger::Builder::new()
        .parse_filters(&log_filter(default))
        .init();
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    match args.cmd {
        SubCommand::Run(args) => {
            if !args.quiet {
                init_logger("idps_crawler=warn,idps_csv=warn");
            }
            run(args)
        }
        SubCommand::Test(args) => {
            init_logger("idps_crawler=info");
            test(args)
        }
        SubCommand::Export(args) => export(args),
        SubCommand::Example => {
            print!("{}", Task::example().export()?);
            Ok(())
        }
        SubCommand::Completion => {
            generate(Shell::Bash, &mut Args::command(), "idps", &mut io::stdout());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn user_log_filter_wins() {
        env::set_var("RUST_LOG", "idps_crawler=trace");
        assert_eq!("idps_crawler=trace", log_filter("idps_crawler=info"));

        env::remove_var("RUST_LOG");
        assert_eq!("idps_crawler=info", log_filter("idps_crawler=info"));
    }

    #[test]
    fn flags_override_defaults() {
        let args = Args::parse_from([
            "idps",
            "run",
            "--task",
            "task.yaml",
            "--concurrent-downloads",
            "8",
            "--no-sigint",
        ]);
        let SubCommand::Run(args) = args.cmd else {
            panic!("expected run");
        };
        let conf = CrawlerConfig::try_from(&args).unwrap();

        assert_eq!(8, conf.concurrent_downloads);
        assert!(!conf.handle_sigint);
        assert_eq!("IDPSbot", conf.user_agent);
    }
}
