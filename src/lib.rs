mod status;

use status::normalize::UnmarkedTimezone;
use status::publish::{EmptyServicePolicy, DEFAULT_AGGREGATE_LIMIT, DEFAULT_BASE_URL};
use status::{default_sources, generate, RunOptions, RunReport};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Publishes Apple system status as static RSS feeds.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory the feeds are written under
    #[arg(long, env = "STATUS_RSS_OUTPUT_DIR", default_value = "rss")]
    output_dir: PathBuf,

    /// Offset assumed for posted dates without a zone suffix
    #[arg(long, value_enum, default_value_t = TimezoneArg::Utc)]
    unmarked_timezone: TimezoneArg,

    /// What to write for services with no events
    #[arg(long, value_enum, default_value_t = EmptyServicesArg::Skip)]
    empty_services: EmptyServicesArg,

    /// Maximum entries in each aggregate feed
    #[arg(long, default_value_t = DEFAULT_AGGREGATE_LIMIT)]
    aggregate_limit: usize,

    /// Link used when a service has no URL of its own
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Also write `<slug>-status.rss` for the first service whose name contains
    /// this text
    #[arg(long)]
    spotlight: Option<String>,

    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum TimezoneArg {
    Utc,
    Pdt,
    Pst,
}

impl From<TimezoneArg> for UnmarkedTimezone {
    fn from(arg: TimezoneArg) -> Self {
        match arg {
            TimezoneArg::Utc => Self::Utc,
            TimezoneArg::Pdt => Self::Pdt,
            TimezoneArg::Pst => Self::Pst,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum EmptyServicesArg {
    Skip,
    Placeholder,
}

impl From<EmptyServicesArg> for EmptyServicePolicy {
    fn from(arg: EmptyServicesArg) -> Self {
        match arg {
            EmptyServicesArg::Skip => Self::Skip,
            EmptyServicesArg::Placeholder => Self::Placeholder,
        }
    }
}

impl Cli {
    fn run_options(&self) -> RunOptions {
        RunOptions {
            output_dir: self.output_dir.clone(),
            unmarked_timezone: self.unmarked_timezone.into(),
            empty_services: self.empty_services.into(),
            aggregate_limit: self.aggregate_limit,
            base_url: self.base_url.clone(),
            spotlight: self.spotlight.clone().filter(|text| !text.trim().is_empty()),
        }
    }
}

fn init_logging(format: LogFormat) {
    let filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

fn log_summary(report: &RunReport) {
    tracing::info!(
        written = report.written.len(),
        overwritten = report.overwritten.len(),
        failed_writes = report.failed_writes.len(),
        failed_sources = report.failed_sources.len(),
        "generated rss feeds"
    );
    for path in &report.written {
        tracing::info!(path = %path.display(), "feed written");
    }
    for path in &report.overwritten {
        tracing::warn!(path = %path.display(), "feed overwritten by a later service");
    }
    for (path, error) in &report.failed_writes {
        tracing::warn!(path = %path.display(), %error, "feed not written");
    }
    for (url, error) in &report.failed_sources {
        tracing::warn!(%url, %error, "source unavailable");
    }
}

pub fn run() -> ExitCode {
    let _ = dotenvy::from_filename(".env.local");
    let cli = Cli::parse();
    init_logging(cli.log_format);

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            tracing::error!(%error, "failed to start runtime");
            return ExitCode::FAILURE;
        }
    };
    let client = match reqwest::Client::builder().user_agent(USER_AGENT).build() {
        Ok(client) => client,
        Err(error) => {
            tracing::error!(%error, "failed to build http client");
            return ExitCode::FAILURE;
        }
    };

    let options = cli.run_options();
    let now = chrono::Utc::now();
    match runtime.block_on(generate(&client, &default_sources(), &options, now)) {
        Ok(report) => {
            log_summary(&report);
            ExitCode::SUCCESS
        }
        Err(error) => {
            tracing::error!(%error, "no status data could be fetched");
            ExitCode::FAILURE
        }
    }
}
