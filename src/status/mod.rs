pub mod feed;
pub mod normalize;
pub mod publish;
pub mod writer;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use feed::fetcher::{fetch_status, FetchError};
use feed::parser::{parse_status_payload, ExtractError};
use normalize::{normalize_service, Service, UnmarkedTimezone};
use publish::slug::slugify;
use publish::{
    build_aggregate_feed, build_missing_spotlight_feed, build_service_feed, build_spotlight_feed,
    EmptyServicePolicy, FeedContext, FeedDocument, DEFAULT_AGGREGATE_LIMIT, DEFAULT_BASE_URL,
};
use writer::write_feed;

pub const DEVELOPER_STATUS_URL: &str =
    "https://www.apple.com/support/systemstatus/data/developer/system_status_en_US.js";
pub const GENERAL_STATUS_URL: &str =
    "https://www.apple.com/support/systemstatus/data/system_status_en_US.js";
const DEFAULT_CALLBACK: &str = "jsonCallback";
const MASTER_AGGREGATE_FILE: &str = "all-apple-services.rss";

/// One upstream status endpoint and where its feeds go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSource {
    pub url: String,
    pub callback: Option<String>,
    pub kind: String,
    pub directory: String,
    pub aggregate_file: String,
    pub aggregate_title: String,
}

pub fn default_sources() -> Vec<StatusSource> {
    vec![
        StatusSource {
            url: DEVELOPER_STATUS_URL.to_string(),
            callback: Some(DEFAULT_CALLBACK.to_string()),
            kind: "Developer".to_string(),
            directory: "developer".to_string(),
            aggregate_file: "all-developer-services.rss".to_string(),
            aggregate_title: "All Developer Services".to_string(),
        },
        StatusSource {
            url: GENERAL_STATUS_URL.to_string(),
            callback: Some(DEFAULT_CALLBACK.to_string()),
            kind: "System".to_string(),
            directory: "general".to_string(),
            aggregate_file: "all-system-services.rss".to_string(),
            aggregate_title: "All System Services".to_string(),
        },
    ]
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub output_dir: PathBuf,
    pub unmarked_timezone: UnmarkedTimezone,
    pub empty_services: EmptyServicePolicy,
    pub aggregate_limit: usize,
    pub base_url: String,
    pub spotlight: Option<String>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("rss"),
            unmarked_timezone: UnmarkedTimezone::default(),
            empty_services: EmptyServicePolicy::default(),
            aggregate_limit: DEFAULT_AGGREGATE_LIMIT,
            base_url: DEFAULT_BASE_URL.to_string(),
            spotlight: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Extract(#[from] ExtractError),
}

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("could not load any of the {0} status sources")]
    AllSourcesFailed(usize),
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub written: Vec<PathBuf>,
    /// Paths written again in the same run after a slug collision.
    pub overwritten: Vec<PathBuf>,
    pub failed_writes: Vec<(PathBuf, String)>,
    pub failed_sources: Vec<(String, String)>,
}

struct LoadedSource<'a> {
    source: &'a StatusSource,
    services: Vec<Service>,
}

pub async fn load_source(
    client: &reqwest::Client,
    source: &StatusSource,
    now: DateTime<Utc>,
    fallback: UnmarkedTimezone,
) -> Result<Vec<Service>, SourceError> {
    let fetched = fetch_status(client, &source.url).await?;
    tracing::debug!(
        url = %source.url,
        content_type = fetched.content_type.as_deref().unwrap_or("unknown"),
        bytes = fetched.body.len(),
        "fetched status payload"
    );
    let payload = parse_status_payload(&fetched.body, source.callback.as_deref())?;

    Ok(payload
        .services
        .into_iter()
        .map(|raw| normalize_service(raw, now, fallback))
        .collect())
}

/// Fetches every source once and writes all feeds under `options.output_dir`.
///
/// `now` is the only clock reading used; it stands in for missing dates and
/// placeholder entries. Fails only when no source could be loaded.
pub async fn generate(
    client: &reqwest::Client,
    sources: &[StatusSource],
    options: &RunOptions,
    now: DateTime<Utc>,
) -> Result<RunReport, RunError> {
    let mut report = RunReport::default();
    let mut loaded = Vec::with_capacity(sources.len());

    for source in sources {
        tracing::info!(kind = %source.kind, url = %source.url, "fetching system status");
        match load_source(client, source, now, options.unmarked_timezone).await {
            Ok(services) => {
                tracing::info!(kind = %source.kind, services = services.len(), "loaded services");
                loaded.push(LoadedSource { source, services });
            }
            Err(error) => {
                tracing::error!(
                    kind = %source.kind,
                    url = %source.url,
                    %error,
                    "skipping status source"
                );
                report.failed_sources.push((source.url.clone(), error.to_string()));
            }
        }
    }

    if loaded.is_empty() {
        return Err(RunError::AllSourcesFailed(sources.len()));
    }

    for entry in &loaded {
        publish_source(entry, options, now, &mut report);
    }

    if sources.len() > 1 && loaded.len() == sources.len() {
        let all_services: Vec<Service> = loaded
            .iter()
            .flat_map(|entry| entry.services.iter().cloned())
            .collect();
        let ctx = FeedContext::new("All", options.base_url.clone());
        let doc = build_aggregate_feed(
            &all_services,
            "All Apple Services",
            &ctx,
            options.aggregate_limit,
            options.empty_services,
            now,
        );
        publish(&doc, &options.output_dir.join(MASTER_AGGREGATE_FILE), &mut report);
    }

    if let Some(wanted) = options.spotlight.as_deref() {
        publish_spotlight(wanted, &loaded, options, now, &mut report);
    }

    Ok(report)
}

fn publish_source(
    entry: &LoadedSource<'_>,
    options: &RunOptions,
    now: DateTime<Utc>,
    report: &mut RunReport,
) {
    let directory = options.output_dir.join(&entry.source.directory);
    let ctx = FeedContext::new(entry.source.kind.clone(), options.base_url.clone());
    let mut seen_slugs = HashSet::new();

    for service in &entry.services {
        let Some(doc) = build_service_feed(service, &ctx, options.empty_services, now) else {
            tracing::debug!(service = %service.name, "no events, skipping feed");
            continue;
        };
        let slug = slugify(&service.name);
        if !seen_slugs.insert(slug.clone()) {
            tracing::warn!(
                service = %service.name,
                %slug,
                "slug collision, earlier feed is overwritten"
            );
        }
        publish(&doc, &directory.join(format!("{slug}.rss")), report);
    }

    let doc = build_aggregate_feed(
        &entry.services,
        &entry.source.aggregate_title,
        &ctx,
        options.aggregate_limit,
        options.empty_services,
        now,
    );
    publish(&doc, &directory.join(&entry.source.aggregate_file), report);
}

fn publish_spotlight(
    wanted: &str,
    loaded: &[LoadedSource<'_>],
    options: &RunOptions,
    now: DateTime<Utc>,
    report: &mut RunReport,
) {
    let path = options.output_dir.join(format!("{}-status.rss", slugify(wanted)));
    let found = loaded.iter().find_map(|entry| {
        entry
            .services
            .iter()
            .find(|service| service.name.contains(wanted))
            .map(|service| (entry.source, service))
    });

    let doc = match found {
        Some((source, service)) => {
            let ctx = FeedContext::new(source.kind.clone(), options.base_url.clone());
            build_spotlight_feed(service, &ctx, options.empty_services, now)
        }
        None => {
            tracing::warn!(spotlight = wanted, "no service matches spotlight");
            let kind = loaded.first().map(|entry| entry.source.kind.clone()).unwrap_or_default();
            let ctx = FeedContext::new(kind, options.base_url.clone());
            build_missing_spotlight_feed(wanted, &ctx, options.empty_services, now)
        }
    };

    if let Some(doc) = doc {
        publish(&doc, &path, report);
    }
}

fn publish(doc: &FeedDocument, path: &Path, report: &mut RunReport) {
    match write_feed(doc, path) {
        Ok(()) => {
            tracing::debug!(path = %path.display(), entries = doc.entries.len(), "wrote feed");
            if report.written.iter().any(|written| written == path) {
                report.overwritten.push(path.to_path_buf());
            } else {
                report.written.push(path.to_path_buf());
            }
        }
        Err(error) => {
            tracing::error!(path = %path.display(), %error, "failed to write feed");
            report.failed_writes.push((path.to_path_buf(), error.to_string()));
        }
    }
}
