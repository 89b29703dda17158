pub mod slug;

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::normalize::{EventStatus, Service, StatusEvent};

pub const DEFAULT_BASE_URL: &str = "https://www.apple.com/support/systemstatus/";
pub const DEFAULT_AGGREGATE_LIMIT: usize = 50;
const FEED_LANGUAGE: &str = "en";
const FINGERPRINT_LEN: usize = 16;

/// What to publish for a service that currently has no events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EmptyServicePolicy {
    /// Write nothing for the service.
    #[default]
    Skip,
    /// Write one "all systems operational" entry.
    Placeholder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedEntry {
    pub id: String,
    pub title: String,
    pub link: String,
    pub published_at: DateTime<Utc>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedDocument {
    pub title: String,
    pub link: String,
    pub description: String,
    pub language: String,
    pub entries: Vec<FeedEntry>,
}

/// Feed family label ("Developer", "System", "All") and the fallback link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedContext {
    pub kind: String,
    pub base_url: String,
}

impl FeedContext {
    pub fn new(kind: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            base_url: base_url.into(),
        }
    }

    fn document(
        &self,
        title: String,
        description: String,
        entries: Vec<FeedEntry>,
    ) -> FeedDocument {
        FeedDocument {
            title,
            link: self.base_url.clone(),
            description,
            language: FEED_LANGUAGE.to_string(),
            entries,
        }
    }
}

pub fn build_service_feed(
    service: &Service,
    ctx: &FeedContext,
    policy: EmptyServicePolicy,
    now: DateTime<Utc>,
) -> Option<FeedDocument> {
    let title = format!("Apple {} Status – {}", ctx.kind, service.name);
    service_document(service, title, ctx, policy, now)
}

/// Single-service feed published under the aggregate naming.
pub fn build_spotlight_feed(
    service: &Service,
    ctx: &FeedContext,
    policy: EmptyServicePolicy,
    now: DateTime<Utc>,
) -> Option<FeedDocument> {
    let title = format!("Apple {} System Status – {}", ctx.kind, service.name);
    service_document(service, title, ctx, policy, now)
}

/// Stand-in for a spotlight target that is missing from every source.
pub fn build_missing_spotlight_feed(
    wanted: &str,
    ctx: &FeedContext,
    policy: EmptyServicePolicy,
    now: DateTime<Utc>,
) -> Option<FeedDocument> {
    if policy == EmptyServicePolicy::Skip {
        return None;
    }
    let entry = FeedEntry {
        id: format!("{wanted}-not-found"),
        title: format!("{wanted} status not found"),
        link: ctx.base_url.clone(),
        published_at: now,
        description: format!("No {wanted} entry found in the system status feed."),
    };
    Some(ctx.document(
        format!("Apple {} System Status – {}", ctx.kind, wanted),
        format!("Latest updates for Apple {wanted}"),
        vec![entry],
    ))
}

fn service_document(
    service: &Service,
    title: String,
    ctx: &FeedContext,
    policy: EmptyServicePolicy,
    now: DateTime<Utc>,
) -> Option<FeedDocument> {
    let link = service.url.clone().unwrap_or_else(|| ctx.base_url.clone());
    let entries = if service.events.is_empty() {
        match policy {
            EmptyServicePolicy::Skip => return None,
            EmptyServicePolicy::Placeholder => vec![FeedEntry {
                id: format!("{}-no-events", service.name),
                title: format!("🟢 {}: All systems operational", service.name),
                link,
                published_at: now,
                description: format!("No current issues reported for {}", service.name),
            }],
        }
    } else {
        let mut events: Vec<&StatusEvent> = service.events.iter().collect();
        sort_newest_first(&mut events);
        let entries = events
            .into_iter()
            .map(|event| build_entry(event, &service.name, &link));
        dedup_by_id(entries).collect()
    };

    let description = format!("Latest updates for {}", service.name);
    Some(ctx.document(title, description, entries))
}

/// Newest events across `services`, each linked back to the service it came from.
pub fn build_aggregate_feed(
    services: &[Service],
    title_suffix: &str,
    ctx: &FeedContext,
    limit: usize,
    policy: EmptyServicePolicy,
    now: DateTime<Utc>,
) -> FeedDocument {
    let mut events: Vec<StatusEvent> = services
        .iter()
        .flat_map(|service| {
            service
                .events
                .iter()
                .map(move |event| event.clone().with_origin(service))
        })
        .collect();
    events.sort_by(|left, right| right.published_at.cmp(&left.published_at));

    let entries = events.iter().map(|event| {
        let (name, link) = match &event.origin {
            Some(origin) => (
                origin.service_name.as_str(),
                origin.url.clone().unwrap_or_else(|| ctx.base_url.clone()),
            ),
            None => ("", ctx.base_url.clone()),
        };
        build_entry(event, name, &link)
    });
    let mut entries: Vec<FeedEntry> = dedup_by_id(entries).take(limit).collect();

    if entries.is_empty() && policy == EmptyServicePolicy::Placeholder {
        entries.push(FeedEntry {
            id: format!("all-{}-services-operational", ctx.kind.to_lowercase()),
            title: format!("🟢 All {} services operational", ctx.kind),
            link: ctx.base_url.clone(),
            published_at: now,
            description: format!("No current issues reported for any {} services", ctx.kind),
        });
    }

    ctx.document(
        format!("Apple {} System Status – {}", ctx.kind, title_suffix),
        format!("Latest updates for all Apple {} services", ctx.kind),
        entries,
    )
}

pub fn status_glyph(status: &EventStatus) -> &'static str {
    match status {
        EventStatus::Resolved => "🟢",
        EventStatus::Ongoing => "🟠",
        EventStatus::Other(_) => "🔴",
    }
}

/// `{service}-{messageId}-{epoch}`; events carrying neither get a content
/// fingerprint in the last slot instead.
pub fn entry_id(service_name: &str, event: &StatusEvent) -> String {
    if event.message_id.is_none() && event.epoch_start.is_none() {
        return format!("{service_name}--{}", event_fingerprint(event));
    }
    format!(
        "{service_name}-{}-{}",
        event.message_id.as_deref().unwrap_or_default(),
        event
            .epoch_start
            .map(|millis| millis.to_string())
            .unwrap_or_default()
    )
}

pub fn describe_event(event: &StatusEvent) -> String {
    let mut parts = Vec::new();

    match (&event.start_date, &event.end_date) {
        (Some(start), Some(end)) if event.event_status == EventStatus::Resolved => {
            parts.push(format!("Started: {start}"));
            parts.push(format!("Ended: {end}"));
        }
        (Some(start), _) => parts.push(format!("Started: {start}")),
        _ => {}
    }
    if let Some(message) = &event.message {
        parts.push(message.clone());
    }
    if let Some(users) = &event.users_affected {
        parts.push(users.clone());
    }
    if !event.affected_services.is_empty() {
        parts.push(format!(
            "Affected Services: {}",
            event.affected_services.join(", ")
        ));
    }

    parts.join("\n\n")
}

fn event_fingerprint(event: &StatusEvent) -> String {
    let mut hasher = Sha256::new();
    for field in [
        Some(event.status_type.as_str()),
        Some(event.event_status.as_str()),
        event.date_posted.as_deref(),
        event.start_date.as_deref(),
        event.end_date.as_deref(),
        event.message.as_deref(),
    ] {
        hasher.update(field.unwrap_or_default().as_bytes());
        hasher.update(b"::");
    }
    let bytes = hasher.finalize();
    let mut digest = format!("{bytes:x}");
    digest.truncate(FINGERPRINT_LEN);
    digest
}

fn build_entry(event: &StatusEvent, service_name: &str, link: &str) -> FeedEntry {
    FeedEntry {
        id: entry_id(service_name, event),
        title: format!(
            "{} {}: {} ({})",
            status_glyph(&event.event_status),
            service_name,
            event.status_type,
            event.event_status.as_str()
        ),
        link: link.to_string(),
        published_at: event.published_at,
        description: describe_event(event),
    }
}

/// Keeps the first entry for each id, so callers sort before deduplicating.
fn dedup_by_id(entries: impl Iterator<Item = FeedEntry>) -> impl Iterator<Item = FeedEntry> {
    let mut seen = HashSet::new();
    entries.filter(move |entry| {
        let fresh = seen.insert(entry.id.clone());
        if !fresh {
            tracing::debug!(id = %entry.id, "dropping duplicate entry");
        }
        fresh
    })
}

fn sort_newest_first(events: &mut [&StatusEvent]) {
    events.sort_by(|left, right| right.published_at.cmp(&left.published_at));
}
