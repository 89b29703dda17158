use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::feed::types::{RawEvent, RawService};

pub const UNKNOWN_SERVICE: &str = "Unknown Service";
const DEFAULT_STATUS_TYPE: &str = "Issue";
const DEFAULT_EVENT_STATUS: &str = "unknown";
const POSTED_LAYOUTS: [&str; 2] = ["%m/%d/%Y %H:%M", "%m/%d/%Y %H:%M:%S"];

/// Offset applied to a posted date that carries no zone suffix.
///
/// The upstream feed is inconsistent here, so this is a run option rather
/// than a guess baked into the parser.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnmarkedTimezone {
    #[default]
    Utc,
    Pdt,
    Pst,
}

impl UnmarkedTimezone {
    fn offset_hours(self) -> i32 {
        match self {
            Self::Utc => 0,
            Self::Pdt => -7,
            Self::Pst => -8,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DateParseError {
    #[error("unknown timezone suffix: {0}")]
    UnknownZone(String),
    #[error("date does not match any known layout: {0}")]
    Layout(String),
    #[error("offset out of range: {0} hours")]
    Offset(i32),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventStatus {
    Resolved,
    Ongoing,
    Other(String),
}

impl EventStatus {
    pub fn from_label(label: Option<&str>) -> Self {
        match label {
            Some("resolved") => Self::Resolved,
            Some("ongoing") => Self::Ongoing,
            Some(other) => Self::Other(other.to_string()),
            None => Self::Other(DEFAULT_EVENT_STATUS.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Resolved => "resolved",
            Self::Ongoing => "ongoing",
            Self::Other(label) => label,
        }
    }
}

/// Where an event came from, attached once it leaves its service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventOrigin {
    pub service_name: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub message_id: Option<String>,
    pub status_type: String,
    pub event_status: EventStatus,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub date_posted: Option<String>,
    pub epoch_start: Option<i64>,
    pub message: Option<String>,
    pub users_affected: Option<String>,
    pub affected_services: Vec<String>,
    pub published_at: DateTime<Utc>,
    pub origin: Option<EventOrigin>,
}

impl StatusEvent {
    pub fn with_origin(mut self, service: &Service) -> Self {
        self.origin = Some(EventOrigin {
            service_name: service.name.clone(),
            url: service.url.clone(),
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    pub url: Option<String>,
    pub events: Vec<StatusEvent>,
}

pub fn normalize_service(
    raw: RawService,
    now: DateTime<Utc>,
    fallback: UnmarkedTimezone,
) -> Service {
    let events = raw
        .events
        .into_iter()
        .map(|event| normalize_event(event, now, fallback))
        .collect();

    Service {
        name: non_empty(raw.service_name).unwrap_or_else(|| UNKNOWN_SERVICE.to_string()),
        url: non_empty(raw.redirect_url),
        events,
    }
}

pub fn normalize_event(
    raw: RawEvent,
    now: DateTime<Utc>,
    fallback: UnmarkedTimezone,
) -> StatusEvent {
    let date_posted = non_empty(raw.date_posted);
    let published_at =
        resolve_published_at(date_posted.as_deref(), raw.epoch_start_date, now, fallback);
    let affected_services = raw
        .affected_services
        .into_iter()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect();

    StatusEvent {
        message_id: non_empty(raw.message_id),
        status_type: non_empty(raw.status_type).unwrap_or_else(|| DEFAULT_STATUS_TYPE.to_string()),
        event_status: EventStatus::from_label(non_empty(raw.event_status).as_deref()),
        start_date: non_empty(raw.start_date),
        end_date: non_empty(raw.end_date),
        date_posted,
        epoch_start: raw.epoch_start_date,
        message: non_empty(raw.message),
        users_affected: non_empty(raw.users_affected),
        affected_services,
        published_at,
        origin: None,
    }
}

/// Picks the publish instant for an event. Never fails.
///
/// Order: the posted date, then a non-zero epoch in milliseconds, then `now`.
/// A posted date that is present but unreadable resolves to `now`.
pub fn resolve_published_at(
    posted: Option<&str>,
    epoch_ms: Option<i64>,
    now: DateTime<Utc>,
    fallback: UnmarkedTimezone,
) -> DateTime<Utc> {
    if let Some(posted) = posted {
        return match parse_posted_date(posted, fallback) {
            Ok(instant) => instant,
            Err(error) => {
                tracing::debug!(posted, %error, "falling back to fetch time");
                now
            }
        };
    }

    match epoch_ms {
        Some(millis) if millis != 0 => Utc.timestamp_millis_opt(millis).single().unwrap_or(now),
        _ => now,
    }
}

pub fn parse_posted_date(
    posted: &str,
    fallback: UnmarkedTimezone,
) -> Result<DateTime<Utc>, DateParseError> {
    let trimmed = posted.trim();
    let (body, offset_hours) = match trimmed.rsplit_once(char::is_whitespace) {
        Some((body, suffix)) if suffix.chars().all(|c| c.is_ascii_alphabetic()) => {
            (body.trim_end(), zone_offset_hours(suffix)?)
        }
        _ => (trimmed, fallback.offset_hours()),
    };

    let naive = POSTED_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(body, layout).ok())
        .ok_or_else(|| DateParseError::Layout(body.to_string()))?;
    let offset = FixedOffset::east_opt(offset_hours * 3600)
        .ok_or(DateParseError::Offset(offset_hours))?;

    offset
        .from_local_datetime(&naive)
        .single()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| DateParseError::Layout(body.to_string()))
}

fn zone_offset_hours(suffix: &str) -> Result<i32, DateParseError> {
    match suffix.to_ascii_uppercase().as_str() {
        "PDT" => Ok(-7),
        "PST" => Ok(-8),
        "UTC" | "GMT" | "Z" => Ok(0),
        _ => Err(DateParseError::UnknownZone(suffix.to_string())),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetch_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 20, 12, 0, 0).unwrap()
    }

    #[test]
    fn posted_date_with_pdt_suffix_is_seven_hours_behind_utc() {
        let parsed = parse_posted_date("06/13/2025 01:00 PDT", UnmarkedTimezone::Utc)
            .expect("pdt should parse");
        assert_eq!(parsed, Utc.with_ymd_and_hms(2025, 6, 13, 8, 0, 0).unwrap());

        let parsed = parse_posted_date("01/02/2025 23:30 PST", UnmarkedTimezone::Utc)
            .expect("pst should parse");
        assert_eq!(parsed, Utc.with_ymd_and_hms(2025, 1, 3, 7, 30, 0).unwrap());
    }

    #[test]
    fn unmarked_posted_date_follows_configured_policy() {
        let posted = "06/15/2025 09:10";
        let as_utc = parse_posted_date(posted, UnmarkedTimezone::Utc).expect("should parse");
        let as_pdt = parse_posted_date(posted, UnmarkedTimezone::Pdt).expect("should parse");
        let as_pst = parse_posted_date(posted, UnmarkedTimezone::Pst).expect("should parse");

        assert_eq!(as_utc, Utc.with_ymd_and_hms(2025, 6, 15, 9, 10, 0).unwrap());
        assert_eq!(as_pdt, Utc.with_ymd_and_hms(2025, 6, 15, 16, 10, 0).unwrap());
        assert_eq!(as_pst, Utc.with_ymd_and_hms(2025, 6, 15, 17, 10, 0).unwrap());
    }

    #[test]
    fn unknown_suffix_is_an_error() {
        let result = parse_posted_date("06/13/2025 01:00 CEST", UnmarkedTimezone::Utc);
        assert!(matches!(result, Err(DateParseError::UnknownZone(zone)) if zone == "CEST"));
    }

    #[test]
    fn resolution_prefers_posted_then_epoch_then_now() {
        let now = fetch_time();
        let posted =
            resolve_published_at(Some("06/13/2025 01:00 UTC"), Some(1), now, UnmarkedTimezone::Utc);
        assert_eq!(posted, Utc.with_ymd_and_hms(2025, 6, 13, 1, 0, 0).unwrap());

        let epoch = resolve_published_at(None, Some(1_718_280_000_000), now, UnmarkedTimezone::Utc);
        assert_eq!(epoch, Utc.with_ymd_and_hms(2024, 6, 13, 12, 0, 0).unwrap());

        assert_eq!(resolve_published_at(None, Some(0), now, UnmarkedTimezone::Utc), now);
        assert_eq!(resolve_published_at(None, None, now, UnmarkedTimezone::Utc), now);
    }

    #[test]
    fn unreadable_posted_date_degrades_to_now() {
        let now = fetch_time();
        let resolved = resolve_published_at(
            Some("yesterday-ish"),
            Some(1_718_280_000_000),
            now,
            UnmarkedTimezone::Utc,
        );
        assert_eq!(resolved, now);
    }

    #[test]
    fn normalize_event_fills_defaults_and_drops_empty_strings() {
        let raw = RawEvent {
            message_id: Some(" ".to_string()),
            date_posted: Some(String::new()),
            epoch_start_date: Some(1_718_280_000_000),
            message: Some("Investigating.".to_string()),
            affected_services: vec!["Mail".to_string(), "".to_string()],
            ..RawEvent::default()
        };
        let event = normalize_event(raw, fetch_time(), UnmarkedTimezone::Utc);

        assert_eq!(event.message_id, None);
        assert_eq!(event.status_type, "Issue");
        assert_eq!(event.event_status, EventStatus::Other("unknown".to_string()));
        assert_eq!(event.date_posted, None);
        assert_eq!(event.published_at, Utc.with_ymd_and_hms(2024, 6, 13, 12, 0, 0).unwrap());
        assert_eq!(event.affected_services, vec!["Mail".to_string()]);
        assert!(event.origin.is_none());
    }

    #[test]
    fn normalize_service_defaults_name_and_keeps_event_order() {
        let raw = RawService {
            service_name: None,
            redirect_url: Some(String::new()),
            events: vec![
                RawEvent {
                    message_id: Some("b".to_string()),
                    ..RawEvent::default()
                },
                RawEvent {
                    message_id: Some("a".to_string()),
                    ..RawEvent::default()
                },
            ],
        };
        let service = normalize_service(raw, fetch_time(), UnmarkedTimezone::Utc);

        assert_eq!(service.name, UNKNOWN_SERVICE);
        assert_eq!(service.url, None);
        let ids: Vec<_> = service
            .events
            .iter()
            .filter_map(|event| event.message_id.as_deref())
            .collect();
        assert_eq!(ids, vec!["b", "a"]);
    }
}
