use std::path::{Path, PathBuf};

use rss::{Channel, Guid, Item};

use super::publish::FeedDocument;

#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("failed to render rss: {0}")]
    Render(#[from] rss::Error),
    #[error("rendered rss is not well-formed xml: {0}")]
    InvalidXml(String),
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub fn render_rss(doc: &FeedDocument) -> Result<Vec<u8>, WriteError> {
    let items: Vec<Item> = doc
        .entries
        .iter()
        .map(|entry| {
            let mut guid = Guid::default();
            guid.set_value(entry.id.clone());
            guid.set_permalink(false);

            let mut item = Item::default();
            item.set_title(entry.title.clone());
            item.set_link(entry.link.clone());
            item.set_description(entry.description.clone());
            item.set_guid(guid);
            item.set_pub_date(entry.published_at.to_rfc2822());
            item
        })
        .collect();

    let mut channel = Channel::default();
    channel.set_title(doc.title.clone());
    channel.set_link(doc.link.clone());
    channel.set_description(doc.description.clone());
    channel.set_language(doc.language.clone());
    // Derived from content so identical input renders identical bytes.
    if let Some(newest) = doc.entries.iter().map(|entry| entry.published_at).max() {
        channel.set_last_build_date(newest.to_rfc2822());
    }
    channel.set_items(items);

    let rendered = channel.pretty_write_to(Vec::new(), b' ', 2)?;
    let text = std::str::from_utf8(&rendered)
        .map_err(|error| WriteError::InvalidXml(error.to_string()))?;
    roxmltree::Document::parse(text).map_err(|error| WriteError::InvalidXml(error.to_string()))?;

    Ok(rendered)
}

/// Renders `doc` and replaces whatever is at `path`.
pub fn write_feed(doc: &FeedDocument, path: &Path) -> Result<(), WriteError> {
    let rendered = render_rss(doc)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| WriteError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, rendered).map_err(|source| WriteError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::publish::FeedEntry;
    use chrono::{TimeZone, Utc};

    fn sample_document() -> FeedDocument {
        FeedDocument {
            title: "Apple Developer Status – App Attest".to_string(),
            link: "https://www.apple.com/support/systemstatus/".to_string(),
            description: "Latest updates for App Attest".to_string(),
            language: "en".to_string(),
            entries: vec![
                FeedEntry {
                    id: "App Attest-1-1718280000000".to_string(),
                    title: "🟢 App Attest: Outage (resolved)".to_string(),
                    link: "https://developer.apple.com/system-status/".to_string(),
                    published_at: Utc.with_ymd_and_hms(2025, 6, 13, 8, 0, 0).unwrap(),
                    description: "Started: 06/13/2025\n\nUsers <all> & more".to_string(),
                },
                FeedEntry {
                    id: "App Attest-0-1718200000000".to_string(),
                    title: "🟢 App Attest: Maintenance (resolved)".to_string(),
                    link: "https://developer.apple.com/system-status/".to_string(),
                    published_at: Utc.with_ymd_and_hms(2025, 6, 12, 9, 0, 0).unwrap(),
                    description: "Done.".to_string(),
                },
            ],
        }
    }

    #[test]
    fn rendered_rss_reads_back_with_feed_parser() {
        let rendered = render_rss(&sample_document()).expect("render should succeed");
        let parsed = feed_rs::parser::parse(rendered.as_slice()).expect("rss must parse");

        assert_eq!(parsed.feed_type, feed_rs::model::FeedType::RSS2);
        assert_eq!(parsed.entries.len(), 2);
        assert_eq!(parsed.entries[0].id, "App Attest-1-1718280000000");
        assert_eq!(
            parsed.entries[0].published,
            Some(Utc.with_ymd_and_hms(2025, 6, 13, 8, 0, 0).unwrap())
        );
        let summary = parsed.entries[0].summary.as_ref().expect("description expected");
        assert!(summary.content.starts_with("Started: 06/13/2025"));
    }

    #[test]
    fn rendering_is_deterministic_and_uses_newest_entry_as_build_date() {
        let first = render_rss(&sample_document()).expect("render should succeed");
        let second = render_rss(&sample_document()).expect("render should succeed");
        assert_eq!(first, second);

        let text = String::from_utf8(first).expect("utf-8 output");
        assert!(text.contains("<lastBuildDate>Fri, 13 Jun 2025 08:00:00 +0000</lastBuildDate>"));
        assert!(text.contains("isPermaLink=\"false\""));
        assert!(text.contains("<language>en</language>"));
    }

    #[test]
    fn write_feed_creates_directories_and_overwrites() {
        let dir = tempfile::tempdir().expect("tempdir should exist");
        let path = dir.path().join("developer").join("app-attest.rss");

        write_feed(&sample_document(), &path).expect("first write should succeed");
        let mut smaller = sample_document();
        smaller.entries.truncate(1);
        write_feed(&smaller, &path).expect("second write should succeed");

        let bytes = std::fs::read(&path).expect("file should exist");
        let parsed = feed_rs::parser::parse(bytes.as_slice()).expect("rss must parse");
        assert_eq!(parsed.entries.len(), 1);
    }

    #[test]
    fn write_feed_reports_io_failures() {
        let dir = tempfile::tempdir().expect("tempdir should exist");
        let blocker = dir.path().join("general");
        std::fs::write(&blocker, b"not a directory").expect("blocker file should be written");

        let result = write_feed(&sample_document(), &blocker.join("icloud.rss"));
        assert!(matches!(result, Err(WriteError::Io { .. })));
    }
}
