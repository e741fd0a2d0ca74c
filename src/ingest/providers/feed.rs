// src/ingest/providers/feed.rs
//! RSS / Atom feed adapter.
//!
//! The payload is scanned once with a namespace-agnostic event reader. If any
//! `item` element exists the feed is treated as RSS, otherwise `entry` elements
//! are read as Atom. Only the first `max_items` raw elements are considered;
//! elements without a title or a canonicalizable link are dropped.

use async_trait::async_trait;
use metrics::{counter, histogram};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::canonical::{canonicalize, source_host};
use crate::config::FeedSource;
use crate::error::{CurateError, Result};
use crate::fetch::Fetcher;
use crate::ingest::types::{CandidateRecord, Origin, SourceProvider};
use crate::ingest::{normalize_text, parse_timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedKind {
    Rss,
    Atom,
}

/// Direct child of an item/entry, with its attributes and (XML-unescaped) text.
#[derive(Debug, Default)]
struct Child {
    name: String,
    attrs: Vec<(String, String)>,
    parts: Vec<String>,
}

impl Child {
    fn text(&self) -> String {
        normalize_text(&self.parts.join(" "))
    }

    fn first_part(&self) -> String {
        self.parts
            .iter()
            .map(|p| normalize_text(p))
            .find(|p| !p.is_empty())
            .unwrap_or_default()
    }

    fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Default)]
struct RawEntry {
    children: Vec<Child>,
    images: Vec<String>,
}

impl RawEntry {
    fn first_of(&self, names: &[&str]) -> Option<&Child> {
        self.children
            .iter()
            .find(|c| names.contains(&c.name.as_str()))
    }

    fn text_of(&self, names: &[&str]) -> String {
        self.first_of(names).map(Child::text).unwrap_or_default()
    }
}

#[derive(Debug, Default)]
struct Scan {
    items: Vec<RawEntry>,
    entries: Vec<RawEntry>,
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn attributes(e: &BytesStart<'_>) -> Vec<(String, String)> {
    e.attributes()
        .flatten()
        .map(|a| {
            let key = String::from_utf8_lossy(a.key.local_name().as_ref()).into_owned();
            let raw = String::from_utf8_lossy(&a.value);
            (key, html_escape::decode_html_entities(&raw).trim().to_string())
        })
        .collect()
}

/// Image URL carried by media:thumbnail, media:content or an image enclosure.
fn image_hint(name: &str, attrs: &[(String, String)]) -> Option<String> {
    let get = |k: &str| attrs.iter().find(|(ak, _)| ak == k).map(|(_, v)| v.as_str());
    let is_image = get("medium") == Some("image")
        || get("type").is_some_and(|t| t.starts_with("image/"));
    let raw = match name {
        "thumbnail" => get("url"),
        "content" if is_image => get("url"),
        "enclosure" if is_image => get("url"),
        _ => None,
    }?;
    canonicalize(raw)
}

fn scan(xml: &str) -> std::result::Result<Scan, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    let mut out = Scan::default();
    let mut depth = 0usize;
    // (kind, entry, depth of the item/entry element)
    let mut current: Option<(FeedKind, RawEntry, usize)> = None;
    let mut capturing: Option<usize> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                depth += 1;
                let name = local_name(&e);
                match current.as_mut() {
                    None if name == "item" => {
                        current = Some((FeedKind::Rss, RawEntry::default(), depth));
                    }
                    None if name == "entry" => {
                        current = Some((FeedKind::Atom, RawEntry::default(), depth));
                    }
                    None => {}
                    Some((_, entry, at)) => {
                        let attrs = attributes(&e);
                        if let Some(img) = image_hint(&name, &attrs) {
                            entry.images.push(img);
                        }
                        if depth == *at + 1 {
                            entry.children.push(Child {
                                name,
                                attrs,
                                parts: Vec::new(),
                            });
                            capturing = Some(entry.children.len() - 1);
                        }
                    }
                }
            }
            Event::Empty(e) => {
                if let Some((_, entry, at)) = current.as_mut() {
                    let name = local_name(&e);
                    let attrs = attributes(&e);
                    if let Some(img) = image_hint(&name, &attrs) {
                        entry.images.push(img);
                    }
                    if depth == *at {
                        entry.children.push(Child {
                            name,
                            attrs,
                            parts: Vec::new(),
                        });
                    }
                }
            }
            Event::Text(t) => {
                if let (Some((_, entry, _)), Some(idx)) = (current.as_mut(), capturing) {
                    let raw = String::from_utf8_lossy(&t);
                    let text = html_escape::decode_html_entities(&raw).into_owned();
                    if !text.trim().is_empty() {
                        entry.children[idx].parts.push(text);
                    }
                }
            }
            Event::CData(c) => {
                if let (Some((_, entry, _)), Some(idx)) = (current.as_mut(), capturing) {
                    let text = String::from_utf8_lossy(&c).into_owned();
                    if !text.trim().is_empty() {
                        entry.children[idx].parts.push(text);
                    }
                }
            }
            Event::End(_) => {
                let closes_entry = matches!(current, Some((_, _, at)) if at == depth);
                if closes_entry {
                    if let Some((kind, entry, _)) = current.take() {
                        match kind {
                            FeedKind::Rss => out.items.push(entry),
                            FeedKind::Atom => out.entries.push(entry),
                        }
                    }
                    capturing = None;
                } else if matches!(current, Some((_, _, at)) if depth == at + 1) {
                    capturing = None;
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(out)
}

fn categories(entry: &RawEntry, kind: FeedKind) -> Vec<String> {
    entry
        .children
        .iter()
        .filter(|c| c.name == "category" || c.name == "tag")
        .map(|c| match kind {
            FeedKind::Atom => c
                .attr("term")
                .filter(|t| !t.is_empty())
                .map(normalize_text)
                .unwrap_or_else(|| c.text()),
            FeedKind::Rss => c.text(),
        })
        .filter(|t| !t.is_empty())
        .collect()
}

fn rss_link(entry: &RawEntry) -> String {
    entry
        .first_of(&["link"])
        .map(|c| {
            let text = c.text();
            if text.is_empty() {
                c.attr("href").unwrap_or_default().to_string()
            } else {
                text
            }
        })
        .unwrap_or_default()
}

fn atom_link(entry: &RawEntry) -> String {
    entry
        .children
        .iter()
        .find(|c| {
            c.name == "link"
                && matches!(c.attr("rel"), None | Some("") | Some("alternate"))
                && c.attr("href").is_some_and(|h| !h.is_empty())
        })
        .and_then(|c| c.attr("href"))
        .unwrap_or_default()
        .to_string()
}

fn to_candidate(
    source: &FeedSource,
    entry: &RawEntry,
    kind: FeedKind,
) -> Result<CandidateRecord> {
    let title = entry.text_of(&["title"]);
    if title.is_empty() {
        return Err(CurateError::Validation("missing title".into()));
    }
    let raw_link = match kind {
        FeedKind::Rss => rss_link(entry),
        FeedKind::Atom => atom_link(entry),
    };
    let url = canonicalize(&raw_link)
        .ok_or_else(|| CurateError::Validation(format!("unusable link `{raw_link}`")))?;

    let (summary, published, author) = match kind {
        FeedKind::Rss => (
            entry.text_of(&["description", "summary"]),
            entry.text_of(&["pubDate", "published", "updated", "date"]),
            entry.text_of(&["author", "creator"]),
        ),
        FeedKind::Atom => (
            entry.text_of(&["summary", "content"]),
            entry.text_of(&["published", "updated"]),
            entry
                .first_of(&["author"])
                .map(Child::first_part)
                .unwrap_or_default(),
        ),
    };

    let source_label = if source.source.trim().is_empty() {
        source_host(&url)
    } else {
        source.source.trim().to_lowercase()
    };

    Ok(CandidateRecord {
        title,
        url,
        summary,
        published_at: parse_timestamp(&published),
        source: source_label,
        tags_seed: categories(entry, kind),
        origin: Origin::Feed(source.name.clone()),
        trending_score: None,
        author: Some(author).filter(|a| !a.is_empty()),
        thumbnail_url: entry.images.first().cloned(),
    })
}

/// Parse a feed payload into candidates. Malformed XML is a `Parse` error;
/// invalid individual entries are skipped.
pub fn parse_feed(source: &FeedSource, payload: &[u8], max_items: usize) -> Result<Vec<CandidateRecord>> {
    let t0 = std::time::Instant::now();
    let xml = String::from_utf8_lossy(payload);
    let scanned = scan(&xml).map_err(|e| CurateError::parse(&source.name, e))?;

    let (kind, raw) = if !scanned.items.is_empty() {
        (FeedKind::Rss, scanned.items)
    } else {
        (FeedKind::Atom, scanned.entries)
    };

    let mut out = Vec::new();
    for entry in raw.iter().take(max_items) {
        match to_candidate(source, entry, kind) {
            Ok(c) => out.push(c),
            Err(e) => tracing::debug!(feed = %source.name, error = %e, "entry skipped"),
        }
    }

    histogram!("curator_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    counter!("curator_candidates_total").increment(out.len() as u64);
    Ok(out)
}

pub struct FeedProvider {
    source: FeedSource,
    max_items: usize,
}

impl FeedProvider {
    pub fn new(source: FeedSource, max_items: usize) -> Self {
        Self { source, max_items }
    }
}

#[async_trait]
impl SourceProvider for FeedProvider {
    async fn fetch_latest(&self, fetcher: &dyn Fetcher) -> Result<Vec<CandidateRecord>> {
        let body = fetcher.fetch(&self.source.url).await?;
        parse_feed(&self.source, &body, self.max_items)
    }

    fn name(&self) -> &str {
        &self.source.name
    }
}
