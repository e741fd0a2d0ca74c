// src/canonical.rs
//! URL canonicalization: the identity key used for dedup, history and item ids.
//!
//! Rules: http/https only, non-empty host, lowercase host, no fragment, and no
//! tracking parameters (`utm_*`, `fbclid`, `gclid`, `mc_cid`, `mc_eid`).
//! Remaining query parameters keep their order and raw encoding, which makes
//! `canonicalize(canonicalize(u)) == canonicalize(u)`.

use url::Url;

const TRACKING_EXACT: [&str; 4] = ["fbclid", "gclid", "mc_cid", "mc_eid"];

fn is_tracking_param(segment: &str) -> bool {
    let key = segment
        .split_once('=')
        .map_or(segment, |(k, _)| k)
        .to_ascii_lowercase();
    key.starts_with("utm_") || TRACKING_EXACT.contains(&key.as_str())
}

/// `scheme://authority` with a non-empty host, checked on the raw text: the
/// `url` parser repairs `http:///x` and `https:/x` into hosts of its own.
fn has_authority(raw: &str) -> bool {
    let Some((_, rest)) = raw.split_once(':') else {
        return false;
    };
    let Some(rest) = rest.strip_prefix("//") else {
        return false;
    };
    let authority = rest
        .split(|c: char| matches!(c, '/' | '\\' | '?' | '#'))
        .next()
        .unwrap_or_default();
    let host = authority.rsplit_once('@').map_or(authority, |(_, h)| h);
    !host.is_empty() && !host.starts_with(':')
}

/// Canonicalize a raw URL. Returns `None` for anything that is not a usable
/// http(s) link.
pub fn canonicalize(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || !has_authority(raw) {
        return None;
    }
    let mut url = Url::parse(raw).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    let host = url.host_str()?.to_ascii_lowercase();
    if host.is_empty() {
        return None;
    }
    // `url` already lowercases domain hosts; this keeps the rule explicit.
    url.set_host(Some(&host)).ok()?;
    url.set_fragment(None);

    let kept: Vec<String> = url
        .query()
        .unwrap_or_default()
        .split('&')
        .filter(|seg| !seg.is_empty() && !is_tracking_param(seg))
        .map(str::to_string)
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.set_query(Some(&kept.join("&")));
    }

    Some(url.to_string())
}

/// Lowercased host without a leading `www.`; empty for unparseable input.
pub fn source_host(url: &str) -> String {
    let host = Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
        .unwrap_or_default();
    match host.strip_prefix("www.") {
        Some(rest) => rest.to_string(),
        None => host,
    }
}

/// True when `host` equals `domain` or is one of its subdomains.
pub fn host_matches(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}
