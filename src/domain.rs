//! Host and registrable-domain helpers shared by every stage.
//!
//! The registrable domain (public suffix plus one label) is the join key between
//! extracted records and registry rows.

use std::net::IpAddr;

use url::Url;

/// Ordering platforms that render menus client-side; never fetched.
pub const THIRD_PARTY_HOSTS: &[&str] = &[
    "toasttab.com",
    "square.site",
    "tryotter.com",
    "clover.com",
    "ubereats.com",
    "doordash.com",
    "grubhub.com",
    "olo.com",
    "chownow.com",
    "opentable.com",
    "resy.com",
    "ezcater.com",
];

/// Parse a URL, assuming `https` when the scheme is missing (`mybistro.com`).
pub fn parse_lenient(raw: &str) -> Option<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let candidate = if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_string()
    } else {
        format!("https://{}", raw)
    };
    Url::parse(&candidate).ok()
}

/// Lowercased host of a URL or bare domain, without port.
pub fn host_of(raw: &str) -> Option<String> {
    let url = parse_lenient(raw)?;
    let host = url.host_str()?.trim_end_matches('.').to_ascii_lowercase();
    let host = host.trim_start_matches('[').trim_end_matches(']').to_string();
    if host.is_empty() {
        None
    } else {
        Some(host)
    }
}

/// Public-suffix-aware `domain.suffix` for a hostname.
///
/// IP literals are their own registrable domain; hosts with no label above a
/// public suffix (`localhost`, `co.uk`) have none.
pub fn registrable(host: &str) -> Option<String> {
    let host = host.trim().trim_end_matches('.').to_ascii_lowercase();
    if host.is_empty() {
        return None;
    }
    if host.parse::<IpAddr>().is_ok() {
        return Some(host);
    }
    psl::domain_str(&host).map(str::to_string)
}

/// Registrable domain of a URL or bare domain.
pub fn registrable_of_url(raw: &str) -> Option<String> {
    host_of(raw).and_then(|h| registrable(&h))
}

/// Origin (`scheme://host[:port]`) of a site; query, fragment and path dropped.
pub fn normalize_site(raw: &str) -> Option<String> {
    let url = parse_lenient(raw)?;
    url.host_str()?;
    Some(url.origin().ascii_serialization())
}

/// `scheme://host/path` with the trailing slash trimmed, as stored in the registry.
pub fn clean_website(raw: &str) -> Option<String> {
    let url = parse_lenient(raw)?;
    let host = url.host_str()?;
    let port = url.port().map(|p| format!(":{}", p)).unwrap_or_default();
    let cleaned = format!("{}://{}{}{}", url.scheme(), host, port, url.path());
    Some(cleaned.trim_end_matches('/').to_string())
}

/// Whether the URL's host ends with a denylisted ordering platform.
pub fn is_third_party(url: &str) -> bool {
    match host_of(url) {
        Some(host) => THIRD_PARTY_HOSTS.iter().any(|tp| host.ends_with(tp)),
        None => false,
    }
}

/// Same registrable domain on both sides; an unresolvable side never matches.
pub fn same_organization(a: &str, b: &str) -> bool {
    match (registrable_of_url(a), registrable_of_url(b)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}
