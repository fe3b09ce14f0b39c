//! Link model: hyperlinks learned from responses.
//!
//! A response can advertise navigation two ways: `Link` response headers
//! (`<href>; rel=name; title=...; templated=true`) and a HAL-style
//! `_links`/`links` JSON body property. Both are folded into one
//! relation-type-keyed map of links plus one map of unresolved URI
//! templates.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;
use reqwest::header::{self, HeaderMap};
use tracing::warn;
use url::Url;

use crate::error::Result;

/// A hyperlink learned from one response: absolute target URI plus an
/// optional human-readable title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    /// Absolute target URI.
    pub href: Url,
    /// Optional title for display purposes.
    pub title: Option<String>,
}

/// Links and templates extracted from a single response.
///
/// Observed state is always replaced wholesale with one of these, never
/// merged, so concurrent readers only ever see a complete snapshot.
#[derive(Debug, Clone, Default)]
pub(crate) struct LinkExtraction {
    pub links: HashMap<String, Vec<Link>>,
    pub templates: HashMap<String, String>,
}

impl LinkExtraction {
    /// Insert a link for a relation type. Links for one rel form a set
    /// keyed by href: re-observing a known href overwrites its title
    /// instead of duplicating the entry.
    fn insert_link(&mut self, rel: &str, link: Link) {
        let links = self.links.entry(rel.to_owned()).or_default();
        if let Some(existing) = links.iter_mut().find(|l| l.href == link.href) {
            existing.title = link.title;
        } else {
            links.push(link);
        }
    }

    fn insert_template(&mut self, rel: &str, template: &str) {
        self.templates.insert(rel.to_owned(), template.to_owned());
    }
}

/// Join a relative reference against a base URI.
///
/// A `./` prefix treats the base's final path segment as a directory
/// (`…/contacts` + `./5` = `…/contacts/5`); anything else follows plain
/// RFC3986 reference resolution.
pub(crate) fn join_relative(base: &Url, relative: &str) -> Result<Url> {
    if let Some(rest) = relative.strip_prefix("./") {
        let mut dir = base.clone();
        if !dir.path().ends_with('/') {
            dir.set_path(&format!("{}/", dir.path()));
        }
        return Ok(dir.join(rest)?);
    }
    Ok(base.join(relative)?)
}

/// Extract all links and link templates a response advertises, from both
/// `Link` headers and a HAL-style body property. Relative hrefs are
/// resolved against `base`; templates stay unresolved strings.
pub(crate) fn extract(base: &Url, headers: &HeaderMap, body: &[u8]) -> LinkExtraction {
    let mut out = LinkExtraction::default();

    for value in headers.get_all(header::LINK) {
        if let Ok(text) = value.to_str() {
            parse_link_header(base, text, &mut out);
        }
    }

    if let Ok(json) = serde_json::from_slice::<serde_json::Value>(body) {
        if let Some(links) = json.get("_links").or_else(|| json.get("links")) {
            parse_hal_links(base, links, &mut out);
        }
    }

    out
}

lazy_static! {
    /// One `Link` header entry: `<href>` followed by its `;`-separated
    /// parameters, up to the next `<`. Matching to the next `<` rather
    /// than the next `,` keeps commas inside quoted titles intact.
    static ref LINK_ENTRY: Regex = Regex::new(r"<(?P<href>[^>]*)>(?P<params>[^<]*)").unwrap();
}

/// Parse one `Link` header value, which may carry several comma-separated
/// link entries.
fn parse_link_header(base: &Url, value: &str, out: &mut LinkExtraction) {
    for entry in LINK_ENTRY.captures_iter(value) {
        let href = &entry["href"];
        let mut rel = None;
        let mut title = None;
        let mut templated = false;

        for param in entry["params"].split(';') {
            let param = param.trim().trim_end_matches(',').trim();
            if param.is_empty() {
                continue;
            }
            match param.split_once('=') {
                Some((key, raw)) => {
                    let unquoted = raw.trim().trim_matches('"');
                    match key.trim() {
                        "rel" => rel = Some(unquoted.to_owned()),
                        "title" => title = Some(unquoted.to_owned()),
                        "templated" => templated = unquoted.eq_ignore_ascii_case("true"),
                        _ => {}
                    }
                }
                None if param == "templated" => templated = true,
                None => {}
            }
        }

        let Some(rel) = rel else { continue };
        if templated {
            out.insert_template(&rel, href);
        } else {
            match join_relative(base, href) {
                Ok(target) => out.insert_link(&rel, Link {
                    href: target,
                    title,
                }),
                Err(e) => warn!(href, %e, "ignoring unparsable link header target"),
            }
        }
    }
}

/// Parse a HAL `_links`/`links` object: each key is a relation type, each
/// value an object with `href`, optional `title`, optional `templated`, or
/// an array of such objects.
fn parse_hal_links(base: &Url, links: &serde_json::Value, out: &mut LinkExtraction) {
    let Some(rels) = links.as_object() else { return };
    for (rel, value) in rels {
        match value {
            serde_json::Value::Array(entries) => {
                for entry in entries {
                    parse_hal_entry(base, rel, entry, out);
                }
            }
            entry => parse_hal_entry(base, rel, entry, out),
        }
    }
}

fn parse_hal_entry(base: &Url, rel: &str, entry: &serde_json::Value, out: &mut LinkExtraction) {
    let Some(href) = entry.get("href").and_then(|h| h.as_str()) else {
        return;
    };
    let templated = entry
        .get("templated")
        .and_then(|t| t.as_bool())
        .unwrap_or(false);
    if templated {
        out.insert_template(rel, href);
        return;
    }
    let title = entry
        .get("title")
        .and_then(|t| t.as_str())
        .map(str::to_owned);
    match join_relative(base, href) {
        Ok(target) => out.insert_link(rel, Link {
            href: target,
            title,
        }),
        Err(e) => warn!(href, %e, "ignoring unparsable body link target"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn base() -> Url {
        Url::parse("http://localhost/endpoint").unwrap()
    }

    fn extract_header(value: &str) -> LinkExtraction {
        let mut headers = HeaderMap::new();
        headers.insert(header::LINK, HeaderValue::from_str(value).unwrap());
        extract(&base(), &headers, b"")
    }

    #[test]
    fn test_join_relative_plain() {
        assert_eq!(
            join_relative(&base(), "other").unwrap().as_str(),
            "http://localhost/other"
        );
    }

    #[test]
    fn test_join_relative_dot_slash() {
        assert_eq!(
            join_relative(&base(), "./5").unwrap().as_str(),
            "http://localhost/endpoint/5"
        );
    }

    #[test]
    fn test_parse_single_link() {
        let out = extract_header("<a>; rel=target1");
        assert_eq!(
            out.links["target1"],
            vec![Link {
                href: Url::parse("http://localhost/a").unwrap(),
                title: None,
            }]
        );
    }

    #[test]
    fn test_parse_multiple_links_with_title() {
        let out = extract_header("<a>; rel=target1; title=\"Title, with comma\", <b>; rel=target2");
        assert_eq!(
            out.links["target1"][0].title.as_deref(),
            Some("Title, with comma")
        );
        assert_eq!(
            out.links["target2"][0].href.as_str(),
            "http://localhost/b"
        );
    }

    #[test]
    fn test_parse_templated_link() {
        let out = extract_header("<{id}>; rel=child; templated=true");
        assert!(out.links.is_empty());
        assert_eq!(out.templates["child"], "{id}");
    }

    #[test]
    fn test_same_href_overwrites_title() {
        let out = extract_header("<a>; rel=target1; title=\"old\", <a>; rel=target1; title=\"new\"");
        assert_eq!(out.links["target1"].len(), 1);
        assert_eq!(out.links["target1"][0].title.as_deref(), Some("new"));
    }

    #[test]
    fn test_parse_hal_body() {
        let body = br#"{
            "_links": {
                "target1": {"href": "a", "title": "first"},
                "child": {"href": "./{id}", "templated": true},
                "many": [{"href": "b"}, {"href": "c"}]
            },
            "id": 1
        }"#;
        let out = extract(&base(), &HeaderMap::new(), body);
        assert_eq!(out.links["target1"][0].title.as_deref(), Some("first"));
        assert_eq!(out.templates["child"], "./{id}");
        assert_eq!(out.links["many"].len(), 2);
    }

    #[test]
    fn test_parse_plain_links_property() {
        let body = br#"{"links": {"search": {"href": "find"}}}"#;
        let out = extract(&base(), &HeaderMap::new(), body);
        assert_eq!(
            out.links["search"][0].href.as_str(),
            "http://localhost/find"
        );
    }

    #[test]
    fn test_non_json_body_ignored() {
        let out = extract(&base(), &HeaderMap::new(), b"\x00binary");
        assert!(out.links.is_empty());
        assert!(out.templates.is_empty());
    }
}
