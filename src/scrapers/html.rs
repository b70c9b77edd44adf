//! Small DOM helpers shared by the adapters.

use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

/// Collapse runs of whitespace (including NBSP) into single spaces.
pub fn collapse_whitespace(text: &str) -> String {
    text.split(|c: char| c.is_whitespace() || c == '\u{a0}')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// All text under `el`, whitespace-collapsed.
pub fn element_text(el: ElementRef) -> String {
    collapse_whitespace(&el.text().collect::<String>())
}

/// Text of `el` split at `<br>` elements. Empty lines are dropped.
pub fn text_lines(el: ElementRef) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    collect_lines(el, &mut lines, &mut current);
    push_line(&mut lines, &mut current);
    lines
}

fn collect_lines(el: ElementRef, lines: &mut Vec<String>, current: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => current.push_str(text),
            Node::Element(e) if e.name() == "br" => push_line(lines, current),
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    collect_lines(child, lines, current);
                }
            }
            _ => {}
        }
    }
}

fn push_line(lines: &mut Vec<String>, current: &mut String) {
    let line = collapse_whitespace(current);
    if !line.is_empty() {
        lines.push(line);
    }
    current.clear();
}

/// Largest number shown by the pager links matched by `pager`, at least 1.
pub fn max_page(document: &Html, pager: &Selector) -> u32 {
    document
        .select(pager)
        .filter_map(|a| element_text(a).trim().parse::<u32>().ok())
        .max()
        .unwrap_or(1)
        .max(1)
}

/// Resolve `href` against the page it appeared on.
pub fn resolve(page_url: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    let base = Url::parse(page_url).ok()?;
    base.join(href).ok().map(String::from)
}

/// Value of query parameter `name` in an absolute or relative URL.
pub fn query_param(href: &str, name: &str) -> Option<String> {
    let query = href.split_once('?').map(|(_, q)| q).unwrap_or(href);
    let query = query.split('#').next().unwrap_or_default();
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

/// Path and query of a URL, so it can be re-fetched through failover.
pub fn to_path(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    Some(match parsed.query() {
        Some(q) => format!("{}?{}", parsed.path(), q),
        None => parsed.path().to_string(),
    })
}

/// Host part of a URL.
pub fn host_of(url: &str) -> Option<String> {
    Url::parse(url).ok()?.host_str().map(str::to_string)
}
