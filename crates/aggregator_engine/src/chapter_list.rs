use std::collections::HashSet;

use aggregator_core::WorkItem;
use scraper::{ElementRef, Html, Selector};
use url::Url;

const CHAPTER_LINK_SELECTOR: &str = ".list-chapter li a, .chapter-item a, .chapter-list a";
const LINK_TITLE_SELECTOR: &str = ".chapter-title, span, .title";

/// Scan a novel's listing page into an ordered work list.
///
/// Links without a usable href, links carrying a `#` fragment, and repeated
/// urls are dropped; `ordinal_index` counts the surviving links.
pub fn scan_chapter_list(html: &str, base_url: Option<&Url>) -> Vec<WorkItem> {
    let (Ok(link_sel), Ok(title_sel)) = (
        Selector::parse(CHAPTER_LINK_SELECTOR),
        Selector::parse(LINK_TITLE_SELECTOR),
    ) else {
        return Vec::new();
    };

    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut items = Vec::new();

    for anchor in document.select(&link_sel) {
        let Some(url) = anchor
            .value()
            .attr("href")
            .and_then(|href| resolve_url(href, base_url))
        else {
            continue;
        };
        if url.fragment().is_some() || !seen.insert(url.to_string()) {
            continue;
        }
        let index = items.len();
        let title = link_title(anchor, &title_sel).unwrap_or_else(|| format!("Chapter {}", index + 1));
        items.push(WorkItem::new(title, url.to_string(), index));
    }

    items
}

fn link_title(anchor: ElementRef, title_sel: &Selector) -> Option<String> {
    anchor
        .select(title_sel)
        .map(element_text)
        .find(|text| !text.is_empty())
        .or_else(|| Some(element_text(anchor)).filter(|text| !text.is_empty()))
        .or_else(|| {
            anchor
                .value()
                .attr("title")
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
        })
}

fn element_text(el: ElementRef) -> String {
    el.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn resolve_url(reference: &str, base: Option<&Url>) -> Option<Url> {
    let trimmed = reference.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with('#') || lower.starts_with("javascript:") || lower.starts_with("mailto:") {
        return None;
    }
    let url = match Url::parse(trimmed) {
        Ok(url) => url,
        Err(_) => base?.join(trimmed).ok()?,
    };
    matches!(url.scheme(), "http" | "https").then_some(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_links_resolve_against_base() {
        let base = Url::parse("https://novelbin.me/novel-book/some-novel").unwrap();
        assert_eq!(
            resolve_url("/b/some-novel/chapter-1", Some(&base)).unwrap().as_str(),
            "https://novelbin.me/b/some-novel/chapter-1"
        );
        assert!(resolve_url("chapter-2", None).is_none());
        assert!(resolve_url("javascript:void(0)", Some(&base)).is_none());
    }
}
