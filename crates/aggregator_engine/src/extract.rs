use aggregator_core::ExtractedChapter;
use ego_tree::NodeId;
use scraper::{ElementRef, Html, Selector};

pub const UNKNOWN_NOVEL: &str = "Unknown Novel";
pub const UNKNOWN_CHAPTER: &str = "Unknown Chapter";

const NOVEL_TITLE_SELECTORS: &[&str] = &[
    "#chapter > div > div > a.novel-title",
    ".novel-title",
    "a[class*=\"novel\"]",
    ".breadcrumb a:last-child",
    "h1",
    ".book-title",
];

const CHAPTER_TITLE_SELECTORS: &[&str] = &[
    "#chapter > div > div > h2 > a > span",
    ".chr-title span",
    ".chapter-title",
    "h2 span",
    "h1",
    ".chr-text",
];

const CONTENT_SELECTORS: &[&str] = &[
    "#chr-content",
    ".chapter-content",
    ".content",
    "#content",
    ".post-content",
    ".reading-content",
];

/// Substructures dropped from inside the content region.
const UNWANTED_SELECTORS: &[&str] = &[
    ".unlock-buttons",
    ".text-center",
    ".ad",
    ".advertisement",
    ".banner",
    "script",
    "style",
    "noscript",
    "iframe",
    ".social-share",
    ".comments",
    ".navigation",
    ".chapter-nav",
    "div[class*=\"ads\"]",
    "div[class*=\"advert\"]",
    "div[class*=\"banner\"]",
    "div[class*=\"unlock\"]",
    "[hidden]",
    "[style*=\"display:none\"]",
    "[style*=\"display: none\"]",
];

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("chapter content not found with any selector in {url}")]
    ContentNotFound { url: String },
}

pub trait Extractor: Send + Sync {
    fn extract(&self, html: &str, source_url: &str) -> Result<ExtractedChapter, ExtractionError>;
}

/// Selector-priority extractor for chapter pages.
///
/// Titles take the first selector whose text is non-empty; the content
/// region takes the first selector that matches at all.
#[derive(Debug)]
pub struct ChapterExtractor {
    novel_title: Vec<Selector>,
    chapter_title: Vec<Selector>,
    content: Vec<Selector>,
    unwanted: Vec<Selector>,
}

impl Default for ChapterExtractor {
    fn default() -> Self {
        Self {
            novel_title: compile(NOVEL_TITLE_SELECTORS),
            chapter_title: compile(CHAPTER_TITLE_SELECTORS),
            content: compile(CONTENT_SELECTORS),
            unwanted: compile(UNWANTED_SELECTORS),
        }
    }
}

impl Extractor for ChapterExtractor {
    fn extract(&self, html: &str, source_url: &str) -> Result<ExtractedChapter, ExtractionError> {
        let mut doc = Html::parse_document(html);

        let novel_title =
            first_text(&doc, &self.novel_title).unwrap_or_else(|| UNKNOWN_NOVEL.to_string());
        let chapter_title =
            first_text(&doc, &self.chapter_title).unwrap_or_else(|| UNKNOWN_CHAPTER.to_string());

        let not_found = || ExtractionError::ContentNotFound {
            url: source_url.to_string(),
        };
        let content_id = self
            .content
            .iter()
            .find_map(|sel| doc.select(sel).next())
            .map(|el| el.id())
            .ok_or_else(not_found)?;

        for id in self.unwanted_nodes(&doc, content_id) {
            if let Some(mut node) = doc.tree.get_mut(id) {
                node.detach();
            }
        }

        let content_html = doc
            .tree
            .get(content_id)
            .and_then(ElementRef::wrap)
            .map(|el| el.inner_html())
            .ok_or_else(not_found)?;

        Ok(ExtractedChapter {
            novel_title,
            chapter_title,
            content_html: content_html.trim().to_string(),
            source_url: source_url.to_string(),
        })
    }
}

impl ChapterExtractor {
    fn unwanted_nodes(&self, doc: &Html, content_id: NodeId) -> Vec<NodeId> {
        let Some(content) = doc.tree.get(content_id).and_then(ElementRef::wrap) else {
            return Vec::new();
        };
        let mut ids: Vec<NodeId> = self
            .unwanted
            .iter()
            .flat_map(|sel| content.select(sel).map(|el| el.id()))
            .collect();
        ids.extend(
            content
                .descendants()
                .filter(|node| node.value().is_comment())
                .map(|node| node.id()),
        );
        ids
    }
}

fn compile(selectors: &[&str]) -> Vec<Selector> {
    selectors
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .collect()
}

fn first_text(doc: &Html, selectors: &[Selector]) -> Option<String> {
    selectors.iter().find_map(|sel| {
        let el = doc.select(sel).next()?;
        let text = collapse_whitespace(&el.text().collect::<String>());
        (!text.is_empty()).then_some(text)
    })
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
