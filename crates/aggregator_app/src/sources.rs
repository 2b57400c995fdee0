use std::fs;

use aggregator_core::WorkItem;
use aggregator_engine::{scan_chapter_list, FetchStrategy, Fetcher};
use anyhow::{bail, Context as _};
use engine_logging::engine_info;
use url::Url;

use crate::cli::SourceArgs;

/// Resolve the work list from whichever source the user gave.
pub async fn load_work_items(
    source: &SourceArgs,
    fetcher: &dyn Fetcher,
) -> anyhow::Result<Vec<WorkItem>> {
    if !source.chapter_url.is_empty() {
        return Ok(direct_items(&source.chapter_url));
    }

    if let Some(list_url) = source.list_url.as_deref() {
        let output = fetcher
            .fetch(list_url, FetchStrategy::Primary)
            .await
            .with_context(|| format!("fetch chapter list {list_url}"))?;
        let base = Url::parse(&output.metadata.final_url)
            .with_context(|| format!("parse listing url {}", output.metadata.final_url))?;
        let items = scan_chapter_list(&output.body, Some(&base));
        engine_info!("Scanned {} chapters from {list_url}", items.len());
        return Ok(items);
    }

    if let Some(path) = source.list_file.as_deref() {
        let html = fs::read_to_string(path)
            .with_context(|| format!("read listing file {}", path.display()))?;
        let base = source
            .base_url
            .as_deref()
            .map(Url::parse)
            .transpose()
            .context("parse --base-url")?;
        let items = scan_chapter_list(&html, base.as_ref());
        engine_info!("Scanned {} chapters from {}", items.len(), path.display());
        return Ok(items);
    }

    bail!("give one of --list-url, --list-file or --chapter-url")
}

fn direct_items(urls: &[String]) -> Vec<WorkItem> {
    urls.iter()
        .enumerate()
        .map(|(index, url)| WorkItem::new(format!("Chapter {}", index + 1), url.clone(), index))
        .collect()
}
