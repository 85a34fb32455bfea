//! Bulk cover harvesting from publication index pages.
//!
//! An [`IndexSource`] names a blog or magazine index. The harvester fetches
//! the index, keeps the article links matching the source's pattern, and
//! runs [`MetadataExtractor`] over one page of them concurrently. Articles
//! without a usable cover are dropped, and an index that cannot be fetched
//! yields no covers rather than an error.

use std::collections::HashSet;

use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::client::{build_client, fetch_page};
use crate::error::{FetchError, FetchResult, SourceError};
use crate::extractor::MetadataExtractor;
use crate::security::HostGuard;
use crate::types::config::ExtractorConfig;

/// Cache policy for harvested cover lists.
pub const HARVEST_CACHE_CONTROL: &str =
    "public, max-age=120, s-maxage=600, stale-while-revalidate=86400";

/// Articles per page when the caller asks for none.
pub const DEFAULT_HARVEST_LIMIT: usize = 12;
pub const MIN_HARVEST_LIMIT: usize = 6;
pub const MAX_HARVEST_LIMIT: usize = 24;

/// Built-in sources: name, index URL, link base, href pattern, label, fallback title.
const BUILTIN_SOURCES: &[(&str, &str, &str, &str, &str, Option<&str>)] = &[
    (
        "allenai",
        "https://allenai.org/blog",
        "https://allenai.org/blog",
        r"/blog/",
        "allenai.org",
        None,
    ),
    (
        "vercel",
        "https://vercel.com/blog",
        "https://vercel.com",
        r"/blog/",
        "vercel.com",
        Some("Vercel Blog"),
    ),
    (
        "smashing",
        "https://www.smashingmagazine.com/articles/",
        "https://www.smashingmagazine.com",
        r"^/\d{4}/\d{2}/",
        "smashingmagazine.com",
        Some("Smashing Magazine"),
    ),
];

/// A publication index to harvest covers from.
#[derive(Debug, Clone)]
pub struct IndexSource {
    /// Path segment identifying the source (`/api/harvest/{name}`)
    pub name: String,

    /// Page listing the articles
    pub index_url: Url,

    /// Base that relative article links are resolved against
    pub link_base: Url,

    /// Matched against each raw `href` on the index
    pub link_pattern: Regex,

    /// `source` reported on every harvested cover
    pub label: String,

    /// Title used when an article has none
    pub fallback_title: Option<String>,
}

impl IndexSource {
    /// Source whose links resolve against the index URL itself.
    pub fn new(
        name: impl Into<String>,
        index_url: &str,
        link_pattern: &str,
        label: impl Into<String>,
    ) -> Result<Self, SourceError> {
        let index_url = parse_source_url(index_url)?;
        Ok(Self {
            name: name.into(),
            link_base: index_url.clone(),
            index_url,
            link_pattern: Regex::new(link_pattern)?,
            label: label.into(),
            fallback_title: None,
        })
    }

    pub fn with_link_base(mut self, link_base: &str) -> Result<Self, SourceError> {
        self.link_base = parse_source_url(link_base)?;
        Ok(self)
    }

    pub fn with_fallback_title(mut self, title: impl Into<String>) -> Self {
        self.fallback_title = Some(title.into());
        self
    }

    /// The publications harvested out of the box.
    pub fn builtins() -> Result<Vec<Self>, SourceError> {
        BUILTIN_SOURCES
            .iter()
            .map(|&(name, index, base, pattern, label, fallback)| {
                let source = Self::new(name, index, pattern, label)?.with_link_base(base)?;
                Ok(match fallback {
                    Some(title) => source.with_fallback_title(title),
                    None => source,
                })
            })
            .collect()
    }

    /// Article links on an index page, absolutized and deduplicated in
    /// document order. Only http(s) links survive.
    pub fn article_links(&self, html: &str) -> Vec<Url> {
        let Ok(hrefs) = Selector::parse("[href]") else {
            return Vec::new();
        };

        let document = Html::parse_document(html);
        let mut seen = HashSet::new();
        document
            .select(&hrefs)
            .filter_map(|el| el.value().attr("href"))
            .filter(|href| self.link_pattern.is_match(href))
            .filter_map(|href| self.link_base.join(href.trim()).ok())
            .filter(|url| matches!(url.scheme(), "http" | "https"))
            .filter(|url| seen.insert(url.to_string()))
            .collect()
    }
}

fn parse_source_url(raw: &str) -> Result<Url, SourceError> {
    Url::parse(raw).map_err(|source| SourceError::Url {
        url: raw.to_string(),
        source,
    })
}

/// Window into a source's article list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestPage {
    pub offset: usize,
    pub limit: usize,
}

impl Default for HarvestPage {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: DEFAULT_HARVEST_LIMIT,
        }
    }
}

impl HarvestPage {
    /// Page from loosely-typed query values.
    ///
    /// A missing or zero limit means the default; anything else is clamped
    /// to the allowed range. Negative offsets start from the beginning.
    pub fn from_query(offset: Option<i64>, limit: Option<i64>) -> Self {
        let limit = match limit {
            None | Some(0) => DEFAULT_HARVEST_LIMIT,
            Some(n) => n.clamp(MIN_HARVEST_LIMIT as i64, MAX_HARVEST_LIMIT as i64) as usize,
        };
        Self {
            offset: offset.unwrap_or(0).max(0) as usize,
            limit,
        }
    }

    fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let start = self.offset.min(items.len());
        let end = start.saturating_add(self.limit).min(items.len());
        &items[start..end]
    }
}

/// One article's cover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarvestedCover {
    /// Validated cover image
    pub url: Url,
    pub title: Option<String>,
    pub source: String,
    /// Article the cover was found on
    pub page_url: Url,
}

/// Harvests covers for a window of an index's articles.
#[derive(Debug, Clone)]
pub struct IndexHarvester {
    client: reqwest::Client,
    guard: HostGuard,
    extractor: MetadataExtractor,
    config: ExtractorConfig,
}

impl IndexHarvester {
    /// Create a harvester; index pages and articles share `guard`.
    pub fn new(guard: HostGuard, config: ExtractorConfig) -> FetchResult<Self> {
        let client = build_client(&guard, &config.user_agent, config.max_redirects)?;
        let extractor = MetadataExtractor::new(guard.clone(), config.clone())?;
        Ok(Self {
            client,
            guard,
            extractor,
            config,
        })
    }

    /// Covers for `page` of `source`'s articles, in index order.
    pub async fn harvest(&self, source: &IndexSource, page: HarvestPage) -> Vec<HarvestedCover> {
        let links = match self.index_links(source).await {
            Ok(links) => links,
            Err(e) => {
                warn!(
                    source = %source.name,
                    url = %source.index_url,
                    error = %e,
                    "Index fetch failed"
                );
                return Vec::new();
            }
        };

        let window = page.slice(&links);
        debug!(
            source = %source.name,
            found = links.len(),
            offset = page.offset,
            requested = window.len(),
            "Harvesting article covers"
        );

        let extractions = window
            .iter()
            .map(|article| self.extractor.extract(article.as_str()));
        let results = futures::future::join_all(extractions).await;

        let covers: Vec<HarvestedCover> = window
            .iter()
            .zip(results)
            .filter_map(|(article, result)| {
                let url = result.image_url?;
                Some(HarvestedCover {
                    url,
                    title: result.title.or_else(|| source.fallback_title.clone()),
                    source: source.label.clone(),
                    page_url: article.clone(),
                })
            })
            .collect();

        info!(source = %source.name, covers = covers.len(), "Harvest completed");
        covers
    }

    /// Fetch the index and pull out its article links.
    pub async fn index_links(&self, source: &IndexSource) -> FetchResult<Vec<Url>> {
        self.guard.enforce(&source.index_url).await?;

        let html = tokio::time::timeout(
            self.config.page_timeout,
            fetch_page(&self.client, &source.index_url, self.config.max_page_bytes),
        )
        .await
        .map_err(|_| FetchError::Timeout {
            url: source.index_url.to_string(),
        })??;

        Ok(source.article_links(&html))
    }
}
