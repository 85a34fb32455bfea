//! Candidate search over page markup.
//!
//! The page is parsed with `scraper` (html5ever) and only read: no script is
//! ever evaluated. Image sources are consulted in [`CandidateSource::PRIORITY`]
//! order and the first non-empty value wins.

use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use super::json_ld;
use crate::types::extraction::{CandidateSource, ImageCandidate};

/// Everything the markup pass found, before image validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageMetadata {
    /// Chosen image, already absolute
    pub image: Option<ImageCandidate>,

    /// `og:title`, else trimmed `<title>`
    pub title: Option<String>,

    /// `og:site_name`
    pub site_name: Option<String>,
}

/// Scan raw HTML for cover metadata.
///
/// `page_url` is the base for resolving relative references.
pub fn scan(html: &str, page_url: &Url) -> PageMetadata {
    let document = Html::parse_document(html);

    let image = find_candidate(&document).and_then(|(source, raw)| {
        let resolved = resolve_reference(&raw, page_url);
        if resolved.is_none() {
            debug!(source = ?source, reference = %raw, "Candidate did not resolve to an http(s) URL");
        }
        resolved.map(|url| ImageCandidate { source, url })
    });

    let title = meta_content(&document, &["og:title"]).or_else(|| document_title(&document));
    let site_name = meta_content(&document, &["og:site_name"]);

    PageMetadata {
        image,
        title,
        site_name,
    }
}

/// Resolve a reference against the page URL, keeping only http(s) results.
pub fn resolve_reference(reference: &str, page_url: &Url) -> Option<Url> {
    page_url
        .join(reference)
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https"))
}

fn find_candidate(document: &Html) -> Option<(CandidateSource, String)> {
    CandidateSource::PRIORITY
        .iter()
        .find_map(|&source| candidate_value(document, source).map(|value| (source, value)))
}

fn candidate_value(document: &Html, source: CandidateSource) -> Option<String> {
    match source {
        CandidateSource::OpenGraphImage => meta_content(document, &["og:image", "og:image:url"]),
        CandidateSource::OpenGraphImageSecure => {
            meta_content(document, &["og:image:secure_url"])
        }
        CandidateSource::TwitterCardImage => {
            meta_content(document, &["twitter:image", "twitter:image:src"])
        }
        CandidateSource::JsonLdImage => json_ld::find_image(document),
        CandidateSource::LinkImageSrc => link_href(document, "image_src"),
        CandidateSource::InlineImgTag => first_inline_img(document),
        CandidateSource::VideoPoster => first_attribute(document, "[poster]", "poster"),
    }
}

/// Content of the first `<meta>` whose `property` or `name` matches.
///
/// Attributes are read off the parsed element, so their order in the
/// source markup does not matter.
fn meta_content(document: &Html, names: &[&str]) -> Option<String> {
    let selector = selector("meta")?;
    document.select(&selector).find_map(|meta| {
        let element = meta.value();
        let matches = ["property", "name"]
            .iter()
            .filter_map(|attr| element.attr(attr))
            .any(|value| names.iter().any(|name| value.trim().eq_ignore_ascii_case(name)));

        if matches {
            non_empty(element.attr("content"))
        } else {
            None
        }
    })
}

fn link_href(document: &Html, rel: &str) -> Option<String> {
    let selector = selector("link")?;
    document.select(&selector).find_map(|link| {
        let element = link.value();
        let has_rel = element
            .attr("rel")
            .map(|value| value.split_whitespace().any(|r| r.eq_ignore_ascii_case(rel)))
            .unwrap_or(false);

        if has_rel {
            non_empty(element.attr("href"))
        } else {
            None
        }
    })
}

fn first_inline_img(document: &Html) -> Option<String> {
    let selector = selector("img")?;
    document
        .select(&selector)
        .filter_map(|img| non_empty(img.value().attr("src")))
        .find(|src| {
            let lower = src.to_ascii_lowercase();
            !lower.starts_with("data:") && !lower.contains(".svg")
        })
}

fn first_attribute(document: &Html, css: &str, attr: &str) -> Option<String> {
    let selector = selector(css)?;
    document
        .select(&selector)
        .find_map(|element| non_empty(element.value().attr(attr)))
}

fn document_title(document: &Html) -> Option<String> {
    let selector = selector("title")?;
    document
        .select(&selector)
        .next()
        .map(|el: ElementRef<'_>| el.text().collect::<String>())
        .and_then(|text| non_empty(Some(text.as_str())))
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

pub(super) fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}
