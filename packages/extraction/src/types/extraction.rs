//! Extraction output types.

use serde::{Deserialize, Serialize};
use url::Url;

/// Best-effort metadata found on a page.
///
/// `image_url` is always serialized (as `null` when nothing usable was
/// found); `title` and `source` are omitted when absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    /// Absolute, validated cover image URL
    pub image_url: Option<Url>,

    /// `og:title`, falling back to `<title>`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// `og:site_name`, falling back to the page hostname
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl ExtractionResult {
    /// Result with nothing found.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether a cover image survived validation.
    pub fn has_image(&self) -> bool {
        self.image_url.is_some()
    }
}

/// Where a candidate image reference came from.
///
/// Variants are declared in priority order; the first source with a
/// non-empty value wins and later sources are never consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSource {
    /// `og:image` / `og:image:url`
    OpenGraphImage,
    /// `og:image:secure_url`
    OpenGraphImageSecure,
    /// `twitter:image` / `twitter:image:src`
    TwitterCardImage,
    /// `image` field of a JSON-LD block
    JsonLdImage,
    /// `<link rel="image_src">`
    LinkImageSrc,
    /// First `<img src>` that is not a data URI or SVG
    InlineImgTag,
    /// `poster` attribute (video / media players)
    VideoPoster,
}

impl CandidateSource {
    /// All sources, highest priority first.
    pub const PRIORITY: [CandidateSource; 7] = [
        CandidateSource::OpenGraphImage,
        CandidateSource::OpenGraphImageSecure,
        CandidateSource::TwitterCardImage,
        CandidateSource::JsonLdImage,
        CandidateSource::LinkImageSrc,
        CandidateSource::InlineImgTag,
        CandidateSource::VideoPoster,
    ];
}

/// A resolved image reference and where it was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageCandidate {
    pub source: CandidateSource,
    pub url: Url,
}
