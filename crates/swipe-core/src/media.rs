//! Media lookup vocabulary: query construction, post parsing, and picking
//! a playable URL out of a scored result list. Transport lives elsewhere.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

use crate::constants::EXCLUDED_MEDIA_TAG;

/// What kind of media the client wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MediaTypePreference {
    VideoOnly,
    PhotosOnly,
    #[default]
    Any,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseMediaTypeError(pub String);

impl fmt::Display for ParseMediaTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid media_type '{}': expected \"Video Only\", \"Photos Only\" or \"Videos & Photos\"",
            self.0
        )
    }
}

impl std::error::Error for ParseMediaTypeError {}

impl FromStr for MediaTypePreference {
    type Err = ParseMediaTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "video only" | "video" | "videos" => Ok(Self::VideoOnly),
            "photos only" | "photo" | "photos" | "image" | "images" => Ok(Self::PhotosOnly),
            "videos & photos" | "all" | "any" | "both" => Ok(Self::Any),
            _ => Err(ParseMediaTypeError(s.to_string())),
        }
    }
}

impl fmt::Display for MediaTypePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::VideoOnly => "Video Only",
            Self::PhotosOnly => "Photos Only",
            Self::Any => "Videos & Photos",
        })
    }
}

/// Tag query sent to the media lookup service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaQuery {
    pub tags: Vec<String>,
}

impl MediaQuery {
    pub fn new(tag: &str, blacklisted: &[String], preference: MediaTypePreference) -> Self {
        let mut tags = vec![tag.to_string(), format!("-{EXCLUDED_MEDIA_TAG}")];
        match preference {
            MediaTypePreference::VideoOnly => tags.push("animated".to_string()),
            MediaTypePreference::PhotosOnly => tags.push("-animated".to_string()),
            MediaTypePreference::Any => {}
        }
        tags.extend(
            blacklisted
                .iter()
                .map(|t| t.trim())
                .filter(|t| !t.is_empty())
                .map(|t| format!("-{t}")),
        );
        Self { tags }
    }

    /// Space-joined tag string with the score ordering appended, ready to be
    /// URL-encoded as the `tags` parameter.
    pub fn tags_param(&self) -> String {
        format!("{} sort:score:desc", self.tags.join(" "))
    }
}

/// One post as returned by the lookup service. Unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaPost {
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default)]
    pub sample_url: Option<String>,
    /// Set when the service generated a downscaled `sample_url`.
    #[serde(default)]
    pub sample: bool,
    #[serde(default)]
    pub score: i64,
}

impl MediaPost {
    /// The URL to serve: the sample when flagged, otherwise the full file.
    pub fn preferred_url(&self) -> Option<&str> {
        let sample = self.sample_url.as_deref().filter(|u| !u.is_empty());
        let file = self.file_url.as_deref().filter(|u| !u.is_empty());
        match (self.sample, sample) {
            (true, Some(url)) => Some(url),
            _ => file,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    #[default]
    Unknown,
}

impl MediaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    pub url: String,
    pub kind: MediaKind,
}

/// `//host/path` → `https://host/path`; anything else unchanged.
pub fn normalize_url(url: &str) -> String {
    match url.strip_prefix("//") {
        Some(rest) => format!("https://{rest}"),
        None => url.to_string(),
    }
}

/// Classify by file extension, ignoring any query string or fragment.
pub fn classify_url(url: &str) -> MediaKind {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let file = path.rsplit('/').next().unwrap_or(path);
    let Some((_, ext)) = file.rsplit_once('.') else {
        return MediaKind::Unknown;
    };
    match ext.to_lowercase().as_str() {
        "mp4" | "webm" | "mov" | "m4v" => MediaKind::Video,
        "jpg" | "jpeg" | "png" | "gif" | "webp" | "bmp" | "tiff" => MediaKind::Image,
        _ => MediaKind::Unknown,
    }
}

/// Pick one usable post uniformly among the `top_n` highest scored
/// (`None` or `0` means all of them).
///
/// Posts without a URL are skipped before ranking.
pub fn choose_media(posts: &[MediaPost], top_n: Option<usize>, rng: &mut impl Rng) -> Option<Media> {
    let mut usable: Vec<(&MediaPost, &str)> = posts
        .iter()
        .filter_map(|p| p.preferred_url().map(|u| (p, u)))
        .collect();
    usable.sort_by(|a, b| b.0.score.cmp(&a.0.score));
    if let Some(n) = top_n
        && n > 0
    {
        usable.truncate(n);
    }
    let (_, url) = usable.choose(rng)?;
    let url = normalize_url(url);
    let kind = classify_url(&url);
    Some(Media { url, kind })
}
