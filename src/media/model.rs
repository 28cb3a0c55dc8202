use poem_openapi::{Enum, Object};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::error::MediaError;

/// Supported source platforms
#[derive(Debug, Enum, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[oai(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Tiktok,
    Youtube,
    Facebook,
    Instagram,
}

impl Platform {
    pub const ALL: [Platform; 4] = [
        Platform::Tiktok,
        Platform::Youtube,
        Platform::Facebook,
        Platform::Instagram,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Tiktok => "tiktok",
            Platform::Youtube => "youtube",
            Platform::Facebook => "facebook",
            Platform::Instagram => "instagram",
        }
    }

    /// Registrable domains whose hosts (and subdomains) belong to the platform.
    pub fn domains(&self) -> &'static [&'static str] {
        match self {
            Platform::Tiktok => &["tiktok.com"],
            Platform::Youtube => &["youtube.com", "youtu.be", "youtube-nocookie.com"],
            Platform::Facebook => &["facebook.com", "fb.watch", "fb.com"],
            Platform::Instagram => &["instagram.com", "instagr.am"],
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = MediaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Platform::ALL
            .into_iter()
            .find(|platform| platform.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| MediaError::InvalidUrl(format!("unsupported platform: {}", s)))
    }
}

/// Kind of content behind a post
#[derive(Debug, Enum, Clone, Copy, PartialEq, Eq)]
#[oai(rename_all = "lowercase")]
pub enum MediaType {
    Video,
    Image,
}

/// One of the downloadable assets of a post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Video,
    Music,
    Thumbnail,
}

impl AssetKind {
    /// Label used in suggested filenames.
    pub fn label(&self) -> &'static str {
        match self {
            AssetKind::Video => "video",
            AssetKind::Music => "audio",
            AssetKind::Thumbnail => "cover",
        }
    }
}

/// Creator of the post
#[derive(Debug, Object, Clone, Default, PartialEq)]
pub struct Author {
    /// Handle, unique per platform
    pub unique_id: String,
    /// Display name
    pub nickname: String,
    /// Avatar image URL
    pub avatar: String,
}

/// Engagement counters, zero when the platform does not expose them
#[derive(Debug, Object, Clone, Default, PartialEq)]
pub struct Stats {
    pub plays: u64,
    pub likes: u64,
    pub comments: u64,
}

/// Direct asset URLs, omitted when a format is unavailable
#[derive(Debug, Object, Clone, Default, PartialEq)]
pub struct Downloads {
    #[oai(skip_serializing_if_is_none)]
    pub video: Option<String>,
    #[oai(skip_serializing_if_is_none)]
    pub music: Option<String>,
    #[oai(skip_serializing_if_is_none)]
    pub thumbnail: Option<String>,
}

impl Downloads {
    pub fn get(&self, kind: AssetKind) -> Option<&String> {
        match kind {
            AssetKind::Video => self.video.as_ref(),
            AssetKind::Music => self.music.as_ref(),
            AssetKind::Thumbnail => self.thumbnail.as_ref(),
        }
    }

    pub fn set(&mut self, kind: AssetKind, value: Option<String>) {
        match kind {
            AssetKind::Video => self.video = value,
            AssetKind::Music => self.music = value,
            AssetKind::Thumbnail => self.thumbnail = value,
        }
    }
}

/// Stream endpoint tokens, one per asset listed in `downloads`
#[derive(Debug, Object, Clone, Default, PartialEq)]
pub struct StreamTokens {
    #[oai(skip_serializing_if_is_none)]
    pub video: Option<String>,
    #[oai(skip_serializing_if_is_none)]
    pub music: Option<String>,
    #[oai(skip_serializing_if_is_none)]
    pub thumbnail: Option<String>,
}

impl StreamTokens {
    pub fn set(&mut self, kind: AssetKind, token: Option<String>) {
        match kind {
            AssetKind::Video => self.video = token,
            AssetKind::Music => self.music = token,
            AssetKind::Thumbnail => self.thumbnail = token,
        }
    }
}

/// Resolved post
#[derive(Debug, Object, Clone, PartialEq)]
pub struct MediaDescriptor {
    /// Platform-assigned content identifier
    pub id: String,
    /// Platform the post was resolved from
    pub platform: Platform,
    /// Whether the post is a video or an image post
    pub media_type: MediaType,
    /// Caption of the post
    pub title: String,
    pub author: Author,
    /// Thumbnail image URL
    pub cover: String,
    pub stats: Stats,
    /// Direct, short-lived asset URLs
    pub downloads: Downloads,
    /// Tokens to pass to the stream endpoint alongside each asset URL
    pub tokens: StreamTokens,
}

impl MediaDescriptor {
    pub fn new(id: impl Into<String>, platform: Platform, media_type: MediaType) -> Self {
        MediaDescriptor {
            id: id.into(),
            platform,
            media_type,
            title: String::new(),
            author: Author::default(),
            cover: String::new(),
            stats: Stats::default(),
            downloads: Downloads::default(),
            tokens: StreamTokens::default(),
        }
    }
}
