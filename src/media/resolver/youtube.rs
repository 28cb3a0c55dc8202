use super::{endpoint, json_count, json_text, Resolver};
use crate::media::model::{Author, MediaDescriptor, MediaType, Platform, Stats};
use anyhow::Context;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::{header::USER_AGENT, Client};
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

const CLIENT_VERSION: &str = "19.09.37";
const ANDROID_USER_AGENT: &str = "com.google.android.youtube/19.09.37 (Linux; U; Android 11) gzip";

lazy_static! {
    static ref VIDEO_ID: Regex = Regex::new(r"^[A-Za-z0-9_-]{11}$").unwrap();
}

/// Resolves YouTube videos through the InnerTube player endpoint.
pub struct YoutubeResolver {
    client: Client,
    origin: String,
}

impl YoutubeResolver {
    pub fn new(client: Client, origin: &str) -> Self {
        YoutubeResolver {
            client,
            origin: origin.to_string(),
        }
    }

    fn map(&self, video_id: &str, player: &Value) -> anyhow::Result<MediaDescriptor> {
        let status = player["playabilityStatus"]["status"]
            .as_str()
            .unwrap_or("UNKNOWN");
        if status != "OK" {
            anyhow::bail!(
                "video {} is not playable ({}): {}",
                video_id,
                status,
                player["playabilityStatus"]["reason"]
                    .as_str()
                    .unwrap_or("no reason given")
            );
        }

        let details = &player["videoDetails"];
        let id = match json_text(&details["videoId"]) {
            id if id.is_empty() => video_id.to_string(),
            id => id,
        };

        let thumbnail = details["thumbnail"]["thumbnails"]
            .as_array()
            .and_then(|thumbnails| {
                thumbnails
                    .iter()
                    .max_by_key(|t| t["width"].as_u64().unwrap_or(0))
            })
            .map(|t| json_text(&t["url"]))
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| format!("https://i.ytimg.com/vi/{}/hqdefault.jpg", id));

        let mut descriptor = MediaDescriptor::new(id, Platform::Youtube, MediaType::Video);
        descriptor.title = json_text(&details["title"]);
        descriptor.author = Author {
            unique_id: json_text(&details["channelId"]),
            nickname: json_text(&details["author"]),
            avatar: String::new(),
        };
        descriptor.cover = thumbnail.clone();
        descriptor.stats = Stats {
            plays: json_count(&details["viewCount"]),
            ..Stats::default()
        };

        let streaming = &player["streamingData"];
        descriptor.downloads.video = best_format(&streaming["formats"], "video/mp4", "height");
        descriptor.downloads.music = best_format(&streaming["adaptiveFormats"], "audio/", "bitrate");
        descriptor.downloads.thumbnail = Some(thumbnail);

        Ok(descriptor)
    }
}

/// Highest ranked format with a direct URL whose mime type starts with `mime_prefix`.
fn best_format(formats: &Value, mime_prefix: &str, rank_by: &str) -> Option<String> {
    formats
        .as_array()?
        .iter()
        .filter(|format| {
            format["mimeType"]
                .as_str()
                .is_some_and(|mime| mime.starts_with(mime_prefix))
        })
        .filter(|format| format["url"].as_str().is_some_and(|url| !url.is_empty()))
        .max_by_key(|format| json_count(&format[rank_by]))
        .map(|format| json_text(&format["url"]))
}

/// Pulls the 11 character video id out of watch, short, embed and live links.
pub fn video_id(url: &Url) -> anyhow::Result<String> {
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    let segments: Vec<&str> = url
        .path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();

    let candidate = if host == "youtu.be" || host.ends_with(".youtu.be") {
        segments.first().map(|s| s.to_string())
    } else if let Some((_, id)) = url.query_pairs().find(|(key, _)| key == "v") {
        Some(id.into_owned())
    } else {
        match segments.as_slice() {
            ["shorts" | "embed" | "live" | "v", id, ..] => Some(id.to_string()),
            _ => None,
        }
    };

    candidate
        .filter(|id| VIDEO_ID.is_match(id))
        .context("YouTube video ID was not found")
}

#[async_trait]
impl Resolver for YoutubeResolver {
    fn platform(&self) -> Platform {
        Platform::Youtube
    }

    async fn resolve(&self, url: &Url) -> anyhow::Result<MediaDescriptor> {
        let video_id = video_id(url)?;
        debug!(video_id = %video_id, "Querying innertube player");

        let payload = json!({
            "videoId": video_id,
            "context": {
                "client": {
                    "clientName": "ANDROID",
                    "clientVersion": CLIENT_VERSION,
                    "androidSdkVersion": 30,
                    "hl": "en",
                    "gl": "US"
                }
            },
            "contentCheckOk": true,
            "racyCheckOk": true
        });

        let response = self
            .client
            .post(endpoint(&self.origin, "/youtubei/v1/player"))
            .query(&[("prettyPrint", "false")])
            .header(USER_AGENT, ANDROID_USER_AGENT)
            .header("X-YouTube-Client-Name", "3")
            .header("X-YouTube-Client-Version", CLIENT_VERSION)
            .json(&payload)
            .send()
            .await
            .context("Failed to reach innertube")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("innertube returned {}", status);
        }

        let player: Value = response
            .json()
            .await
            .context("Failed to parse innertube response")?;

        self.map(&video_id, &player)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Url {
        Url::parse(raw).unwrap()
    }

    #[test]
    fn test_video_id_shapes() {
        for raw in [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ?t=42",
            "https://www.youtube.com/shorts/dQw4w9WgXcQ",
            "https://m.youtube.com/embed/dQw4w9WgXcQ",
            "https://www.youtube.com/live/dQw4w9WgXcQ?feature=share",
        ] {
            assert_eq!(video_id(&parse(raw)).unwrap(), "dQw4w9WgXcQ", "{}", raw);
        }
        assert!(video_id(&parse("https://www.youtube.com/@channel")).is_err());
        assert!(video_id(&parse("https://www.youtube.com/watch?v=short")).is_err());
    }

    fn player_body() -> Value {
        json!({
            "playabilityStatus": {"status": "OK"},
            "videoDetails": {
                "videoId": "dQw4w9WgXcQ",
                "title": "Never Gonna Give You Up",
                "author": "Rick Astley",
                "channelId": "UCuAXFkgsw1L7xaCfnd5JJOw",
                "viewCount": "1500000000",
                "thumbnail": {"thumbnails": [
                    {"url": "https://i.ytimg.com/vi/dQw4w9WgXcQ/default.jpg", "width": 120},
                    {"url": "https://i.ytimg.com/vi/dQw4w9WgXcQ/maxres.jpg", "width": 1280}
                ]}
            },
            "streamingData": {
                "formats": [
                    {"mimeType": "video/mp4; codecs=\"avc1\"", "height": 360, "url": "https://rr1.example/360.mp4"},
                    {"mimeType": "video/mp4; codecs=\"avc1\"", "height": 720, "url": "https://rr1.example/720.mp4"},
                    {"mimeType": "video/mp4; codecs=\"avc1\"", "height": 1080, "signatureCipher": "s=abc"}
                ],
                "adaptiveFormats": [
                    {"mimeType": "audio/mp4; codecs=\"mp4a\"", "bitrate": 130000, "url": "https://rr1.example/a128.m4a"},
                    {"mimeType": "audio/webm; codecs=\"opus\"", "bitrate": 50000, "url": "https://rr1.example/a50.webm"},
                    {"mimeType": "video/webm", "bitrate": 900000, "url": "https://rr1.example/v.webm"}
                ]
            }
        })
    }

    #[tokio::test]
    async fn test_maps_player_response() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/youtubei/v1/player")
            .match_query(mockito::Matcher::Any)
            .match_body(mockito::Matcher::PartialJson(json!({"videoId": "dQw4w9WgXcQ"})))
            .with_header("content-type", "application/json")
            .with_body(player_body().to_string())
            .create_async()
            .await;

        let resolver = YoutubeResolver::new(Client::new(), &server.url());
        let descriptor = resolver
            .resolve(&parse("https://youtu.be/dQw4w9WgXcQ"))
            .await
            .unwrap();

        assert_eq!(descriptor.id, "dQw4w9WgXcQ");
        assert_eq!(descriptor.author.unique_id, "UCuAXFkgsw1L7xaCfnd5JJOw");
        assert_eq!(descriptor.stats.plays, 1_500_000_000);
        assert_eq!(descriptor.stats.likes, 0);
        assert_eq!(
            descriptor.downloads.video.as_deref(),
            Some("https://rr1.example/720.mp4")
        );
        assert_eq!(
            descriptor.downloads.music.as_deref(),
            Some("https://rr1.example/a128.m4a")
        );
        assert_eq!(
            descriptor.downloads.thumbnail.as_deref(),
            Some("https://i.ytimg.com/vi/dQw4w9WgXcQ/maxres.jpg")
        );
    }

    #[tokio::test]
    async fn test_unplayable_video_fails() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/youtubei/v1/player")
            .match_query(mockito::Matcher::Any)
            .with_header("content-type", "application/json")
            .with_body(
                json!({"playabilityStatus": {"status": "LOGIN_REQUIRED", "reason": "Private video"}})
                    .to_string(),
            )
            .create_async()
            .await;

        let resolver = YoutubeResolver::new(Client::new(), &server.url());
        let result = resolver
            .resolve(&parse("https://www.youtube.com/watch?v=dQw4w9WgXcQ"))
            .await;
        assert!(result.is_err());
    }
}
