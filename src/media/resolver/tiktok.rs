use super::{absolute_url, endpoint, first_text, json_count, json_text, Resolver};
use crate::media::model::{Author, MediaDescriptor, MediaType, Platform, Stats};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::{header::ACCEPT, Client};
use serde_json::Value;
use tracing::debug;
use url::Url;

/// Resolves TikTok posts through the TikWM API.
pub struct TikTokResolver {
    client: Client,
    origin: String,
}

impl TikTokResolver {
    pub fn new(client: Client, origin: &str) -> Self {
        TikTokResolver {
            client,
            origin: origin.to_string(),
        }
    }

    fn map(&self, data: &Value) -> anyhow::Result<MediaDescriptor> {
        let id = json_text(&data["id"]);
        if id.is_empty() {
            anyhow::bail!("tikwm response has no post id");
        }

        let is_slideshow = data["images"]
            .as_array()
            .is_some_and(|images| !images.is_empty());
        let media_type = if is_slideshow {
            MediaType::Image
        } else {
            MediaType::Video
        };

        let mut descriptor = MediaDescriptor::new(id, Platform::Tiktok, media_type);
        descriptor.title = json_text(&data["title"]);
        descriptor.author = Author {
            unique_id: json_text(&data["author"]["unique_id"]),
            nickname: json_text(&data["author"]["nickname"]),
            avatar: self.asset(&data["author"]["avatar"]).unwrap_or_default(),
        };
        descriptor.cover = self.asset(&data["cover"]).unwrap_or_default();
        descriptor.stats = Stats {
            plays: json_count(&data["play_count"]),
            likes: json_count(&data["digg_count"]),
            comments: json_count(&data["comment_count"]),
        };

        if !is_slideshow {
            descriptor.downloads.video = first_text(&[&data["hdplay"], &data["play"]])
                .and_then(|raw| absolute_url(&self.origin, &raw));
        }
        descriptor.downloads.music = first_text(&[&data["music"], &data["music_info"]["play"]])
            .and_then(|raw| absolute_url(&self.origin, &raw));
        descriptor.downloads.thumbnail = first_text(&[&data["origin_cover"], &data["cover"]])
            .and_then(|raw| absolute_url(&self.origin, &raw));

        Ok(descriptor)
    }

    fn asset(&self, value: &Value) -> Option<String> {
        absolute_url(&self.origin, &json_text(value))
    }
}

#[async_trait]
impl Resolver for TikTokResolver {
    fn platform(&self) -> Platform {
        Platform::Tiktok
    }

    async fn resolve(&self, url: &Url) -> anyhow::Result<MediaDescriptor> {
        debug!(url = %url, "Querying tikwm");

        let response = self
            .client
            .get(endpoint(&self.origin, "/api/"))
            .query(&[("url", url.as_str()), ("hd", "1")])
            .header(ACCEPT, "application/json")
            .send()
            .await
            .context("Failed to reach tikwm")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("tikwm returned {}", status);
        }

        let body: Value = response
            .json()
            .await
            .context("Failed to parse tikwm response")?;

        let code = body["code"].as_i64().context("tikwm response has no code")?;
        if code != 0 {
            anyhow::bail!(
                "tikwm rejected the post (code {}): {}",
                code,
                body["msg"].as_str().unwrap_or("unknown error")
            );
        }

        self.map(&body["data"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    const POST: &str = "https://www.tiktok.com/@user/video/123";

    fn video_body() -> Value {
        json!({
            "code": 0,
            "msg": "success",
            "data": {
                "id": "123",
                "title": "dance",
                "cover": "https://p16.example/cover.jpg",
                "origin_cover": "https://p16.example/origin.jpg",
                "play": "/video/media/play/123.mp4",
                "hdplay": "",
                "music": "https://sf16.example/music.mp3",
                "play_count": 1000000,
                "digg_count": 2500,
                "comment_count": "31",
                "author": {
                    "unique_id": "user",
                    "nickname": "User",
                    "avatar": "https://p16.example/avatar.jpg"
                }
            }
        })
    }

    async fn resolve_with(body: Value) -> (anyhow::Result<MediaDescriptor>, String) {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("url".into(), POST.into()),
                Matcher::UrlEncoded("hd".into(), "1".into()),
            ]))
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await;

        let resolver = TikTokResolver::new(Client::new(), &server.url());
        let result = resolver.resolve(&Url::parse(POST).unwrap()).await;
        (result, server.url())
    }

    #[tokio::test]
    async fn test_maps_video_post() {
        let (result, origin) = resolve_with(video_body()).await;
        let descriptor = result.unwrap();

        assert_eq!(descriptor.id, "123");
        assert_eq!(descriptor.media_type, MediaType::Video);
        assert_eq!(descriptor.author.unique_id, "user");
        assert_eq!(descriptor.stats.plays, 1_000_000);
        assert_eq!(descriptor.stats.comments, 31);
        assert_eq!(
            descriptor.downloads.video,
            Some(format!("{}/video/media/play/123.mp4", origin))
        );
        assert_eq!(
            descriptor.downloads.music.as_deref(),
            Some("https://sf16.example/music.mp3")
        );
        assert_eq!(
            descriptor.downloads.thumbnail.as_deref(),
            Some("https://p16.example/origin.jpg")
        );
    }

    #[tokio::test]
    async fn test_prefers_hd_video() {
        let mut body = video_body();
        body["data"]["hdplay"] = json!("https://v16.example/hd.mp4");
        let (result, _) = resolve_with(body).await;
        assert_eq!(
            result.unwrap().downloads.video.as_deref(),
            Some("https://v16.example/hd.mp4")
        );
    }

    #[tokio::test]
    async fn test_slideshow_has_no_video() {
        let mut body = video_body();
        body["data"]["images"] = json!(["https://p16.example/1.jpg"]);
        let (result, _) = resolve_with(body).await;
        let descriptor = result.unwrap();
        assert_eq!(descriptor.media_type, MediaType::Image);
        assert!(descriptor.downloads.video.is_none());
    }

    #[tokio::test]
    async fn test_api_error_code_fails() {
        let (result, _) =
            resolve_with(json!({"code": -1, "msg": "Url parsing is failed!", "data": null})).await;
        assert!(result.is_err());
    }
}
