use super::{endpoint, first_text, json_count, json_text, Resolver};
use crate::media::model::{Author, MediaDescriptor, MediaType, Platform, Stats};
use anyhow::Context;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
};
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

const DOC_ID: &str = "10015901848480474";
const LSD: &str = "AVqbxe3J_YA";

lazy_static! {
    static ref POST_PATH: Regex = Regex::new(r"^/(?:[\w.]+/)?(?:p|reels?|tv)/([a-zA-Z0-9_-]+)/?").unwrap();
}

/// Resolves Instagram posts and reels through the public GraphQL endpoint.
pub struct InstagramResolver {
    client: Client,
    origin: String,
}

impl InstagramResolver {
    pub fn new(client: Client, origin: &str) -> Self {
        InstagramResolver {
            client,
            origin: origin.to_string(),
        }
    }

    fn headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Accept", HeaderValue::from_static("*/*"));
        headers.insert("Accept-Language", HeaderValue::from_static("en-US,en;q=0.5"));
        headers.insert(
            "X-FB-Friendly-Name",
            HeaderValue::from_static("PolarisPostActionLoadPostQueryQuery"),
        );
        headers.insert("X-IG-App-ID", HeaderValue::from_static("1217981644879628"));
        headers.insert("X-FB-LSD", HeaderValue::from_static(LSD));
        headers.insert("X-ASBD-ID", HeaderValue::from_static("129477"));
        headers.insert("Sec-Fetch-Dest", HeaderValue::from_static("empty"));
        headers.insert("Sec-Fetch-Mode", HeaderValue::from_static("cors"));
        headers.insert("Sec-Fetch-Site", HeaderValue::from_static("same-origin"));
        headers.insert("User-Agent", HeaderValue::from_static("Mozilla/5.0 (Linux; Android 11; SAMSUNG SM-G973U) AppleWebKit/537.36 (KHTML, like Gecko) SamsungBrowser/14.2 Chrome/87.0.4280.141 Mobile Safari/537.36"));
        headers
    }
}

pub fn get_post_id(url: &Url) -> anyhow::Result<String> {
    POST_PATH
        .captures(url.path())
        .map(|captures| captures[1].to_string())
        .context("Instagram post/reel ID was not found")
}

/// Maps `xdt_shortcode_media` into a descriptor.
pub fn map_media(media: &Value) -> anyhow::Result<MediaDescriptor> {
    if !media.is_object() {
        anyhow::bail!("Instagram returned no media, the post may be private or removed");
    }

    let shortcode = json_text(&media["shortcode"]);
    let id = if shortcode.is_empty() {
        json_text(&media["id"])
    } else {
        shortcode
    };

    let is_video = media["is_video"].as_bool().unwrap_or(false);
    let media_type = if is_video {
        MediaType::Video
    } else {
        MediaType::Image
    };

    let owner = &media["owner"];
    let mut descriptor = MediaDescriptor::new(id, Platform::Instagram, media_type);
    descriptor.title = json_text(&media["edge_media_to_caption"]["edges"][0]["node"]["text"]);
    descriptor.author = Author {
        unique_id: json_text(&owner["username"]),
        nickname: json_text(&owner["full_name"]),
        avatar: json_text(&owner["profile_pic_url"]),
    };
    descriptor.cover = json_text(&media["display_url"]);
    descriptor.stats = Stats {
        plays: json_count(&media["video_play_count"]).max(json_count(&media["video_view_count"])),
        likes: json_count(&media["edge_media_preview_like"]["count"]),
        comments: json_count(&media["edge_media_to_parent_comment"]["count"])
            .max(json_count(&media["edge_media_to_comment"]["count"])),
    };

    if is_video {
        descriptor.downloads.video = first_text(&[&media["video_url"]]);
    }
    descriptor.downloads.thumbnail = first_text(&[&media["display_url"], &media["thumbnail_src"]]);

    Ok(descriptor)
}

#[async_trait]
impl Resolver for InstagramResolver {
    fn platform(&self) -> Platform {
        Platform::Instagram
    }

    async fn resolve(&self, url: &Url) -> anyhow::Result<MediaDescriptor> {
        let post_id = get_post_id(url)?;
        debug!(post_id = %post_id, "Querying instagram graphql");

        let variables = json!({
            "shortcode": post_id,
            "fetch_comment_count": null,
            "fetch_related_profile_media_count": null,
            "parent_comment_count": null,
            "child_comment_count": null,
            "fetch_like_count": null,
            "fetch_tagged_user_count": null,
            "fetch_preview_comment_count": null,
            "has_threaded_comments": false,
            "hoisted_comment_id": null,
            "hoisted_reply_id": null
        })
        .to_string();

        let form = [
            ("av", "0"),
            ("__d", "www"),
            ("__user", "0"),
            ("__a", "1"),
            ("__req", "3"),
            ("__comet_req", "7"),
            ("lsd", LSD),
            ("jazoest", "2957"),
            ("fb_api_caller_class", "RelayModern"),
            (
                "fb_api_req_friendly_name",
                "PolarisPostActionLoadPostQueryQuery",
            ),
            ("variables", variables.as_str()),
            ("server_timestamps", "true"),
            ("doc_id", DOC_ID),
        ];

        let response = self
            .client
            .post(endpoint(&self.origin, "/api/graphql"))
            .headers(Self::headers())
            .form(&form)
            .send()
            .await
            .context("Failed to reach instagram")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("instagram graphql returned {}", status);
        }

        let response_data: Value = response
            .json()
            .await
            .context("Failed to parse instagram response")?;

        map_media(&response_data["data"]["xdt_shortcode_media"])
    }
}
