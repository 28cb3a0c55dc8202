use super::{endpoint, Resolver};
use crate::media::model::{Author, MediaDescriptor, MediaType, Platform};
use anyhow::Context;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
};
use tracing::debug;
use url::Url;

lazy_static! {
    static ref VIDEO_URLS: Vec<Regex> = [
        "browser_native_hd_url",
        "playable_url_quality_hd",
        "browser_native_sd_url",
        "playable_url",
    ]
    .iter()
    .map(|key| Regex::new(&format!(r#""{}":"((?:[^"\\]|\\.)+)""#, key)).unwrap())
    .collect();
    static ref OG_IMAGE: Regex =
        Regex::new(r#"<meta\s+property="og:image"\s+content="([^"]+)""#).unwrap();
    static ref OG_TITLE: Regex =
        Regex::new(r#"<meta\s+property="og:title"\s+content="([^"]*)""#).unwrap();
    static ref VIDEO_ID: Regex = Regex::new(r#""video_id":"(\d+)""#).unwrap();
    static ref URL_VIDEO_ID: Regex = Regex::new(r"/(?:videos|reel|watch)/(?:[^/]+/)?(\d+)").unwrap();
    static ref OWNER: Regex = Regex::new(
        r#""owner":\{"__typename":"\w+","id":"(\d+)"(?:,"name":"((?:[^"\\]|\\.)*)")?"#
    )
    .unwrap();
}

/// Resolves Facebook videos and reels by reading the data embedded in the post page.
pub struct FacebookResolver {
    client: Client,
    origin: String,
}

impl FacebookResolver {
    pub fn new(client: Client, origin: &str) -> Self {
        FacebookResolver {
            client,
            origin: origin.to_string(),
        }
    }

    /// facebook.com pages are fetched from the configured origin, short links
    /// are followed as-is.
    fn page_url(&self, url: &Url) -> String {
        let host = url.host_str().unwrap_or_default();
        if host == "fb.watch" || host.ends_with(".fb.watch") {
            return url.to_string();
        }
        let mut path = url.path().to_string();
        if let Some(query) = url.query() {
            path.push('?');
            path.push_str(query);
        }
        endpoint(&self.origin, &path)
    }
}

/// Decodes a JSON string literal body (`\/`, `%`, ...).
fn unescape_json(raw: &str) -> Option<String> {
    serde_json::from_str::<String>(&format!("\"{}\"", raw)).ok()
}

fn unescape_html(raw: &str) -> String {
    raw.replace("&quot;", "\"")
        .replace("&#039;", "'")
        .replace("&#x27;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

fn video_id(page: &str, url: &Url) -> Option<String> {
    if let Some(captures) = VIDEO_ID.captures(page) {
        return Some(captures[1].to_string());
    }
    if let Some((_, id)) = url.query_pairs().find(|(key, _)| key == "v") {
        return Some(id.into_owned());
    }
    URL_VIDEO_ID
        .captures(url.path())
        .map(|captures| captures[1].to_string())
}

/// Maps a post page into a descriptor.
pub fn parse_page(page: &str, url: &Url) -> anyhow::Result<MediaDescriptor> {
    let video_url = VIDEO_URLS
        .iter()
        .filter_map(|re| re.captures(page))
        .filter_map(|captures| unescape_json(&captures[1]))
        .find(|url| url.starts_with("http"))
        .context("No playable video found, the post may be private or removed")?;

    let id = video_id(page, url).context("Facebook video ID was not found")?;

    let mut descriptor = MediaDescriptor::new(id, Platform::Facebook, MediaType::Video);
    descriptor.title = OG_TITLE
        .captures(page)
        .map(|captures| unescape_html(&captures[1]))
        .unwrap_or_default();

    if let Some(owner) = OWNER.captures(page) {
        descriptor.author = Author {
            unique_id: owner[1].to_string(),
            nickname: owner
                .get(2)
                .and_then(|name| unescape_json(name.as_str()))
                .unwrap_or_default(),
            avatar: String::new(),
        };
    }

    let thumbnail = OG_IMAGE
        .captures(page)
        .map(|captures| unescape_html(&captures[1]));
    descriptor.cover = thumbnail.clone().unwrap_or_default();
    descriptor.downloads.video = Some(video_url);
    descriptor.downloads.thumbnail = thumbnail;

    Ok(descriptor)
}

#[async_trait]
impl Resolver for FacebookResolver {
    fn platform(&self) -> Platform {
        Platform::Facebook
    }

    async fn resolve(&self, url: &Url) -> anyhow::Result<MediaDescriptor> {
        let page_url = self.page_url(url);
        debug!(url = %page_url, "Fetching facebook page");

        let mut headers = HeaderMap::new();
        headers.insert(
            "Accept",
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert("Accept-Language", HeaderValue::from_static("en-US,en;q=0.5"));
        headers.insert("Sec-Fetch-Dest", HeaderValue::from_static("document"));
        headers.insert("Sec-Fetch-Mode", HeaderValue::from_static("navigate"));
        headers.insert("Sec-Fetch-Site", HeaderValue::from_static("none"));

        let response = self
            .client
            .get(&page_url)
            .headers(headers)
            .send()
            .await
            .context("Failed to reach facebook")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("facebook returned {}", status);
        }

        let final_url = response.url().clone();
        let page = response
            .text()
            .await
            .context("Failed to read facebook page")?;

        // short links redirect to the canonical post, which carries the id
        parse_page(&page, &final_url).or_else(|_| parse_page(&page, url))
    }
}
