mod facebook;
mod instagram;
mod tiktok;
mod youtube;

use super::{
    error::MediaError,
    limits::UpstreamLimits,
    model::{AssetKind, MediaDescriptor, MediaType, Platform},
    token::AssetSigner,
};
use crate::{config::Config, utils::format_count};
use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;
use std::{collections::HashMap, sync::Arc, time::Duration, time::Instant};
use tracing::{error, info, warn};
use url::Url;

pub use facebook::FacebookResolver;
pub use instagram::InstagramResolver;
pub use tiktok::TikTokResolver;
pub use youtube::YoutubeResolver;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Turns a public post URL of one platform into a [`MediaDescriptor`].
#[async_trait]
pub trait Resolver: Send + Sync {
    fn platform(&self) -> Platform;

    /// Fetch the post and map the platform's response. Errors carry full
    /// upstream detail and are sanitized by [`Resolvers`].
    async fn resolve(&self, url: &Url) -> anyhow::Result<MediaDescriptor>;
}

/// Shared client used by every adapter and by the gateway.
pub fn http_client(config: &Config) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(config.upstream_timeout)
        .build()
        .context("Failed to build reqwest client")
}

/// Dispatch table from platform to adapter
pub struct Resolvers {
    table: HashMap<Platform, Arc<dyn Resolver>>,
    limits: UpstreamLimits,
    timeout: Duration,
    signer: AssetSigner,
}

impl Resolvers {
    pub fn new(
        config: &Config,
        client: reqwest::Client,
        limits: UpstreamLimits,
        signer: AssetSigner,
    ) -> Self {
        let resolvers: Vec<Arc<dyn Resolver>> = vec![
            Arc::new(TikTokResolver::new(client.clone(), &config.origins.tiktok)),
            Arc::new(YoutubeResolver::new(client.clone(), &config.origins.youtube)),
            Arc::new(FacebookResolver::new(client.clone(), &config.origins.facebook)),
            Arc::new(InstagramResolver::new(client, &config.origins.instagram)),
        ];
        Self::with_resolvers(resolvers, limits, config.upstream_timeout, signer)
    }

    pub fn with_resolvers(
        resolvers: Vec<Arc<dyn Resolver>>,
        limits: UpstreamLimits,
        timeout: Duration,
        signer: AssetSigner,
    ) -> Self {
        let table = resolvers
            .into_iter()
            .map(|resolver| (resolver.platform(), resolver))
            .collect();
        Resolvers {
            table,
            limits,
            timeout,
            signer,
        }
    }

    pub async fn resolve(
        &self,
        platform: Platform,
        url: &Url,
    ) -> Result<MediaDescriptor, MediaError> {
        let resolver = self.table.get(&platform).ok_or_else(|| {
            MediaError::Internal(anyhow::anyhow!("no resolver registered for {}", platform))
        })?;

        let started = Instant::now();
        let outcome = tokio::time::timeout(self.timeout, async {
            let _permit = self.limits.acquire(platform).await?;
            resolver.resolve(url).await.map_err(|error| {
                error!(platform = %platform, url = %url, error = ?error, "Failed to resolve post");
                MediaError::from_upstream(error)
            })
        })
        .await;

        let descriptor = match outcome {
            Ok(descriptor) => descriptor?,
            Err(_) => {
                warn!(platform = %platform, url = %url, timeout = ?self.timeout, "Resolution timed out");
                return Err(MediaError::UpstreamTimeout);
            }
        };

        let descriptor = self.finish(platform, descriptor)?;
        info!(
            platform = %platform,
            id = %descriptor.id,
            plays = %format_count(descriptor.stats.plays),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Resolved post"
        );
        Ok(descriptor)
    }

    /// Enforces descriptor invariants and attaches stream tokens.
    fn finish(
        &self,
        platform: Platform,
        mut descriptor: MediaDescriptor,
    ) -> Result<MediaDescriptor, MediaError> {
        descriptor.platform = platform;

        if descriptor.id.is_empty() {
            return Err(MediaError::ResolutionFailed(anyhow::anyhow!(
                "{} adapter returned an empty id",
                platform
            )));
        }

        for kind in [AssetKind::Video, AssetKind::Music, AssetKind::Thumbnail] {
            let valid = descriptor
                .downloads
                .get(kind)
                .filter(|raw| is_absolute_http(raw))
                .cloned();
            if valid.is_none() && descriptor.downloads.get(kind).is_some() {
                warn!(platform = %platform, id = %descriptor.id, kind = ?kind, "Dropping non-absolute asset url");
            }
            descriptor.downloads.set(kind, valid);
        }

        if descriptor.media_type == MediaType::Video && descriptor.downloads.video.is_none() {
            return Err(MediaError::ResolutionFailed(anyhow::anyhow!(
                "{} post {} has no playable video",
                platform,
                descriptor.id
            )));
        }

        for kind in [AssetKind::Video, AssetKind::Music, AssetKind::Thumbnail] {
            let token = match descriptor.downloads.get(kind) {
                Some(url) => Some(self.signer.issue(platform, kind, &descriptor.id, url)?),
                None => None,
            };
            descriptor.tokens.set(kind, token);
        }

        Ok(descriptor)
    }
}

fn is_absolute_http(raw: &str) -> bool {
    Url::parse(raw)
        .map(|url| (url.scheme() == "http" || url.scheme() == "https") && url.has_host())
        .unwrap_or(false)
}

/// Resolves a possibly relative asset path against the upstream origin.
pub(crate) fn absolute_url(origin: &str, raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if Url::parse(raw).is_ok() {
        return Some(raw.to_string());
    }
    Url::parse(origin)
        .and_then(|base| base.join(raw))
        .map(|url| url.to_string())
        .ok()
}

/// Joins a path onto a configured origin.
pub(crate) fn endpoint(origin: &str, path: &str) -> String {
    format!("{}{}", origin.trim_end_matches('/'), path)
}

/// Reads a JSON string or number as text, empty when missing.
pub(crate) fn json_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

/// Reads a counter that platforms send either as a number or a numeric string.
pub(crate) fn json_count(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f > 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// First non-empty string among the given JSON values.
pub(crate) fn first_text(values: &[&Value]) -> Option<String> {
    values
        .iter()
        .map(|value| json_text(value))
        .find(|text| !text.is_empty())
}
