use super::{
    error::MediaError,
    limits::UpstreamLimits,
    model::{AssetKind, Platform},
    token::AssetClaims,
};
use crate::config::Config;
use futures::StreamExt;
use poem::Body;
use reqwest::{
    header::{CONTENT_TYPE, REFERER},
    Client, StatusCode,
};
use std::{io, time::Duration};
use tracing::{debug, error, warn};

/// Bytes of a remote asset ready to be relayed to the caller
pub struct Asset {
    pub body: Body,
    pub content_type: String,
    pub filename: String,
}

/// Relays asset bytes from platform CDNs.
pub struct Gateway {
    client: Client,
    limits: UpstreamLimits,
    timeout: Duration,
    buffer_threshold: u64,
}

impl Gateway {
    pub fn new(client: Client, limits: UpstreamLimits, config: &Config) -> Self {
        Gateway {
            client,
            limits,
            timeout: config.stream_timeout,
            buffer_threshold: config.stream_buffer_threshold,
        }
    }

    /// Fetches a verified asset. Small assets are buffered, everything else
    /// is streamed while holding the platform's connection permit.
    pub async fn fetch(&self, claims: &AssetClaims) -> Result<Asset, MediaError> {
        let permit = tokio::time::timeout(self.timeout, self.limits.acquire(claims.platform))
            .await
            .map_err(|_| MediaError::UpstreamTimeout)??;

        // the request timeout also covers reading the body
        let response = self
            .client
            .get(&claims.url)
            .timeout(self.timeout)
            .header(REFERER, referer(claims.platform))
            .send()
            .await
            .map_err(|e| upstream_error(claims, e))?;

        let status = response.status();
        if matches!(
            status,
            StatusCode::FORBIDDEN | StatusCode::NOT_FOUND | StatusCode::GONE
        ) {
            warn!(url = %claims.url, status = %status, "Asset link no longer valid");
            return Err(MediaError::AssetUnavailable(format!(
                "upstream returned {}",
                status
            )));
        }
        if !status.is_success() {
            error!(url = %claims.url, status = %status, "Asset fetch failed");
            return Err(MediaError::ResolutionFailed(anyhow::anyhow!(
                "asset fetch returned {}",
                status
            )));
        }

        let content_type = normalize_content_type(
            claims.kind,
            response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|value| value.to_str().ok()),
        );
        let filename = filename(claims, &content_type);

        let body = match response.content_length() {
            Some(length) if length <= self.buffer_threshold => {
                debug!(url = %claims.url, length, "Buffering asset");
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| upstream_error(claims, e))?;
                drop(permit);
                Body::from_bytes(bytes)
            }
            length => {
                debug!(url = %claims.url, length = ?length, "Streaming asset");
                let stream = response.bytes_stream().map(move |chunk| {
                    let _held = &permit;
                    chunk.map_err(io::Error::other)
                });
                Body::from_bytes_stream(stream)
            }
        };

        Ok(Asset {
            body,
            content_type,
            filename,
        })
    }
}

fn upstream_error(claims: &AssetClaims, error: reqwest::Error) -> MediaError {
    error!(url = %claims.url, error = %error, "Failed to fetch asset");
    MediaError::from_upstream(anyhow::Error::new(error))
}

fn referer(platform: Platform) -> &'static str {
    match platform {
        Platform::Tiktok => "https://www.tiktok.com/",
        Platform::Youtube => "https://www.youtube.com/",
        Platform::Facebook => "https://www.facebook.com/",
        Platform::Instagram => "https://www.instagram.com/",
    }
}

/// Keeps the upstream content type when it matches the asset kind,
/// otherwise falls back to the kind's default.
pub fn normalize_content_type(kind: AssetKind, upstream: Option<&str>) -> String {
    let (prefix, fallback) = match kind {
        AssetKind::Video => ("video/", "video/mp4"),
        AssetKind::Music => ("audio/", "audio/mpeg"),
        AssetKind::Thumbnail => ("image/", "image/jpeg"),
    };
    upstream
        .and_then(|value| value.split(';').next())
        .map(|mime| mime.trim().to_ascii_lowercase())
        .filter(|mime| mime.starts_with(prefix) && mime.len() > prefix.len())
        .unwrap_or_else(|| fallback.to_string())
}

fn extension(content_type: &str) -> &str {
    match content_type {
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "video/quicktime" => "mov",
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/mp4" | "audio/x-m4a" => "m4a",
        "audio/webm" => "webm",
        "audio/aac" => "aac",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/heic" => "heic",
        other => other
            .split('/')
            .nth(1)
            .filter(|subtype| subtype.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or("bin"),
    }
}

/// Suggested filename, e.g. `tiktok_video_123.mp4`.
pub fn filename(claims: &AssetClaims, content_type: &str) -> String {
    let id: String = claims
        .media_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    let id = if id.is_empty() { "media".to_string() } else { id };
    format!(
        "{}_{}_{}.{}",
        claims.platform,
        claims.kind.label(),
        id,
        extension(content_type)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::error::ErrorKind;

    fn claims(url: String, kind: AssetKind) -> AssetClaims {
        AssetClaims {
            url,
            platform: Platform::Tiktok,
            kind,
            media_id: "123".to_string(),
            iat: 0,
            exp: 0,
        }
    }

    fn gateway(threshold: u64) -> Gateway {
        let mut config = Config::for_upstream("http://127.0.0.1");
        config.stream_buffer_threshold = threshold;
        Gateway::new(Client::new(), UpstreamLimits::new(2), &config)
    }

    #[test]
    fn test_normalize_content_type() {
        assert_eq!(
            normalize_content_type(AssetKind::Video, Some("video/mp4")),
            "video/mp4"
        );
        assert_eq!(
            normalize_content_type(AssetKind::Video, Some("application/octet-stream")),
            "video/mp4"
        );
        assert_eq!(
            normalize_content_type(AssetKind::Music, Some("audio/mp4; codecs=mp4a.40.2")),
            "audio/mp4"
        );
        assert_eq!(normalize_content_type(AssetKind::Music, None), "audio/mpeg");
        assert_eq!(
            normalize_content_type(AssetKind::Thumbnail, Some("IMAGE/WEBP")),
            "image/webp"
        );
    }

    #[test]
    fn test_filename() {
        let claims = claims("https://cdn.example/a".to_string(), AssetKind::Music);
        assert_eq!(filename(&claims, "audio/mpeg"), "tiktok_audio_123.mp3");

        let mut odd = claims;
        odd.kind = AssetKind::Thumbnail;
        odd.media_id = "../../etc\"".to_string();
        assert_eq!(filename(&odd, "image/jpeg"), "tiktok_cover_etc.jpg");
    }

    #[tokio::test]
    async fn test_buffers_small_assets() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/cover.jpg")
            .match_header("referer", "https://www.tiktok.com/")
            .with_header("content-type", "image/jpeg")
            .with_body("tiny")
            .create_async()
            .await;

        let claims = claims(format!("{}/cover.jpg", server.url()), AssetKind::Thumbnail);
        let asset = gateway(1024).fetch(&claims).await.unwrap();
        assert_eq!(asset.content_type, "image/jpeg");
        assert_eq!(asset.filename, "tiktok_cover_123.jpg");
        assert_eq!(asset.body.into_string().await.unwrap(), "tiny");
    }

    #[tokio::test]
    async fn test_streams_large_assets() {
        let payload = "x".repeat(4096);
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/video.mp4")
            .with_header("content-type", "video/mp4")
            .with_body(&payload)
            .create_async()
            .await;

        let claims = claims(format!("{}/video.mp4", server.url()), AssetKind::Video);
        let asset = gateway(16).fetch(&claims).await.unwrap();
        assert_eq!(asset.body.into_string().await.unwrap(), payload);
    }

    #[tokio::test]
    async fn test_expired_cdn_link_is_asset_unavailable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/video.mp4")
            .with_status(403)
            .create_async()
            .await;

        let claims = claims(format!("{}/video.mp4", server.url()), AssetKind::Video);
        let error = gateway(16).fetch(&claims).await.err().unwrap();
        assert_eq!(error.kind(), ErrorKind::AssetUnavailable);
    }

    #[tokio::test]
    async fn test_upstream_server_error_is_resolution_failed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/video.mp4")
            .with_status(500)
            .create_async()
            .await;

        let claims = claims(format!("{}/video.mp4", server.url()), AssetKind::Video);
        let error = gateway(16).fetch(&claims).await.err().unwrap();
        assert_eq!(error.kind(), ErrorKind::ResolutionFailed);
    }

    #[tokio::test]
    async fn test_silent_upstream_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let mut config = Config::for_upstream("http://127.0.0.1");
        config.stream_timeout = Duration::from_millis(300);
        let gateway = Gateway::new(Client::new(), UpstreamLimits::new(2), &config);

        let claims = claims(format!("http://{}/video.mp4", addr), AssetKind::Video);
        let error = gateway.fetch(&claims).await.err().unwrap();
        assert_eq!(error.kind(), ErrorKind::UpstreamTimeout);
    }
}
