use crate::media::Platform;
use anyhow::Context;
use std::{env, str::FromStr, time::Duration};

/// Upstream origins each platform adapter talks to.
#[derive(Debug, Clone)]
pub struct Origins {
    pub tiktok: String,
    pub youtube: String,
    pub facebook: String,
    pub instagram: String,
}

impl Default for Origins {
    fn default() -> Self {
        Origins {
            tiktok: "https://www.tikwm.com".to_string(),
            youtube: "https://www.youtube.com".to_string(),
            facebook: "https://www.facebook.com".to_string(),
            instagram: "https://www.instagram.com".to_string(),
        }
    }
}

/// How long a platform keeps its direct asset links alive.
#[derive(Debug, Clone)]
pub struct AssetTtl {
    pub tiktok: Duration,
    pub youtube: Duration,
    pub facebook: Duration,
    pub instagram: Duration,
}

impl Default for AssetTtl {
    fn default() -> Self {
        AssetTtl {
            tiktok: Duration::from_secs(300),
            youtube: Duration::from_secs(6 * 60 * 60),
            facebook: Duration::from_secs(60 * 60),
            instagram: Duration::from_secs(60 * 60),
        }
    }
}

impl AssetTtl {
    pub fn get(&self, platform: Platform) -> Duration {
        match platform {
            Platform::Tiktok => self.tiktok,
            Platform::Youtube => self.youtube,
            Platform::Facebook => self.facebook,
            Platform::Instagram => self.instagram,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub signing_secret: String,
    pub upstream_timeout: Duration,
    pub stream_timeout: Duration,
    /// Assets at or below this many bytes are buffered instead of streamed
    pub stream_buffer_threshold: u64,
    pub max_upstream_connections: usize,
    pub asset_ttl: AssetTtl,
    pub origins: Origins,
    pub swagger_credentials: Option<(String, String)>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let signing_secret = env::var("SIGNING_SECRET").context("SIGNING_SECRET must be set")?;
        if signing_secret.len() < 16 {
            anyhow::bail!("SIGNING_SECRET must be at least 16 characters long");
        }

        let defaults = Origins::default();
        let ttl = AssetTtl::default();

        let swagger_credentials = match (
            env::var("SWAGGER_USERNAME").ok(),
            env::var("SWAGGER_PASSWORD").ok(),
        ) {
            (Some(username), Some(password)) => Some((username, password)),
            _ => None,
        };

        Ok(Config {
            host: env::var("HOST").unwrap_or("http://localhost:3000".to_string()),
            port: parse_env("PORT", 3000)?,
            signing_secret,
            upstream_timeout: Duration::from_secs(parse_env("UPSTREAM_TIMEOUT_SECS", 15)?),
            stream_timeout: Duration::from_secs(parse_env("STREAM_TIMEOUT_SECS", 300)?),
            stream_buffer_threshold: parse_env("STREAM_BUFFER_THRESHOLD", 1024 * 1024)?,
            max_upstream_connections: parse_env("MAX_UPSTREAM_CONNECTIONS", 16)?,
            asset_ttl: AssetTtl {
                tiktok: secs_env("TIKTOK_ASSET_TTL_SECS", ttl.tiktok)?,
                youtube: secs_env("YOUTUBE_ASSET_TTL_SECS", ttl.youtube)?,
                facebook: secs_env("FACEBOOK_ASSET_TTL_SECS", ttl.facebook)?,
                instagram: secs_env("INSTAGRAM_ASSET_TTL_SECS", ttl.instagram)?,
            },
            origins: Origins {
                tiktok: env::var("TIKTOK_ORIGIN").unwrap_or(defaults.tiktok),
                youtube: env::var("YOUTUBE_ORIGIN").unwrap_or(defaults.youtube),
                facebook: env::var("FACEBOOK_ORIGIN").unwrap_or(defaults.facebook),
                instagram: env::var("INSTAGRAM_ORIGIN").unwrap_or(defaults.instagram),
            },
            swagger_credentials,
        })
    }

    /// Config pointing every platform at a single test server.
    #[cfg(test)]
    pub fn for_upstream(origin: &str) -> Self {
        Config {
            host: "http://localhost:3000".to_string(),
            port: 3000,
            signing_secret: "test-signing-secret-0123456789".to_string(),
            upstream_timeout: Duration::from_secs(5),
            stream_timeout: Duration::from_secs(5),
            stream_buffer_threshold: 16,
            max_upstream_connections: 4,
            asset_ttl: AssetTtl::default(),
            origins: Origins {
                tiktok: origin.to_string(),
                youtube: origin.to_string(),
                facebook: origin.to_string(),
                instagram: origin.to_string(),
            },
            swagger_credentials: None,
        }
    }
}

fn parse_env<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: {}", key, value)),
        Err(_) => Ok(default),
    }
}

fn secs_env(key: &str, default: Duration) -> anyhow::Result<Duration> {
    Ok(Duration::from_secs(parse_env(key, default.as_secs())?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_ttl_defaults() {
        let ttl = AssetTtl::default();
        assert_eq!(ttl.get(Platform::Tiktok), Duration::from_secs(300));
        assert!(ttl.get(Platform::Youtube) > ttl.get(Platform::Instagram));
    }

    #[test]
    fn test_parse_env_falls_back_to_default() {
        let value: u64 = parse_env("TIKLOAD_TEST_UNSET_VARIABLE", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_parse_env_rejects_garbage() {
        env::set_var("TIKLOAD_TEST_BAD_PORT", "not-a-port");
        let result: anyhow::Result<u16> = parse_env("TIKLOAD_TEST_BAD_PORT", 3000);
        assert!(result.is_err());
        env::remove_var("TIKLOAD_TEST_BAD_PORT");
    }
}
