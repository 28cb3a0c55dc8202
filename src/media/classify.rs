use super::{error::MediaError, model::Platform};
use url::Url;

/// Finds the platform a host belongs to.
pub fn detect_platform(url: &Url) -> Option<Platform> {
    let host = url.host_str()?.trim_end_matches('.').to_ascii_lowercase();
    Platform::ALL.into_iter().find(|platform| {
        platform
            .domains()
            .iter()
            .any(|domain| host == *domain || host.ends_with(&format!(".{}", domain)))
    })
}

/// Validates a user supplied post URL against the platform the caller asked for.
pub fn classify(declared: Platform, raw_url: &str) -> Result<Url, MediaError> {
    let raw_url = raw_url.trim();
    let url = Url::parse(raw_url)
        .map_err(|_| MediaError::InvalidUrl("Not a valid link".to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(MediaError::InvalidUrl(
            "Only http and https links are supported".to_string(),
        ));
    }

    match detect_platform(&url) {
        Some(platform) if platform == declared => Ok(url),
        Some(platform) => Err(MediaError::InvalidUrl(format!(
            "This is a {} link, not a {} link",
            platform, declared
        ))),
        None => Err(MediaError::InvalidUrl(format!(
            "Not a supported {} link",
            declared
        ))),
    }
}
