use poem_openapi::Enum;
use thiserror::Error;

/// Error kinds surfaced to callers in the response envelope
#[derive(Debug, Enum, Clone, Copy, PartialEq, Eq)]
#[oai(rename_all = "PascalCase")]
pub enum ErrorKind {
    /// Malformed or platform-mismatched input, correct it before retrying
    InvalidUrl,
    /// The post could not be accessed or mapped, retry later
    ResolutionFailed,
    /// The platform did not answer in time, safe to retry once
    UpstreamTimeout,
    /// The asset link expired, resolve the post again
    AssetUnavailable,
    /// Unexpected failure
    InternalError,
}

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("asset url was not issued by this service: {0}")]
    UnknownAsset(String),
    #[error("resolution failed: {0:#}")]
    ResolutionFailed(anyhow::Error),
    #[error("upstream timed out")]
    UpstreamTimeout,
    #[error("asset is no longer available: {0}")]
    AssetUnavailable(String),
    #[error("internal error: {0:#}")]
    Internal(anyhow::Error),
}

impl MediaError {
    /// Translates an upstream failure into the public taxonomy.
    pub fn from_upstream(error: anyhow::Error) -> Self {
        let timed_out = error.chain().any(|cause| {
            cause
                .downcast_ref::<reqwest::Error>()
                .is_some_and(|e| e.is_timeout())
        });
        if timed_out {
            MediaError::UpstreamTimeout
        } else {
            MediaError::ResolutionFailed(error)
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            MediaError::InvalidUrl(_) | MediaError::UnknownAsset(_) => ErrorKind::InvalidUrl,
            MediaError::ResolutionFailed(_) => ErrorKind::ResolutionFailed,
            MediaError::UpstreamTimeout => ErrorKind::UpstreamTimeout,
            MediaError::AssetUnavailable(_) => ErrorKind::AssetUnavailable,
            MediaError::Internal(_) => ErrorKind::InternalError,
        }
    }

    /// Message safe to hand to callers. Never contains upstream detail.
    pub fn public_message(&self) -> String {
        match self {
            MediaError::InvalidUrl(reason) => reason.clone(),
            MediaError::UnknownAsset(_) => {
                "Asset link was not issued by this service".to_string()
            }
            MediaError::ResolutionFailed(_) => {
                "Could not fetch this post. Check the link or try again shortly".to_string()
            }
            MediaError::UpstreamTimeout => {
                "The platform took too long to respond. Try again shortly".to_string()
            }
            MediaError::AssetUnavailable(_) => {
                "The download link has expired. Resolve the post again".to_string()
            }
            MediaError::Internal(_) => "Something went wrong on our side".to_string(),
        }
    }
}
