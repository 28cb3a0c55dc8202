use super::{
    error::MediaError,
    model::{AssetKind, Platform},
};
use crate::config::AssetTtl;
use chrono::Utc;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind as JwtErrorKind, Algorithm, DecodingKey, EncodingKey,
    Header, Validation,
};
use serde::{Deserialize, Serialize};

/// What a stream token vouches for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetClaims {
    pub url: String,
    pub platform: Platform,
    pub kind: AssetKind,
    pub media_id: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and checks the short-lived tokens that tie an asset URL to a
/// resolution made by this service.
#[derive(Clone)]
pub struct AssetSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: AssetTtl,
}

impl AssetSigner {
    pub fn new(secret: &str, ttl: AssetTtl) -> Self {
        AssetSigner {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn issue(
        &self,
        platform: Platform,
        kind: AssetKind,
        media_id: &str,
        url: &str,
    ) -> Result<String, MediaError> {
        self.issue_at(platform, kind, media_id, url, Utc::now().timestamp())
    }

    pub fn issue_at(
        &self,
        platform: Platform,
        kind: AssetKind,
        media_id: &str,
        url: &str,
        issued_at: i64,
    ) -> Result<String, MediaError> {
        let claims = AssetClaims {
            url: url.to_string(),
            platform,
            kind,
            media_id: media_id.to_string(),
            iat: issued_at,
            exp: issued_at + self.ttl.get(platform).as_secs() as i64,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| MediaError::Internal(anyhow::Error::new(e).context("signing asset token")))
    }

    pub fn verify(
        &self,
        platform: Platform,
        url: &str,
        token: &str,
    ) -> Result<AssetClaims, MediaError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let claims = match decode::<AssetClaims>(token, &self.decoding, &validation) {
            Ok(data) => data.claims,
            Err(e) if matches!(e.kind(), JwtErrorKind::ExpiredSignature) => {
                return Err(MediaError::AssetUnavailable(format!(
                    "token for {} expired",
                    url
                )));
            }
            Err(e) => {
                return Err(MediaError::UnknownAsset(format!("{}: {}", url, e)));
            }
        };

        if claims.url != url || claims.platform != platform {
            return Err(MediaError::UnknownAsset(format!(
                "token was issued for another asset ({} on {})",
                claims.url, claims.platform
            )));
        }

        Ok(claims)
    }
}
