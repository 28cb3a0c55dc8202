use super::{
    classify::classify,
    gateway::Gateway,
    model::{MediaDescriptor, Platform},
    resolver::Resolvers,
    token::AssetSigner,
};
use crate::utils::{ApiTags, JsonError, JsonSuccess, ResponseObject};
use poem::{
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    Body,
};
use poem_openapi::{
    param::{Path, Query},
    payload::{Binary, Response},
    OpenApi,
};
use tracing::info;

const MISSING_URL: &str = "Missing url query parameter";

pub struct MediaApi {
    resolvers: Resolvers,
    gateway: Gateway,
    signer: AssetSigner,
}

#[OpenApi(tag = "ApiTags::Media")]
impl MediaApi {
    pub fn new(resolvers: Resolvers, gateway: Gateway, signer: AssetSigner) -> Self {
        Self {
            resolvers,
            gateway,
            signer,
        }
    }

    /// Resolve a post into direct asset links and metadata
    #[oai(
        path = "/:platform/download",
        method = "get",
        operation_id = "media::download"
    )]
    async fn download(
        &self,
        platform: Path<String>,
        url: Query<Option<String>>,
    ) -> Result<JsonSuccess<MediaDescriptor>, JsonError<MediaDescriptor>> {
        let platform: Platform = platform.0.parse()?;
        let Some(url) = url.0 else {
            return Err(ResponseObject::bad_request(MISSING_URL));
        };
        let source = classify(platform, &url)?;

        info!(platform = %platform, url = %source, "Resolving post");
        let descriptor = self.resolvers.resolve(platform, &source).await?;

        Ok(ResponseObject::ok(descriptor))
    }

    /// Relay the bytes of an asset returned by the download endpoint
    #[oai(path = "/:platform/stream", method = "get", operation_id = "media::stream")]
    async fn stream(
        &self,
        platform: Path<String>,
        url: Query<Option<String>>,
        token: Query<Option<String>>,
    ) -> Result<Response<Binary<Body>>, JsonError<String>> {
        let platform: Platform = platform.0.parse()?;
        let Some(url) = url.0 else {
            return Err(ResponseObject::bad_request(MISSING_URL));
        };

        let token = match token.0 {
            Some(token) if !token.is_empty() => token,
            _ => {
                return Err(ResponseObject::bad_request(
                    "Missing stream token, resolve the post first",
                ));
            }
        };

        let claims = self.signer.verify(platform, &url, &token)?;
        let asset = self.gateway.fetch(&claims).await?;

        info!(
            platform = %platform,
            kind = ?claims.kind,
            filename = %asset.filename,
            "Streaming asset"
        );

        let disposition = format!(
            "attachment; filename=\"{}\"; filename*=UTF-8''{}",
            asset.filename,
            urlencoding::encode(&asset.filename)
        );

        Ok(Response::new(Binary(asset.body))
            .header(CONTENT_TYPE, asset.content_type)
            .header(CONTENT_DISPOSITION, disposition))
    }
}
