mod classify;
mod error;
mod gateway;
mod handler;
mod limits;
mod model;
mod resolver;
mod token;

pub use error::{ErrorKind, MediaError};
pub use model::Platform;

use crate::config::Config;
use gateway::Gateway;
use limits::UpstreamLimits;
use resolver::Resolvers;
use token::AssetSigner;

pub fn media_api(config: &Config) -> anyhow::Result<handler::MediaApi> {
    let client = resolver::http_client(config)?;
    let limits = UpstreamLimits::new(config.max_upstream_connections);
    let signer = AssetSigner::new(&config.signing_secret, config.asset_ttl.clone());

    let resolvers = Resolvers::new(config, client.clone(), limits.clone(), signer.clone());
    let gateway = Gateway::new(client, limits, config);

    Ok(handler::MediaApi::new(resolvers, gateway, signer))
}
