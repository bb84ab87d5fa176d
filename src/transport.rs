//! Transports for chain providers.

use alloy::{
    providers::WsConnect,
    pubsub::PubSubConnect,
    rpc::client::BuiltInConnectionString,
    transports::{
        BoxTransport, Transport as _, TransportConnect, TransportResult, layers::RetryBackoffLayer,
    },
};
use std::str::FromStr;
use url::Url;

/// [`RetryBackoffLayer`] used for chain providers.
///
/// We are allowing max 10 retries with a backoff of 800ms. The CU/s is set to max value to avoid
/// any throttling.
pub const RETRY_LAYER: RetryBackoffLayer = RetryBackoffLayer::new(10, 800, u64::MAX);

/// A connected transport.
#[derive(Debug)]
pub struct ChainTransport {
    /// The boxed transport.
    pub inner: BoxTransport,
    /// Whether the endpoint is local.
    pub is_local: bool,
    /// Whether the transport supports subscriptions.
    pub is_pubsub: bool,
}

/// Connects to `url` over http or websockets.
pub async fn create_transport(url: &Url) -> TransportResult<ChainTransport> {
    let url = BuiltInConnectionString::from_str(url.as_str())?;
    let is_local = url.is_local();

    let (inner, is_pubsub) = match url {
        BuiltInConnectionString::Ws(url, auth) => (
            WsConnect::new(url.as_str())
                .with_auth_opt(auth)
                // Configure max number of retries to prevent provider from becoming useless
                .with_max_retries(u32::MAX)
                .into_service()
                .await?
                .boxed(),
            true,
        ),
        url => (url.connect_boxed().await?, false),
    };

    Ok(ChainTransport { inner, is_local, is_pubsub })
}
