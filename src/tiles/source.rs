//! Where tile bytes come from: URL templating for slippy-map servers and the
//! async retriever trait the fetch pipeline is built on.

use crate::core::address::TileAddress;
use crate::core::constants::{DEFAULT_FETCH_TIMEOUT, DEFAULT_TILE_HOST};
use crate::{MapError, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use std::time::Duration;

static PLATFORM_INFO: Lazy<String> =
    Lazy::new(|| format!("({}; {})", std::env::consts::OS, std::env::consts::ARCH));

/// Maps a tile address to a URL.
pub trait TileSource: Send + Sync {
    fn url(&self, address: TileAddress) -> String;
}

/// The standard `{host}/{z}/{i}/{j}.png` scheme used by OpenStreetMap and
/// most compatible servers.
#[derive(Debug, Clone)]
pub struct OpenStreetMapSource {
    base: String,
}

impl OpenStreetMapSource {
    pub fn new() -> Self {
        Self::with_base(DEFAULT_TILE_HOST)
    }

    pub fn with_base(base: impl Into<String>) -> Self {
        let mut base = base.into();
        while base.ends_with('/') {
            base.pop();
        }
        Self { base }
    }
}

impl Default for OpenStreetMapSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TileSource for OpenStreetMapSource {
    fn url(&self, address: TileAddress) -> String {
        format!(
            "{}/{}/{}/{}.png",
            self.base, address.zoom, address.i, address.j
        )
    }
}

/// Loads raw tile bytes for an address. Implementations must be shareable
/// across the fetch workers.
#[async_trait]
pub trait TileRetriever: Send + Sync {
    async fn load_tile(&self, address: TileAddress) -> Result<Vec<u8>>;
}

/// HTTP retriever with a descriptive User-Agent and bounded timeouts.
///
/// Public tile servers require an identifying agent string; the default is
/// `slipmap/{version} ({os}; {arch})` with an optional application-supplied
/// suffix appended.
pub struct HttpTileRetriever {
    client: reqwest::Client,
    source: Box<dyn TileSource>,
}

impl HttpTileRetriever {
    pub fn new(source: Box<dyn TileSource>) -> Result<Self> {
        Self::with_options(source, DEFAULT_FETCH_TIMEOUT, None)
    }

    pub fn with_options(
        source: Box<dyn TileSource>,
        timeout: Duration,
        agent_suffix: Option<&str>,
    ) -> Result<Self> {
        let mut agent = format!(
            "slipmap/{} {}",
            env!("CARGO_PKG_VERSION"),
            &*PLATFORM_INFO
        );
        if let Some(suffix) = agent_suffix {
            agent.push(' ');
            agent.push_str(suffix);
        }
        let client = reqwest::Client::builder()
            .user_agent(agent)
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self { client, source })
    }
}

#[async_trait]
impl TileRetriever for HttpTileRetriever {
    async fn load_tile(&self, address: TileAddress) -> Result<Vec<u8>> {
        let url = self.source.url(address);
        log::debug!("requesting {}", url);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(MapError::HttpStatus {
                status: response.status(),
                address,
            });
        }
        let bytes = response.bytes().await?.to_vec();
        // Sniff the container format so corrupt or HTML error bodies are
        // rejected before they reach the cache.
        image::guess_format(&bytes)
            .map_err(|_| MapError::Decode(format!("unrecognized image data for {address}")))?;
        log::info!("downloaded tile {} ({} bytes)", address, bytes.len());
        Ok(bytes)
    }
}
