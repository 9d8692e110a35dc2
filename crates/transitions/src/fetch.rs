use anyhow::{anyhow, Error};
use bytes::Bytes;
use futures::future::BoxFuture;
use reqwest::get as reqwest_get;
use url::Url;

/// Asynchronous GET seam used by the preload manager.
///
/// Production code uses [`HttpFetcher`]; tests substitute a counting double
/// so preload behavior is observable without a network.
pub trait Fetcher: Send + Sync {
    /// Fetch the body at `url`. Implementations must not panic.
    fn fetch(&self, url: Url) -> BoxFuture<'static, Result<Bytes, Error>>;
}

/// reqwest-backed fetcher for same-origin preload requests.
#[derive(Clone, Copy, Debug, Default)]
pub struct HttpFetcher;

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: Url) -> BoxFuture<'static, Result<Bytes, Error>> {
        Box::pin(async move {
            let response = reqwest_get(url.clone())
                .await
                .map_err(|err| anyhow!("Failed to fetch URL {url}: {err}"))?;
            if !response.status().is_success() {
                return Err(anyhow!(
                    "Failed to fetch URL: {} (Status: {})",
                    url,
                    response.status()
                ));
            }
            response
                .bytes()
                .await
                .map_err(|err| anyhow!("Failed to read body for {url}: {err}"))
        })
    }
}
