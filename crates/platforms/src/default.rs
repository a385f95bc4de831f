use std::sync::OnceLock;
use std::time::Duration;

use reqwest::header::{self, HeaderMap, HeaderValue};
use tracing::debug;

pub const DEFAULT_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

pub const BILIBILI_REFERER: &str = "https://live.bilibili.com/";

/// Default per-request timeout for room API calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            // Safe to ignore: can happen if another crate installed it first.
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// Build a `reqwest::ClientBuilder` preloaded with browser-like headers.
pub fn create_client_builder(user_agent: &str, referer: &str) -> reqwest::ClientBuilder {
    install_rustls_provider();

    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(referer) {
        headers.insert(header::REFERER, value);
    }
    headers.insert(
        header::ACCEPT_ENCODING,
        HeaderValue::from_static("gzip, deflate"),
    );

    reqwest::Client::builder()
        .user_agent(user_agent)
        .default_headers(headers)
        .gzip(true)
        .deflate(true)
}
