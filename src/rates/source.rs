use std::time::Duration;

use crate::{Error, Result};

/// Status line and body of one price-source request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Issues `GET` requests against a price source.
///
/// Implementations return `Err` only when the request itself could not be
/// completed. Non-success statuses come back as a normal response and are
/// judged by the cache.
pub trait PriceSource: Send + Sync + 'static {
    fn invoke_get(&self, path: &str, timeout: Duration) -> Result<PriceResponse>;
}

/// HTTPS price source backed by a blocking `reqwest` client.
pub struct HttpPriceSource {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpPriceSource {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder().build()?;
        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }
}

impl PriceSource for HttpPriceSource {
    fn invoke_get(&self, path: &str, timeout: Duration) -> Result<PriceResponse> {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), path);
        let response = self.client.get(&url).timeout(timeout).send()?;
        let status = response.status().as_u16();
        let body = response.bytes()?.to_vec();
        Ok(PriceResponse { status, body })
    }
}

/// Stand-in used when the cache is disabled; never touches the network.
pub(crate) struct DisabledSource;

impl PriceSource for DisabledSource {
    fn invoke_get(&self, _path: &str, _timeout: Duration) -> Result<PriceResponse> {
        Err(Error::ExchangeRatesDisabled)
    }
}
