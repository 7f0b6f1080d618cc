//! Parser for the CryptoCompare single-symbol price endpoint.

use super::Rates;
use crate::Result;

/// Turns a price-source response body into [`Rates`].
pub trait RatesParser: Send + Sync + 'static {
    /// Request path (including query) the parser expects a body from.
    fn path(&self) -> &str;

    fn parse(&self, body: &[u8]) -> Result<Rates>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CryptoCompare;

impl CryptoCompare {
    pub const HOST: &'static str = "https://min-api.cryptocompare.com";
    pub const PATH: &'static str = "/data/price?fsym=XMR&tsyms=AUD,BGN,BRL,BTC,CAD,CHF,CLP,CNY,CZK,DKK,EUR,GBP,HKD,INR,ISK,JPY,KRW,NZD,PLN,SEK,SGD,THB,USD,VEF";
}

impl RatesParser for CryptoCompare {
    fn path(&self) -> &str {
        Self::PATH
    }

    fn parse(&self, body: &[u8]) -> Result<Rates> {
        Ok(serde_json::from_slice(body)?)
    }
}
