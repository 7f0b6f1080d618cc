//! Exchange-rate cache shared by every client of a context.
//!
//! The cache holds one snapshot and the time it was last refreshed. The
//! lock is taken only to read or replace those two fields; the price-source
//! request always runs without it, so concurrent refreshers may each hit the
//! source once when the interval has just elapsed.

pub mod crypto_compare;
pub mod source;

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::{Error, Result};

pub use crypto_compare::{CryptoCompare, RatesParser};
pub use source::{HttpPriceSource, PriceResponse, PriceSource};

/// Extra time past the refresh interval before a cached snapshot is stale.
pub const GRACE_WINDOW: Duration = Duration::from_secs(30);

/// Request timeout handed to the price source.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(20);

/// Price of one XMR in each supported unit.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct Rates {
    pub aud: f64,
    pub bgn: f64,
    pub brl: f64,
    pub btc: f64,
    pub cad: f64,
    pub chf: f64,
    pub clp: f64,
    pub cny: f64,
    pub czk: f64,
    pub dkk: f64,
    pub eur: f64,
    pub gbp: f64,
    pub hkd: f64,
    pub inr: f64,
    pub isk: f64,
    pub jpy: f64,
    pub krw: f64,
    pub nzd: f64,
    pub pln: f64,
    pub sek: f64,
    pub sgd: f64,
    pub thb: f64,
    pub usd: f64,
    pub vef: f64,
}

/// Outcome of [`RatesCache::retrieve`].
#[derive(Debug, Clone, PartialEq)]
pub enum RatesRefresh {
    /// A new snapshot was fetched and stored.
    Fresh(Rates),
    /// No fetch happened; this is whatever was cached (if anything).
    Unchanged(Option<Rates>),
}

impl RatesRefresh {
    pub fn rates(&self) -> Option<&Rates> {
        match self {
            RatesRefresh::Fresh(rates) => Some(rates),
            RatesRefresh::Unchanged(rates) => rates.as_ref(),
        }
    }

    pub fn is_fresh(&self) -> bool {
        matches!(self, RatesRefresh::Fresh(_))
    }
}

#[derive(Default)]
struct CacheState {
    cached: Option<Rates>,
    refreshed_at: Option<u64>,
}

pub(crate) struct RatesCache {
    interval: Duration,
    source: Box<dyn PriceSource>,
    parser: Box<dyn RatesParser>,
    clock: Box<dyn Clock>,
    state: Mutex<CacheState>,
}

impl RatesCache {
    pub(crate) fn new(
        interval: Duration,
        source: Box<dyn PriceSource>,
        parser: Box<dyn RatesParser>,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            interval,
            source,
            parser,
            clock,
            state: Mutex::new(CacheState::default()),
        }
    }

    pub(crate) fn interval(&self) -> Duration {
        self.interval
    }

    pub(crate) fn is_enabled(&self) -> bool {
        !self.interval.is_zero()
    }

    /// Refreshes from the price source when the interval has elapsed,
    /// otherwise hands back the cached snapshot untouched.
    pub(crate) fn retrieve(&self) -> Result<RatesRefresh> {
        if !self.is_enabled() {
            return Ok(RatesRefresh::Unchanged(self.lock()?.cached));
        }

        let now = self.clock.now();
        {
            let state = self.lock()?;
            if age(state.refreshed_at, now).is_some_and(|age| age < self.interval) {
                return Ok(RatesRefresh::Unchanged(state.cached));
            }
        }

        let fresh = self.fetch();

        let mut state = self.lock()?;
        state.refreshed_at = Some(now);
        match fresh {
            Ok(rates) => {
                state.cached = Some(rates);
                log::info!("exchange rates refreshed (1 XMR = {} USD)", rates.usd);
                Ok(RatesRefresh::Fresh(rates))
            }
            Err(err) => {
                log::warn!("exchange rate refresh failed: {err}");
                Err(Error::ExchangeRatesFetch)
            }
        }
    }

    /// Last cached snapshot, provided it is inside interval + grace window.
    pub(crate) fn current(&self) -> Result<Rates> {
        if !self.is_enabled() {
            return Err(Error::ExchangeRatesDisabled);
        }

        let now = self.clock.now();
        let state = self.lock()?;
        match age(state.refreshed_at, now) {
            Some(age) if age < self.interval.saturating_add(GRACE_WINDOW) => {
                state.cached.ok_or(Error::ExchangeRatesFetch)
            }
            _ => Err(Error::ExchangeRatesOld),
        }
    }

    fn fetch(&self) -> Result<Rates> {
        let response = self.source.invoke_get(self.parser.path(), FETCH_TIMEOUT)?;
        if response.status != 200 {
            log::warn!("price source answered with status {}", response.status);
            return Err(Error::ExchangeRatesFetch);
        }
        self.parser.parse(&response.body)
    }

    fn lock(&self) -> Result<MutexGuard<'_, CacheState>> {
        self.state
            .lock()
            .map_err(|_| Error::InvalidState("rates cache lock poisoned"))
    }
}

/// Time since the last refresh; `None` if the cache was never refreshed.
fn age(refreshed_at: Option<u64>, now: u64) -> Option<Duration> {
    refreshed_at.map(|at| Duration::from_nanos(now.saturating_sub(at)))
}
