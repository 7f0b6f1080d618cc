use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::clock::{Clock, MonotonicClock};
use crate::rates::source::DisabledSource;
use crate::rates::{
    CryptoCompare, HttpPriceSource, PriceSource, Rates, RatesCache, RatesParser, RatesRefresh,
};
use crate::signal::{self, Signal, SIGNAL_ENDPOINT};
use crate::{Error, Result};

const DEFAULT_DAEMON_ADDRESS: &str = "tcp://127.0.0.1:18082";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextConfig {
    /// ZeroMQ endpoint of the daemon's RPC socket.
    /// Default: tcp://127.0.0.1:18082
    pub daemon_address: String,

    /// How often exchange rates may be refetched. Zero disables the cache.
    /// Default: disabled
    pub rates_interval: Duration,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            daemon_address: DEFAULT_DAEMON_ADDRESS.to_string(),
            rates_interval: Duration::ZERO,
        }
    }
}

/// State shared between a context and every client made from it.
pub(crate) struct Shared {
    // zmq sockets are not thread-safe; raises from different threads queue here.
    signal_pub: Mutex<zmq::Socket>,
    pub(crate) comm: zmq::Context,
    pub(crate) daemon_address: String,
    pub(crate) rates: RatesCache,
}

impl Shared {
    fn raise(&self, signal: Signal) -> Result<()> {
        let publisher = self
            .signal_pub
            .lock()
            .map_err(|_| Error::InvalidState("signal publisher lock poisoned"))?;
        signal::publish(&publisher, signal)
    }
}

/// Owner handle for the messaging context, signal bus and rate cache.
///
/// Clients keep the underlying state alive after this handle is gone.
/// Dropping a valid handle publishes [`Signal::Process`] once, so any client
/// still blocked in a wait returns [`Error::AbortProcess`].
#[derive(Default)]
pub struct Context {
    shared: Option<Arc<Shared>>,
}

impl Context {
    /// Builds a context that fetches rates from CryptoCompare over HTTPS.
    pub fn make(daemon_address: impl Into<String>, rates_interval: Duration) -> Result<Self> {
        Self::make_with_config(ContextConfig {
            daemon_address: daemon_address.into(),
            rates_interval,
        })
    }

    pub fn make_with_config(config: ContextConfig) -> Result<Self> {
        Self::make_with_clock(config, MonotonicClock::new())
    }

    /// Same as [`Context::make_with_config`] with a custom clock source for
    /// the rate cache (e.g., [`crate::QuantaClock`]).
    pub fn make_with_clock(config: ContextConfig, clock: impl Clock) -> Result<Self> {
        if config.rates_interval.is_zero() {
            return Self::make_with_source(config, DisabledSource, CryptoCompare, clock);
        }
        let source = HttpPriceSource::new(CryptoCompare::HOST)?;
        Self::make_with_source(config, source, CryptoCompare, clock)
    }

    /// Builds a context with caller-supplied rate collaborators.
    pub fn make_with_source(
        config: ContextConfig,
        source: impl PriceSource,
        parser: impl RatesParser,
        clock: impl Clock,
    ) -> Result<Self> {
        let comm = zmq::Context::new();
        let signal_pub = comm.socket(zmq::PUB).map_err(Error::setup("zmq_socket"))?;
        signal_pub
            .bind(SIGNAL_ENDPOINT)
            .map_err(Error::setup("zmq_bind"))?;

        log::debug!(
            "rpc context ready (daemon {}, rates interval {:?})",
            config.daemon_address,
            config.rates_interval
        );

        let rates = RatesCache::new(
            config.rates_interval,
            Box::new(source),
            Box::new(parser),
            Box::new(clock),
        );
        Ok(Self {
            shared: Some(Arc::new(Shared {
                signal_pub: Mutex::new(signal_pub),
                comm,
                daemon_address: config.daemon_address,
                rates,
            })),
        })
    }

    pub fn is_valid(&self) -> bool {
        self.shared.is_some()
    }

    pub fn daemon_address(&self) -> Result<&str> {
        Ok(&self.shared()?.daemon_address)
    }

    pub fn rates_interval(&self) -> Result<Duration> {
        Ok(self.shared()?.rates.interval())
    }

    /// Cancels the current scan in every client watching scan signals.
    pub fn raise_abort_scan(&self) -> Result<()> {
        self.shared()?.raise(Signal::Scan)
    }

    /// Tells every client to stop.
    pub fn raise_abort_process(&self) -> Result<()> {
        self.shared()?.raise(Signal::Process)
    }

    /// Refetches rates when the refresh interval has elapsed; otherwise
    /// returns the cached snapshot tagged [`RatesRefresh::Unchanged`].
    pub fn retrieve_rates(&self) -> Result<RatesRefresh> {
        self.shared()?.rates.retrieve()
    }

    /// Cached rates without a refresh; see [`crate::Client::get_rates`].
    pub fn cached_rates(&self) -> Result<Rates> {
        self.shared()?.rates.current()
    }

    pub(crate) fn shared(&self) -> Result<&Arc<Shared>> {
        self.shared
            .as_ref()
            .ok_or(Error::InvalidState("rpc context is empty"))
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            if let Err(err) = shared.raise(Signal::Process) {
                log::warn!("failed to publish shutdown signal: {err}");
            }
        }
    }
}
