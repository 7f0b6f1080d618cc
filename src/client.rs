use std::sync::Arc;
use std::time::Duration;

use crate::context::{Context, Shared};
use crate::rates::Rates;
use crate::signal::{self, Signal, SIGNAL_ENDPOINT};
use crate::wait::wait_ready;
use crate::Result;

const LINGER_MS: i32 = 0;

/// Per-worker connection to the daemon.
///
/// Owns a `REQ` socket to the daemon and a `SUB` socket on the context's
/// signal bus, subscribed to [`Signal::Process`] from the start. Every
/// blocking call races the daemon against the signal bus, so a raised signal
/// unblocks the worker at its next wait.
///
/// A client is `Send` but not `Sync`: one worker drives it at a time.
pub struct Client {
    daemon: zmq::Socket,
    signal_sub: zmq::Socket,
    shared: Arc<Shared>,
}

impl Client {
    pub fn make(context: &Context) -> Result<Self> {
        let shared = Arc::clone(context.shared()?);

        let daemon = shared.comm.socket(zmq::REQ)?;
        daemon.connect(&shared.daemon_address)?;
        daemon.set_linger(LINGER_MS)?;

        let signal_sub = shared.comm.socket(zmq::SUB)?;
        signal_sub.set_linger(LINGER_MS)?;
        signal_sub.connect(SIGNAL_ENDPOINT)?;
        signal::subscribe(&signal_sub, Signal::Process)?;

        log::debug!("rpc client connected to {}", shared.daemon_address);
        Ok(Self {
            daemon,
            signal_sub,
            shared,
        })
    }

    /// Also wake on [`Signal::Scan`]. Subscribing twice has no extra effect.
    pub fn watch_scan_signals(&self) -> Result<()> {
        signal::subscribe(&self.signal_sub, Signal::Scan)
    }

    /// Blocks until the daemon socket errors, a signal arrives, or `timeout`
    /// elapses. No message is consumed.
    pub fn wait(&self, timeout: Duration) -> Result<()> {
        wait_ready(
            &self.daemon,
            &self.signal_sub,
            zmq::PollEvents::empty(),
            timeout,
        )
    }

    /// Sends one request to the daemon.
    ///
    /// Only the first blocking wait gets `timeout`; a retry after that is
    /// non-blocking, so the call never outlives its budget.
    pub fn send(&self, message: &[u8], timeout: Duration) -> Result<()> {
        let mut timeout = timeout;
        loop {
            match self.daemon.send(message, zmq::DONTWAIT) {
                Ok(()) => return Ok(()),
                Err(zmq::Error::EAGAIN) => {}
                Err(err) => return Err(err.into()),
            }
            wait_ready(&self.daemon, &self.signal_sub, zmq::POLLOUT, timeout)?;
            timeout = Duration::ZERO;
        }
    }

    /// Receives the next reply from the daemon, with the same budget rule as
    /// [`Client::send`].
    pub fn get_message(&self, timeout: Duration) -> Result<Vec<u8>> {
        let mut timeout = timeout;
        loop {
            match self.daemon.recv_bytes(zmq::DONTWAIT) {
                Ok(message) => return Ok(message),
                Err(zmq::Error::EAGAIN) => {}
                Err(err) => return Err(err.into()),
            }
            wait_ready(&self.daemon, &self.signal_sub, zmq::POLLIN, timeout)?;
            timeout = Duration::ZERO;
        }
    }

    /// Cached exchange rates. Never triggers a refresh.
    ///
    /// Fails with `ExchangeRatesDisabled` when caching is off and with
    /// `ExchangeRatesOld` once the snapshot is older than the refresh interval
    /// plus [`crate::rates::GRACE_WINDOW`].
    pub fn get_rates(&self) -> Result<Rates> {
        self.shared.rates.current()
    }

    pub fn daemon_address(&self) -> &str {
        &self.shared.daemon_address
    }
}
