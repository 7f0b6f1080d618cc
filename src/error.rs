use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("timed out waiting on daemon")]
    DaemonTimeout,
    #[error("received abort process signal")]
    AbortProcess,
    #[error("received abort scan signal")]
    AbortScan,
    #[error("received unknown signal")]
    SignalUnknown,
    #[error("exchange rates feature is disabled")]
    ExchangeRatesDisabled,
    #[error("exchange rates are older than cache interval")]
    ExchangeRatesOld,
    #[error("unable to fetch exchange rates")]
    ExchangeRatesFetch,
    #[error("invalid state: {0}")]
    InvalidState(&'static str),
    #[error("{call} failed: {source}")]
    Setup {
        call: &'static str,
        #[source]
        source: zmq::Error,
    },
    #[error("transport error: {0}")]
    Transport(#[from] zmq::Error),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

impl Error {
    /// True for the two cooperative-cancellation outcomes.
    pub fn is_signal(&self) -> bool {
        matches!(self, Error::AbortProcess | Error::AbortScan)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::DaemonTimeout)
    }

    pub(crate) fn setup(call: &'static str) -> impl FnOnce(zmq::Error) -> Error {
        move |source| Error::Setup { call, source }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
