//! Daemon RPC client layer for a light wallet server.
//!
//! A [`Context`] owns the ZeroMQ context, the in-process signal bus and the
//! exchange-rate cache. Worker threads each build a [`Client`] from it and
//! issue request/response calls to the daemon; every blocking step can be
//! cut short by [`Context::raise_abort_process`] or
//! [`Context::raise_abort_scan`].

pub mod client;
pub mod clock;
pub mod context;
pub mod error;
pub mod rates;
pub mod signal;
mod wait;

pub use client::Client;
pub use clock::{Clock, MonotonicClock, QuantaClock};
pub use context::{Context, ContextConfig};
pub use error::{Error, Result};
pub use rates::{Rates, RatesRefresh};
pub use signal::Signal;
