//! Control topics carried on the in-process signal bus.
//!
//! The bus is a single `PUB` socket bound by the context at
//! [`SIGNAL_ENDPOINT`]; every client connects a `SUB` socket to it. Frames are
//! the null-terminated topic names, and subscriptions use the same bytes so
//! prefix matching is exact. Delivery is fire-and-forget: a client that has
//! not subscribed yet when a signal is published never sees it.

use crate::{Error, Result};

pub const SIGNAL_ENDPOINT: &str = "inproc://signal";

const PROCESS_FRAME: &[u8] = b"PROCESS\0";
const SCAN_FRAME: &[u8] = b"SCAN\0";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Signal {
    /// Irrecoverable, stop everything.
    Process,
    /// Cancel only the current unit of work (a scan pass).
    Scan,
}

impl Signal {
    pub fn frame(self) -> &'static [u8] {
        match self {
            Signal::Process => PROCESS_FRAME,
            Signal::Scan => SCAN_FRAME,
        }
    }

    /// Maps the first byte of a received frame to the signal it announces.
    pub fn classify(first: u8) -> Option<Signal> {
        match first {
            b'P' => Some(Signal::Process),
            b'S' => Some(Signal::Scan),
            _ => None,
        }
    }

    pub(crate) fn into_error(self) -> Error {
        match self {
            Signal::Process => Error::AbortProcess,
            Signal::Scan => Error::AbortScan,
        }
    }
}

pub(crate) fn publish(publisher: &zmq::Socket, signal: Signal) -> Result<()> {
    publisher.send(signal.frame(), 0)?;
    log::debug!("published {:?} signal", signal);
    Ok(())
}

pub(crate) fn subscribe(subscriber: &zmq::Socket, signal: Signal) -> Result<()> {
    subscriber.set_subscribe(signal.frame())?;
    Ok(())
}

/// Reads exactly one frame from a readable subscriber and turns it into the
/// terminal error the waiting caller should see.
pub(crate) fn receive(subscriber: &zmq::Socket) -> Error {
    let mut buf = [0u8; 1];
    if let Err(err) = subscriber.recv_into(&mut buf, 0) {
        return Error::Transport(err);
    }
    match Signal::classify(buf[0]) {
        Some(signal) => signal.into_error(),
        None => Error::SignalUnknown,
    }
}
