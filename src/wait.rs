use std::time::{Duration, Instant};

use crate::signal;
use crate::{Error, Result};

/// Blocks until `daemon` reports one of `events`, a signal arrives on
/// `signals`, or `timeout` runs out.
///
/// Nothing is read from `daemon`. When both sockets are ready the daemon
/// wins and the pending signal stays queued for the next wait. An `EINTR`
/// from the poll is retried with the time already spent taken off the
/// budget, so interruptions never extend the deadline.
pub(crate) fn wait_ready(
    daemon: &zmq::Socket,
    signals: &zmq::Socket,
    events: zmq::PollEvents,
    timeout: Duration,
) -> Result<()> {
    if timeout.is_zero() {
        return Err(Error::DaemonTimeout);
    }

    let mut remaining = timeout;
    let daemon_ready = loop {
        let mut items = [
            daemon.as_poll_item(events | zmq::POLLERR),
            signals.as_poll_item(zmq::POLLIN | zmq::POLLERR),
        ];

        let start = Instant::now();
        let polled = zmq::poll(&mut items, poll_timeout_ms(remaining));
        remaining = charge(remaining, start, Instant::now());

        match polled {
            Ok(0) => return Err(Error::DaemonTimeout),
            Ok(_) => break !items[0].get_revents().is_empty(),
            Err(zmq::Error::EINTR) => {
                log::trace!("poll interrupted, {:?} left", remaining);
            }
            Err(err) => return Err(err.into()),
        }
    };

    if daemon_ready {
        return Ok(());
    }
    Err(signal::receive(signals))
}

/// Takes the time spent between `start` and `end` off `remaining`, never
/// going below zero.
fn charge(remaining: Duration, start: Instant, end: Instant) -> Duration {
    remaining.saturating_sub(end.saturating_duration_since(start))
}

/// Converts a budget into the millisecond argument `zmq_poll` expects.
///
/// Sub-millisecond remainders round up so a live budget never turns into a
/// non-blocking poll.
fn poll_timeout_ms(budget: Duration) -> i64 {
    let millis = budget.as_millis();
    let millis = if millis == 0 && !budget.is_zero() { 1 } else { millis };
    i64::try_from(millis).unwrap_or(i64::MAX)
}
