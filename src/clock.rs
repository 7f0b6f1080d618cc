use std::time::Instant;

/// A monotonic time source for the rate cache.
///
/// Readings are nanoseconds since an arbitrary per-clock origin. Only
/// differences between two readings of the same clock are meaningful.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> u64;
}

/// A clock backed by `std::time::Instant`.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }
}

/// A clock that reads the CPU's Time-Stamp Counter via the `quanta` crate.
///
/// Cheaper than `Instant` on hosts with an invariant TSC, and still
/// monotonic.
#[derive(Debug, Clone)]
pub struct QuantaClock {
    clock: quanta::Clock,
    origin: quanta::Instant,
}

impl Default for QuantaClock {
    fn default() -> Self {
        let clock = quanta::Clock::new();
        let origin = clock.now();
        Self { clock, origin }
    }
}

impl QuantaClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for QuantaClock {
    fn now(&self) -> u64 {
        let delta = self.clock.now().duration_since(self.origin);
        u64::try_from(delta.as_nanos()).unwrap_or(u64::MAX)
    }
}
