use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lws_rpc::rates::{CryptoCompare, PriceResponse, PriceSource};
use lws_rpc::{Client, Clock, Context, ContextConfig, Error, QuantaClock, Rates, RatesRefresh};

const INTERVAL: Duration = Duration::from_secs(60);

#[derive(Clone, Default)]
struct ManualClock {
    now_ns: Arc<AtomicU64>,
}

impl ManualClock {
    fn advance(&self, by: Duration) {
        self.now_ns
            .fetch_add(by.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.now_ns.load(Ordering::SeqCst)
    }
}

/// Price source that answers with whatever the test last scripted.
/// `None` simulates a transport failure.
#[derive(Clone, Default)]
struct ScriptedSource {
    calls: Arc<AtomicUsize>,
    next: Arc<Mutex<Option<PriceResponse>>>,
}

impl ScriptedSource {
    fn answer(&self, status: u16, body: Vec<u8>) {
        *self.next.lock().unwrap() = Some(PriceResponse { status, body });
    }

    fn answer_rates(&self, rates: &Rates) {
        self.answer(200, serde_json::to_vec(rates).unwrap());
    }

    fn fail(&self) {
        *self.next.lock().unwrap() = None;
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PriceSource for ScriptedSource {
    fn invoke_get(&self, path: &str, timeout: Duration) -> lws_rpc::Result<PriceResponse> {
        assert_eq!(path, CryptoCompare::PATH);
        assert_eq!(timeout, Duration::from_secs(20));
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.next
            .lock()
            .unwrap()
            .clone()
            .ok_or(Error::ExchangeRatesFetch)
    }
}

fn usd(price: f64) -> Rates {
    Rates {
        usd: price,
        ..Rates::default()
    }
}

fn context(interval: Duration) -> (Context, ScriptedSource, ManualClock) {
    let source = ScriptedSource::default();
    let clock = ManualClock::default();
    let config = ContextConfig {
        daemon_address: "tcp://127.0.0.1:1".to_string(),
        rates_interval: interval,
    };
    let ctx = Context::make_with_source(config, source.clone(), CryptoCompare, clock.clone())
        .expect("context");
    (ctx, source, clock)
}

#[test]
fn disabled_cache_never_touches_the_source() {
    let (ctx, source, _clock) = context(Duration::ZERO);
    source.answer_rates(&usd(100.0));

    assert_eq!(ctx.retrieve_rates().expect("retrieve"), RatesRefresh::Unchanged(None));
    assert!(matches!(ctx.cached_rates(), Err(Error::ExchangeRatesDisabled)));

    let client = Client::make(&ctx).expect("client");
    assert!(matches!(client.get_rates(), Err(Error::ExchangeRatesDisabled)));
    assert_eq!(source.calls(), 0);
}

#[test]
fn retrieve_within_interval_reuses_cached_value() {
    let (ctx, source, clock) = context(INTERVAL);
    source.answer_rates(&usd(100.0));

    let first = ctx.retrieve_rates().expect("first");
    assert_eq!(first, RatesRefresh::Fresh(usd(100.0)));

    source.answer_rates(&usd(200.0));
    clock.advance(Duration::from_secs(59));
    let second = ctx.retrieve_rates().expect("second");
    assert_eq!(second, RatesRefresh::Unchanged(Some(usd(100.0))));
    assert!(!second.is_fresh());
    assert_eq!(source.calls(), 1);
}

#[test]
fn retrieve_after_interval_fetches_again() {
    let (ctx, source, clock) = context(INTERVAL);
    source.answer_rates(&usd(100.0));
    ctx.retrieve_rates().expect("first");

    source.answer_rates(&usd(200.0));
    clock.advance(INTERVAL);
    let refreshed = ctx.retrieve_rates().expect("second");
    assert!(refreshed.is_fresh());
    assert_eq!(refreshed.rates(), Some(&usd(200.0)));
    assert_eq!(source.calls(), 2);
}

#[test]
fn failed_fetch_keeps_previous_value_and_backs_off() {
    let (ctx, source, clock) = context(INTERVAL);
    source.answer_rates(&usd(100.0));
    ctx.retrieve_rates().expect("first");
    let client = Client::make(&ctx).expect("client");

    clock.advance(INTERVAL + Duration::from_secs(1));
    source.fail();
    assert!(matches!(ctx.retrieve_rates(), Err(Error::ExchangeRatesFetch)));
    assert_eq!(client.get_rates().expect("cached"), usd(100.0));

    // The failed attempt still counts as a refresh for the interval.
    assert_eq!(
        ctx.retrieve_rates().expect("reuse"),
        RatesRefresh::Unchanged(Some(usd(100.0)))
    );
    assert_eq!(source.calls(), 2);
}

#[test]
fn non_success_status_is_a_fetch_error() {
    let (ctx, source, _clock) = context(INTERVAL);
    source.answer(503, serde_json::to_vec(&usd(100.0)).unwrap());

    assert!(matches!(ctx.retrieve_rates(), Err(Error::ExchangeRatesFetch)));
    assert_eq!(source.calls(), 1);
}

#[test]
fn unparsable_body_is_a_fetch_error() {
    let (ctx, source, clock) = context(INTERVAL);
    source.answer(200, b"{\"Response\":\"Error\"}".to_vec());
    assert!(matches!(ctx.retrieve_rates(), Err(Error::ExchangeRatesFetch)));

    clock.advance(INTERVAL);
    source.answer_rates(&usd(150.0));
    assert_eq!(
        ctx.retrieve_rates().expect("recovered"),
        RatesRefresh::Fresh(usd(150.0))
    );
}

#[test]
fn get_rates_goes_stale_after_interval_plus_grace() {
    let (ctx, source, clock) = context(INTERVAL);
    source.answer_rates(&usd(100.0));
    ctx.retrieve_rates().expect("first");
    let client = Client::make(&ctx).expect("client");

    clock.advance(INTERVAL + Duration::from_secs(30) - Duration::from_nanos(1));
    assert_eq!(client.get_rates().expect("fresh enough"), usd(100.0));

    clock.advance(Duration::from_nanos(1));
    assert!(matches!(client.get_rates(), Err(Error::ExchangeRatesOld)));
    assert_eq!(source.calls(), 1);
}

#[test]
fn get_rates_before_first_refresh_is_old() {
    let (ctx, source, _clock) = context(INTERVAL);
    let client = Client::make(&ctx).expect("client");

    assert!(matches!(client.get_rates(), Err(Error::ExchangeRatesOld)));
    assert_eq!(source.calls(), 0);
}

#[test]
fn get_rates_after_only_failed_fetches_is_a_fetch_error() {
    let (ctx, source, clock) = context(INTERVAL);
    source.fail();

    assert!(matches!(ctx.retrieve_rates(), Err(Error::ExchangeRatesFetch)));
    let client = Client::make(&ctx).expect("client");
    assert!(matches!(client.get_rates(), Err(Error::ExchangeRatesFetch)));

    clock.advance(INTERVAL + Duration::from_secs(30));
    assert!(matches!(client.get_rates(), Err(Error::ExchangeRatesOld)));
    assert_eq!(source.calls(), 1);
}

#[test]
fn tsc_clock_context_starts_with_rates_disabled() {
    let config = ContextConfig {
        daemon_address: "tcp://127.0.0.1:1".to_string(),
        rates_interval: Duration::ZERO,
    };
    let ctx = Context::make_with_clock(config, QuantaClock::new()).expect("context");
    assert!(ctx.is_valid());
    assert_eq!(ctx.retrieve_rates().expect("retrieve"), RatesRefresh::Unchanged(None));
    assert!(matches!(ctx.cached_rates(), Err(Error::ExchangeRatesDisabled)));
}

#[test]
fn concurrent_refreshers_share_the_cache() {
    let (ctx, source, _clock) = context(INTERVAL);
    source.answer_rates(&usd(100.0));

    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                let refresh = ctx.retrieve_rates().expect("retrieve");
                assert_eq!(refresh.rates(), Some(&usd(100.0)));
            });
        }
    });

    assert!(source.calls() >= 1);
    assert_eq!(ctx.cached_rates().expect("cached"), usd(100.0));
}
