use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};

use anyhow::{bail, Context as _, Result};
use clap::Parser;
use log::info;

use lws_rpc::{Client, Context, ContextConfig, Error, QuantaClock, RatesRefresh, Signal};

#[derive(Parser, Debug)]
#[command(name = "lws-rpc-cli")]
#[command(about = "Send one request to the daemon and/or refresh exchange rates")]
struct Args {
    /// Daemon RPC endpoint
    #[arg(long, default_value = "tcp://127.0.0.1:18082")]
    daemon: String,

    /// Exchange rate refresh interval in seconds (0 disables rates)
    #[arg(long, default_value_t = 0)]
    rates_interval_secs: u64,

    /// Time the rate cache with the CPU TSC instead of the std monotonic clock
    #[arg(long)]
    tsc_clock: bool,

    /// Per-call timeout in seconds for send and receive
    #[arg(long, default_value_t = 5)]
    timeout_secs: u64,

    /// Raw request payload to send to the daemon
    #[arg(short, long)]
    message: Option<String>,

    /// Refresh and print exchange rates
    #[arg(long)]
    rates: bool,

    /// Subscribe the client to scan-abort signals
    #[arg(long)]
    watch_scan: bool,

    /// Raise the scan-abort signal after this many seconds
    #[arg(long)]
    abort_scan_after_secs: Option<u64>,

    /// Raise the process-abort signal after this many seconds
    #[arg(long)]
    abort_after_secs: Option<u64>,
}

impl Args {
    /// Signals to raise, ordered by when they fire.
    fn timers(&self) -> Vec<(Duration, Signal)> {
        let mut timers = [
            (self.abort_scan_after_secs, Signal::Scan),
            (self.abort_after_secs, Signal::Process),
        ]
        .into_iter()
        .filter_map(|(secs, signal)| secs.map(|secs| (Duration::from_secs(secs), signal)))
        .collect::<Vec<_>>();
        timers.sort_by_key(|(at, _)| *at);
        timers
    }
}

fn raise(context: &Context, signal: Signal) -> lws_rpc::Result<()> {
    match signal {
        Signal::Process => context.raise_abort_process(),
        Signal::Scan => context.raise_abort_scan(),
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = ContextConfig {
        daemon_address: args.daemon.clone(),
        rates_interval: Duration::from_secs(args.rates_interval_secs),
    };
    let context = if args.tsc_clock {
        Context::make_with_clock(config, QuantaClock::new())
    } else {
        Context::make_with_config(config)
    }
    .context("failed to set up rpc context")?;
    let timeout = Duration::from_secs(args.timeout_secs);

    std::thread::scope(|scope| -> Result<()> {
        // Dropped when this closure returns, which stops the timer thread early.
        let (done_tx, done_rx) = mpsc::channel::<()>();
        let timers = args.timers();
        if !timers.is_empty() {
            let context = &context;
            scope.spawn(move || {
                let start = Instant::now();
                for (at, signal) in timers {
                    match done_rx.recv_timeout(at.saturating_sub(start.elapsed())) {
                        Err(RecvTimeoutError::Timeout) => {
                            info!("raising {:?} signal", signal);
                            if let Err(err) = raise(context, signal) {
                                log::warn!("{:?} signal not sent: {err}", signal);
                            }
                        }
                        _ => return,
                    }
                }
            });
        }

        if let Some(message) = args.message.as_deref() {
            let client = Client::make(&context).context("failed to connect to daemon")?;
            if args.watch_scan {
                client.watch_scan_signals()?;
            }

            info!("sending {} bytes to {}", message.len(), client.daemon_address());
            match client
                .send(message.as_bytes(), timeout)
                .and_then(|()| client.get_message(timeout))
            {
                Ok(reply) => println!("{}", String::from_utf8_lossy(&reply)),
                Err(err) if err.is_signal() => bail!("request cancelled: {err}"),
                Err(err) => return Err(err).context("daemon request failed"),
            }
        }

        if args.rates {
            match context.retrieve_rates() {
                Ok(RatesRefresh::Fresh(rates)) | Ok(RatesRefresh::Unchanged(Some(rates))) => {
                    println!("{}", serde_json::to_string_pretty(&rates)?);
                }
                Ok(RatesRefresh::Unchanged(None)) => bail!("{}", Error::ExchangeRatesDisabled),
                Err(err) => return Err(err).context("exchange rate refresh failed"),
            }
        }
        drop(done_tx);
        Ok(())
    })
}
