//! Two timer-driven producers sharing one rolling window.
//!
//! One thread reports a success every second, the other every two seconds,
//! into ten one-second buckets. Evicted buckets are logged by the default
//! tracing sink. Pass the run length in seconds as the first argument
//! (default 15).
//!
//! ```text
//! RUST_LOG=debug cargo run --example two_producers -- 30
//! ```

use std::env;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rolling_window_core::{Category, OutcomeRecorder, RollingWindowCounter};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

fn produce<R>(recorder: R, every: Duration, until: Instant)
where
    R: OutcomeRecorder<Instant>,
{
    loop {
        thread::sleep(every);
        let now = Instant::now();
        if now >= until {
            break;
        }
        if let Err(err) = recorder.report(Category::Success, now) {
            debug!(error = %err, "report dropped");
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let run_for = env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(15));

    let start = Instant::now();
    let counter = Arc::new(RollingWindowCounter::new(start, Duration::from_secs(1), 10));
    info!(?run_for, bucket_count = counter.bucket_count(), "starting producers");

    let until = start + run_for;
    let producers: Vec<_> = [Duration::from_secs(1), Duration::from_secs(2)]
        .into_iter()
        .map(|every| {
            let counter = Arc::clone(&counter);
            thread::spawn(move || produce(counter, every, until))
        })
        .collect();

    for producer in producers {
        if producer.join().is_err() {
            tracing::error!("producer thread panicked");
        }
    }

    let totals = counter.totals();
    info!(
        success = totals.success,
        stale = counter.stale_reports(),
        "producers finished; live window"
    );
}
