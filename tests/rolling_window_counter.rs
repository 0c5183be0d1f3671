use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rolling_window_core::{
    Bucket, Category, NullSink, RollingWindowConfig, RollingWindowCounter, SlideMode, Snapshot, StaleReport,
    TryReportError,
};

type Captured = Arc<Mutex<Vec<Snapshot<Duration>>>>;

fn capture() -> (Captured, impl FnMut(Snapshot<Duration>) + Send) {
    let captured: Captured = Arc::default();
    let sink = {
        let captured = Arc::clone(&captured);
        move |snapshot| captured.lock().unwrap().push(snapshot)
    };
    (captured, sink)
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

#[test]
fn test_new_rolling_window_counter() {
    let counter = RollingWindowCounter::new(Instant::now(), secs(1), 10);
    assert_eq!(counter.bucket_count(), 10);
    assert_eq!(counter.window_span(), secs(10));
    assert_eq!(counter.head_index(), 0);
    assert_eq!(counter.slide_mode(), SlideMode::Bucket);
    assert_eq!(counter.totals(), Bucket::default());
}

#[test]
#[should_panic(expected = "bucket_unit must be greater than 0")]
fn test_new_with_zero_bucket_unit() {
    RollingWindowCounter::new(Instant::now(), Duration::ZERO, 4);
}

#[test]
#[should_panic(expected = "bucket_count must be greater than 0")]
fn test_new_with_zero_bucket_count() {
    RollingWindowCounter::new(Instant::now(), secs(1), 0);
}

#[test]
fn test_reports_land_in_matching_buckets() {
    let counter = RollingWindowCounter::with_sink(secs(0), secs(1), 3, NullSink);

    assert_eq!(counter.report(Category::Success, ms(500)), Ok(()));
    assert_eq!(counter.report(Category::Failure, ms(1_200)), Ok(()));
    assert_eq!(counter.report(Category::Rejection, ms(2_999)), Ok(()));
    assert_eq!(counter.report(Category::Rejection, ms(2_000)), Ok(()));

    let live = counter.current_snapshots();
    assert_eq!(live.len(), 3);
    assert_eq!((live[0].range_start, live[0].range_end), (secs(0), secs(1)));
    assert_eq!(live[0].success, 1);
    assert_eq!(live[1].failure, 1);
    assert_eq!(live[2].rejection, 2);
    assert_eq!(counter.totals().total(), 4);
}

#[test]
fn test_bucket_mode_slides_just_enough() {
    let (captured, sink) = capture();
    let counter = RollingWindowCounter::with_sink(secs(0), secs(1), 3, sink);

    counter.report(Category::Success, ms(500)).unwrap();
    counter.report(Category::Failure, ms(1_200)).unwrap();
    // Window is [0s, 3s); 3.4s needs exactly one bucket to go.
    counter.report(Category::Timeout, ms(3_400)).unwrap();

    let evicted = captured.lock().unwrap().clone();
    assert_eq!(evicted.len(), 1);
    assert_eq!(evicted[0], Snapshot::new(secs(0), secs(1), &Bucket { success: 1, ..Bucket::default() }));

    assert_eq!(counter.window_start(), secs(1));
    assert_eq!(counter.head_index(), 1);

    let live = counter.current_snapshots();
    assert_eq!((live[0].range_start, live[0].failure), (secs(1), 1));
    assert_eq!((live[2].range_start, live[2].timeout), (secs(3), 1));
}

#[test]
fn test_span_mode_scenario() {
    // Three one-second buckets starting at T0.
    let (captured, sink) = capture();
    let counter = RollingWindowConfig::new(secs(1), 3)
        .with_slide_mode(SlideMode::Span)
        .build(secs(0), sink)
        .unwrap();

    counter.report(Category::Success, ms(500)).unwrap();
    counter.report(Category::Failure, ms(1_200)).unwrap();
    counter.report(Category::Timeout, ms(3_400)).unwrap();

    let evicted = captured.lock().unwrap().clone();
    assert_eq!(
        evicted,
        vec![
            Snapshot::new(secs(0), secs(1), &Bucket { success: 1, ..Bucket::default() }),
            Snapshot::new(secs(1), secs(2), &Bucket { failure: 1, ..Bucket::default() }),
            Snapshot::new(secs(2), secs(3), &Bucket::default()),
        ]
    );

    // Full rotation: head is back where it started.
    assert_eq!(counter.head_index(), 0);
    assert_eq!(counter.window_start(), secs(3));

    let live = counter.current_snapshots();
    assert_eq!((live[0].range_start, live[0].range_end), (secs(3), secs(4)));
    assert_eq!(live[0].timeout, 1);
    assert_eq!(counter.totals().total(), 1);
}

#[test]
fn test_stale_report_is_rejected_without_mutation() {
    let (captured, sink) = capture();
    let counter = RollingWindowCounter::with_sink(secs(0), secs(1), 3, sink);

    counter.report(Category::Success, ms(200)).unwrap();
    counter.report(Category::Success, ms(5_500)).unwrap();
    let window_start = counter.window_start();
    let before = counter.current_snapshots();
    let evicted_before = captured.lock().unwrap().len();

    assert_eq!(
        counter.report(Category::Failure, ms(2_900)),
        Err(StaleReport { behind: ms(100) })
    );
    assert_eq!(counter.report(Category::Timeout, ms(0)), Err(StaleReport { behind: secs(3) }));

    assert_eq!(counter.window_start(), window_start);
    assert_eq!(counter.current_snapshots(), before);
    assert_eq!(captured.lock().unwrap().len(), evicted_before);
    assert_eq!(counter.stale_reports(), 2);
}

#[test]
fn test_report_at_window_start_is_accepted() {
    let counter = RollingWindowCounter::with_sink(secs(7), secs(1), 2, NullSink);
    assert_eq!(counter.report(Category::Rejection, secs(7)), Ok(()));
    assert_eq!(counter.current_snapshots()[0].rejection, 1);
}

#[test]
fn test_span_mode_k_spans_ahead_evicts_k_times_bucket_count() {
    for k in 1..=4u64 {
        let (captured, sink) = capture();
        let counter = RollingWindowConfig::new(ms(250), 4)
            .with_slide_mode(SlideMode::Span)
            .build(secs(0), sink)
            .unwrap();
        counter.report(Category::Success, ms(100)).unwrap();

        let span = counter.window_span();
        counter.report(Category::Success, span * k as u32).unwrap();

        let evicted = captured.lock().unwrap().clone();
        assert_eq!(evicted.len() as u64, k * 4);
        assert_eq!(evicted[0].range_start, secs(0));
        assert_eq!(evicted[0].success, 1);
        for pair in evicted.windows(2) {
            assert_eq!(pair[0].range_end, pair[1].range_start);
            assert_eq!(pair[0].range_end - pair[0].range_start, ms(250));
        }
        assert_eq!(counter.window_start(), span * k as u32);
        assert_eq!(counter.head_index(), 0);
    }
}

#[test]
fn test_bucket_mode_k_spans_ahead_keeps_newest_bucket() {
    let (captured, sink) = capture();
    let counter = RollingWindowCounter::with_sink(secs(0), secs(1), 4, sink);

    // 3 spans ahead: offset 12, window must end just after it.
    counter.report(Category::Failure, secs(12)).unwrap();

    let evicted = captured.lock().unwrap().clone();
    assert_eq!(evicted.len(), 3 * 4 - 3);
    assert_eq!(evicted.last().map(|s| s.range_end), Some(secs(9)));
    assert_eq!(counter.window_start(), secs(9));
    assert_eq!(counter.head_index(), 9 % 4);
    assert_eq!(counter.current_snapshots()[3].failure, 1);
}

#[test]
fn test_huge_jump_after_idle_period() {
    let (captured, sink) = capture();
    let counter = RollingWindowCounter::with_sink(secs(0), ms(100), 5, sink);
    counter.report(Category::Timeout, ms(50)).unwrap();
    counter.report(Category::Success, ms(450)).unwrap();

    counter.report(Category::Success, secs(60)).unwrap();

    let evicted = captured.lock().unwrap().clone();
    // Offset 600 slots; the window keeps the last five, so 596 are evicted.
    assert_eq!(evicted.len(), 596);
    assert_eq!(evicted[0].timeout, 1);
    assert_eq!(evicted[4].success, 1);
    assert!(evicted[5..].iter().all(Snapshot::is_empty));
    assert_eq!(evicted[595].range_end, ms(59_600));
    assert_eq!(counter.window_start(), ms(59_600));
    assert_eq!(counter.totals().total(), 1);
}

#[test]
fn test_flush_through_evicts_without_counting() {
    let (captured, sink) = capture();
    let counter = RollingWindowCounter::with_sink(secs(0), secs(1), 2, sink);
    counter.report(Category::Failure, ms(300)).unwrap();

    assert_eq!(counter.flush_through(secs(2)), Ok(()));
    assert_eq!(captured.lock().unwrap().len(), 1);
    assert_eq!(captured.lock().unwrap()[0].failure, 1);
    assert_eq!(counter.totals(), Bucket::default());

    assert_eq!(counter.flush_through(ms(500)), Err(StaleReport { behind: ms(500) }));
}

#[test]
fn test_try_report_without_contention() {
    let counter = RollingWindowCounter::with_sink(secs(0), secs(1), 2, NullSink);
    assert_eq!(counter.try_report(Category::Success, ms(10)), Ok(()));
    counter.flush_through(secs(10)).unwrap();
    assert_eq!(
        counter.try_report(Category::Success, ms(10)),
        Err(TryReportError::Stale(StaleReport { behind: ms(8_990) }))
    );
}

#[test]
fn test_try_report_while_sink_holds_lock() {
    use std::sync::mpsc;

    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let release_rx = Mutex::new(release_rx);
    let sink = move |_snapshot: Snapshot<Duration>| {
        entered_tx.send(()).unwrap();
        release_rx.lock().unwrap().recv().unwrap();
    };
    let counter = RollingWindowCounter::with_sink(secs(0), secs(1), 1, sink);

    std::thread::scope(|scope| {
        // One bucket, one slot ahead: exactly one eviction.
        let slider = scope.spawn(|| counter.report(Category::Success, secs(1)));
        entered_rx.recv().unwrap();

        assert_eq!(
            counter.try_report(Category::Failure, secs(1)),
            Err(TryReportError::Contended)
        );

        release_tx.send(()).unwrap();
        assert_eq!(slider.join().unwrap(), Ok(()));
    });

    assert_eq!(counter.totals().success, 1);
}

#[test]
fn test_invariant_ranges_tie_out_with_evictions() {
    let (captured, sink) = capture();
    let counter = RollingWindowCounter::with_sink(secs(0), ms(200), 4, sink);

    let mut t = ms(0);
    for step in [ms(30), ms(450), ms(10), ms(900), ms(1), ms(3_000), ms(199), ms(201)] {
        t += step;
        counter.report(Category::Success, t).unwrap();

        let live = counter.current_snapshots();
        let window_start = counter.window_start();
        for (k, snapshot) in live.iter().enumerate() {
            assert_eq!(snapshot.range_start, window_start + ms(200) * k as u32);
            assert_eq!(snapshot.range_end, window_start + ms(200) * (k as u32 + 1));
        }
        assert!(t >= window_start && t < window_start + counter.window_span());

        if let Some(last) = captured.lock().unwrap().last() {
            assert_eq!(last.range_end, window_start);
        }
    }
}

#[test]
fn test_conservation_over_many_reports() {
    let (captured, sink) = capture();
    let counter = RollingWindowCounter::with_sink(secs(0), ms(10), 8, sink);

    let mut accepted = 0u64;
    for i in 0..2_000u64 {
        let category = Category::ALL[(i % 4) as usize];
        if counter.report(category, ms(i * 7 % 13 + i * 3)).is_ok() {
            accepted += 1;
        }
    }

    let emitted: u64 = captured.lock().unwrap().iter().map(Snapshot::total).sum();
    assert_eq!(emitted + counter.totals().total(), accepted);
    assert_eq!(accepted + counter.stale_reports(), 2_000);
}

#[test]
fn test_instant_timestamps() {
    let start = Instant::now();
    let evicted = Arc::new(Mutex::new(Vec::new()));
    let sink = {
        let evicted = Arc::clone(&evicted);
        move |s: Snapshot<Instant>| evicted.lock().unwrap().push(s)
    };
    let counter = RollingWindowCounter::with_sink(start, ms(100), 2, sink);

    counter.report(Category::Success, start + ms(50)).unwrap();
    counter.report(Category::Success, start + ms(250)).unwrap();

    let evicted = evicted.lock().unwrap();
    assert_eq!(evicted.len(), 1);
    assert_eq!(evicted[0].range_start, start);
    assert_eq!(evicted[0].range_end, start + ms(100));
    assert_eq!(counter.window_start(), start + ms(100));
}

#[test]
fn test_into_sink_returns_sink() {
    let counter = RollingWindowCounter::with_sink(secs(0), secs(1), 2, NullSink);
    counter.report(Category::Success, secs(9)).unwrap();
    let _sink: NullSink = counter.into_sink();
}
