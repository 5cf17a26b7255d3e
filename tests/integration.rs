//! Integration tests for the publisher/subscriber system

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use fluxweld::prelude::*;
use fluxweld::traits::SharedPublisher;

fn assert_single_terminal<T>(signals: &[Signal<T>]) {
    let terminals = signals.iter().filter(|s| s.is_terminal()).count();
    assert!(terminals <= 1, "more than one terminal signal");
    if let Some(pos) = signals.iter().position(|s| s.is_terminal()) {
        assert_eq!(pos, signals.len() - 1, "signal delivered after a terminal");
    }
}

#[test]
fn test_just_yields_value_then_complete() {
    let sink = CollectSubscriber::new();
    just(42).subscribe_with(sink.clone());
    assert_eq!(sink.signals(), vec![Signal::Value(42), Signal::Complete]);
}

#[test]
fn test_just_many_yields_all_in_order() {
    let sink = CollectSubscriber::new();
    from_iter(["Flux", "just", "many"]).subscribe_with(sink.clone());
    assert_eq!(
        sink.signals(),
        vec![
            Signal::Value("Flux"),
            Signal::Value("just"),
            Signal::Value("many"),
            Signal::Complete
        ]
    );
}

#[test]
fn test_map_over_single() {
    let sink = CollectSubscriber::new();
    just(3).map(|x| x + 1).subscribe_with(sink.clone());
    assert_eq!(sink.signals(), vec![Signal::Value(4), Signal::Complete]);

    let failed = CollectSubscriber::<i32>::new();
    just(3)
        .map(|_: i32| -> i32 { panic!("map failed") })
        .subscribe_with(failed.clone());
    let signals = failed.signals();
    assert_eq!(signals.len(), 1);
    assert!(matches!(signals[0], Signal::Error(Error::Transform(_))));
}

#[test]
fn test_zip_of_three_and_zip_with_error() {
    let sink = CollectSubscriber::new();
    zip3(just('a'), just('b'), just('c')).subscribe_with(sink.clone());
    assert_eq!(
        sink.signals(),
        vec![Signal::Value(('a', 'b', 'c')), Signal::Complete]
    );

    let failed = CollectSubscriber::new();
    zip2(just('a'), error::<char>(Error::custom("e"))).subscribe_with(failed.clone());
    assert_eq!(failed.signals(), vec![Signal::Error(Error::custom("e"))]);
}

#[test]
fn test_concat_with_and_first_error() {
    let sink = CollectSubscriber::new();
    just("a").concat_with(just("b")).subscribe_with(sink.clone());
    assert_eq!(
        sink.signals(),
        vec![Signal::Value("a"), Signal::Value("b"), Signal::Complete]
    );

    let subscribed = Arc::new(AtomicUsize::new(0));
    let counter = subscribed.clone();
    let failed = CollectSubscriber::new();
    error::<&str>(Error::custom("first"))
        .concat_with(from_fn(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Some("b"))
        }))
        .subscribe_with(failed.clone());
    assert_eq!(failed.signals(), vec![Signal::Error(Error::custom("first"))]);
    assert_eq!(subscribed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_delay_elements_timestamps() {
    let delay = Duration::from_millis(25);
    let start = Instant::now();
    let sink = CollectSubscriber::new();
    just_many(vec!["a", "b"])
        .delay_elements(delay)
        .subscribe_with(sink.clone());

    sink.wait_terminal().await;
    assert_eq!(
        sink.signals(),
        vec![Signal::Value("a"), Signal::Value("b"), Signal::Complete]
    );
    let stamps = sink.timestamps();
    assert!(stamps[0] >= start + delay);
    assert!(stamps[1] >= stamps[0] + delay);
    assert!(stamps[2] >= stamps[1]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_delay_delivers_on_another_thread() {
    let caller = std::thread::current().id();
    let seen = Arc::new(parking_lot::Mutex::new(None));
    let record = seen.clone();
    let sink = CollectSubscriber::new();

    just(1)
        .delay_elements(Duration::from_millis(5))
        .do_on_next(move |_| *record.lock() = Some(std::thread::current().id()))
        .subscribe_with(sink.clone());
    sink.wait_terminal().await;

    assert_eq!(sink.values(), vec![1]);
    let fired_on = seen.lock().take();
    assert!(fired_on.is_some());
    assert_ne!(fired_on, Some(caller));
}

#[test]
fn test_cancel_twice_is_same_as_once() {
    let scheduler = Arc::new(VirtualScheduler::new());
    let sink = CollectSubscriber::new();
    let subscription = just_many(vec![1, 2, 3])
        .delay_elements_on(Duration::from_millis(10), scheduler.clone())
        .subscribe_with(sink.clone());

    scheduler.advance(Duration::from_millis(10));
    subscription.cancel();
    subscription.cancel();
    assert!(subscription.is_cancelled());

    scheduler.advance(Duration::from_millis(100));
    assert_eq!(sink.signals(), vec![Signal::Value(1)]);
}

#[test]
fn test_no_signal_after_terminal_across_combinations() {
    let scheduler = Arc::new(VirtualScheduler::new());

    let pipelines: Vec<SharedPublisher<i32>> = vec![
        just(1).map(|x| x * 2).shared(),
        just_many(vec![1, 2, 0]).map(|x| 10 / x).shared(),
        just(2).flat_map_many(|x| just_many(vec![x, x])).shared(),
        just(2).flat_map(|_| error::<i32>(Error::custom("inner"))).shared(),
        zip2(just(1), just(2)).map(|(a, b)| a + b).shared(),
        zip2(just(1), empty::<i32>()).map(|(a, b)| a + b).shared(),
        just(1).concat_with(error(Error::custom("tail"))).shared(),
        error::<i32>(Error::custom("head")).concat_with(just(1)).shared(),
        just_many(vec![1, 2, 3])
            .delay_elements_on(Duration::from_millis(5), scheduler.clone())
            .concat_with(just(4))
            .shared(),
        just(1).then(just(5)).filter(|x| *x > 0).log("combo").shared(),
    ];

    let sinks: Vec<CollectSubscriber<i32>> = pipelines
        .iter()
        .map(|p| {
            let sink = CollectSubscriber::new();
            p.subscribe_with(sink.clone());
            sink
        })
        .collect();

    scheduler.advance(Duration::from_millis(100));

    let runs: Vec<Vec<Signal<i32>>> = sinks.iter().map(|sink| sink.signals()).collect();
    for (sink, signals) in sinks.iter().zip(&runs) {
        assert!(sink.is_terminated());
        assert_single_terminal(signals);
    }
    assert_eq!(
        runs[8],
        vec![
            Signal::Value(1),
            Signal::Value(2),
            Signal::Value(3),
            Signal::Value(4),
            Signal::Complete
        ]
    );
}

#[test]
fn test_lambda_subscription() {
    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let values = seen.clone();
    let errors = seen.clone();
    let completions = seen.clone();

    just_many(vec![1, 2])
        .concat_with(error(Error::custom("Error from flux")))
        .subscribe(
            move |v| values.lock().push(format!("Data: {v}")),
            move |e| errors.lock().push(format!("Handled error: {e}")),
            move || completions.lock().push("done".to_string()),
        );

    assert_eq!(
        *seen.lock(),
        vec![
            "Data: 1".to_string(),
            "Data: 2".to_string(),
            "Handled error: Error from flux".to_string(),
        ]
    );
}

#[test]
fn test_demand_and_request() {
    let sink = CollectSubscriber::new();
    let subscription = range(0..5).subscribe_with_config(
        sink.clone(),
        SubscribeConfig::default().initial_demand(2).buffer_size(8),
    );
    assert_eq!(sink.values(), vec![0, 1]);

    subscription.request(2);
    assert_eq!(sink.values(), vec![0, 1, 2, 3]);
    assert!(!sink.is_terminated());

    subscription.request(UNBOUNDED);
    assert_eq!(sink.values(), vec![0, 1, 2, 3, 4]);
    assert!(sink.is_completed());
}

#[test]
fn test_publishers_are_reusable() {
    let pipeline = just_many(vec![1, 2, 3]).map(|x| x * x).shared();
    let first = CollectSubscriber::new();
    let second = CollectSubscriber::new();
    pipeline.subscribe_with(first.clone());
    pipeline.subscribe_with(second.clone());
    assert_eq!(first.values(), vec![1, 4, 9]);
    assert_eq!(first.signals(), second.signals());
}

#[test]
fn test_stream_bridge() {
    use futures::StreamExt;

    let values: Vec<i64> = tokio_test::block_on(async {
        range(0..4)
            .into_stream()
            .map(|r| r.unwrap_or_default())
            .collect()
            .await
    });
    assert_eq!(values, vec![0, 1, 2, 3]);
}
