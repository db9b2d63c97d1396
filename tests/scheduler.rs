use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::time::{Instant, timeout, timeout_at};
use tokio_util::sync::CancellationToken;

use serialvisor::{EventKind, ProcessError, Provider, ProviderRef, Scheduler, Signal, TaskError, Wait};

fn counter() -> Arc<AtomicUsize> {
    Arc::new(AtomicUsize::new(0))
}

fn periodic(name: &'static str, every: Duration, runs: &Arc<AtomicUsize>) -> ProviderRef {
    let runs = Arc::clone(runs);
    Provider::every(
        name,
        move |_ctx: CancellationToken| {
            let runs = Arc::clone(&runs);
            async move {
                runs.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        },
        every,
    )
}

fn signalled(name: &'static str, runs: &Arc<AtomicUsize>) -> (ProviderRef, Signal) {
    let runs = Arc::clone(runs);
    Provider::on_signal(name, move |_ctx: CancellationToken| {
        let runs = Arc::clone(&runs);
        async move {
            runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    })
}

/// Calls `process` until `deadline`; cycle errors are ignored.
async fn drive_until(sched: &mut Scheduler, token: &CancellationToken, deadline: Instant) {
    while timeout_at(deadline, sched.process(token)).await.is_ok() {}
}

#[tokio::test(start_paused = true)]
async fn scheduled_provider_keeps_scheduler_busy_until_dropped() {
    let mut sched = Scheduler::new();
    assert!(sched.is_empty());

    let left = Arc::new(AtomicUsize::new(2));
    let provider = Provider::from_fn(
        "two-shots",
        |_ctx: CancellationToken| async { Ok(()) },
        move |_ctx: CancellationToken| {
            if left.load(Ordering::SeqCst) == 0 {
                return Wait::Stop;
            }
            left.fetch_sub(1, Ordering::SeqCst);
            Wait::ready()
        },
    );
    let token = CancellationToken::new();
    sched.schedule(provider, token.clone());

    for _ in 0..2 {
        assert!(!sched.is_empty());
        sched.process(&token).await.unwrap();
    }
    assert!(!sched.is_empty());
    sched.process(&token).await.unwrap();
    assert!(sched.is_empty());
}

#[tokio::test(start_paused = true)]
async fn fixed_delay_runs_once_per_period() {
    let mut sched = Scheduler::new();
    let runs = counter();
    let token = CancellationToken::new();
    sched.schedule(periodic("tick", Duration::from_millis(10), &runs), token.clone());

    let start = Instant::now();
    drive_until(&mut sched, &token, start + Duration::from_millis(55)).await;

    assert_eq!(runs.load(Ordering::SeqCst), 5);
    assert!(!sched.is_empty());
}

#[tokio::test(start_paused = true)]
async fn signal_notifications_collapse_into_one_run() {
    let mut sched = Scheduler::new();
    let runs = counter();
    let (provider, signal) = signalled("drain", &runs);
    let token = CancellationToken::new();
    sched.schedule(provider, token.clone());

    // Nothing happens without a notification.
    assert!(timeout(Duration::from_millis(50), sched.process(&token)).await.is_err());
    assert_eq!(runs.load(Ordering::SeqCst), 0);

    signal.notify();
    signal.notify();
    signal.notify();
    sched.process(&token).await.unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    assert!(timeout(Duration::from_millis(50), sched.process(&token)).await.is_err());
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    signal.notify();
    sched.process(&token).await.unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn failed_work_is_retried_on_next_cycle() {
    let mut sched = Scheduler::new();
    let mut events = sched.subscribe();
    let runs = counter();
    let r = Arc::clone(&runs);
    let provider = Provider::from_fn(
        "flaky",
        move |_ctx: CancellationToken| {
            let r = Arc::clone(&r);
            async move {
                if r.fetch_add(1, Ordering::SeqCst) == 0 {
                    return Err(TaskError::fail("first attempt"));
                }
                Ok(())
            }
        },
        |_ctx: CancellationToken| Wait::ready(),
    );
    let token = CancellationToken::new();
    sched.schedule(Arc::clone(&provider), token.clone());

    let err = sched.process(&token).await.unwrap_err();
    assert_eq!(err.as_label(), "process_work_failed");
    assert_eq!(err.provider(), Some("flaky"));
    assert!(sched.is_scheduled(&provider));

    sched.process(&token).await.unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 2);

    let kinds: Vec<EventKind> = std::iter::from_fn(|| events.try_recv().ok().map(|e| e.kind)).collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::ProviderScheduled,
            EventKind::ProviderReady,
            EventKind::WorkFailed,
            EventKind::ProviderRescheduled,
            EventKind::ProviderReady,
            EventKind::WorkCompleted,
            EventKind::ProviderRescheduled,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn cancelled_schedule_token_drops_provider() {
    let mut sched = Scheduler::new();
    let runs = counter();
    let (provider, signal) = signalled("drain", &runs);

    let schedule_token = CancellationToken::new();
    sched.schedule(Arc::clone(&provider), schedule_token.clone());

    let cancel = schedule_token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(5)).await;
        cancel.cancel();
    });

    let driver = CancellationToken::new();
    let err = sched.process(&driver).await.unwrap_err();
    assert!(matches!(err, ProcessError::Canceled { .. }));
    assert!(err.is_cancellation());
    assert!(!sched.is_scheduled(&provider));
    assert!(sched.is_empty());

    signal.notify();
    sched.process(&driver).await.unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn invalidated_signal_provider_is_dropped_without_notify() {
    let mut sched = Scheduler::new();
    let mut events = sched.subscribe();
    let runs = counter();
    let (provider, signal) = signalled("drain", &runs);
    let token = CancellationToken::new();
    sched.schedule(Arc::clone(&provider), token.clone());

    signal.notify();
    sched.process(&token).await.unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    // The rescheduled evaluation has not been polled yet on this runtime.
    provider.invalidate();
    sched.process(&token).await.unwrap();
    assert!(sched.is_empty());
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    let dropped = std::iter::from_fn(|| events.try_recv().ok())
        .find(|e| e.kind == EventKind::ProviderDropped)
        .unwrap();
    assert_eq!(dropped.reason.as_deref(), Some("invalidated"));
    assert_eq!(dropped.cycle, Some(2));
}

#[tokio::test(start_paused = true)]
async fn providers_share_one_serial_stream() {
    let mut sched = Scheduler::new();
    let token = CancellationToken::new();
    let counters = [counter(), counter(), counter()];
    sched.schedule(periodic("p10", Duration::from_millis(10), &counters[0]), token.clone());
    sched.schedule(periodic("p20", Duration::from_millis(20), &counters[1]), token.clone());
    sched.schedule(periodic("p30", Duration::from_millis(30), &counters[2]), token.clone());
    assert_eq!(sched.pending(), vec!["p10", "p20", "p30"]);

    drive_until(&mut sched, &token, Instant::now() + Duration::from_millis(65)).await;

    for (runs, expected) in counters.iter().zip([6usize, 3, 2]) {
        let got = runs.load(Ordering::SeqCst);
        assert!(got.abs_diff(expected) <= 1, "expected ~{expected}, got {got}");
    }
    assert_eq!(sched.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn run_returns_when_token_is_cancelled() {
    let mut sched = Scheduler::new();
    let runs = counter();
    let token = CancellationToken::new();
    sched.schedule(periodic("tick", Duration::from_millis(10), &runs), token.clone());

    let stop = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(35)).await;
        stop.cancel();
    });

    sched.run(&token).await.unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn run_surfaces_condition_failures() {
    let mut sched = Scheduler::new();
    let provider = Provider::from_fn(
        "probe",
        |_ctx: CancellationToken| async { Ok(()) },
        |_ctx: CancellationToken| Wait::until(async { Err(TaskError::fail("link down")) }),
    );
    sched.schedule(provider, CancellationToken::new());

    let err = sched.run(&CancellationToken::new()).await.unwrap_err();
    assert_eq!(err.as_label(), "process_condition_failed");
    assert!(sched.is_empty());
}
