//! # Poll Loop Example
//!
//! One scheduler, three providers sharing a single serial stream:
//! - `heartbeat`: fixed delay, never fails
//! - `flaky`: fixed delay, fails every third run (and keeps going)
//! - `drain`: signal-gated, woken by a background producer
//!
//! Events are rendered through the built-in `LogWriter`.
//!
//! ## Run
//! ```bash
//! RUST_LOG=serialvisor=debug cargo run --example poll_loop --features logging
//! ```

use std::{
    sync::Arc,
    sync::atomic::{AtomicU32, Ordering},
    time::Duration,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use serialvisor::{LogWriter, Provider, Scheduler, SchedulerConfig, TaskError};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), serialvisor::ProcessError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut scheduler = Scheduler::builder(SchedulerConfig::default().with_name("poll-loop"))
        .with_subscriber(Arc::new(LogWriter::new()))
        .build();
    let token = CancellationToken::new();

    let heartbeat = Provider::every(
        "heartbeat",
        |_ctx: CancellationToken| async {
            println!("[heartbeat] tick");
            Ok(())
        },
        Duration::from_millis(250),
    );

    let attempts = Arc::new(AtomicU32::new(0));
    let flaky = Provider::every(
        "flaky",
        move |_ctx: CancellationToken| {
            let attempts = Arc::clone(&attempts);
            async move {
                let n = attempts.fetch_add(1, Ordering::Relaxed) + 1;
                if n % 3 == 0 {
                    return Err(TaskError::fail(format!("attempt {n} refused")));
                }
                println!("[flaky] attempt {n} ok");
                Ok(())
            }
        },
        Duration::from_millis(400),
    );

    let (drain, signal) = Provider::on_signal("drain", |ctx: CancellationToken| async move {
        tokio::select! {
            _ = ctx.cancelled() => Err(TaskError::Canceled),
            _ = tokio::time::sleep(Duration::from_millis(50)) => {
                println!("[drain] queue drained");
                Ok(())
            }
        }
    });

    scheduler.schedule(heartbeat, token.clone());
    scheduler.schedule(flaky, token.clone());
    scheduler.schedule(drain, token.clone());

    // Producer: bursts of notifications collapse into a single drain run.
    tokio::spawn(async move {
        for _ in 0..4 {
            tokio::time::sleep(Duration::from_millis(600)).await;
            signal.notify();
            signal.notify();
        }
    });

    let stop = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(3)).await;
        println!("[main] stopping");
        stop.cancel();
    });

    loop {
        match scheduler.run(&token).await {
            Ok(()) => break,
            Err(err) => {
                println!("[main] cycle error: {err}");
                if scheduler.is_empty() {
                    break;
                }
            }
        }
    }
    println!("[main] left pending: {:?}", scheduler.pending());
    Ok(())
}
