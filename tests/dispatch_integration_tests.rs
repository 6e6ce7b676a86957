//! End-to-end dispatch rounds across every concurrency target.

mod common;

use batchflow_core::dispatch::{
    action_fn, aggregator_fn, blocking, ActionSignature, Aggregator, CallContext,
    CollectSuccesses, Concat, ConcurrencyTarget, DispatchOptions, Dispatcher, InitSpec,
    ItemAction, Outcome, Outcomes, ParallelAction, TargetDispatcher, WorkItem, WorkPlan,
};
use batchflow_core::error::{
    AggregateError, BatchflowError, DispatchError, ItemError, ItemErrorKind,
};
use common::*;
use serde_json::json;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

fn outcomes_passthrough() -> impl Aggregator<i64, Output = Vec<Outcome<i64>>> {
    aggregator_fn(|outcomes: Outcomes<i64>, _ctx: &CallContext| Ok(outcomes.into_vec()))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_outcomes_follow_input_order_for_every_target() {
    for target in ALL_TARGETS {
        for n in [0usize, 1, 7, 64] {
            let action =
                ParallelAction::new(numbers_signature(), square_failing(vec![]), CollectSuccesses)
                    .init(numbers_init(n))
                    .target(target)
                    .max_workers(8);

            let squares = action
                .run(CallContext::new(), &CancellationToken::new())
                .await
                .unwrap();

            let expected: Vec<i64> = (0..n as i64).map(|i| i * i).collect();
            assert_eq!(squares, expected, "target {target} with {n} items");
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_targets_produce_equivalent_outcomes() {
    let mut results = Vec::new();
    for target in ALL_TARGETS {
        let action = ParallelAction::new(
            numbers_signature(),
            square_failing(vec![3, 11, 12]),
            outcomes_passthrough(),
        )
        .init(numbers_init(20))
        .target(target)
        .allow_failures();

        results.push(
            action
                .run(CallContext::new(), &CancellationToken::new())
                .await
                .unwrap(),
        );
    }

    let sequential = &results[0];
    assert_eq!(sequential.len(), 20);
    assert_eq!(sequential.iter().filter(|o| o.is_failure()).count(), 3);
    for other in &results[1..] {
        assert_eq!(other, sequential);
    }
    assert_eq!(
        sequential[3].failure().map(|e| e.kind),
        Some(ItemErrorKind::Io)
    );
}

fn download_signature() -> ActionSignature {
    ActionSignature::new("download", ["url"])
}

fn download(dir: PathBuf) -> impl ItemAction<Output = Vec<String>> {
    let dir = Arc::new(dir);
    action_fn(move |item: WorkItem| {
        let dir = Arc::clone(&dir);
        async move {
            let url = item.param_str("url")?;
            if url.contains("missing") {
                return Err(ItemError::io(format!("404 for {url}")));
            }
            let name = url.rsplit('/').next().unwrap_or_default();
            let path = dir.join(name);
            tokio::fs::write(&path, url.as_bytes()).await?;
            Ok::<_, ItemError>(vec![path.display().to_string()])
        }
    })
}

#[tokio::test]
async fn test_two_url_download_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let action = ParallelAction::new(
        download_signature(),
        download(dir.path().to_path_buf()),
        Concat,
    )
    .init(InitSpec::fixed(vec![
        vec![json!("http://host/a.zip")],
        vec![json!("http://host/b.zip")],
    ]))
    .target(ConcurrencyTarget::ThreadPool);

    let paths = action
        .run(CallContext::new(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        paths,
        vec![
            dir.path().join("a.zip").display().to_string(),
            dir.path().join("b.zip").display().to_string(),
        ]
    );
    assert!(dir.path().join("a.zip").exists());
    assert!(dir.path().join("b.zip").exists());
}

#[tokio::test]
async fn test_two_url_download_with_one_failure_raises_after_both_resolve() {
    let dir = tempfile::tempdir().unwrap();
    let action = ParallelAction::new(
        download_signature(),
        download(dir.path().to_path_buf()),
        Concat,
    )
    .init(InitSpec::fixed(vec![
        vec![json!("http://host/a.zip")],
        vec![json!("http://host/missing.zip")],
    ]))
    .target(ConcurrencyTarget::ThreadPool);

    let err = action
        .run(CallContext::new(), &CancellationToken::new())
        .await
        .unwrap_err();

    match &err {
        BatchflowError::Aggregate(aggregate) => {
            assert_eq!(aggregate.failed_positions(), vec![1]);
            match aggregate {
                AggregateError::ItemsFailed {
                    failed,
                    total,
                    outcomes,
                } => {
                    assert_eq!((*failed, *total), (1, 2));
                    assert_eq!(outcomes.len(), 2);
                    assert!(!outcomes[0].failed);
                    assert!(outcomes[1].failed);
                }
                other => panic!("unexpected aggregate error: {other:?}"),
            }
        }
        other => panic!("unexpected error: {other:?}"),
    }
    let message = err.to_string();
    assert!(message.contains("404 for http://host/missing.zip"));
    // The sibling ran to completion despite the failure
    assert!(dir.path().join("a.zip").exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_thread_pool_overlaps_slow_items() {
    let latencies: Vec<u64> = (0..100u64).map(|i| 10 + (i * 37) % 41).collect();
    let serial_sum: u64 = latencies.iter().sum();

    let action = ParallelAction::new(
        ActionSignature::new("wait", ["ms"]),
        action_fn(|item: WorkItem| async move {
            let ms = item.param("ms").and_then(|v| v.as_u64()).unwrap_or_default();
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok::<_, ItemError>(item.position())
        }),
        CollectSuccesses,
    )
    .init(InitSpec::fixed(latencies.iter().map(|ms| vec![json!(ms)]).collect()))
    .target(ConcurrencyTarget::ThreadPool)
    .max_workers(100);

    let started = Instant::now();
    let positions = action
        .run(CallContext::new(), &CancellationToken::new())
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(positions, (0..100).collect::<Vec<_>>());
    assert!(
        elapsed < Duration::from_millis(serial_sum / 4),
        "took {elapsed:?}, serial sum is {serial_sum}ms"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_blocking_items_run_on_os_threads() {
    let action = ParallelAction::new(
        ActionSignature::new("blocking_wait", ["ms"]),
        blocking(|item: WorkItem| {
            let ms = item.param("ms").and_then(|v| v.as_u64()).unwrap_or_default();
            std::thread::sleep(Duration::from_millis(ms));
            Ok(item.position())
        }),
        CollectSuccesses,
    )
    .init(InitSpec::fixed((0..20).map(|_| vec![json!(50)]).collect()))
    .target(ConcurrencyTarget::ThreadPool)
    .max_workers(20);

    let started = Instant::now();
    let positions = action
        .run(CallContext::new(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(positions, (0..20).collect::<Vec<_>>());
    assert!(started.elapsed() < Duration::from_millis(20 * 50));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_panicking_item_becomes_failure() {
    for target in ALL_TARGETS {
        let action = ParallelAction::new(
            numbers_signature(),
            action_fn(|item: WorkItem| async move {
                let n = number(&item)?;
                if n == 2 {
                    panic!("corrupt archive {n}");
                }
                Ok::<_, ItemError>(n)
            }),
            outcomes_passthrough(),
        )
        .init(numbers_init(4))
        .target(target)
        .allow_failures();

        let outcomes = action
            .run(CallContext::new(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 4);
        let failure = outcomes[2].failure().unwrap();
        assert_eq!(failure.kind, ItemErrorKind::Panicked);
        assert!(failure.message.contains("corrupt archive 2"));
        assert_eq!(outcomes[3], Outcome::Success(3));
    }
}

#[tokio::test]
async fn test_slow_item_times_out() {
    let action = ParallelAction::new(
        numbers_signature(),
        action_fn(|item: WorkItem| async move {
            let n = number(&item)?;
            if n == 1 {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            Ok::<_, ItemError>(n)
        }),
        outcomes_passthrough(),
    )
    .init(numbers_init(3))
    .target(ConcurrencyTarget::Cooperative)
    .item_timeout(Duration::from_millis(50))
    .allow_failures();

    let outcomes = action
        .run(CallContext::new(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcomes[0], Outcome::Success(0));
    assert_eq!(
        outcomes[1].failure().map(|e| e.kind),
        Some(ItemErrorKind::Timeout)
    );
    assert_eq!(outcomes[2], Outcome::Success(2));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancellation_fails_round_without_aggregating() {
    const TOTAL: usize = 10;
    const FINISHING: i64 = 4;

    for target in ALL_TARGETS {
        let finished = Arc::new(AtomicUsize::new(0));
        let post = CountingAggregator::default();
        let counter = Arc::clone(&finished);

        let action = ParallelAction::new(
            numbers_signature(),
            action_fn(move |item: WorkItem| {
                let counter = Arc::clone(&counter);
                async move {
                    let n = number(&item)?;
                    if n >= FINISHING {
                        futures::future::pending::<()>().await;
                    }
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ItemError>(n)
                }
            }),
            post.clone(),
        )
        .init(numbers_init(TOTAL))
        .target(target)
        .max_workers(TOTAL);

        let cancel = CancellationToken::new();
        let canceller = {
            let cancel = cancel.clone();
            let finished = Arc::clone(&finished);
            tokio::spawn(async move {
                while finished.load(Ordering::SeqCst) < FINISHING as usize {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
                cancel.cancel();
            })
        };

        let err = action.run(CallContext::new(), &cancel).await.unwrap_err();
        canceller.await.unwrap();

        match err {
            BatchflowError::Dispatch(DispatchError::Cancelled { completed, total }) => {
                assert_eq!(total, TOTAL, "target {target}");
                assert!(completed <= FINISHING as usize, "target {target}");
            }
            other => panic!("unexpected error for {target}: {other:?}"),
        }
        assert_eq!(post.calls(), 0, "aggregator ran for {target}");
        assert_eq!(finished.load(Ordering::SeqCst), FINISHING as usize);
    }
}

#[tokio::test]
async fn test_pre_cancelled_empty_round_fails_for_every_target() {
    for target in ALL_TARGETS {
        let post = CountingAggregator::default();
        let action = ParallelAction::new(numbers_signature(), square_failing(vec![]), post.clone())
            .init(numbers_init(0))
            .target(target);

        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = action.run(CallContext::new(), &cancel).await.unwrap_err();
        assert!(
            matches!(
                err,
                BatchflowError::Dispatch(DispatchError::Cancelled {
                    completed: 0,
                    total: 0
                })
            ),
            "target {target}: {err:?}"
        );
        assert_eq!(post.calls(), 0, "aggregator ran for {target}");
    }
}

#[tokio::test]
async fn test_cancel_after_last_item_resolved_completes_for_every_target() {
    const TOTAL: usize = 6;

    for target in ALL_TARGETS {
        let cancel = CancellationToken::new();
        let resolved = Arc::new(AtomicUsize::new(0));
        let post = CountingAggregator::default();

        let action = {
            let cancel = cancel.clone();
            let resolved = Arc::clone(&resolved);
            ParallelAction::new(
                numbers_signature(),
                action_fn(move |item: WorkItem| {
                    let cancel = cancel.clone();
                    let resolved = Arc::clone(&resolved);
                    async move {
                        let n = number(&item)?;
                        tokio::task::yield_now().await;
                        // The last item to finish fires the token on its way out
                        if resolved.fetch_add(1, Ordering::SeqCst) + 1 == TOTAL {
                            cancel.cancel();
                        }
                        Ok::<_, ItemError>(n)
                    }
                }),
                post.clone(),
            )
            .init(numbers_init(TOTAL))
            .target(target)
            .max_workers(2)
        };

        let values = action.run(CallContext::new(), &cancel).await.unwrap();
        assert!(cancel.is_cancelled());
        assert_eq!(values, (0..TOTAL as i64).collect::<Vec<_>>(), "target {target}");
        assert_eq!(post.calls(), 1, "target {target}");
    }
}

#[tokio::test]
async fn test_call_context_reaches_every_item() {
    let action = ParallelAction::new(
        numbers_signature(),
        action_fn(|item: WorkItem| async move {
            let n = number(&item)?;
            let scale = item.arg(1).and_then(|v| v.as_i64()).unwrap_or(1);
            let offset = item.option("offset").and_then(|v| v.as_i64()).unwrap_or(0);
            Ok::<_, ItemError>(n * scale + offset)
        }),
        aggregator_fn(|outcomes: Outcomes<i64>, ctx: &CallContext| {
            let values = outcomes
                .into_successes()
                .map_err(|e| AggregateError::custom(e.to_string()))?;
            let limit = ctx.option("limit").and_then(|v| v.as_u64()).unwrap_or(u64::MAX);
            Ok(values.into_iter().take(limit as usize).collect::<Vec<_>>())
        }),
    )
    .init(numbers_init(4))
    .target(ConcurrencyTarget::Sequential);

    let ctx = CallContext::new()
        .with_arg(10)
        .with_option("offset", 1)
        .with_option("limit", 3);
    let values = action.run(ctx, &CancellationToken::new()).await.unwrap();
    assert_eq!(values, vec![1, 11, 21]);
}

#[tokio::test]
async fn test_producer_runs_once_per_round() {
    let calls = Arc::new(AtomicUsize::new(0));
    let producer_calls = Arc::clone(&calls);
    let action = ParallelAction::new(numbers_signature(), square_failing(vec![]), CollectSuccesses)
        .init(InitSpec::producer(move || {
            let round = producer_calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok((0..round).map(|i| vec![json!(i)]).collect())
        }))
        .target(ConcurrencyTarget::Cooperative);

    let first = action
        .run(CallContext::new(), &CancellationToken::new())
        .await
        .unwrap();
    let second = action
        .run(CallContext::new(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(first, vec![0]);
    assert_eq!(second, vec![0, 1]);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_dispatcher_handles_empty_plan() {
    let plan = WorkPlan::resolve(
        Some(&numbers_init(0)),
        &numbers_signature(),
        &CallContext::new(),
    )
    .unwrap();

    for target in ALL_TARGETS {
        let dispatcher = TargetDispatcher::for_target(target, &DispatchOptions::default());
        let outcomes = dispatcher
            .dispatch(plan.clone(), Arc::new(square_failing(vec![])), &CancellationToken::new())
            .await
            .unwrap();
        assert!(outcomes.is_empty());
        assert!(!outcomes.any_failed());
    }
}
