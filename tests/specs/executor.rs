// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Executor specs: structured concurrency and single-thread ordering.

use std::sync::Arc;
use std::time::Duration;

use em_executor::{any3, any_of, AsyncScope, ExecutorKind, ExecutorManager, ExecutorSpec};

type BoxedArm<T> = std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'static>>;

fn pool(name: &str, kind: ExecutorKind, threads: u32) -> ExecutorManager {
    ExecutorManager::build(&[ExecutorSpec {
        name: name.to_owned(),
        kind,
        thread_num: threads,
    }])
    .expect("executor must build")
}

/// Scenario: three arms sleeping 100/50/120 ms returning 1/2/3; the race
/// resumes with arm index 1 and value 2.
#[test]
fn any_resumes_with_the_first_arm() {
    let manager = pool("race", ExecutorKind::AsioThread, 4);
    let exe = manager.get("race").unwrap();
    let scope = AsyncScope::new();

    let winner = exe.block_on(any3(
        &exe,
        &scope,
        async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            1u32
        },
        async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            2u32
        },
        async {
            tokio::time::sleep(Duration::from_millis(120)).await;
            3u32
        },
    ));

    let variant = winner.expect("race must resolve");
    assert_eq!(variant.index(), 1);
    assert_eq!(variant.as_v1(), Some(&2));

    exe.block_on(scope.complete());
    manager.shutdown();
}

/// Invariant: on a 1-thread executor, post(A); post(B) runs A before B.
#[test]
fn single_thread_post_is_fifo() {
    let manager = pool("strand", ExecutorKind::SimpleThread, 1);
    let exe = manager.get("strand").unwrap();
    let scope = AsyncScope::new();

    let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
    for i in 0..64u32 {
        let order = Arc::clone(&order);
        exe.post(&scope, async move {
            order.lock().push(i);
        });
    }

    let waiter = pool("waiter", ExecutorKind::SimpleThread, 1);
    waiter
        .get("waiter")
        .unwrap()
        .block_on(scope.complete());

    assert_eq!(*order.lock(), (0..64).collect::<Vec<_>>());
    waiter.shutdown();
    manager.shutdown();
}

/// Homogeneous races return the winning index alongside the value, and the
/// losing arms stay owned by the scope.
#[test]
fn any_of_returns_index_and_value() {
    let manager = pool("race", ExecutorKind::AsioThread, 2);
    let exe = manager.get("race").unwrap();
    let scope = AsyncScope::new();

    let arms: Vec<BoxedArm<u8>> = vec![
        Box::pin(async {
            tokio::time::sleep(Duration::from_millis(40)).await;
            7u8
        }),
        Box::pin(async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            9u8
        }),
    ];
    let winner = exe.block_on(any_of(&exe, &scope, arms));
    assert_eq!(winner, Some((1, 9)));

    exe.block_on(scope.complete());
    manager.shutdown();
}
