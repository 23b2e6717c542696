// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Structured-concurrency race: start N tasks, resume with the first
//! completed value tagged by arm index, leave the rest to the parent scope.

use std::future::Future;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::sync::mpsc;

use em_core::{IndexedVariant2, IndexedVariant3};

use crate::executor::ExecutorHandle;
use crate::scope::AsyncScope;

async fn race(
    exe: &ExecutorHandle,
    scope: &AsyncScope,
    arms: Vec<BoxFuture<'static, ()>>,
    mut rx: mpsc::Receiver<usize>,
) -> Option<usize> {
    debug_assert!(!arms.is_empty());
    for arm in arms {
        exe.post(scope, arm);
    }
    rx.recv().await
}

/// Race homogeneous arms; the winner's `(index, value)` is returned. The
/// losing arms keep running under `scope` until they finish or the scope is
/// cleaned up. Returns `None` when every arm was cancelled before finishing.
pub async fn any_of<T, F>(
    exe: &ExecutorHandle,
    scope: &AsyncScope,
    arms: Vec<F>,
) -> Option<(usize, T)>
where
    T: Send + 'static,
    F: Future<Output = T> + Send + 'static,
{
    if arms.is_empty() {
        return None;
    }

    let (value_tx, mut value_rx) = mpsc::channel::<(usize, T)>(arms.len());
    let (done_tx, done_rx) = mpsc::channel::<usize>(arms.len());

    let boxed: Vec<BoxFuture<'static, ()>> = arms
        .into_iter()
        .enumerate()
        .map(|(index, fut)| {
            let value_tx = value_tx.clone();
            let done_tx = done_tx.clone();
            async move {
                let value = fut.await;
                if value_tx.try_send((index, value)).is_ok() {
                    let _ = done_tx.try_send(index);
                }
            }
            .boxed()
        })
        .collect();
    drop(value_tx);
    drop(done_tx);

    race(exe, scope, boxed, done_rx).await?;
    value_rx.recv().await
}

/// Race two differently-typed arms.
pub async fn any2<A, B, FA, FB>(
    exe: &ExecutorHandle,
    scope: &AsyncScope,
    a: FA,
    b: FB,
) -> Option<IndexedVariant2<A, B>>
where
    A: Send + 'static,
    B: Send + 'static,
    FA: Future<Output = A> + Send + 'static,
    FB: Future<Output = B> + Send + 'static,
{
    let arms: Vec<BoxFuture<'static, IndexedVariant2<A, B>>> = vec![
        a.map(IndexedVariant2::V0).boxed(),
        b.map(IndexedVariant2::V1).boxed(),
    ];
    any_of(exe, scope, arms).await.map(|(_, value)| value)
}

/// Race three differently-typed arms.
pub async fn any3<A, B, C, FA, FB, FC>(
    exe: &ExecutorHandle,
    scope: &AsyncScope,
    a: FA,
    b: FB,
    c: FC,
) -> Option<IndexedVariant3<A, B, C>>
where
    A: Send + 'static,
    B: Send + 'static,
    C: Send + 'static,
    FA: Future<Output = A> + Send + 'static,
    FB: Future<Output = B> + Send + 'static,
    FC: Future<Output = C> + Send + 'static,
{
    let arms: Vec<BoxFuture<'static, IndexedVariant3<A, B, C>>> = vec![
        a.map(IndexedVariant3::V0).boxed(),
        b.map(IndexedVariant3::V1).boxed(),
        c.map(IndexedVariant3::V2).boxed(),
    ];
    any_of(exe, scope, arms).await.map(|(_, value)| value)
}

#[cfg(test)]
#[path = "any_tests.rs"]
mod tests;
