//! Concurrent moves against a shared file-backed database

mod common;

use canopy::tree::ParentChange;
use canopy::TreeErrorKind;
use common::{contiguous, CanopyTest};
use tokio::task::JoinSet;

const SIBLINGS: i64 = 8;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reorders_keep_orderings_contiguous() {
    let test = CanopyTest::file().await.unwrap();
    test.resource(1, None, 1).await.unwrap();
    let ids: Vec<i64> = (100..100 + SIBLINGS).collect();
    test.children(Some(1), &ids).await.unwrap();

    let mut tasks = JoinSet::new();
    for (i, id) in ids.iter().copied().enumerate() {
        let mutator = test.engine.mutator();
        let position = (i as i64 * 3) % SIBLINGS + 1;
        tasks.spawn(async move {
            mutator
                .move_to_position(id, position, ParentChange::Unchanged)
                .await
        });
    }

    while let Some(joined) = tasks.join_next().await {
        if let Err(err) = joined.unwrap() {
            // Another move may already have put the resource at its target
            assert_eq!(err.kind(), TreeErrorKind::WrongPosition, "{}", err);
        }
    }

    assert_eq!(
        test.orderings(Some(1)).await.unwrap(),
        contiguous(SIBLINGS as usize)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reparents_keep_both_branches_contiguous() {
    let test = CanopyTest::file().await.unwrap();
    test.children(None, &[1, 2]).await.unwrap();
    let left: Vec<i64> = (100..100 + SIBLINGS).collect();
    let right: Vec<i64> = (200..200 + SIBLINGS).collect();
    test.children(Some(1), &left).await.unwrap();
    test.children(Some(2), &right).await.unwrap();

    let mut tasks = JoinSet::new();
    for id in left.iter().chain(right.iter()).copied().step_by(2) {
        let mutator = test.engine.mutator();
        let new_parent = if id < 200 { 2 } else { 1 };
        tasks.spawn(async move {
            mutator
                .move_to_position(id, 1, ParentChange::SetTo(Some(new_parent)))
                .await
        });
    }

    while let Some(joined) = tasks.join_next().await {
        joined.unwrap().unwrap();
    }

    let total = test.child_ids(Some(1)).await.unwrap().len()
        + test.child_ids(Some(2)).await.unwrap().len();
    assert_eq!(total, 2 * SIBLINGS as usize);
    for parent in [1, 2] {
        let orderings = test.orderings(Some(parent)).await.unwrap();
        assert_eq!(orderings, contiguous(orderings.len()));
    }
}
