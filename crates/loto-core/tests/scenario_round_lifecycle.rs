//! Round lifecycle scenarios driven through `LotoService` over the in-memory
//! store: single-open-round invariant, idempotent open/close, results stored
//! at most once and only on the latest closed round.

use std::sync::Arc;

use loto_core::{CloseOutcome, LotoError, LotoService, OpenOutcome, RawNumbers, RoundState};
use loto_testkit::MemoryStore;

fn service() -> (Arc<MemoryStore>, LotoService) {
    let store = Arc::new(MemoryStore::new());
    let svc = LotoService::new(store.clone(), "https://loto.example/");
    (store, svc)
}

#[tokio::test]
async fn open_twice_keeps_a_single_open_round() {
    let (store, svc) = service();

    let first = svc.open_round().await.unwrap();
    let second = svc.open_round().await.unwrap();

    assert!(matches!(first, OpenOutcome::Opened(_)));
    assert_eq!(second, OpenOutcome::AlreadyOpen(first.round_id()));
    assert_eq!(store.open_round_count().await, 1);
    assert_eq!(store.round_count().await, 1);
}

#[tokio::test]
async fn close_without_open_round_is_a_noop() {
    let (store, svc) = service();
    assert_eq!(svc.close_round().await.unwrap(), CloseOutcome::NothingOpen);
    assert_eq!(store.round_count().await, 0);
}

#[tokio::test]
async fn close_then_open_starts_a_fresh_round() {
    let (store, svc) = service();
    let r1 = svc.open_round().await.unwrap().round_id();
    assert_eq!(svc.close_round().await.unwrap(), CloseOutcome::Closed(r1));
    // Closing again has nothing to close.
    assert_eq!(svc.close_round().await.unwrap(), CloseOutcome::NothingOpen);

    let r2 = svc.open_round().await.unwrap();
    assert!(matches!(r2, OpenOutcome::Opened(id) if id != r1));
    assert_eq!(store.open_round_count().await, 1);
}

#[tokio::test]
async fn results_are_stored_once_on_the_closed_latest_round() {
    let (_store, svc) = service();
    let round_id = svc.open_round().await.unwrap().round_id();

    // Still open.
    let err = svc.store_results(&[1, 2, 3, 4, 5, 6]).await.unwrap_err();
    assert!(matches!(err, LotoError::InvalidState { .. }));

    svc.close_round().await.unwrap();
    assert_eq!(svc.store_results(&[6, 5, 4, 3, 2, 1]).await.unwrap(), round_id);

    // Second attempt on the same round.
    let err = svc.store_results(&[7, 8, 9, 10, 11, 12]).await.unwrap_err();
    assert!(matches!(err, LotoError::InvalidState { round_id: Some(id), .. } if id == round_id));

    let status = svc.ticket_status().await.unwrap();
    assert_eq!(status.results.unwrap().as_slice(), &[1, 2, 3, 4, 5, 6]);
}

#[tokio::test]
async fn results_without_any_round_are_invalid_state() {
    let (_store, svc) = service();
    let err = svc.store_results(&[1, 2, 3, 4, 5, 6]).await.unwrap_err();
    assert!(matches!(err, LotoError::InvalidState { round_id: None, .. }));
}

#[tokio::test]
async fn results_target_latest_round_even_if_an_older_one_is_pending() {
    let (_store, svc) = service();
    svc.open_round().await.unwrap();
    svc.close_round().await.unwrap();
    // A new round opened before results were stored for the previous one.
    svc.open_round().await.unwrap();

    let err = svc.store_results(&[1, 2, 3, 4, 5, 6]).await.unwrap_err();
    assert!(matches!(err, LotoError::InvalidState { .. }));
}

#[tokio::test]
async fn invalid_drawn_numbers_fail_validation_before_state_check() {
    let (_store, svc) = service();
    let err = svc.store_results(&[]).await.unwrap_err();
    assert!(matches!(err, LotoError::Validation(_)));
    let err = svc.store_results(&[1, 1, 2, 3, 4, 5]).await.unwrap_err();
    assert!(matches!(err, LotoError::Validation(_)));
}

#[tokio::test]
async fn ticket_page_state_follows_round_through_all_states() {
    let (store, svc) = service();
    svc.open_round().await.unwrap();
    let receipt = svc
        .submit_ticket("A123", &RawNumbers::Csv("3,7,12,19,25,40".into()))
        .await
        .unwrap();
    let id = receipt.ticket.id.to_string();

    let (_, round) = svc.lookup_ticket(&id).await.unwrap();
    assert_eq!(round.state(), RoundState::Open);

    svc.close_round().await.unwrap();
    let (_, round) = svc.lookup_ticket(&id).await.unwrap();
    assert_eq!(round.state(), RoundState::Closed);
    assert_eq!(svc.ticket_view(&id).await.unwrap().match_count(), None);

    svc.store_results(&[7, 19, 25, 1, 2, 3]).await.unwrap();
    let (_, round) = svc.lookup_ticket(&id).await.unwrap();
    assert_eq!(round.state(), RoundState::Resulted);
    assert_eq!(svc.ticket_view(&id).await.unwrap().match_count(), Some(4));
    assert_eq!(store.open_round_count().await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_open_and_close_never_leave_two_open_rounds() {
    let (store, svc) = service();

    let mut handles = Vec::new();
    for i in 0..64 {
        let svc = svc.clone();
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            if i % 3 == 0 {
                svc.close_round().await.unwrap();
            } else {
                svc.open_round().await.unwrap();
            }
            store.open_round_count().await
        }));
    }

    for h in handles {
        let open = h.await.unwrap();
        assert!(open <= 1, "observed {open} open rounds");
    }
    assert!(store.open_round_count().await <= 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_result_submissions_succeed_exactly_once() {
    let (_store, svc) = service();
    svc.open_round().await.unwrap();
    svc.close_round().await.unwrap();

    let mut handles = Vec::new();
    for i in 0..16_i64 {
        let svc = svc.clone();
        handles.push(tokio::spawn(async move {
            svc.store_results(&[1, 2, 3, 4, 5, 6 + i]).await
        }));
    }

    let mut ok = 0;
    for h in handles {
        match h.await.unwrap() {
            Ok(_) => ok += 1,
            Err(LotoError::InvalidState { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(ok, 1);
}
