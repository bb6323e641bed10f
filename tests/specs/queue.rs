//! Request queue specs: admission control, batch slot placement,
//! delay/remove, and dispatch of due requests.

use crate::prelude::*;
use adminq_core::store::RequestFilter;
use adminq_core::{EntityId, Op, RequestId, BATCH_HOUR};
use adminq_daemon::protocol::{Request, Response};
use chrono::{Duration, Timelike, Utc};

fn add(op: Op, target: u64) -> Request {
    Request::QueueAdd {
        requester_id: EntityId(1),
        operation: op,
        target_id: Some(EntityId(target)),
        destination_id: None,
        run_at: Some(Utc::now() + Duration::days(1)),
        state_data: None,
    }
}

#[tokio::test]
async fn conflicting_requests_are_rejected() {
    let daemon = TestDaemon::start("");

    let response = daemon.send(&add(Op::MoveUser, 41)).await;
    assert!(matches!(response, Response::Added { id: RequestId(1) }));

    // delete conflicts with a pending move on the same target
    let response = daemon.send(&add(Op::DeleteUser, 41)).await;
    let Response::Error { message } = response else {
        panic!("expected error, got {response:?}");
    };
    assert!(message.contains("move-user"));

    // a different target is unaffected
    let response = daemon.send(&add(Op::DeleteUser, 42)).await;
    assert!(matches!(response, Response::Added { id: RequestId(2) }));
    daemon.stop().await;
}

#[tokio::test]
async fn omitted_run_at_lands_in_the_batch_slot() {
    let daemon = TestDaemon::start("");

    daemon
        .send(&Request::QueueAdd {
            requester_id: EntityId(1),
            operation: Op::MoveUser,
            target_id: Some(EntityId(41)),
            destination_id: None,
            run_at: None,
            state_data: None,
        })
        .await;

    let Response::Requests { requests } = daemon
        .send(&Request::QueueList {
            filter: RequestFilter::default(),
        })
        .await
    else {
        panic!("expected request list");
    };
    assert_eq!(requests.len(), 1);
    assert_eq!(i64::from(requests[0].run_at.hour()), BATCH_HOUR);
    assert_eq!(requests[0].run_at.minute(), 0);
    daemon.stop().await;
}

#[tokio::test]
async fn delay_pushes_a_request_back() {
    let daemon = TestDaemon::start("");
    daemon.send(&add(Op::MoveUser, 41)).await;

    let body = daemon
        .send_text(&Request::QueueDelay {
            id: RequestId(1),
            minutes: 30,
        })
        .await;
    assert!(body.contains("request 1 delayed"));

    let response = daemon
        .send(&Request::QueueDelay {
            id: RequestId(99),
            minutes: 30,
        })
        .await;
    assert!(matches!(response, Response::Error { .. }));
    daemon.stop().await;
}

#[tokio::test]
async fn remove_clears_matching_requests() {
    let daemon = TestDaemon::start("");
    daemon.send(&add(Op::MoveUser, 41)).await;
    daemon.send(&add(Op::MoveUser, 42)).await;

    let body = daemon
        .send_text(&Request::QueueRemove {
            filter: RequestFilter::by_target(EntityId(41)),
        })
        .await;
    assert!(body.contains("removed 1"));

    let Response::Requests { requests } = daemon
        .send(&Request::QueueList {
            filter: RequestFilter::default(),
        })
        .await
    else {
        panic!("expected request list");
    };
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].target_id, Some(EntityId(42)));
    daemon.stop().await;
}

#[tokio::test]
async fn due_requests_are_dispatched_and_consumed() {
    let daemon = TestDaemon::start("");

    daemon
        .send(&Request::QueueAdd {
            requester_id: EntityId(1),
            operation: Op::MoveUser,
            target_id: Some(EntityId(41)),
            destination_id: None,
            run_at: Some(Utc::now() - Duration::minutes(1)),
            state_data: None,
        })
        .await;

    eventually(
        || async {
            match daemon
                .send(&Request::QueueList {
                    filter: RequestFilter::default(),
                })
                .await
            {
                Response::Requests { requests } => requests.is_empty(),
                _ => false,
            }
        },
        "due request to be dispatched",
    )
    .await;
    daemon.stop().await;
}

#[tokio::test]
async fn queue_survives_daemon_restart() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = config_in(dir.path());
    std::fs::write(&config.jobs_path, "").unwrap();

    let daemon = TestDaemon::start_with_config(config.clone());
    daemon.send(&add(Op::MoveUser, 41)).await;
    daemon.stop().await;

    let daemon = TestDaemon::start_with_config(config);
    let Response::Requests { requests } = daemon
        .send(&Request::QueueList {
            filter: RequestFilter::default(),
        })
        .await
    else {
        panic!("expected request list");
    };
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].id, RequestId(1));
    daemon.stop().await;
}
