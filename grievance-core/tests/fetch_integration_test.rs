//! Resilient fetch integration tests: a flaky transport feeding the list
//! controller through the wire decoder, on tokio's paused clock.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use grievance_core::wire::{ApiEnvelope, GrievanceDto};
use grievance_core::{
    CampusCatalogue, CampusCode, Department, FetchOutcome, FetchPhase, Grievance,
    GrievanceError, GrievanceListController, GrievanceResult, ListSource, PageType, Principal,
    ReasonCode, ResilientFetch, RetryPolicy, Role,
};
use tokio::time::Instant;

const NEW_LIST: &str = r#"{
    "success": true,
    "message": "Grievances fetched",
    "data": [
        {"id": 1, "issuse_id": "ISSUE-1719323584454-aaaaaa", "rollno": "41522001",
         "campus": "DSEU-1", "subject": "Attendance not updated",
         "description": "Attendance for May missing", "issuse_type": "ACADEMIC",
         "status": "NEW", "date": "2024-06-25T10:00:00Z"},
        {"id": 2, "issuse_id": "ISSUE-1719323584999-bbbbbb", "rollno": "41522002",
         "campus": "DSEU-1", "subject": "Library fine",
         "description": "Fine charged twice", "issuse_type": "ACADEMIC",
         "status": "PENDING", "date": "2024-06-26T10:00:00Z"}
    ]
}"#;

fn decode(body: &str) -> GrievanceResult<Vec<Grievance>> {
    let envelope: ApiEnvelope<Vec<GrievanceDto>> = serde_json::from_str(body)
        .map_err(|e| GrievanceError::server_rejected(None, e.to_string()))?;
    let catalogue = CampusCatalogue::default();
    envelope
        .into_data()?
        .into_iter()
        .map(|dto| dto.into_domain(&catalogue))
        .collect()
}

fn policy() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_millis(1000))
}

fn academic_admin() -> Principal {
    Principal::new(
        "7",
        "Academic Cell",
        [Role::Campus(Department::Academic)],
        Some(CampusCode::new("DSEU-1")),
    )
    .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_flaky_transport_recovers_on_third_attempt() {
    let source = ListSource::new(Role::Campus(Department::Academic), PageType::New).unwrap();
    let controller = GrievanceListController::new(source, 10, policy());
    let calls = AtomicU32::new(0);
    let stamps = Mutex::new(Vec::new());

    let outcome = controller
        .load(Some(&academic_admin()), || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            stamps.lock().unwrap().push(Instant::now());
            async move {
                if n < 3 {
                    Err(GrievanceError::transient("connection reset"))
                } else {
                    decode(NEW_LIST)
                }
            }
        })
        .await
        .unwrap();

    assert!(matches!(outcome, FetchOutcome::Success(ref rows) if rows.len() == 2));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(controller.phase(), FetchPhase::Ready);

    let stamps = stamps.lock().unwrap();
    let first = stamps[1] - stamps[0];
    let second = stamps[2] - stamps[1];
    assert!(second >= first * 2, "first={first:?} second={second:?}");

    // The NEW page only shows NEW rows.
    let rows = controller.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, "ISSUE-1719323584454-aaaaaa");
}

#[tokio::test(start_paused = true)]
async fn test_refresh_failure_keeps_previous_rows() {
    let source = ListSource::new(Role::Campus(Department::Academic), PageType::Pending).unwrap();
    let controller = GrievanceListController::new(source, 10, policy());
    let admin = academic_admin();

    controller
        .load(Some(&admin), || async { decode(NEW_LIST) })
        .await
        .unwrap();
    assert_eq!(controller.rows().len(), 1);

    let calls = AtomicU32::new(0);
    let outcome = controller
        .load(Some(&admin), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<Vec<Grievance>, _>(GrievanceError::transient("timeout")) }
        })
        .await
        .unwrap();

    match outcome {
        FetchOutcome::Failed {
            attempts,
            stale_data_available,
            error,
        } => {
            assert_eq!(attempts, 3);
            assert!(stale_data_available);
            assert_eq!(error.reason_code(), ReasonCode::TransientNetwork);
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(matches!(
        controller.phase(),
        FetchPhase::Error {
            attempts: 3,
            stale: true,
            ..
        }
    ));
    assert_eq!(controller.rows().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_server_rejection_is_not_retried() {
    let fetch: ResilientFetch<Vec<Grievance>> = ResilientFetch::new(policy());
    let calls = AtomicU32::new(0);

    let outcome = fetch
        .fetch(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { decode(r#"{"success": false, "message": "Unauthorized role"}"#) }
        })
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let err = outcome.into_result().unwrap().unwrap_err();
    assert_eq!(err.reason_code(), ReasonCode::ServerRejected);
}

#[tokio::test(start_paused = true)]
async fn test_manual_retry_supersedes_pending_backoff() {
    let fetch: Arc<ResilientFetch<Vec<Grievance>>> = Arc::new(ResilientFetch::new(policy()));

    let stale = {
        let fetch = Arc::clone(&fetch);
        tokio::spawn(async move {
            fetch
                .fetch(|| async { Err(GrievanceError::transient("unreachable")) })
                .await
        })
    };
    // Let the first attempt fail and park on its backoff timer.
    tokio::time::sleep(Duration::from_millis(10)).await;

    let fresh = fetch.fetch(|| async { decode(NEW_LIST) }).await;
    assert!(matches!(fresh, FetchOutcome::Success(_)));

    assert!(matches!(stale.await.unwrap(), FetchOutcome::Superseded));
    assert_eq!(fetch.data().map(|rows| rows.len()), Some(2));
    assert_eq!(fetch.phase(), FetchPhase::Ready);
}
