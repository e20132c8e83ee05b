//! Lifecycle integration tests: state machine, escalation router and
//! in-flight serialization working together on realistic grievances.

use chrono::{TimeZone, Utc};
use grievance_core::escalation::RouteError;
use grievance_core::lifecycle::{Action, ActionRequest, TransitionError};
use grievance_core::{
    CampusCatalogue, CampusCode, Category, Department, EscalationRouter, GrievanceStateMachine,
    Grievance, InFlightActions, Owner, Principal, ReasonCode, RedirectRequest, Role, Status,
    TimelineAction,
};

fn machine() -> GrievanceStateMachine {
    GrievanceStateMachine::new(EscalationRouter::new(CampusCatalogue::default()))
}

fn grievance(category: Category) -> Grievance {
    Grievance::submitted(
        "ISSUE-1719323584454-4k2x9a",
        "41522001",
        CampusCode::new("DSEU-1"),
        "Marks not updated",
        "Internal assessment marks missing on the portal",
        category,
        Utc.with_ymd_and_hms(2024, 6, 25, 10, 0, 0).unwrap(),
    )
}

fn campus_admin(department: Department, campus: &str) -> Principal {
    Principal::new(
        format!("campus-{department}-{campus}"),
        "Campus Admin",
        [Role::Campus(department)],
        Some(CampusCode::new(campus)),
    )
    .unwrap()
}

fn university_admin(department: Department) -> Principal {
    Principal::new(
        format!("university-{department}"),
        "University Admin",
        [Role::University(department)],
        None,
    )
    .unwrap()
}

fn superadmin() -> Principal {
    Principal::new("root", "Super Admin", [Role::SuperAdmin], None).unwrap()
}

fn all_actions() -> Vec<Action> {
    vec![
        Action::Acknowledge,
        Action::Resolve,
        Action::Reject,
        Action::Return,
        Action::Redirect(RedirectRequest::escalate()),
        Action::Redirect(RedirectRequest::to(Role::SuperAdmin, None)),
    ]
}

// ── Terminal idempotence ─────────────────────────────────────────────

#[test]
fn test_terminal_states_reject_every_action() {
    let m = machine();
    for closing in [Action::Resolve, Action::Reject] {
        let mut g = grievance(Category::Academic);
        m.apply(&mut g, &superadmin(), &ActionRequest::new(closing))
            .unwrap();
        assert!(g.is_terminal());

        let frozen = g.clone();
        for action in all_actions() {
            for actor in [
                superadmin(),
                campus_admin(Department::Academic, "DSEU-1"),
                university_admin(Department::Admin),
            ] {
                let err = m
                    .apply(&mut g, &actor, &ActionRequest::new(action.clone()))
                    .unwrap_err();
                assert!(matches!(err, TransitionError::TerminalState { .. }));
                assert_eq!(err.reason_code(), ReasonCode::TerminalState);
                assert_eq!(g, frozen);
            }
        }
    }
}

#[test]
fn test_resolve_with_note_then_terminal() {
    let m = machine();
    let actor = campus_admin(Department::Academic, "DSEU-1");
    let mut g = grievance(Category::Academic);
    let before = g.timeline().len();

    let record = m
        .apply(
            &mut g,
            &actor,
            &ActionRequest::new(Action::Resolve).with_note("Issue addressed"),
        )
        .unwrap();

    assert_eq!(record.from, Status::New);
    assert_eq!(record.to, Status::Resolved);
    assert_eq!(g.status(), Status::Resolved);
    assert_eq!(g.timeline().len(), before + 1);
    let last = g.timeline().last().unwrap();
    assert_eq!(last.action, TimelineAction::Resolved);
    assert_eq!(last.note, "Issue addressed");
    assert_eq!(g.responses().len(), 1);

    for action in [Action::Resolve, Action::Reject] {
        let err = m
            .apply(&mut g, &actor, &ActionRequest::new(action))
            .unwrap_err();
        assert_eq!(err.reason_code(), ReasonCode::TerminalState);
    }
}

#[test]
fn test_failed_action_leaves_grievance_unchanged() {
    let m = machine();
    let mut g = grievance(Category::Academic);
    let frozen = g.clone();

    // Return is only allowed from PENDING.
    let err = m
        .apply(&mut g, &superadmin(), &ActionRequest::new(Action::Return))
        .unwrap_err();
    assert_eq!(err.reason_code(), ReasonCode::InvalidTransition);
    assert_eq!(g, frozen);

    // Wrong department.
    let err = m
        .apply(
            &mut g,
            &campus_admin(Department::Examination, "DSEU-1"),
            &ActionRequest::new(Action::Acknowledge),
        )
        .unwrap_err();
    assert_eq!(err.reason_code(), ReasonCode::RoleMismatch);
    assert_eq!(g, frozen);
}

#[test]
fn test_timeline_timestamps_strictly_increase() {
    let m = machine();
    let actor = university_admin(Department::Academic);
    let mut g = grievance(Category::Academic);

    m.apply(&mut g, &actor, &ActionRequest::new(Action::Acknowledge))
        .unwrap();
    m.apply(&mut g, &actor, &ActionRequest::new(Action::Return))
        .unwrap();
    m.apply(&mut g, &actor, &ActionRequest::new(Action::Acknowledge))
        .unwrap();
    m.apply(&mut g, &actor, &ActionRequest::new(Action::Reject))
        .unwrap();

    let stamps: Vec<_> = g.timeline().iter().map(|e| e.timestamp).collect();
    assert!(stamps.windows(2).all(|w| w[0] < w[1]), "{stamps:?}");
    assert_eq!(g.status(), Status::Rejected);
}

// ── Redirect round trip ──────────────────────────────────────────────

#[test]
fn test_redirect_round_trip_then_no_op() {
    let m = machine();
    let actor = university_admin(Department::Academic);
    let mut g = grievance(Category::Academic);
    let request = ActionRequest::new(Action::Redirect(RedirectRequest::to(
        Role::Campus(Department::Academic),
        Some(CampusCode::new("DSEU-2")),
    )));

    m.apply(&mut g, &actor, &request).unwrap();
    assert_eq!(
        g.owner(),
        Owner::new(
            Role::Campus(Department::Academic),
            Some(CampusCode::new("DSEU-2"))
        )
    );
    assert_eq!(g.status(), Status::New);
    assert_eq!(
        g.timeline().last().map(|e| e.action),
        Some(TimelineAction::Redirected)
    );

    let err = m.apply(&mut g, &actor, &request).unwrap_err();
    assert!(matches!(
        err,
        TransitionError::RedirectTargetInvalid(RouteError::NoOpRedirect { .. })
    ));
    assert_eq!(err.reason_code(), ReasonCode::NoOpRedirect);
}

#[test]
fn test_lateral_redirect_needs_seniority() {
    let m = machine();
    let request = ActionRequest::new(Action::Redirect(RedirectRequest::to(
        Role::Campus(Department::Academic),
        Some(CampusCode::new("DSEU-2")),
    )));

    let mut g = grievance(Category::Academic);
    let err = m
        .apply(&mut g, &campus_admin(Department::Academic, "DSEU-1"), &request)
        .unwrap_err();
    assert_eq!(err.reason_code(), ReasonCode::InsufficientSeniority);
    assert_eq!(
        g.owner(),
        Owner::new(
            Role::Campus(Department::Academic),
            Some(CampusCode::new("DSEU-1"))
        )
    );

    m.apply(&mut g, &university_admin(Department::Academic), &request)
        .unwrap();
    assert_eq!(g.owner().campus, Some(CampusCode::new("DSEU-2")));
}

#[test]
fn test_redirected_grievance_moves_out_of_previous_owner_reach() {
    let m = machine();
    let mut g = grievance(Category::Academic);
    m.apply(
        &mut g,
        &university_admin(Department::Academic),
        &ActionRequest::new(Action::Redirect(RedirectRequest::to(
            Role::Campus(Department::Academic),
            Some(CampusCode::new("DSEU-2")),
        ))),
    )
    .unwrap();

    let err = m
        .apply(
            &mut g,
            &campus_admin(Department::Academic, "DSEU-1"),
            &ActionRequest::new(Action::Acknowledge),
        )
        .unwrap_err();
    assert_eq!(err.reason_code(), ReasonCode::ScopeMismatch);

    m.apply(
        &mut g,
        &campus_admin(Department::Academic, "DSEU-2"),
        &ActionRequest::new(Action::Acknowledge),
    )
    .unwrap();
    assert_eq!(g.status(), Status::Pending);
}

// ── Category constraints ─────────────────────────────────────────────

#[test]
fn prop_examination_never_redirects_to_non_academic() {
    let m = machine();
    let actors = [
        campus_admin(Department::Examination, "DSEU-1"),
        campus_admin(Department::Admin, "DSEU-1"),
        university_admin(Department::Examination),
        university_admin(Department::Admin),
    ];
    let targets = [
        RedirectRequest::to(Role::Campus(Department::NonAcademic), None),
        RedirectRequest::to(
            Role::Campus(Department::NonAcademic),
            Some(CampusCode::new("DSEU-3")),
        ),
        RedirectRequest::to(Role::University(Department::NonAcademic), None),
        RedirectRequest::to(Role::University(Department::NonAcademic), None)
            .recategorize(Category::NonAcademic),
    ];

    for actor in &actors {
        for target in &targets {
            let mut g = grievance(Category::Examination);
            let frozen = g.clone();
            let err = m
                .apply(
                    &mut g,
                    actor,
                    &ActionRequest::new(Action::Redirect(target.clone())),
                )
                .unwrap_err();
            assert_eq!(
                err.reason_code(),
                ReasonCode::CategoryMismatch,
                "actor={} target={target:?}",
                actor.id
            );
            assert_eq!(g, frozen);
        }
    }
}

#[test]
fn test_superadmin_recategorizes_then_department_follows() {
    let m = machine();
    let mut g = grievance(Category::Examination);

    m.apply(
        &mut g,
        &superadmin(),
        &ActionRequest::new(Action::Redirect(
            RedirectRequest::to(Role::Campus(Department::NonAcademic), None)
                .recategorize(Category::NonAcademic),
        )),
    )
    .unwrap();

    assert_eq!(g.category(), Category::Examination);
    assert_eq!(g.current_category(), Category::NonAcademic);
    assert_eq!(
        g.owner(),
        Owner::new(
            Role::Campus(Department::NonAcademic),
            Some(CampusCode::new("DSEU-1"))
        )
    );

    m.apply(
        &mut g,
        &campus_admin(Department::NonAcademic, "DSEU-1"),
        &ActionRequest::new(Action::Resolve).with_note("Handled by estates"),
    )
    .unwrap();
    assert_eq!(g.status(), Status::Resolved);
}

#[test]
fn test_escalation_ladder_to_superadmin() {
    let m = machine();
    let mut g = grievance(Category::Academic);

    m.apply(
        &mut g,
        &campus_admin(Department::Academic, "DSEU-1"),
        &ActionRequest::new(Action::Redirect(RedirectRequest::escalate())),
    )
    .unwrap();
    assert_eq!(g.owner().role, Role::University(Department::Academic));

    m.apply(
        &mut g,
        &university_admin(Department::Academic),
        &ActionRequest::new(Action::Redirect(RedirectRequest::escalate())),
    )
    .unwrap();
    assert_eq!(g.owner().role, Role::SuperAdmin);

    let err = m
        .apply(
            &mut g,
            &superadmin(),
            &ActionRequest::new(Action::Redirect(RedirectRequest::escalate())),
        )
        .unwrap_err();
    assert_eq!(err.reason_code(), ReasonCode::InvalidTarget);
}

// ── Serialization of concurrent actions ──────────────────────────────

#[tokio::test]
async fn test_second_action_waits_for_first_permit() {
    let inflight = InFlightActions::new();
    let g = grievance(Category::Academic);

    let permit = inflight.try_acquire(&g.id).unwrap();
    let err = inflight.try_acquire(&g.id).unwrap_err();
    assert_eq!(err.reason_code(), ReasonCode::ActionInFlight);
    assert!(inflight.try_acquire("ISSUE-OTHER").is_ok());

    let handle = tokio::spawn(async move {
        tokio::task::yield_now().await;
        drop(permit);
    });
    handle.await.unwrap();

    assert!(!inflight.is_in_flight(&g.id));
    assert!(inflight.try_acquire(&g.id).is_ok());
}

#[test]
fn test_stale_plan_revalidated_against_latest_state() {
    let m = machine();
    let actor = campus_admin(Department::Academic, "DSEU-1");
    let mut g = grievance(Category::Academic);
    let snapshot = g.clone();

    // Two planners act on the same snapshot; the first commits.
    let resolve = m
        .plan(&snapshot, &actor, &ActionRequest::new(Action::Resolve), Utc::now())
        .unwrap();
    GrievanceStateMachine::commit(&mut g, resolve);

    // The second re-plans against the latest state before committing.
    let err = m
        .plan(&g, &actor, &ActionRequest::new(Action::Reject), Utc::now())
        .unwrap_err();
    assert_eq!(err.reason_code(), ReasonCode::TerminalState);
    assert_eq!(g.status(), Status::Resolved);
}
