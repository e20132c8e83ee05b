//! Access gate property tests: exhaustive validation of the role matching
//! rule over the whole role vocabulary.
//!
//! Tests verify:
//! - Allow iff some held role covers the department and reaches the scope
//! - Superadmin satisfies every capability
//! - Empty and missing principals are denied, never allowed
//! - Deny reasons separate department misses from scope misses
//! - Campus-scoped roles stay within their own campus

use grievance_core::{
    AccessDecision, AccessGate, AccessTarget, CampusCode, Capability, Department, DenyReason,
    Principal, Role, Scope,
};

const SCOPES: [Scope; 3] = [Scope::Campus, Scope::University, Scope::SuperAdmin];

const CAPABILITIES: [Capability; 7] = [
    Capability::ViewList,
    Capability::ViewDetail,
    Capability::Acknowledge,
    Capability::Resolve,
    Capability::Reject,
    Capability::Return,
    Capability::Redirect,
];

fn home() -> CampusCode {
    CampusCode::new("DSEU-1")
}

fn principal(roles: &[Role]) -> Principal {
    Principal::new("admin-1", "Test Admin", roles.iter().copied(), Some(home())).unwrap()
}

/// Every principal holding one or two roles from the vocabulary.
fn role_sets() -> Vec<Vec<Role>> {
    let all = Role::all();
    let mut sets: Vec<Vec<Role>> = all.iter().map(|r| vec![*r]).collect();
    for (i, a) in all.iter().enumerate() {
        for b in &all[i + 1..] {
            sets.push(vec![*a, *b]);
        }
    }
    sets
}

fn expected(roles: &[Role], target: &AccessTarget) -> bool {
    roles.iter().any(|r| {
        r.is_superadmin()
            || (r.department().covers(target.department) && r.scope().covers(target.scope))
    })
}

// ── Property: allow iff department matches and scope reaches ─────────

#[test]
fn prop_gate_matches_rule_for_all_role_sets() {
    let gate = AccessGate::new();
    for roles in role_sets() {
        let p = principal(&roles);
        for department in Department::ALL {
            for scope in SCOPES {
                let target = AccessTarget::new(department, scope);
                for capability in CAPABILITIES {
                    let decision = gate.check(Some(&p), capability, &target);
                    assert_eq!(
                        decision.is_allowed(),
                        expected(&roles, &target),
                        "roles={roles:?} capability={capability} target={target}"
                    );
                }
            }
        }
    }
}

// ── Property: superadmin satisfies every capability ──────────────────

#[test]
fn prop_superadmin_allows_everything() {
    let gate = AccessGate::new();
    let p = Principal::new("root", "Root", [Role::SuperAdmin], None).unwrap();
    for department in Department::ALL {
        for scope in SCOPES {
            let target = AccessTarget::new(department, scope).at_campus(CampusCode::new("DSEU-5"));
            for capability in CAPABILITIES {
                assert_eq!(
                    gate.check(Some(&p), capability, &target),
                    AccessDecision::Allow(Role::SuperAdmin)
                );
            }
        }
    }
}

// ── Property: missing or empty role sets fail closed ─────────────────

#[test]
fn prop_missing_principal_is_not_authenticated() {
    let gate = AccessGate::new();
    for department in Department::ALL {
        for scope in SCOPES {
            let target = AccessTarget::new(department, scope);
            assert_eq!(
                gate.check(None, Capability::ViewList, &target),
                AccessDecision::Deny(DenyReason::NotAuthenticated)
            );
        }
    }
}

#[test]
fn prop_empty_role_set_is_role_mismatch() {
    let gate = AccessGate::new();
    let p = Principal::new("nobody", "No Roles", [], None).unwrap();
    for department in Department::ALL {
        for scope in SCOPES {
            let target = AccessTarget::new(department, scope);
            assert_eq!(
                gate.check(Some(&p), Capability::ViewDetail, &target),
                AccessDecision::Deny(DenyReason::RoleMismatch)
            );
        }
    }
}

// ── Property: deny reason distinguishes department from scope ────────

#[test]
fn prop_deny_reason_tracks_department_match() {
    let gate = AccessGate::new();
    for roles in role_sets() {
        let p = principal(&roles);
        for department in Department::ALL {
            for scope in SCOPES {
                let target = AccessTarget::new(department, scope);
                if let AccessDecision::Deny(reason) =
                    gate.check(Some(&p), Capability::ViewList, &target)
                {
                    let department_matched =
                        roles.iter().any(|r| r.department().covers(department));
                    let want = if department_matched {
                        DenyReason::ScopeMismatch
                    } else {
                        DenyReason::RoleMismatch
                    };
                    assert_eq!(reason, want, "roles={roles:?} target={target}");
                }
            }
        }
    }
}

// ── Property: campus roles never reach another campus ────────────────

#[test]
fn prop_campus_roles_confined_to_home_campus() {
    let gate = AccessGate::new();
    for department in Department::ALL {
        let p = principal(&[Role::Campus(department)]);
        let own = AccessTarget::new(department, Scope::Campus).at_campus(home());
        let other =
            AccessTarget::new(department, Scope::Campus).at_campus(CampusCode::new("DSEU-2"));

        assert!(gate.check(Some(&p), Capability::Resolve, &own).is_allowed());
        assert_eq!(
            gate.check(Some(&p), Capability::Resolve, &other),
            AccessDecision::Deny(DenyReason::ScopeMismatch)
        );
    }
}

#[test]
fn test_campus_examination_cannot_list_academic() {
    let gate = AccessGate::new();
    let p = Principal::new(
        "exam-1",
        "Exam Cell",
        [Role::parse("campus examination").unwrap()],
        Some(home()),
    )
    .unwrap();
    let target = AccessTarget::new(Department::Academic, Scope::Campus);

    assert_eq!(
        gate.check(Some(&p), Capability::ViewList, &target),
        AccessDecision::Deny(DenyReason::RoleMismatch)
    );
}
