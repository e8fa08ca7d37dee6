use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gestor_auth::{authorize, Principal};
use gestor_core::{Code, DomainError, DomainResult, UserId};

use crate::policy::{Stamp, TransitionPolicy};
use crate::status::Status;

/// Workflow fields every header carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub status: Status,
    pub requester: UserId,
    pub approver: Option<UserId>,
    pub approved_at: Option<DateTime<Utc>>,
    pub dispatcher: Option<UserId>,
    pub dispatched_at: Option<DateTime<Utc>>,
}

impl WorkflowState {
    pub fn new(status: Status, requester: UserId) -> Self {
        Self {
            status,
            requester,
            approver: None,
            approved_at: None,
            dispatcher: None,
            dispatched_at: None,
        }
    }

    pub fn is_final(&self) -> bool {
        self.status.terminal
    }

    pub fn is_approved(&self) -> bool {
        self.approver.is_some()
    }

    pub fn is_dispatched(&self) -> bool {
        self.dispatcher.is_some()
    }

    /// Fail unless line items and header fields may still change.
    pub fn ensure_editable(&self, what: &str) -> DomainResult<()> {
        if self.status.terminal {
            return Err(DomainError::invalid_state(format!(
                "cannot modify {what} in final status {}",
                self.status.code
            )));
        }
        if !self.status.editable {
            return Err(DomainError::invalid_state(format!(
                "status {} does not allow editing {what}",
                self.status.code
            )));
        }
        Ok(())
    }

    pub fn apply(&mut self, change: &StatusChanged) {
        self.status = change.to.clone();
        match change.stamp {
            Stamp::Approver => {
                self.approver = Some(change.actor);
                self.approved_at = Some(change.occurred_at);
            }
            Stamp::Dispatcher => {
                self.dispatcher = Some(change.actor);
                self.dispatched_at = Some(change.occurred_at);
            }
            Stamp::None => {}
        }
    }
}

/// Implemented by every workflow header aggregate.
pub trait WorkflowHeader {
    fn workflow(&self) -> &WorkflowState;

    fn number(&self) -> &str;
}

/// A decided status change; becomes exactly one history row once applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChanged {
    /// `None` only for the creation row.
    pub from: Option<Code>,
    pub to: Status,
    pub actor: UserId,
    pub stamp: Stamp,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl StatusChanged {
    /// The history row written when a header is created in its initial status.
    pub fn created(initial: Status, actor: UserId, occurred_at: DateTime<Utc>) -> Self {
        Self {
            from: None,
            to: initial,
            actor,
            stamp: Stamp::None,
            note: Some("creada".to_string()),
            occurred_at,
        }
    }
}

/// Decide a guarded status change without touching the header.
///
/// Order of checks: final status, catalog membership, same-status, source
/// status allowed by the rule, actor permission.
pub fn decide_transition(
    policy: &TransitionPolicy,
    state: &WorkflowState,
    target: &str,
    actor: &Principal,
    note: Option<String>,
    occurred_at: DateTime<Utc>,
) -> DomainResult<StatusChanged> {
    if state.is_final() {
        return Err(DomainError::invalid_state(format!(
            "cannot change status of a {} record in final status {}",
            policy.module, state.status.code
        )));
    }

    let target = policy.catalog.find(target)?.clone();
    if target.code == state.status.code {
        return Err(DomainError::invalid_state(format!(
            "record is already in status {}",
            target.code
        )));
    }

    let stamp = match policy.rule_for(&target.code) {
        Some(rule) => {
            if !rule.allows_from(&state.status.code) {
                return Err(DomainError::invalid_state(format!(
                    "cannot move from {} to {}",
                    state.status.code, target.code
                )));
            }
            authorize(actor, &rule.permission)?;
            rule.stamp
        }
        None => {
            authorize(actor, &policy.change_permission)?;
            Stamp::None
        }
    };

    Ok(StatusChanged {
        from: Some(state.status.code.clone()),
        to: target,
        actor: actor.user_id,
        stamp,
        note: note.filter(|n| !n.trim().is_empty()),
        occurred_at,
    })
}

/// The generic status change offered to users: any catalog target except the
/// ones the policy reserves for a dedicated operation.
pub fn decide_status_change(
    policy: &TransitionPolicy,
    state: &WorkflowState,
    target: &str,
    actor: &Principal,
    note: Option<String>,
    occurred_at: DateTime<Utc>,
) -> DomainResult<StatusChanged> {
    let code = Code::parse(target)?;
    if let Some(operation) = policy.reserved_operation(&code) {
        return Err(DomainError::invalid_state(format!(
            "status {code} of {} can only be reached through the {operation} operation",
            policy.module
        )));
    }
    decide_transition(policy, state, target, actor, note, occurred_at)
}

/// Decide and apply in one step; the state is untouched on error.
pub fn transition(
    policy: &TransitionPolicy,
    state: &mut WorkflowState,
    target: &str,
    actor: &Principal,
    note: Option<String>,
    occurred_at: DateTime<Utc>,
) -> DomainResult<StatusChanged> {
    let change = decide_transition(policy, state, target, actor, note, occurred_at)?;
    state.apply(&change);
    Ok(change)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::codes;
    use gestor_auth::permissions::requisitions as p;

    fn approver() -> Principal {
        Principal::new(UserId::new(), "Jefa de Bodega").with_permissions([p::APPROVE, p::REJECT])
    }

    fn pending_state(policy: &TransitionPolicy) -> WorkflowState {
        WorkflowState::new(policy.catalog.initial().clone(), UserId::new())
    }

    #[test]
    fn approve_stamps_approver_and_time() {
        let policy = TransitionPolicy::requisitions();
        let mut state = pending_state(&policy);
        let actor = approver();
        let now = Utc::now();

        let change = transition(&policy, &mut state, codes::APPROVED, &actor, None, now).unwrap();

        assert_eq!(change.from.as_ref().unwrap(), &codes::PENDING);
        assert_eq!(state.status.code, codes::APPROVED);
        assert_eq!(state.approver, Some(actor.user_id));
        assert_eq!(state.approved_at, Some(now));
        assert!(state.dispatcher.is_none());
    }

    #[test]
    fn final_status_rejects_every_transition() {
        let policy = TransitionPolicy::requisitions();
        let mut state = pending_state(&policy);
        let actor = approver();
        transition(&policy, &mut state, codes::REJECTED, &actor, Some("sin stock".into()), Utc::now())
            .unwrap();

        let before = state.clone();
        let err = transition(&policy, &mut state, codes::APPROVED, &actor, None, Utc::now())
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
        assert_eq!(state, before);
    }

    #[test]
    fn missing_permission_is_unauthorized_and_leaves_state() {
        let policy = TransitionPolicy::requisitions();
        let mut state = pending_state(&policy);
        let clerk = Principal::new(UserId::new(), "Auxiliar").with_permissions([p::CREATE]);

        let err = transition(&policy, &mut state, codes::APPROVED, &clerk, None, Utc::now())
            .unwrap_err();
        assert!(matches!(err, DomainError::Unauthorized(_)));
        assert_eq!(state.status.code, codes::PENDING);
    }

    #[test]
    fn dispatch_requires_approved_source() {
        let policy = TransitionPolicy::requisitions();
        let mut state = pending_state(&policy);
        let keeper = Principal::new(UserId::new(), "Bodeguero").with_permissions([p::DISPATCH]);

        let err = transition(&policy, &mut state, codes::DISPATCHED, &keeper, None, Utc::now())
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
    }

    #[test]
    fn unknown_target_is_not_found() {
        let policy = TransitionPolicy::requisitions();
        let state = pending_state(&policy);
        let err = decide_transition(&policy, &state, "ARCHIVADA", &approver(), None, Utc::now())
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[test]
    fn same_status_is_rejected() {
        let policy = TransitionPolicy::requisitions();
        let state = pending_state(&policy);
        let err = decide_transition(&policy, &state, codes::PENDING, &approver(), None, Utc::now())
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
    }

    #[test]
    fn generic_change_refuses_reserved_targets() {
        let policy = TransitionPolicy::requisitions();
        let state = pending_state(&policy);
        let admin = Principal::new(UserId::new(), "admin")
            .with_permissions([gestor_auth::permissions::ALL]);

        for target in [codes::APPROVED, "despachada"] {
            let err = decide_status_change(&policy, &state, target, &admin, None, Utc::now())
                .unwrap_err();
            assert!(matches!(err, DomainError::InvalidState(_)), "{target}");
        }

        let change = decide_status_change(
            &policy,
            &state,
            codes::CANCELLED,
            &admin,
            Some("duplicada".into()),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(change.to.code, codes::CANCELLED);
    }

    #[test]
    fn editing_is_limited_to_the_initial_status() {
        let policy = TransitionPolicy::requisitions();
        let mut state = pending_state(&policy);
        assert!(state.ensure_editable("lines").is_ok());
        transition(&policy, &mut state, codes::APPROVED, &approver(), None, Utc::now()).unwrap();
        assert!(state.ensure_editable("lines").is_err());
    }
}
