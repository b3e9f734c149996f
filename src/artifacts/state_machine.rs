//! Approval state machine (§4.4). All transitions not in the table below
//! are rejected with a typed conflict error naming the offending pair.

use crate::domain::ApprovalState;
use crate::errors::AppError;
use ApprovalState::*;

pub struct TransitionRequest<'a> {
    pub from: ApprovalState,
    pub to: ApprovalState,
    pub reviewer: Option<&'a str>,
    pub review_notes: Option<&'a str>,
    pub approver: Option<&'a str>,
    pub reason: Option<&'a str>,
    pub validation_passed: bool,
    /// Whether another artifact for the same `strategy.name+version` is
    /// already `ACTIVE` (checked by the caller against the store).
    pub another_active_exists: bool,
}

/// Validates a transition against the state table; does not persist
/// anything. Returns `Ok(())` if the transition and its preconditions hold.
pub fn validate(req: &TransitionRequest) -> Result<(), AppError> {
    if req.from == Revoked {
        return Err(conflict(req.from, req.to));
    }
    if req.to == Revoked {
        return match req.reason {
            Some(_) => Ok(()),
            None => Err(AppError::Validation("revocation requires a reason".into())),
        };
    }

    match (req.from, req.to) {
        (Draft, Validated) => {
            if req.validation_passed {
                Ok(())
            } else {
                Err(AppError::Validation(
                    "validation report missing or failed".into(),
                ))
            }
        }
        (Validated, Reviewed) => {
            if req.reviewer.is_some() && req.review_notes.is_some() {
                Ok(())
            } else {
                Err(AppError::Validation(
                    "reviewer and review notes are required".into(),
                ))
            }
        }
        (Reviewed, Approved) => match (req.approver, req.reviewer) {
            (Some(approver), Some(reviewer)) if approver != reviewer => Ok(()),
            (Some(_), Some(_)) => Err(AppError::Validation(
                "approver must be distinct from reviewer".into(),
            )),
            _ => Err(AppError::Validation("approver identity required".into())),
        },
        (Approved, Active) => {
            if req.another_active_exists {
                Err(AppError::Conflict(format!(
                    "another artifact for this strategy+version is already {Active:?}"
                )))
            } else {
                Ok(())
            }
        }
        (Active, Deprecated) => {
            if req.reason.is_some() {
                Ok(())
            } else {
                Err(AppError::Validation("deprecation requires a reason".into()))
            }
        }
        (Draft, Draft) | (Validated, Draft) | (Reviewed, Draft) => {
            if req.reason.is_some() {
                Ok(())
            } else {
                Err(AppError::Validation("rollback requires a reason".into()))
            }
        }
        _ => Err(conflict(req.from, req.to)),
    }
}

fn conflict(from: ApprovalState, to: ApprovalState) -> AppError {
    AppError::Conflict(format!("transition {from:?} -> {to:?} is not permitted"))
}

/// Approved/Active and not Revoked: the only states the executor may load
/// an artifact from (§4.4 "usable").
pub fn is_usable(state: ApprovalState) -> bool {
    matches!(state, Approved | Active)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_request(from: ApprovalState, to: ApprovalState) -> TransitionRequest<'static> {
        TransitionRequest {
            from,
            to,
            reviewer: None,
            review_notes: None,
            approver: None,
            reason: None,
            validation_passed: false,
            another_active_exists: false,
        }
    }

    #[test]
    fn draft_to_validated_requires_passed_validation() {
        let mut req = base_request(Draft, Validated);
        assert!(validate(&req).is_err());
        req.validation_passed = true;
        assert!(validate(&req).is_ok());
    }

    #[test]
    fn approver_must_differ_from_reviewer() {
        let mut req = base_request(Reviewed, Approved);
        req.reviewer = Some("alice");
        req.approver = Some("alice");
        assert!(validate(&req).is_err());
        req.approver = Some("bob");
        assert!(validate(&req).is_ok());
    }

    #[test]
    fn unknown_transition_is_conflict() {
        let req = base_request(Draft, Active);
        assert!(matches!(validate(&req), Err(AppError::Conflict(_))));
    }

    #[test]
    fn revoke_requires_reason_but_works_from_any_non_revoked_state() {
        for from in [Draft, Validated, Reviewed, Approved, Active, Deprecated] {
            let mut req = base_request(from, Revoked);
            assert!(validate(&req).is_err());
            req.reason = Some("kill switch");
            assert!(validate(&req).is_ok());
        }
    }

    #[test]
    fn revoked_is_a_sink() {
        let req = base_request(Revoked, Draft);
        assert!(validate(&req).is_err());
    }

    #[test]
    fn usability_matches_approved_or_active() {
        assert!(!is_usable(Draft));
        assert!(is_usable(Approved));
        assert!(is_usable(Active));
        assert!(!is_usable(Revoked));
    }
}
