use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::timesheet::TimesheetStatus;

/// Body of `POST /timesheet/approve`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "id": 4,
    "approved": true,
    "approved_date": "2026-10-14T09:30:00Z"
}))]
pub struct ApproveRequest {
    pub id: u64,
    pub approved: bool,
    #[serde(default)]
    #[schema(value_type = Option<String>, format = "date-time")]
    pub approved_date: Option<DateTime<Utc>>,
}

impl ApproveRequest {
    /// Request flipping a timesheet's approval. Approving stamps `now`,
    /// unapproving clears the date.
    pub fn toggle(id: u64, currently_approved: bool, now: DateTime<Utc>) -> Self {
        let approved = !currently_approved;
        Self {
            id,
            approved,
            approved_date: approved.then_some(now),
        }
    }

    pub fn target_status(&self) -> TimesheetStatus {
        if self.approved {
            TimesheetStatus::Approved
        } else {
            TimesheetStatus::Pending
        }
    }
}

/// Body of `POST /timesheet/reject`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RejectRequest {
    #[schema(example = 4)]
    pub id: u64,
}

/// What happened to a requested status change.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TransitionOutcome {
    Applied {
        id: u64,
        status: TimesheetStatus,
    },
    Failed {
        id: u64,
        reason: String,
    },
    /// Another transition was still in flight.
    Busy,
}

impl TransitionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, TransitionOutcome::Applied { .. })
    }
}

/// Allows one status change at a time. Holding the [`StatusGuard`] keeps the
/// approval actions disabled; dropping it re-enables them whatever the
/// outcome.
#[derive(Debug, Default)]
pub struct StatusGate {
    changing: AtomicBool,
}

impl StatusGate {
    pub fn try_begin(&self) -> Option<StatusGuard<'_>> {
        self.changing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| StatusGuard { gate: self })
    }

    pub fn is_changing(&self) -> bool {
        self.changing.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
pub struct StatusGuard<'a> {
    gate: &'a StatusGate,
}

impl Drop for StatusGuard<'_> {
    fn drop(&mut self) {
        self.gate.changing.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 14, 9, 30, 0).unwrap()
    }

    #[test]
    fn approving_stamps_the_date() {
        let req = ApproveRequest::toggle(4, false, now());
        assert!(req.approved);
        assert_eq!(req.approved_date, Some(now()));
        assert_eq!(req.target_status(), TimesheetStatus::Approved);
    }

    #[test]
    fn unapproving_clears_the_date() {
        let req = ApproveRequest::toggle(4, true, now());
        assert!(!req.approved);
        assert_eq!(req.approved_date, None);
        assert_eq!(req.target_status(), TimesheetStatus::Pending);

        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json, serde_json::json!({"id": 4, "approved": false, "approved_date": null}));
    }

    #[test]
    fn gate_admits_one_change_at_a_time() {
        let gate = StatusGate::default();
        let guard = gate.try_begin().expect("gate starts open");
        assert!(gate.is_changing());
        assert!(gate.try_begin().is_none());

        drop(guard);
        assert!(!gate.is_changing());
        assert!(gate.try_begin().is_some());
    }

    #[test]
    fn gate_reopens_on_early_return() {
        fn failing(gate: &StatusGate) -> Result<(), &'static str> {
            let _guard = gate.try_begin().ok_or("busy")?;
            Err("server said no")
        }

        let gate = StatusGate::default();
        assert_eq!(failing(&gate), Err("server said no"));
        assert!(!gate.is_changing());
    }
}
