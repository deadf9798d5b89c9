use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use std::future::Future;

use futures::future::join_all;
use serde::Serialize;

use crate::model::{time_record::TimeRecord, timesheet::TimesheetHeader};
use crate::workflow::hours::{Timesheet, format_hours, total_hours};

/// Join key between a timesheet and its tracked-hours figure.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize)]
pub struct TrackedKey {
    pub employee_id: u64,
    pub project_id: u64,
}

impl TrackedKey {
    pub fn of(header: &TimesheetHeader) -> Self {
        Self {
            employee_id: header.employee_id,
            project_id: header.project_id,
        }
    }
}

/// Tracked hours per (employee, project). `None` marks a pair whose fetch
/// failed.
pub type TrackedHours = HashMap<TrackedKey, Option<f64>>;

/// Distinct keys in first-seen order.
pub fn distinct_keys<'a>(timesheets: impl IntoIterator<Item = &'a Timesheet>) -> Vec<TrackedKey> {
    let mut seen = HashSet::new();
    timesheets
        .into_iter()
        .map(|t| TrackedKey::of(&t.header))
        .filter(|key| seen.insert(*key))
        .collect()
}

/// Fetches the records behind every key concurrently and totals them.
///
/// A failing key is logged and stored as `None`; it never aborts the others.
pub async fn fetch_tracked_hours<F, Fut, E>(keys: &[TrackedKey], fetch: F) -> TrackedHours
where
    F: Fn(TrackedKey) -> Fut,
    Fut: Future<Output = Result<Vec<TimeRecord>, E>>,
    E: Display,
{
    let fetch = &fetch;
    let settled = join_all(keys.iter().map(|&key| async move { (key, fetch(key).await) })).await;

    settled
        .into_iter()
        .map(|(key, result)| match result {
            Ok(records) => (key, Some(total_hours(&records))),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    employee_id = key.employee_id,
                    project_id = key.project_id,
                    "Tracked hours fetch failed"
                );
                (key, None)
            }
        })
        .collect()
}

/// One line of the approval table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApprovalRow<'a> {
    pub timesheet: &'a Timesheet,
    pub tracked_hours: Option<f64>,
}

impl ApprovalRow<'_> {
    pub fn name(&self) -> String {
        self.timesheet.header.employee_name()
    }

    pub fn tracked_label(&self) -> String {
        self.tracked_hours.map(format_hours).unwrap_or_default()
    }

    pub fn status_label(&self) -> &'static str {
        use crate::model::timesheet::TimesheetStatus::*;
        match self.timesheet.header.status {
            Some(Approved) => "Approved",
            Some(Rejected) => "Rejected",
            Some(Pending) | None => "Open",
        }
    }

    pub fn action_label(&self) -> &'static str {
        if self.timesheet.header.is_approved() {
            "Unapprove"
        } else {
            "Approve"
        }
    }
}

/// Pairs every timesheet with its tracked hours by key. The result has one
/// row per timesheet, in timesheet order.
pub fn rows<'a>(timesheets: &'a [Timesheet], tracked: &TrackedHours) -> Vec<ApprovalRow<'a>> {
    timesheets
        .iter()
        .map(|timesheet| ApprovalRow {
            timesheet,
            tracked_hours: tracked
                .get(&TrackedKey::of(&timesheet.header))
                .copied()
                .flatten(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::timesheet::TimesheetStatus;
    use crate::workflow::hours::assemble;
    use chrono::NaiveDate;

    fn sheet(id: u64, employee_id: u64, project_id: u64) -> Timesheet {
        assemble(
            TimesheetHeader {
                id,
                project_id,
                project_name: None,
                employee_id,
                start_date_of_the_week: NaiveDate::from_ymd_opt(2026, 10, 12).unwrap(),
                submission_date: None,
                status: None,
                approved_by: None,
                approved_date: None,
                first_name: format!("E{employee_id}"),
                last_name: "Test".into(),
            },
            None,
        )
    }

    fn record(start: &str, end: &str) -> TimeRecord {
        TimeRecord {
            id: None,
            timesheet_id: 0,
            day: "Monday".into(),
            date: None,
            start_time: start.into(),
            end_time: end.into(),
        }
    }

    #[test]
    fn keys_are_deduplicated_in_order() {
        let sheets = [sheet(1, 7, 1), sheet(2, 8, 1), sheet(3, 7, 1)];
        let keys = distinct_keys(&sheets);
        assert_eq!(
            keys,
            vec![
                TrackedKey { employee_id: 7, project_id: 1 },
                TrackedKey { employee_id: 8, project_id: 1 },
            ]
        );
    }

    #[actix_web::test]
    async fn failures_become_none_without_dropping_rows() {
        let sheets = vec![sheet(1, 7, 1), sheet(2, 8, 1), sheet(3, 9, 1)];
        let keys = distinct_keys(&sheets);

        let tracked = fetch_tracked_hours(&keys, |key| async move {
            if key.employee_id == 8 {
                Err("connection reset")
            } else {
                Ok(vec![record("08:00", "16:00"), record("09:00", "10:30")])
            }
        })
        .await;

        let rows = rows(&sheets, &tracked);
        assert_eq!(rows.len(), sheets.len());
        assert_eq!(rows[0].tracked_hours, Some(9.5));
        assert_eq!(rows[1].tracked_hours, None);
        assert_eq!(rows[1].tracked_label(), "");
        assert_eq!(rows[2].tracked_label(), "9.50");
    }

    #[test]
    fn rows_follow_keys_not_positions() {
        let sheets = vec![sheet(1, 7, 1), sheet(2, 8, 1)];
        let mut tracked = TrackedHours::new();
        // inserted in reverse order on purpose
        tracked.insert(TrackedKey { employee_id: 8, project_id: 1 }, Some(4.0));
        tracked.insert(TrackedKey { employee_id: 7, project_id: 1 }, Some(12.0));

        let rows = rows(&sheets, &tracked);
        assert_eq!(rows[0].tracked_hours, Some(12.0));
        assert_eq!(rows[1].tracked_hours, Some(4.0));
    }

    #[test]
    fn unknown_keys_have_no_hours() {
        let sheets = vec![sheet(1, 7, 1)];
        let rows = rows(&sheets, &TrackedHours::new());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].tracked_hours, None);
    }

    #[test]
    fn labels_follow_status() {
        let mut approved = sheet(1, 7, 1);
        approved.header.status = Some(TimesheetStatus::Approved);
        let mut rejected = sheet(2, 8, 1);
        rejected.header.status = Some(TimesheetStatus::Rejected);
        let open = sheet(3, 9, 1);

        let sheets = vec![approved, rejected, open];
        let rows = rows(&sheets, &TrackedHours::new());
        assert_eq!(
            rows.iter().map(|r| r.status_label()).collect::<Vec<_>>(),
            vec!["Approved", "Rejected", "Open"]
        );
        assert_eq!(rows[0].action_label(), "Unapprove");
        assert_eq!(rows[2].action_label(), "Approve");
        assert_eq!(rows[2].name(), "E9 Test");
    }
}
