use std::sync::Mutex;

use chrono::{NaiveDate, Utc};
use futures::future::join_all;
use tracing::{error, info, warn};

use crate::client::{error::ClientError, http::TimesheetApi};
use crate::model::{
    notification::latest_submission, project::Project, time_record::TimeRecord,
    timesheet::TimesheetHeader,
};
use crate::workflow::{
    approval::{ApproveRequest, RejectRequest, StatusGate, TransitionOutcome},
    hours::{self, DayHours, Timesheet, assemble, format_hours, validate_interval},
    reconcile::{self, ApprovalRow, TrackedHours},
    week::{Generation, WeekCursor},
};

/// Everything the "Timesheets" and "Approval" tabs render for one week.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApprovalState {
    pub generation: u64,
    pub week_start: Option<NaiveDate>,
    pub timesheets: Vec<Timesheet>,
    pub tracked: TrackedHours,
}

impl ApprovalState {
    pub fn rows(&self) -> Vec<ApprovalRow<'_>> {
        reconcile::rows(&self.timesheets, &self.tracked)
    }

    /// Footer of the hours table: every employee's hours per weekday.
    pub fn day_totals(&self) -> DayHours {
        hours::day_totals(self.timesheets.iter().map(|t| &t.hours))
    }

    pub fn grand_total(&self) -> String {
        format_hours(self.day_totals().total())
    }
}

/// View model of a project's manager approval screen.
pub struct ManagerApproval<A> {
    api: A,
    project_id: u64,
    cursor: Mutex<WeekCursor>,
    generation: Generation,
    state: Mutex<ApprovalState>,
    gate: StatusGate,
}

impl<A: TimesheetApi> ManagerApproval<A> {
    pub fn new(api: A, project_id: u64, today: NaiveDate, notification: &mut Option<NaiveDate>) -> Self {
        Self {
            api,
            project_id,
            cursor: Mutex::new(WeekCursor::with_notification(today, notification)),
            generation: Generation::default(),
            state: Mutex::new(ApprovalState::default()),
            gate: StatusGate::default(),
        }
    }

    /// Opens on the week of the manager's newest unread submission for this
    /// project and marks that notification read. Without one the view opens
    /// on the current week.
    pub async fn from_notifications(
        api: A,
        project_id: u64,
        manager_id: u64,
        today: NaiveDate,
    ) -> Self {
        let feed = api
            .notifications(manager_id)
            .await
            .map_err(|e| warn!(error = %e, manager_id, "Failed to fetch notifications"))
            .unwrap_or_default();

        let mut week = None;
        if let Some(notification) = latest_submission(&feed, project_id) {
            week = notification.week_start;
            if let Err(e) = api.mark_notification_read(notification.id).await {
                warn!(error = %e, notification_id = notification.id, "Failed to mark notification read");
            }
        }

        Self::new(api, project_id, today, &mut week)
    }

    pub fn cursor(&self) -> WeekCursor {
        lock(&self.cursor).clone()
    }

    pub fn snapshot(&self) -> ApprovalState {
        lock(&self.state).clone()
    }

    /// Whether a status change is in flight; approval actions are disabled
    /// meanwhile.
    pub fn is_changing_status(&self) -> bool {
        self.gate.is_changing()
    }

    /// Project shown in the screen header; `None` if it could not be loaded.
    pub async fn project(&self) -> Option<Project> {
        self.api
            .project(self.project_id)
            .await
            .map_err(|e| error!(error = %e, project_id = self.project_id, "Failed to fetch project"))
            .ok()
    }

    pub async fn previous_week(&self) -> bool {
        lock(&self.cursor).previous_week();
        self.refresh().await
    }

    /// Moves forward and refetches; does nothing at the week of `today`.
    pub async fn next_week(&self, today: NaiveDate) -> bool {
        let moved = lock(&self.cursor).next_week(today);
        if !moved {
            return false;
        }
        self.refresh().await
    }

    /// Fetches headers, their time records and tracked hours for the cursor
    /// week. Returns `false` when a newer refresh started meanwhile and this
    /// result was dropped.
    pub async fn refresh(&self) -> bool {
        let generation = self.generation.advance();
        let week_start = self.cursor().start();

        let headers = match self.api.manager_timesheets(self.project_id, week_start).await {
            Ok(headers) => headers,
            Err(e) => {
                error!(error = %e, project_id = self.project_id, %week_start, "Failed to fetch timesheets");
                Vec::new()
            }
        };

        let timesheets = self.with_records(headers).await;
        let keys = reconcile::distinct_keys(&timesheets);
        let tracked = reconcile::fetch_tracked_hours(&keys, |key| self.api.tracked_records(key)).await;

        self.apply(
            generation,
            ApprovalState {
                generation,
                week_start: Some(week_start),
                timesheets,
                tracked,
            },
        )
    }

    async fn with_records(&self, headers: Vec<TimesheetHeader>) -> Vec<Timesheet> {
        let fetched = join_all(headers.iter().map(|h| self.api.time_records(h.id))).await;

        headers
            .into_iter()
            .zip(fetched)
            .map(|(header, records)| {
                let records = records
                    .map_err(|e| {
                        warn!(error = %e, timesheet_id = header.id, "Failed to fetch time records");
                    })
                    .ok();
                assemble(header, records)
            })
            .collect()
    }

    fn apply(&self, generation: u64, next: ApprovalState) -> bool {
        let mut state = lock(&self.state);
        if !self.generation.is_current(generation) {
            info!(generation, "Discarding stale timesheet response");
            return false;
        }
        *state = next;
        true
    }

    /// Saves one cell of the hours table, then refetches whether or not the
    /// save went through. Inverted or malformed intervals and records of an
    /// approved timesheet are refused without a request.
    pub async fn save_record(&self, record: TimeRecord) -> Result<u64, ClientError> {
        validate_interval(&record.day, &record.start_time, &record.end_time)
            .map_err(|reason| ClientError::Invalid(reason.to_string()))?;

        let approved = lock(&self.state)
            .timesheets
            .iter()
            .any(|t| t.header.id == record.timesheet_id && t.header.is_approved());
        if approved {
            return Err(ClientError::Invalid("approved timesheets are locked".to_string()));
        }

        let saved = self.api.upsert_time_record(&record).await;
        if let Err(e) = &saved {
            error!(error = %e, timesheet_id = record.timesheet_id, "Failed to save time record");
        }
        self.refresh().await;
        saved
    }

    /// Approves an open timesheet or reopens an approved one, then refetches.
    pub async fn toggle_approval(&self, timesheet_id: u64) -> TransitionOutcome {
        let Some(_guard) = self.gate.try_begin() else {
            return TransitionOutcome::Busy;
        };

        let currently_approved = lock(&self.state)
            .timesheets
            .iter()
            .find(|t| t.header.id == timesheet_id)
            .map(|t| t.header.is_approved());
        let Some(currently_approved) = currently_approved else {
            return TransitionOutcome::Failed {
                id: timesheet_id,
                reason: "timesheet is not in the current view".to_string(),
            };
        };

        let request = ApproveRequest::toggle(timesheet_id, currently_approved, Utc::now());
        let outcome = match self.api.approve(&request).await {
            Ok(response) => TransitionOutcome::Applied {
                id: response.id,
                status: response.status,
            },
            Err(e) => {
                error!(error = %e, timesheet_id, "Approval change failed");
                TransitionOutcome::Failed {
                    id: timesheet_id,
                    reason: e.to_string(),
                }
            }
        };

        self.refresh().await;
        outcome
    }

    pub async fn reject(&self, timesheet_id: u64) -> TransitionOutcome {
        let Some(_guard) = self.gate.try_begin() else {
            return TransitionOutcome::Busy;
        };

        let outcome = match self.api.reject(&RejectRequest { id: timesheet_id }).await {
            Ok(response) => TransitionOutcome::Applied {
                id: response.id,
                status: response.status,
            },
            Err(e) => {
                error!(error = %e, timesheet_id, "Rejection failed");
                TransitionOutcome::Failed {
                    id: timesheet_id,
                    reason: e.to_string(),
                }
            }
        };

        self.refresh().await;
        outcome
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    // every write is a whole-value assignment, so a poisoned state is still complete
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
