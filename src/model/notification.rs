use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, ToSchema, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NotificationKind {
    /// Sent to the project manager when a worker submits a week.
    TimesheetSubmitted,
    TimesheetApproved,
    TimesheetRejected,
}

/// Entry of a user's notification feed. Timesheet notifications carry the
/// week they refer to so a client can open that week directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "id": 9,
    "user_id": 2,
    "type": "timesheet_submitted",
    "project_id": 3,
    "timesheet_id": 4,
    "week_start": "2026-10-12",
    "read": false,
    "created_at": "2026-10-16T17:02:11Z"
}))]
pub struct Notification {
    pub id: u64,
    pub user_id: u64,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    #[serde(default)]
    pub project_id: Option<u64>,
    #[serde(default)]
    pub timesheet_id: Option<u64>,
    #[serde(default)]
    #[schema(value_type = Option<String>, format = "date")]
    pub week_start: Option<NaiveDate>,
    pub read: bool,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct NotificationRow {
    pub id: u64,
    pub user_id: u64,
    pub kind: String,
    pub project_id: Option<u64>,
    pub timesheet_id: Option<u64>,
    pub week_start: Option<NaiveDate>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = strum::ParseError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            kind: row.kind.parse()?,
            project_id: row.project_id,
            timesheet_id: row.timesheet_id,
            week_start: row.week_start,
            read: row.read,
            created_at: row.created_at,
        })
    }
}

/// Newest unread submission for `project_id` that names a week.
pub fn latest_submission(notifications: &[Notification], project_id: u64) -> Option<&Notification> {
    notifications
        .iter()
        .filter(|n| {
            !n.read
                && n.kind == NotificationKind::TimesheetSubmitted
                && n.project_id == Some(project_id)
                && n.week_start.is_some()
        })
        .max_by_key(|n| (n.created_at, n.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn notification(
        id: u64,
        kind: NotificationKind,
        project_id: u64,
        week: (u32, u32),
        hour: u32,
    ) -> Notification {
        Notification {
            id,
            user_id: 2,
            kind,
            project_id: Some(project_id),
            timesheet_id: Some(id + 100),
            week_start: NaiveDate::from_ymd_opt(2026, week.0, week.1),
            read: false,
            created_at: Utc.with_ymd_and_hms(2026, 10, 16, hour, 0, 0).unwrap(),
        }
    }

    #[test]
    fn kind_is_stored_in_snake_case() {
        assert_eq!(NotificationKind::TimesheetSubmitted.as_ref(), "timesheet_submitted");
        assert_eq!(
            "timesheet_rejected".parse::<NotificationKind>(),
            Ok(NotificationKind::TimesheetRejected)
        );

        let approved = notification(1, NotificationKind::TimesheetApproved, 3, (10, 12), 9);
        let json = serde_json::to_value(approved).unwrap();
        assert_eq!(json["type"], "timesheet_approved");
        assert_eq!(json["week_start"], "2026-10-12");
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let row = NotificationRow {
            id: 1,
            user_id: 2,
            kind: "birthday".into(),
            project_id: None,
            timesheet_id: None,
            week_start: None,
            read: false,
            created_at: Utc.with_ymd_and_hms(2026, 10, 16, 9, 0, 0).unwrap(),
        };
        assert!(Notification::try_from(row).is_err());
    }

    #[test]
    fn newest_unread_submission_of_the_project_wins() {
        let mut read = notification(4, NotificationKind::TimesheetSubmitted, 3, (10, 12), 15);
        read.read = true;
        let feed = vec![
            notification(1, NotificationKind::TimesheetSubmitted, 3, (9, 28), 9),
            notification(2, NotificationKind::TimesheetSubmitted, 3, (10, 5), 11),
            notification(3, NotificationKind::TimesheetSubmitted, 5, (10, 12), 12),
            notification(5, NotificationKind::TimesheetApproved, 3, (10, 12), 16),
            read,
        ];

        let picked = latest_submission(&feed, 3).unwrap();
        assert_eq!(picked.id, 2);
        assert_eq!(picked.week_start, NaiveDate::from_ymd_opt(2026, 10, 5));
        assert!(latest_submission(&feed, 8).is_none());
    }
}
