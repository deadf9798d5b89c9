use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, ToSchema, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TimesheetStatus {
    Approved,
    Rejected,
    Pending,
}

/// Weekly timesheet header as served by the manager and employee listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "id": 4,
    "project_id": 3,
    "project_name": "Website relaunch",
    "employee_id": 7,
    "start_date_of_the_week": "2026-10-12",
    "submission_date": "2026-10-16",
    "status": "pending",
    "approved_by": null,
    "approved_date": null,
    "first_name": "John",
    "last_name": "Doe"
}))]
pub struct TimesheetHeader {
    pub id: u64,
    pub project_id: u64,
    #[serde(default)]
    pub project_name: Option<String>,
    pub employee_id: u64,
    #[schema(value_type = String, format = "date")]
    pub start_date_of_the_week: NaiveDate,
    #[serde(default)]
    #[schema(value_type = Option<String>, format = "date")]
    pub submission_date: Option<NaiveDate>,
    #[serde(default)]
    pub status: Option<TimesheetStatus>,
    #[serde(default)]
    pub approved_by: Option<u64>,
    #[serde(default)]
    #[schema(value_type = Option<String>, format = "date-time")]
    pub approved_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl TimesheetHeader {
    pub fn is_approved(&self) -> bool {
        self.status == Some(TimesheetStatus::Approved)
    }

    pub fn employee_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Raw database shape; `status` is a nullable VARCHAR.
#[derive(Debug, sqlx::FromRow)]
pub struct TimesheetRow {
    pub id: u64,
    pub project_id: u64,
    pub project_name: Option<String>,
    pub employee_id: u64,
    pub start_date_of_the_week: NaiveDate,
    pub submission_date: Option<NaiveDate>,
    pub status: Option<String>,
    pub approved_by: Option<u64>,
    pub approved_date: Option<DateTime<Utc>>,
    pub first_name: String,
    pub last_name: String,
}

impl From<TimesheetRow> for TimesheetHeader {
    fn from(row: TimesheetRow) -> Self {
        // Unrecognised status strings are treated like a missing status.
        let status = row.status.as_deref().and_then(|s| s.parse().ok());

        Self {
            id: row.id,
            project_id: row.project_id,
            project_name: row.project_name,
            employee_id: row.employee_id,
            start_date_of_the_week: row.start_date_of_the_week,
            submission_date: row.submission_date,
            status,
            approved_by: row.approved_by,
            approved_date: row.approved_date,
            first_name: row.first_name,
            last_name: row.last_name,
        }
    }
}

/// Body returned by the approve and reject endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TransitionResponse {
    #[schema(example = "Timesheet approved")]
    pub message: String,
    #[schema(example = 4)]
    pub id: u64,
    pub status: TimesheetStatus,
    #[serde(default)]
    #[schema(value_type = Option<String>, format = "date-time")]
    pub approved_date: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: Option<&str>) -> TimesheetRow {
        TimesheetRow {
            id: 1,
            project_id: 2,
            project_name: Some("Apollo".into()),
            employee_id: 3,
            start_date_of_the_week: NaiveDate::from_ymd_opt(2026, 10, 12).unwrap(),
            submission_date: None,
            status: status.map(str::to_string),
            approved_by: None,
            approved_date: None,
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
        }
    }

    #[test]
    fn row_status_parsing() {
        assert!(TimesheetHeader::from(row(Some("approved"))).is_approved());
        assert_eq!(
            TimesheetHeader::from(row(Some("rejected"))).status,
            Some(TimesheetStatus::Rejected)
        );
        assert_eq!(TimesheetHeader::from(row(None)).status, None);
        assert_eq!(TimesheetHeader::from(row(Some("archived"))).status, None);
    }

    #[test]
    fn header_accepts_sparse_json() {
        let header: TimesheetHeader = serde_json::from_value(serde_json::json!({
            "id": 9,
            "project_id": 1,
            "employee_id": 5,
            "start_date_of_the_week": "2026-10-12",
            "status": null
        }))
        .unwrap();

        assert_eq!(header.status, None);
        assert!(!header.is_approved());
        assert_eq!(header.employee_name(), " ");
    }
}
