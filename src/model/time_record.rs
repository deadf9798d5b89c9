use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One clock-in/clock-out interval inside a timesheet.
///
/// `start_time` and `end_time` are kept as the `HH:MM` strings they were
/// entered with; durations are derived in [`crate::workflow::hours`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 11,
        "timesheet_id": 4,
        "day": "Monday",
        "date": "2026-10-12",
        "start_time": "08:00",
        "end_time": "16:00"
    })
)]
pub struct TimeRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub timesheet_id: u64,
    #[schema(example = "Monday")]
    pub day: String,
    #[serde(default)]
    #[schema(value_type = Option<String>, format = "date")]
    pub date: Option<NaiveDate>,
    #[schema(example = "08:00")]
    pub start_time: String,
    #[schema(example = "16:00")]
    pub end_time: String,
}
