use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 3,
        "name": "Website relaunch",
        "project_manager_id": 2,
        "start_date": "2026-01-05",
        "end_date": "2026-06-30",
        "estimated_hours": 800
    })
)]
pub struct Project {
    pub id: u64,
    pub name: String,
    pub project_manager_id: u64,
    #[schema(value_type = Option<String>, format = "date")]
    pub start_date: Option<NaiveDate>,
    #[schema(value_type = Option<String>, format = "date")]
    pub end_date: Option<NaiveDate>,
    pub estimated_hours: Option<i32>,
}
