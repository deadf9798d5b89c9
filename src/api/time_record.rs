use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::debug;
use utoipa::{IntoParams, ToSchema};

use crate::api::{
    db_error, message,
    project::require_project_manager,
    timesheet::{may_edit_timesheet, require_timesheet_access},
};
use crate::auth::auth::AuthUser;
use crate::model::{time_record::TimeRecord, timesheet::TimesheetStatus};
use crate::workflow::hours::validate_interval;

const RECORD_COLUMNS: &str = "tr.id, tr.timesheet_id, tr.day, tr.date, tr.start_time, tr.end_time";

#[derive(Deserialize, IntoParams)]
pub struct TimeRecordQuery {
    pub timesheet_id: u64,
}

#[derive(Deserialize, IntoParams)]
pub struct TrackedQuery {
    /// Project id
    pub pid: u64,
}

#[derive(Deserialize, ToSchema)]
#[schema(example = json!({
    "timesheet_id": 4,
    "day": "Monday",
    "start_time": "08:00",
    "end_time": "16:00"
}))]
pub struct UpsertTimeRecord {
    /// Present to update an existing record
    pub id: Option<u64>,
    pub timesheet_id: u64,
    pub day: String,
    #[schema(value_type = Option<String>, format = "date")]
    pub date: Option<NaiveDate>,
    pub start_time: String,
    pub end_time: String,
}

#[derive(Serialize, ToSchema)]
pub struct TimeRecordListResponse {
    pub data: Vec<TimeRecord>,
}

/// Time records of one timesheet
#[utoipa::path(
    get,
    path = "/api/timesheet/timerecord",
    params(TimeRecordQuery),
    responses(
        (status = 200, description = "Time records of the timesheet", body = [TimeRecord]),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Timesheet not found")
    ),
    security(("bearer_auth" = [])),
    tag = "TimeRecord"
)]
pub async fn list_time_records(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<TimeRecordQuery>,
) -> actix_web::Result<impl Responder> {
    require_timesheet_access(pool.get_ref(), &auth, query.timesheet_id).await?;

    let records = sqlx::query_as::<_, TimeRecord>(&format!(
        "SELECT {RECORD_COLUMNS} FROM time_record tr WHERE tr.timesheet_id = ?
         ORDER BY tr.date, tr.start_time, tr.id"
    ))
    .bind(query.timesheet_id)
    .fetch_all(pool.get_ref())
    .await
    .map_err(db_error("Failed to fetch time records"))?;

    debug!(timesheet_id = query.timesheet_id, count = records.len(), "Fetched time records");
    Ok(HttpResponse::Ok().json(records))
}

/// Creates a time record, or updates it when `id` is given
#[utoipa::path(
    post,
    path = "/api/timesheet/timerecord",
    request_body = UpsertTimeRecord,
    responses(
        (status = 200, description = "Record saved", body = Object, example = json!({
            "message": "Time record saved", "id": 11
        })),
        (status = 400, description = "Invalid day or times"),
        (status = 404, description = "Timesheet or record not found"),
        (status = 409, description = "Approved timesheets are locked")
    ),
    security(("bearer_auth" = [])),
    tag = "TimeRecord"
)]
pub async fn upsert_time_record(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<UpsertTimeRecord>,
) -> actix_web::Result<impl Responder> {
    let record = payload.into_inner();
    let day = match validate_interval(&record.day, &record.start_time, &record.end_time) {
        Ok(day) => day,
        Err(reason) => return Ok(message(HttpResponse::BadRequest(), reason)),
    };

    let mut tx = pool
        .begin()
        .await
        .map_err(db_error("Failed to open transaction"))?;

    let sheet = sqlx::query_as::<_, (NaiveDate, Option<String>, u64, u64)>(
        r#"
        SELECT t.start_date_of_the_week, t.status, t.employee_id, p.project_manager_id
        FROM timesheet t
        JOIN project p ON p.id = t.project_id
        WHERE t.id = ?
        FOR UPDATE
        "#,
    )
    .bind(record.timesheet_id)
    .fetch_optional(&mut *tx)
    .await
    .map_err(db_error("Failed to fetch timesheet"))?;

    // owners, the project's manager and admins may edit; anyone else sees a 404
    let (week, status) = match sheet {
        Some((week, status, employee_id, manager_id))
            if may_edit_timesheet(&auth, employee_id, manager_id) =>
        {
            (week, status)
        }
        _ => return Ok(message(HttpResponse::NotFound(), "Timesheet not found")),
    };
    if status.as_deref() == Some(TimesheetStatus::Approved.as_ref()) {
        return Ok(message(
            HttpResponse::Conflict(),
            "Approved timesheets are locked",
        ));
    }

    let date = record.date.unwrap_or_else(|| day.date_in_week(week));

    let id = match record.id {
        Some(id) => {
            let done = sqlx::query(
                r#"
                UPDATE time_record SET day = ?, date = ?, start_time = ?, end_time = ?
                WHERE id = ? AND timesheet_id = ?
                "#,
            )
            .bind(day.as_ref())
            .bind(date)
            .bind(record.start_time.trim())
            .bind(record.end_time.trim())
            .bind(id)
            .bind(record.timesheet_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error("Failed to update time record"))?;

            // unchanged rows report zero, so only a missing row is an error
            if done.rows_affected() == 0 {
                let exists = sqlx::query_scalar::<_, i64>(
                    "SELECT COUNT(*) FROM time_record WHERE id = ? AND timesheet_id = ?",
                )
                .bind(id)
                .bind(record.timesheet_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(db_error("Failed to check time record"))?;
                if exists == 0 {
                    return Ok(message(HttpResponse::NotFound(), "Time record not found"));
                }
            }
            id
        }
        None => sqlx::query(
            r#"
            INSERT INTO time_record (timesheet_id, day, date, start_time, end_time)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.timesheet_id)
        .bind(day.as_ref())
        .bind(date)
        .bind(record.start_time.trim())
        .bind(record.end_time.trim())
        .execute(&mut *tx)
        .await
        .map_err(db_error("Failed to insert time record"))?
        .last_insert_id(),
    };

    tx.commit().await.map_err(db_error("Failed to commit time record"))?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Time record saved",
        "id": id
    })))
}

/// Every time record an employee logged on a project
#[utoipa::path(
    get,
    path = "/api/timesheet/timerecord/manager/{employee_id}",
    params(
        ("employee_id" = u64, Path, description = "Employee id"),
        TrackedQuery
    ),
    responses(
        (status = 200, description = "Tracked time records", body = TimeRecordListResponse),
        (status = 403, description = "Not the manager of this project"),
        (status = 404, description = "Project not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Approval"
)]
pub async fn tracked_records(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    query: web::Query<TrackedQuery>,
) -> actix_web::Result<impl Responder> {
    let project = require_project_manager(pool.get_ref(), &auth, query.pid).await?;
    let employee_id = path.into_inner();

    let records = sqlx::query_as::<_, TimeRecord>(&format!(
        r#"
        SELECT {RECORD_COLUMNS}
        FROM time_record tr
        JOIN timesheet t ON t.id = tr.timesheet_id
        WHERE t.employee_id = ? AND t.project_id = ?
        ORDER BY tr.date, tr.start_time
        "#
    ))
    .bind(employee_id)
    .bind(project.id)
    .fetch_all(pool.get_ref())
    .await
    .map_err(db_error("Failed to fetch tracked records"))?;

    Ok(HttpResponse::Ok().json(TimeRecordListResponse { data: records }))
}
