use actix_web::{HttpResponse, Responder, web};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{MySql, MySqlPool, Transaction};
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use crate::api::{
    db_error, is_duplicate, message,
    notification::{TimesheetRef, notify},
    project::require_project_manager,
};
use crate::auth::auth::AuthUser;
use crate::model::notification::NotificationKind;
use crate::model::timesheet::{TimesheetHeader, TimesheetRow, TimesheetStatus, TransitionResponse};
use crate::workflow::{
    approval::{ApproveRequest, RejectRequest},
    week::week_start,
};

const HEADER_SELECT: &str = r#"
    SELECT
        t.id,
        t.project_id,
        p.name AS project_name,
        t.employee_id,
        t.start_date_of_the_week,
        t.submission_date,
        t.status,
        t.approved_by,
        t.approved_date,
        u.first_name,
        u.last_name
    FROM timesheet t
    JOIN project p ON p.id = t.project_id
    JOIN users u ON u.id = t.employee_id
"#;

#[derive(Deserialize, IntoParams)]
pub struct ManagerWeekQuery {
    /// Any day of the requested week, `YYYY-MM-DD`
    #[param(value_type = String, example = "2026-10-12")]
    pub start_date: NaiveDate,
}

#[derive(Deserialize, IntoParams)]
pub struct TimesheetQuery {
    /// Defaults to the caller
    pub employee_id: Option<u64>,
    #[param(value_type = String, example = "2026-10-12")]
    pub start_date_of_the_week: NaiveDate,
}

#[derive(Deserialize, IntoParams)]
pub struct TimesheetIdQuery {
    pub id: u64,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateTimesheet {
    #[schema(example = 3)]
    pub project_id: u64,
    /// Normalised to the Monday of its week
    #[schema(example = "2026-10-12", format = "date", value_type = String)]
    pub start_date_of_the_week: NaiveDate,
}

#[derive(Deserialize, ToSchema)]
pub struct SubmitTimesheet {
    #[schema(example = 4)]
    pub id: u64,
    #[schema(example = "2026-10-16", format = "date", value_type = Option<String>)]
    pub submission_date: Option<NaiveDate>,
}

#[derive(Serialize, ToSchema)]
pub struct TimesheetListResponse {
    pub data: Vec<TimesheetHeader>,
}

/// Owner and project manager of a timesheet, locked for the transaction.
#[derive(sqlx::FromRow)]
struct Ownership {
    project_id: u64,
    employee_id: u64,
    project_manager_id: u64,
    start_date_of_the_week: NaiveDate,
    submission_date: Option<NaiveDate>,
    status: Option<String>,
}

impl Ownership {
    fn timesheet(&self, timesheet_id: u64) -> TimesheetRef {
        TimesheetRef {
            project_id: self.project_id,
            timesheet_id,
            week_start: self.start_date_of_the_week,
        }
    }
}

async fn lock_ownership(
    tx: &mut Transaction<'_, MySql>,
    timesheet_id: u64,
) -> Result<Option<Ownership>, sqlx::Error> {
    sqlx::query_as::<_, Ownership>(
        r#"
        SELECT t.project_id, t.employee_id, p.project_manager_id,
               t.start_date_of_the_week, t.submission_date, t.status
        FROM timesheet t
        JOIN project p ON p.id = t.project_id
        WHERE t.id = ?
        FOR UPDATE
        "#,
    )
    .bind(timesheet_id)
    .fetch_optional(&mut **tx)
    .await
}

/// Timesheets of every employee on a project for one week
#[utoipa::path(
    get,
    path = "/api/timesheet/manager/{pid}",
    params(
        ("pid" = u64, Path, description = "Project id"),
        ManagerWeekQuery
    ),
    responses(
        (status = 200, description = "Timesheet headers of the week", body = TimesheetListResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the manager of this project"),
        (status = 404, description = "Project not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Approval"
)]
pub async fn manager_timesheets(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    query: web::Query<ManagerWeekQuery>,
) -> actix_web::Result<impl Responder> {
    let project = require_project_manager(pool.get_ref(), &auth, path.into_inner()).await?;
    let week = week_start(query.start_date);

    let rows = sqlx::query_as::<_, TimesheetRow>(&format!(
        "{HEADER_SELECT} WHERE t.project_id = ? AND t.start_date_of_the_week = ?
         ORDER BY u.last_name, u.first_name, t.id"
    ))
    .bind(project.id)
    .bind(week)
    .fetch_all(pool.get_ref())
    .await
    .map_err(db_error("Failed to fetch manager timesheets"))?;

    Ok(HttpResponse::Ok().json(TimesheetListResponse {
        data: rows.into_iter().map(TimesheetHeader::from).collect(),
    }))
}

/// Approve or reopen a timesheet
#[utoipa::path(
    post,
    path = "/api/timesheet/approve",
    request_body = ApproveRequest,
    responses(
        (status = 200, description = "Approval state changed", body = TransitionResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the manager of this project"),
        (status = 404, description = "Timesheet not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Approval"
)]
pub async fn approve_timesheet(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<ApproveRequest>,
) -> actix_web::Result<impl Responder> {
    auth.require_manager_or_admin()?;
    let request = payload.into_inner();

    let mut tx = pool
        .begin()
        .await
        .map_err(db_error("Failed to open transaction"))?;

    let Some(owner) = lock_ownership(&mut tx, request.id)
        .await
        .map_err(db_error("Failed to fetch timesheet"))?
    else {
        return Ok(message(HttpResponse::NotFound(), "Timesheet not found"));
    };
    if !auth.is_admin() && owner.project_manager_id != auth.user_id {
        return Ok(message(
            HttpResponse::Forbidden(),
            "Not the manager of this project",
        ));
    }

    let status = request.target_status();
    let (approved_by, approved_date) = if request.approved {
        (
            Some(auth.user_id),
            Some(request.approved_date.unwrap_or_else(Utc::now)),
        )
    } else {
        (None, None)
    };

    sqlx::query(
        "UPDATE timesheet SET status = ?, approved_by = ?, approved_date = ? WHERE id = ?",
    )
    .bind(status.as_ref())
    .bind(approved_by)
    .bind(approved_date)
    .bind(request.id)
    .execute(&mut *tx)
    .await
    .map_err(db_error("Failed to update approval"))?;

    if request.approved {
        notify(
            &mut tx,
            owner.employee_id,
            NotificationKind::TimesheetApproved,
            &owner.timesheet(request.id),
        )
        .await
        .map_err(db_error("Failed to queue approval notification"))?;
    }

    tx.commit().await.map_err(db_error("Failed to commit approval"))?;

    info!(timesheet_id = request.id, %status, manager_id = auth.user_id, "Timesheet approval changed");
    Ok(HttpResponse::Ok().json(TransitionResponse {
        message: if request.approved {
            "Timesheet approved".to_string()
        } else {
            "Timesheet reopened".to_string()
        },
        id: request.id,
        status,
        approved_date,
    }))
}

#[utoipa::path(
    post,
    path = "/api/timesheet/reject",
    request_body = RejectRequest,
    responses(
        (status = 200, description = "Timesheet rejected", body = TransitionResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the manager of this project"),
        (status = 404, description = "Timesheet not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Approval"
)]
pub async fn reject_timesheet(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<RejectRequest>,
) -> actix_web::Result<impl Responder> {
    auth.require_manager_or_admin()?;
    let timesheet_id = payload.id;

    let mut tx = pool
        .begin()
        .await
        .map_err(db_error("Failed to open transaction"))?;

    let Some(owner) = lock_ownership(&mut tx, timesheet_id)
        .await
        .map_err(db_error("Failed to fetch timesheet"))?
    else {
        return Ok(message(HttpResponse::NotFound(), "Timesheet not found"));
    };
    if !auth.is_admin() && owner.project_manager_id != auth.user_id {
        return Ok(message(
            HttpResponse::Forbidden(),
            "Not the manager of this project",
        ));
    }

    sqlx::query(
        "UPDATE timesheet SET status = ?, approved_by = NULL, approved_date = NULL WHERE id = ?",
    )
    .bind(TimesheetStatus::Rejected.as_ref())
    .bind(timesheet_id)
    .execute(&mut *tx)
    .await
    .map_err(db_error("Failed to reject timesheet"))?;

    notify(
        &mut tx,
        owner.employee_id,
        NotificationKind::TimesheetRejected,
        &owner.timesheet(timesheet_id),
    )
    .await
    .map_err(db_error("Failed to queue rejection notification"))?;

    tx.commit().await.map_err(db_error("Failed to commit rejection"))?;

    info!(timesheet_id, manager_id = auth.user_id, "Timesheet rejected");
    Ok(HttpResponse::Ok().json(TransitionResponse {
        message: "Timesheet rejected".to_string(),
        id: timesheet_id,
        status: TimesheetStatus::Rejected,
        approved_date: None,
    }))
}

/// Opens a weekly timesheet for the caller on a project they work on
#[utoipa::path(
    post,
    path = "/api/timesheet",
    request_body = CreateTimesheet,
    responses(
        (status = 201, description = "Timesheet created", body = Object, example = json!({
            "message": "Timesheet created", "id": 4
        })),
        (status = 403, description = "Not assigned to this project"),
        (status = 409, description = "Timesheet already exists for this week")
    ),
    security(("bearer_auth" = [])),
    tag = "Timesheet"
)]
pub async fn create_timesheet(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateTimesheet>,
) -> actix_web::Result<impl Responder> {
    let week = week_start(payload.start_date_of_the_week);

    let mut tx = pool
        .begin()
        .await
        .map_err(db_error("Failed to open transaction"))?;

    let assigned = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM project_worker WHERE project_id = ? AND worker_id = ?",
    )
    .bind(payload.project_id)
    .bind(auth.user_id)
    .fetch_one(&mut *tx)
    .await
    .map_err(db_error("Failed to check project membership"))?;

    if assigned == 0 {
        return Ok(message(
            HttpResponse::Forbidden(),
            "Not assigned to this project",
        ));
    }

    let result = sqlx::query(
        r#"
        INSERT INTO timesheet (project_id, employee_id, start_date_of_the_week)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(payload.project_id)
    .bind(auth.user_id)
    .bind(week)
    .execute(&mut *tx)
    .await;

    let done = match result {
        Ok(done) => done,
        Err(e) if is_duplicate(&e) => {
            return Ok(message(
                HttpResponse::Conflict(),
                "Timesheet already exists for this week",
            ));
        }
        Err(e) => return Err(db_error("Failed to create timesheet")(e)),
    };

    tx.commit().await.map_err(db_error("Failed to commit timesheet"))?;

    Ok(HttpResponse::Created().json(json!({
        "message": "Timesheet created",
        "id": done.last_insert_id()
    })))
}

/// Timesheets of one employee for one week
#[utoipa::path(
    get,
    path = "/api/timesheet",
    params(TimesheetQuery),
    responses(
        (status = 200, description = "Timesheets of the week", body = [TimesheetHeader]),
        (status = 403, description = "Only managers can read other employees' timesheets")
    ),
    security(("bearer_auth" = [])),
    tag = "Timesheet"
)]
pub async fn list_timesheets(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<TimesheetQuery>,
) -> actix_web::Result<impl Responder> {
    let employee_id = query.employee_id.unwrap_or(auth.user_id);
    if employee_id != auth.user_id && !auth.can_review() {
        return Ok(message(
            HttpResponse::Forbidden(),
            "Only managers can read other employees' timesheets",
        ));
    }

    let rows = sqlx::query_as::<_, TimesheetRow>(&format!(
        "{HEADER_SELECT} WHERE t.employee_id = ? AND t.start_date_of_the_week = ?
         ORDER BY p.name, t.id"
    ))
    .bind(employee_id)
    .bind(week_start(query.start_date_of_the_week))
    .fetch_all(pool.get_ref())
    .await
    .map_err(db_error("Failed to list timesheets"))?;

    let headers: Vec<TimesheetHeader> = rows.into_iter().map(TimesheetHeader::from).collect();
    Ok(HttpResponse::Ok().json(headers))
}

/// Deletes an unsubmitted timesheet with its time records
#[utoipa::path(
    delete,
    path = "/api/timesheet",
    params(TimesheetIdQuery),
    responses(
        (status = 200, description = "Timesheet deleted"),
        (status = 404, description = "Timesheet not found"),
        (status = 409, description = "Submitted timesheets cannot be deleted")
    ),
    security(("bearer_auth" = [])),
    tag = "Timesheet"
)]
pub async fn delete_timesheet(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<TimesheetIdQuery>,
) -> actix_web::Result<impl Responder> {
    let mut tx = pool
        .begin()
        .await
        .map_err(db_error("Failed to open transaction"))?;

    let owner = lock_ownership(&mut tx, query.id)
        .await
        .map_err(db_error("Failed to fetch timesheet"))?;

    match owner {
        Some(owner) if owner.employee_id == auth.user_id => {
            if owner.submission_date.is_some() {
                return Ok(message(
                    HttpResponse::Conflict(),
                    "Submitted timesheets cannot be deleted",
                ));
            }
        }
        // someone else's timesheet looks the same as a missing one
        _ => return Ok(message(HttpResponse::NotFound(), "Timesheet not found")),
    }

    sqlx::query("DELETE FROM time_record WHERE timesheet_id = ?")
        .bind(query.id)
        .execute(&mut *tx)
        .await
        .map_err(db_error("Failed to delete time records"))?;

    sqlx::query("DELETE FROM timesheet WHERE id = ?")
        .bind(query.id)
        .execute(&mut *tx)
        .await
        .map_err(db_error("Failed to delete timesheet"))?;

    tx.commit().await.map_err(db_error("Failed to commit delete"))?;

    Ok(message(HttpResponse::Ok(), "Timesheet deleted"))
}

/// Submits a timesheet for approval
#[utoipa::path(
    patch,
    path = "/api/timesheet/submit",
    request_body = SubmitTimesheet,
    responses(
        (status = 200, description = "Timesheet submitted", body = Object, example = json!({
            "message": "Timesheet submitted", "status": "pending"
        })),
        (status = 404, description = "Timesheet not found"),
        (status = 409, description = "Approved timesheets cannot be resubmitted")
    ),
    security(("bearer_auth" = [])),
    tag = "Timesheet"
)]
pub async fn submit_timesheet(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<SubmitTimesheet>,
) -> actix_web::Result<impl Responder> {
    let submission_date = payload
        .submission_date
        .unwrap_or_else(|| Utc::now().date_naive());

    let mut tx = pool
        .begin()
        .await
        .map_err(db_error("Failed to open transaction"))?;

    let Some(owner) = lock_ownership(&mut tx, payload.id)
        .await
        .map_err(db_error("Failed to fetch timesheet"))?
        .filter(|owner| owner.employee_id == auth.user_id)
    else {
        return Ok(message(HttpResponse::NotFound(), "Timesheet not found"));
    };

    if owner.status.as_deref() == Some(TimesheetStatus::Approved.as_ref()) {
        return Ok(message(
            HttpResponse::Conflict(),
            "Approved timesheets cannot be resubmitted",
        ));
    }

    sqlx::query("UPDATE timesheet SET submission_date = ?, status = ? WHERE id = ?")
        .bind(submission_date)
        .bind(TimesheetStatus::Pending.as_ref())
        .bind(payload.id)
        .execute(&mut *tx)
        .await
        .map_err(db_error("Failed to submit timesheet"))?;

    notify(
        &mut tx,
        owner.project_manager_id,
        NotificationKind::TimesheetSubmitted,
        &owner.timesheet(payload.id),
    )
    .await
    .map_err(db_error("Failed to queue submission notification"))?;

    tx.commit().await.map_err(db_error("Failed to commit submission"))?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Timesheet submitted",
        "status": TimesheetStatus::Pending
    })))
}

/// Whether the caller may read and edit a timesheet's records: its owner,
/// the project's manager, or an admin.
pub(crate) fn may_edit_timesheet(auth: &AuthUser, employee_id: u64, manager_id: u64) -> bool {
    auth.is_admin() || employee_id == auth.user_id || manager_id == auth.user_id
}

pub(crate) async fn require_timesheet_access(
    pool: &MySqlPool,
    auth: &AuthUser,
    timesheet_id: u64,
) -> actix_web::Result<NaiveDate> {
    let row = sqlx::query_as::<_, (u64, u64, NaiveDate)>(
        r#"
        SELECT t.employee_id, p.project_manager_id, t.start_date_of_the_week
        FROM timesheet t
        JOIN project p ON p.id = t.project_id
        WHERE t.id = ?
        "#,
    )
    .bind(timesheet_id)
    .fetch_optional(pool)
    .await
    .map_err(db_error("Failed to fetch timesheet"))?;

    match row {
        Some((employee_id, manager_id, week)) if may_edit_timesheet(auth, employee_id, manager_id) => {
            Ok(week)
        }
        _ => Err(actix_web::error::ErrorNotFound(
            json!({"message": "Timesheet not found"}),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::role::Role;

    fn user(user_id: u64, role: Role) -> AuthUser {
        AuthUser {
            user_id,
            username: format!("u{user_id}"),
            role,
        }
    }

    #[test]
    fn owner_manager_and_admin_may_edit_records() {
        // timesheet of employee 7 on a project managed by 2
        assert!(may_edit_timesheet(&user(7, Role::Worker), 7, 2));
        assert!(may_edit_timesheet(&user(2, Role::Manager), 7, 2));
        assert!(may_edit_timesheet(&user(1, Role::Admin), 7, 2));
    }

    #[test]
    fn other_managers_and_workers_may_not_edit_records() {
        assert!(!may_edit_timesheet(&user(3, Role::Manager), 7, 2));
        assert!(!may_edit_timesheet(&user(8, Role::Worker), 7, 2));
    }
}
