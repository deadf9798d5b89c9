use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::Serialize;
use sqlx::{MySql, MySqlPool, Transaction};
use tracing::warn;
use utoipa::ToSchema;

use crate::api::{db_error, message};
use crate::auth::auth::AuthUser;
use crate::model::notification::{Notification, NotificationKind, NotificationRow};

#[derive(Serialize, ToSchema)]
pub struct NotificationListResponse {
    pub data: Vec<Notification>,
}

/// Timesheet a notification points at.
pub(crate) struct TimesheetRef {
    pub project_id: u64,
    pub timesheet_id: u64,
    pub week_start: NaiveDate,
}

/// Queues a notification inside the transaction that caused it.
pub(crate) async fn notify(
    tx: &mut Transaction<'_, MySql>,
    user_id: u64,
    kind: NotificationKind,
    timesheet: &TimesheetRef,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO notification (user_id, kind, project_id, timesheet_id, week_start)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(kind.as_ref())
    .bind(timesheet.project_id)
    .bind(timesheet.timesheet_id)
    .bind(timesheet.week_start)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Notification feed of a user, newest first
#[utoipa::path(
    get,
    path = "/api/notification/{user_id}",
    params(("user_id" = u64, Path, description = "Recipient")),
    responses(
        (status = 200, description = "Notifications of the user", body = NotificationListResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Only the recipient or an admin")
    ),
    security(("bearer_auth" = [])),
    tag = "Notification"
)]
pub async fn list_notifications(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let user_id = path.into_inner();
    if user_id != auth.user_id && !auth.is_admin() {
        return Ok(message(
            HttpResponse::Forbidden(),
            "Only the recipient or an admin",
        ));
    }

    let rows = sqlx::query_as::<_, NotificationRow>(
        r#"
        SELECT id, user_id, kind, project_id, timesheet_id, week_start,
               is_read AS `read`, created_at
        FROM notification
        WHERE user_id = ?
        ORDER BY created_at DESC, id DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool.get_ref())
    .await
    .map_err(db_error("Failed to fetch notifications"))?;

    let data = rows
        .into_iter()
        .filter_map(|row| {
            let id = row.id;
            Notification::try_from(row)
                .map_err(|e| warn!(error = %e, notification_id = id, "Skipping notification of unknown kind"))
                .ok()
        })
        .collect();

    Ok(HttpResponse::Ok().json(NotificationListResponse { data }))
}

#[utoipa::path(
    patch,
    path = "/api/notification/{id}/read",
    params(("id" = u64, Path, description = "Notification id")),
    responses(
        (status = 200, description = "Marked as read"),
        (status = 404, description = "Notification not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Notification"
)]
pub async fn mark_read(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let id = path.into_inner();
    let found = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM notification WHERE id = ? AND user_id = ?",
    )
    .bind(id)
    .bind(auth.user_id)
    .fetch_one(pool.get_ref())
    .await
    .map_err(db_error("Failed to fetch notification"))?;
    if found == 0 {
        return Ok(message(HttpResponse::NotFound(), "Notification not found"));
    }

    sqlx::query("UPDATE notification SET is_read = TRUE WHERE id = ?")
        .bind(id)
        .execute(pool.get_ref())
        .await
        .map_err(db_error("Failed to mark notification read"))?;

    Ok(message(HttpResponse::Ok(), "Notification marked as read"))
}
