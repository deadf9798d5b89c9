use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::ToSchema;

use crate::api::{Membership, db_error, membership, message};
use crate::auth::auth::AuthUser;
use crate::model::{project::Project, role::Role};

#[derive(Deserialize, ToSchema)]
pub struct CreateProject {
    #[schema(example = "Website relaunch")]
    pub name: String,
    #[schema(example = "2026-01-05", format = "date", value_type = Option<String>)]
    pub start_date: Option<NaiveDate>,
    #[schema(example = "2026-06-30", format = "date", value_type = Option<String>)]
    pub end_date: Option<NaiveDate>,
    #[schema(example = 800)]
    pub estimated_hours: Option<i32>,
    #[schema(example = 1)]
    pub organization_id: Option<u64>,
}

#[derive(Deserialize, ToSchema)]
pub struct WorkerIds {
    #[schema(example = json!([7, 8]))]
    pub worker_ids: Vec<u64>,
}

#[derive(Serialize, ToSchema)]
pub struct WorkerChanges {
    pub message: String,
    pub total_processed: usize,
    pub changed: Vec<u64>,
    pub unchanged: Vec<u64>,
}

const PROJECT_COLUMNS: &str =
    "id, name, project_manager_id, start_date, end_date, estimated_hours";

/// Loads a project the caller may manage: its manager, or any admin.
pub(crate) async fn require_project_manager(
    pool: &MySqlPool,
    auth: &AuthUser,
    project_id: u64,
) -> actix_web::Result<Project> {
    auth.require_manager_or_admin()?;

    let project = sqlx::query_as::<_, Project>(&format!(
        "SELECT {PROJECT_COLUMNS} FROM project WHERE id = ?"
    ))
    .bind(project_id)
    .fetch_optional(pool)
    .await
    .map_err(db_error("Failed to fetch project"))?
    .ok_or_else(|| actix_web::error::ErrorNotFound(json!({"message": "Project not found"})))?;

    if !auth.is_admin() && project.project_manager_id != auth.user_id {
        return Err(actix_web::error::ErrorForbidden(
            json!({"message": "Not the manager of this project"}),
        ));
    }

    Ok(project)
}

/// Project detail for its manager
#[utoipa::path(
    get,
    path = "/api/project/manager/{pid}",
    params(("pid" = u64, Path, description = "Project id")),
    responses(
        (status = 200, description = "Project detail", body = Project),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the manager of this project"),
        (status = 404, description = "Project not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Project"
)]
pub async fn get_manager_project(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let project = require_project_manager(pool.get_ref(), &auth, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(project))
}

/// Projects visible to the caller: admins see all, managers the ones they
/// run, workers the ones they are assigned to.
#[utoipa::path(
    get,
    path = "/api/project",
    responses(
        (status = 200, description = "Project list", body = [Project]),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Project"
)]
pub async fn list_projects(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    let query = match auth.role {
        Role::Admin => sqlx::query_as::<_, Project>(
            "SELECT id, name, project_manager_id, start_date, end_date, estimated_hours
             FROM project ORDER BY name",
        ),
        Role::Manager => sqlx::query_as::<_, Project>(
            "SELECT id, name, project_manager_id, start_date, end_date, estimated_hours
             FROM project WHERE project_manager_id = ? ORDER BY name",
        )
        .bind(auth.user_id),
        Role::Worker => sqlx::query_as::<_, Project>(
            "SELECT p.id, p.name, p.project_manager_id, p.start_date, p.end_date, p.estimated_hours
             FROM project p
             JOIN project_worker pw ON pw.project_id = p.id
             WHERE pw.worker_id = ?
             ORDER BY p.name",
        )
        .bind(auth.user_id),
    };

    let projects = query
        .fetch_all(pool.get_ref())
        .await
        .map_err(db_error("Failed to list projects"))?;

    Ok(HttpResponse::Ok().json(projects))
}

#[utoipa::path(
    post,
    path = "/api/project",
    request_body = CreateProject,
    responses(
        (status = 201, description = "Project created", body = Object, example = json!({
            "message": "Project created", "id": 3
        })),
        (status = 400, description = "Invalid project"),
        (status = 403, description = "Manager/Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Project"
)]
pub async fn create_project(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateProject>,
) -> actix_web::Result<impl Responder> {
    auth.require_manager_or_admin()?;

    let name = payload.name.trim();
    if name.is_empty() {
        return Ok(message(HttpResponse::BadRequest(), "Project name is required"));
    }
    if let (Some(start), Some(end)) = (payload.start_date, payload.end_date) {
        if start > end {
            return Ok(message(
                HttpResponse::BadRequest(),
                "start_date cannot be after end_date",
            ));
        }
    }
    if payload.estimated_hours.is_some_and(|h| h < 0) {
        return Ok(message(
            HttpResponse::BadRequest(),
            "estimated_hours cannot be negative",
        ));
    }

    let mut tx = pool
        .begin()
        .await
        .map_err(db_error("Failed to open transaction"))?;

    let done = sqlx::query(
        r#"
        INSERT INTO project
            (name, project_manager_id, start_date, end_date, estimated_hours, organization_id)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(name)
    .bind(auth.user_id)
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(payload.estimated_hours)
    .bind(payload.organization_id)
    .execute(&mut *tx)
    .await
    .map_err(db_error("Failed to create project"))?;

    tx.commit().await.map_err(db_error("Failed to commit project"))?;

    info!(project_id = done.last_insert_id(), manager_id = auth.user_id, "Project created");
    Ok(HttpResponse::Created().json(json!({
        "message": "Project created",
        "id": done.last_insert_id()
    })))
}

#[utoipa::path(
    post,
    path = "/api/project/{pid}/workers",
    request_body = WorkerIds,
    params(("pid" = u64, Path, description = "Project id")),
    responses(
        (status = 200, description = "Workers added", body = WorkerChanges),
        (status = 403, description = "Not the manager of this project"),
        (status = 404, description = "Project or worker not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Project"
)]
pub async fn add_workers(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<WorkerIds>,
) -> actix_web::Result<impl Responder> {
    let project = require_project_manager(pool.get_ref(), &auth, path.into_inner()).await?;

    let mut tx = pool
        .begin()
        .await
        .map_err(db_error("Failed to open transaction"))?;

    let mut added = Vec::new();
    let mut already = Vec::new();
    for &worker_id in &payload.worker_ids {
        let result = sqlx::query("INSERT INTO project_worker (project_id, worker_id) VALUES (?, ?)")
            .bind(project.id)
            .bind(worker_id)
            .execute(&mut *tx)
            .await;

        match membership(result).map_err(db_error("Failed to add worker to project"))? {
            Membership::Added => added.push(worker_id),
            Membership::AlreadyPresent => already.push(worker_id),
            // dropping the transaction rolls back the workers added so far
            Membership::MissingReference => {
                return Ok(message(
                    HttpResponse::NotFound(),
                    &format!("Worker {worker_id} not found"),
                ));
            }
        }
    }

    tx.commit().await.map_err(db_error("Failed to commit workers"))?;

    Ok(HttpResponse::Ok().json(WorkerChanges {
        message: "Workers processed".to_string(),
        total_processed: payload.worker_ids.len(),
        changed: added,
        unchanged: already,
    }))
}

#[utoipa::path(
    delete,
    path = "/api/project/{pid}/workers",
    request_body = WorkerIds,
    params(("pid" = u64, Path, description = "Project id")),
    responses(
        (status = 200, description = "Workers removed", body = WorkerChanges),
        (status = 403, description = "Not the manager of this project"),
        (status = 404, description = "Project not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Project"
)]
pub async fn remove_workers(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<WorkerIds>,
) -> actix_web::Result<impl Responder> {
    let project = require_project_manager(pool.get_ref(), &auth, path.into_inner()).await?;

    let mut tx = pool
        .begin()
        .await
        .map_err(db_error("Failed to open transaction"))?;

    let mut removed = Vec::new();
    let mut missing = Vec::new();
    for &worker_id in &payload.worker_ids {
        let done = sqlx::query("DELETE FROM project_worker WHERE project_id = ? AND worker_id = ?")
            .bind(project.id)
            .bind(worker_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error("Failed to remove worker from project"))?;

        if done.rows_affected() > 0 {
            removed.push(worker_id);
        } else {
            missing.push(worker_id);
        }
    }

    tx.commit().await.map_err(db_error("Failed to commit workers"))?;

    Ok(HttpResponse::Ok().json(WorkerChanges {
        message: "Workers processed".to_string(),
        total_processed: payload.worker_ids.len(),
        changed: removed,
        unchanged: missing,
    }))
}
