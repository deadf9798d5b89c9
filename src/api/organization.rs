use std::str::FromStr;

use actix_web::{HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::info;
use utoipa::ToSchema;

use crate::api::{Membership, db_error, membership, message};
use crate::auth::auth::AuthUser;
use crate::model::{role::Role, user::OrganizationUser};

#[derive(Deserialize, ToSchema)]
pub struct OrganizationMember {
    #[schema(example = 7)]
    pub user_id: u64,
    #[schema(example = "worker")]
    pub role: String,
}

#[derive(Deserialize, ToSchema)]
pub struct AddMembers {
    pub users: Vec<OrganizationMember>,
}

#[derive(Deserialize, ToSchema)]
pub struct RemoveMembers {
    #[schema(example = json!([7, 8]))]
    pub user_ids: Vec<u64>,
}

#[derive(Serialize, ToSchema)]
pub struct OrganizationUsersResponse {
    pub message: String,
    pub results: Vec<OrganizationUser>,
}

#[derive(Debug, Default, Serialize, ToSchema)]
pub struct MembershipResults {
    pub total_processed: usize,
    pub successful: Vec<u64>,
    pub not_found: Vec<u64>,
    pub already_in_org: Vec<u64>,
}

#[derive(Serialize, ToSchema)]
pub struct MembershipResponse {
    pub message: String,
    pub results: MembershipResults,
}

/// Every member of an organization with their role in it
#[utoipa::path(
    get,
    path = "/api/organization/{oid}/users",
    params(("oid" = u64, Path, description = "Organization id")),
    responses(
        (status = 200, description = "Organization members", body = OrganizationUsersResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Organization"
)]
pub async fn list_users(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let users = sqlx::query_as::<_, OrganizationUser>(
        r#"
        SELECT u.id, u.username, u.first_name, u.last_name, u.email, ou.role
        FROM users u
        JOIN organization_user ou ON ou.user_id = u.id
        WHERE ou.organization_id = ?
        ORDER BY u.last_name, u.first_name
        "#,
    )
    .bind(path.into_inner())
    .fetch_all(pool.get_ref())
    .await
    .map_err(db_error("Failed to fetch organization users"))?;

    Ok(HttpResponse::Ok().json(OrganizationUsersResponse {
        message: "Users retrieved successfully".to_string(),
        results: users,
    }))
}

/// Adds users to an organization; members already present are left as they are
#[utoipa::path(
    post,
    path = "/api/organization/{oid}/users",
    params(("oid" = u64, Path, description = "Organization id")),
    request_body = AddMembers,
    responses(
        (status = 200, description = "Invitations processed", body = MembershipResponse),
        (status = 400, description = "Unknown role"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Organization not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Organization"
)]
pub async fn add_users(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<AddMembers>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let organization_id = path.into_inner();

    if payload
        .users
        .iter()
        .any(|member| Role::from_str(&member.role).is_err())
    {
        return Ok(message(
            HttpResponse::BadRequest(),
            "Role must be worker, manager or admin",
        ));
    }

    let mut tx = pool
        .begin()
        .await
        .map_err(db_error("Failed to open transaction"))?;

    let organization = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM organization WHERE id = ?")
        .bind(organization_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error("Failed to look up organization"))?;
    if organization == 0 {
        return Ok(message(HttpResponse::NotFound(), "Organization not found"));
    }

    let mut results = MembershipResults {
        total_processed: payload.users.len(),
        ..Default::default()
    };

    for member in &payload.users {
        let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE id = ?")
            .bind(member.user_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_error("Failed to look up user"))?;
        if exists == 0 {
            results.not_found.push(member.user_id);
            continue;
        }

        let result = sqlx::query(
            "INSERT INTO organization_user (organization_id, user_id, role) VALUES (?, ?, ?)",
        )
        .bind(organization_id)
        .bind(member.user_id)
        .bind(&member.role)
        .execute(&mut *tx)
        .await;

        match membership(result).map_err(db_error("Failed to add organization user"))? {
            Membership::Added => results.successful.push(member.user_id),
            Membership::AlreadyPresent => results.already_in_org.push(member.user_id),
            Membership::MissingReference => results.not_found.push(member.user_id),
        }
    }

    tx.commit().await.map_err(db_error("Failed to commit organization users"))?;

    info!(
        organization_id,
        added = results.successful.len(),
        "Organization invitations processed"
    );
    Ok(HttpResponse::Ok().json(MembershipResponse {
        message: "Invitation processing completed".to_string(),
        results,
    }))
}

#[utoipa::path(
    delete,
    path = "/api/organization/{oid}/users",
    params(("oid" = u64, Path, description = "Organization id")),
    request_body = RemoveMembers,
    responses(
        (status = 200, description = "Removals processed", body = MembershipResponse),
        (status = 400, description = "An admin cannot remove themselves"),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Organization"
)]
pub async fn remove_users(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<RemoveMembers>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let organization_id = path.into_inner();

    if payload.user_ids.contains(&auth.user_id) {
        return Ok(message(
            HttpResponse::BadRequest(),
            "An admin cannot remove themselves",
        ));
    }

    let mut tx = pool
        .begin()
        .await
        .map_err(db_error("Failed to open transaction"))?;

    let mut results = MembershipResults {
        total_processed: payload.user_ids.len(),
        ..Default::default()
    };

    for &user_id in &payload.user_ids {
        let done = sqlx::query(
            "DELETE FROM organization_user WHERE organization_id = ? AND user_id = ?",
        )
        .bind(organization_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(db_error("Failed to remove organization user"))?;

        if done.rows_affected() > 0 {
            results.successful.push(user_id);
        } else {
            results.not_found.push(user_id);
        }
    }

    tx.commit().await.map_err(db_error("Failed to commit organization users"))?;

    Ok(HttpResponse::Ok().json(MembershipResponse {
        message: "Removal processing completed".to_string(),
        results,
    }))
}
