use std::collections::HashMap;

use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

use crate::api::db_error;
use crate::auth::auth::AuthUser;
use crate::model::{
    time_record::TimeRecord,
    timesheet::{TimesheetHeader, TimesheetRow, TimesheetStatus},
};
use crate::workflow::hours::{format_hours, interval_hours, total_hours};

#[derive(Deserialize, IntoParams)]
pub struct OrganizationQuery {
    pub organization_id: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProjectReport {
    pub project_id: u64,
    pub name: String,
    pub estimated_hours: Option<i32>,
    /// Two-decimal sum of every logged interval on the project
    #[schema(example = "312.50")]
    pub actual_hours: String,
    /// Estimate minus actual; negative once the project runs over
    #[schema(example = "87.50")]
    pub remaining_hours: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TeamMember {
    pub employee_id: u64,
    #[schema(example = "John Doe")]
    pub name: String,
    /// Role inside the organization, `None` when the employee is not a member
    #[schema(example = "worker")]
    pub role: Option<String>,
    #[schema(example = "38.00")]
    pub hours: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProjectAllocation {
    pub project_id: u64,
    pub project_name: String,
    pub estimated_hours: Option<i32>,
    pub team: Vec<TeamMember>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AllocationsResponse {
    /// Latest week any project of the organization has a timesheet for
    #[schema(value_type = Option<String>, format = "date")]
    pub week_start: Option<NaiveDate>,
    pub projects: Vec<ProjectAllocation>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RecentTimesheet {
    pub id: u64,
    pub project_name: Option<String>,
    #[schema(value_type = String, format = "date")]
    pub start_date_of_the_week: NaiveDate,
    #[schema(example = "Pending")]
    pub status: String,
    #[schema(example = "38.00")]
    pub hours: String,
}

#[derive(sqlx::FromRow)]
struct AllocationRow {
    project_id: u64,
    project_name: String,
    estimated_hours: Option<i32>,
    employee_id: Option<u64>,
    first_name: Option<String>,
    last_name: Option<String>,
    role: Option<String>,
    start_time: Option<String>,
    end_time: Option<String>,
}

#[derive(sqlx::FromRow)]
struct ReportRow {
    project_id: u64,
    name: String,
    estimated_hours: Option<i32>,
    start_time: Option<String>,
    end_time: Option<String>,
}

/// Admins see every organization; everyone else only their own.
async fn require_member(
    pool: &MySqlPool,
    auth: &AuthUser,
    organization_id: u64,
) -> actix_web::Result<()> {
    if auth.is_admin() {
        return Ok(());
    }

    let member = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM organization_user WHERE organization_id = ? AND user_id = ?",
    )
    .bind(organization_id)
    .bind(auth.user_id)
    .fetch_one(pool)
    .await
    .map_err(db_error("Failed to check organization membership"))?;

    if member == 0 {
        return Err(actix_web::error::ErrorForbidden(
            serde_json::json!({"message": "Not a member of this organization"}),
        ));
    }
    Ok(())
}

/// Folds joined project/record rows into one report per project, keeping the
/// order in which projects first appear.
fn summarize(rows: Vec<ReportRow>) -> Vec<ProjectReport> {
    let mut order = Vec::new();
    let mut totals: HashMap<u64, (ReportRow, f64)> = HashMap::new();

    for row in rows {
        let hours = row_hours(row.start_time.as_deref(), row.end_time.as_deref());
        match totals.get_mut(&row.project_id) {
            Some((_, total)) => *total += hours,
            None => {
                order.push(row.project_id);
                totals.insert(row.project_id, (row, hours));
            }
        }
    }

    order
        .into_iter()
        .filter_map(|id| totals.remove(&id))
        .map(|(row, total)| ProjectReport {
            project_id: row.project_id,
            name: row.name,
            estimated_hours: row.estimated_hours,
            actual_hours: format_hours(total),
            remaining_hours: row
                .estimated_hours
                .map(|estimate| format_hours(f64::from(estimate) - total)),
        })
        .collect()
}

fn row_hours(start: Option<&str>, end: Option<&str>) -> f64 {
    match (start, end) {
        (Some(start), Some(end)) => interval_hours(start, end).unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Groups one week's rows into projects and their team members. Projects
/// nobody logged time on keep an empty team.
fn fold_allocations(rows: Vec<AllocationRow>) -> Vec<ProjectAllocation> {
    let mut projects: Vec<(ProjectAllocation, Vec<f64>)> = Vec::new();

    for row in rows {
        let index = match projects.iter().position(|(p, _)| p.project_id == row.project_id) {
            Some(index) => index,
            None => {
                projects.push((
                    ProjectAllocation {
                        project_id: row.project_id,
                        project_name: row.project_name.clone(),
                        estimated_hours: row.estimated_hours,
                        team: Vec::new(),
                    },
                    Vec::new(),
                ));
                projects.len() - 1
            }
        };
        let Some(employee_id) = row.employee_id else {
            continue;
        };

        let hours = row_hours(row.start_time.as_deref(), row.end_time.as_deref());
        let (project, totals) = &mut projects[index];
        match project.team.iter().position(|m| m.employee_id == employee_id) {
            Some(member) => totals[member] += hours,
            None => {
                let name = format!(
                    "{} {}",
                    row.first_name.unwrap_or_default(),
                    row.last_name.unwrap_or_default()
                );
                project.team.push(TeamMember {
                    employee_id,
                    name: name.trim().to_string(),
                    role: row.role,
                    hours: String::new(),
                });
                totals.push(hours);
            }
        }
    }

    projects
        .into_iter()
        .map(|(mut project, totals)| {
            for (member, total) in project.team.iter_mut().zip(totals) {
                member.hours = format_hours(total);
            }
            project
        })
        .collect()
}

fn status_label(header: &TimesheetHeader) -> &'static str {
    match (header.status, header.submission_date) {
        (Some(TimesheetStatus::Approved), _) => "Approved",
        (Some(TimesheetStatus::Rejected), _) => "Rejected",
        (Some(TimesheetStatus::Pending), _) | (None, Some(_)) => "Pending",
        (None, None) => "Draft",
    }
}

/// Estimated versus logged hours per project of an organization
#[utoipa::path(
    get,
    path = "/api/dashboard/projects/reports",
    params(OrganizationQuery),
    responses(
        (status = 200, description = "Project hour reports", body = [ProjectReport]),
        (status = 403, description = "Not a member of this organization")
    ),
    security(("bearer_auth" = [])),
    tag = "Dashboard"
)]
pub async fn project_reports(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<OrganizationQuery>,
) -> actix_web::Result<impl Responder> {
    require_member(pool.get_ref(), &auth, query.organization_id).await?;

    let rows = sqlx::query_as::<_, ReportRow>(
        r#"
        SELECT p.id AS project_id, p.name, p.estimated_hours, tr.start_time, tr.end_time
        FROM project p
        LEFT JOIN timesheet t ON t.project_id = p.id
        LEFT JOIN time_record tr ON tr.timesheet_id = t.id
        WHERE p.organization_id = ?
        ORDER BY p.name, p.id
        "#,
    )
    .bind(query.organization_id)
    .fetch_all(pool.get_ref())
    .await
    .map_err(db_error("Failed to fetch project reports"))?;

    Ok(HttpResponse::Ok().json(summarize(rows)))
}

/// Who worked on which project during the organization's latest week
#[utoipa::path(
    get,
    path = "/api/dashboard/allocations",
    params(OrganizationQuery),
    responses(
        (status = 200, description = "Team allocation per project", body = AllocationsResponse),
        (status = 403, description = "Not a member of this organization")
    ),
    security(("bearer_auth" = [])),
    tag = "Dashboard"
)]
pub async fn project_allocations(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<OrganizationQuery>,
) -> actix_web::Result<impl Responder> {
    require_member(pool.get_ref(), &auth, query.organization_id).await?;

    let week_start = sqlx::query_scalar::<_, Option<NaiveDate>>(
        r#"
        SELECT MAX(t.start_date_of_the_week)
        FROM timesheet t
        JOIN project p ON p.id = t.project_id
        WHERE p.organization_id = ?
        "#,
    )
    .bind(query.organization_id)
    .fetch_one(pool.get_ref())
    .await
    .map_err(db_error("Failed to find latest week"))?;

    let rows = sqlx::query_as::<_, AllocationRow>(
        r#"
        SELECT
            p.id AS project_id, p.name AS project_name, p.estimated_hours,
            t.employee_id, u.first_name, u.last_name, ou.role,
            tr.start_time, tr.end_time
        FROM project p
        LEFT JOIN timesheet t ON t.project_id = p.id AND t.start_date_of_the_week = ?
        LEFT JOIN users u ON u.id = t.employee_id
        LEFT JOIN organization_user ou
            ON ou.user_id = t.employee_id AND ou.organization_id = p.organization_id
        LEFT JOIN time_record tr ON tr.timesheet_id = t.id
        WHERE p.organization_id = ?
        ORDER BY p.name, p.id, u.last_name, u.first_name, t.employee_id
        "#,
    )
    .bind(week_start)
    .bind(query.organization_id)
    .fetch_all(pool.get_ref())
    .await
    .map_err(db_error("Failed to fetch project allocations"))?;

    Ok(HttpResponse::Ok().json(AllocationsResponse {
        week_start,
        projects: fold_allocations(rows),
    }))
}

/// The caller's three latest timesheets in an organization
#[utoipa::path(
    get,
    path = "/api/dashboard/timesheets/recent",
    params(OrganizationQuery),
    responses(
        (status = 200, description = "Recent timesheets", body = [RecentTimesheet]),
        (status = 403, description = "Not a member of this organization")
    ),
    security(("bearer_auth" = [])),
    tag = "Dashboard"
)]
pub async fn recent_timesheets(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<OrganizationQuery>,
) -> actix_web::Result<impl Responder> {
    require_member(pool.get_ref(), &auth, query.organization_id).await?;

    let headers: Vec<TimesheetHeader> = sqlx::query_as::<_, TimesheetRow>(
        r#"
        SELECT
            t.id, t.project_id, p.name AS project_name, t.employee_id,
            t.start_date_of_the_week, t.submission_date, t.status,
            t.approved_by, t.approved_date, u.first_name, u.last_name
        FROM timesheet t
        JOIN project p ON p.id = t.project_id
        JOIN users u ON u.id = t.employee_id
        WHERE t.employee_id = ? AND p.organization_id = ?
        ORDER BY t.start_date_of_the_week DESC, t.id DESC
        LIMIT 3
        "#,
    )
    .bind(auth.user_id)
    .bind(query.organization_id)
    .fetch_all(pool.get_ref())
    .await
    .map_err(db_error("Failed to fetch recent timesheets"))?
    .into_iter()
    .map(TimesheetHeader::from)
    .collect();

    let records = join_all(headers.iter().map(|h| {
        sqlx::query_as::<_, TimeRecord>(
            "SELECT id, timesheet_id, day, date, start_time, end_time FROM time_record WHERE timesheet_id = ?",
        )
        .bind(h.id)
        .fetch_all(pool.get_ref())
    }))
    .await;

    let mut recent = Vec::with_capacity(headers.len());
    for (header, records) in headers.into_iter().zip(records) {
        let records = records.map_err(db_error("Failed to fetch time records"))?;
        recent.push(RecentTimesheet {
            id: header.id,
            status: status_label(&header).to_string(),
            project_name: header.project_name,
            start_date_of_the_week: header.start_date_of_the_week,
            hours: format_hours(total_hours(&records)),
        });
    }

    Ok(HttpResponse::Ok().json(recent))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(project_id: u64, name: &str, times: Option<(&str, &str)>) -> ReportRow {
        ReportRow {
            project_id,
            name: name.to_string(),
            estimated_hours: Some(40),
            start_time: times.map(|t| t.0.to_string()),
            end_time: times.map(|t| t.1.to_string()),
        }
    }

    #[test]
    fn summarize_sums_record_durations_per_project() {
        let reports = summarize(vec![
            row(1, "Alpha", Some(("08:00", "16:00"))),
            row(1, "Alpha", Some(("09:00", "10:30"))),
            row(2, "Beta", None),
        ]);
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].name, "Alpha");
        assert_eq!(reports[0].actual_hours, "9.50");
        assert_eq!(reports[0].remaining_hours.as_deref(), Some("30.50"));
        assert_eq!(reports[1].actual_hours, "0.00");
        assert_eq!(reports[1].remaining_hours.as_deref(), Some("40.00"));
    }

    #[test]
    fn remaining_hours_go_negative_or_stay_unknown() {
        let mut unestimated = row(2, "Beta", Some(("08:00", "09:00")));
        unestimated.estimated_hours = None;
        let mut small = row(1, "Alpha", Some(("08:00", "18:00")));
        small.estimated_hours = Some(4);

        let reports = summarize(vec![small, unestimated]);
        assert_eq!(reports[0].remaining_hours.as_deref(), Some("-6.00"));
        assert_eq!(reports[1].remaining_hours, None);
    }

    fn allocation(
        project_id: u64,
        employee: Option<(u64, &str, &str)>,
        times: Option<(&str, &str)>,
    ) -> AllocationRow {
        AllocationRow {
            project_id,
            project_name: format!("P{project_id}"),
            estimated_hours: Some(100),
            employee_id: employee.map(|e| e.0),
            first_name: employee.map(|e| e.1.to_string()),
            last_name: Some("Doe".to_string()),
            role: employee.map(|e| e.2.to_string()),
            start_time: times.map(|t| t.0.to_string()),
            end_time: times.map(|t| t.1.to_string()),
        }
    }

    #[test]
    fn allocations_group_members_under_their_project() {
        let projects = fold_allocations(vec![
            allocation(1, Some((7, "John", "worker")), Some(("08:00", "16:00"))),
            allocation(1, Some((7, "John", "worker")), Some(("08:00", "12:30"))),
            allocation(1, Some((8, "Jane", "manager")), None),
            allocation(2, None, None),
            allocation(3, Some((7, "John", "worker")), Some(("13:00", "14:00"))),
        ]);

        assert_eq!(projects.len(), 3);
        let team = &projects[0].team;
        assert_eq!(team.len(), 2);
        assert_eq!(team[0].name, "John Doe");
        assert_eq!(team[0].role.as_deref(), Some("worker"));
        assert_eq!(team[0].hours, "12.50");
        assert_eq!(team[1].hours, "0.00");

        assert_eq!(projects[1].project_name, "P2");
        assert!(projects[1].team.is_empty());
        assert_eq!(projects[2].team[0].hours, "1.00");
    }

    #[test]
    fn summarize_ignores_unparseable_times() {
        let reports = summarize(vec![
            row(3, "Gamma", Some(("oops", "16:00"))),
            row(3, "Gamma", Some(("08:00", "09:00"))),
        ]);
        assert_eq!(reports[0].actual_hours, "1.00");
    }

    #[test]
    fn status_label_covers_unset_status() {
        let mut header = TimesheetHeader {
            id: 1,
            project_id: 1,
            project_name: None,
            employee_id: 1,
            start_date_of_the_week: NaiveDate::from_ymd_opt(2026, 10, 12).unwrap(),
            submission_date: None,
            status: None,
            approved_by: None,
            approved_date: None,
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
        };
        assert_eq!(status_label(&header), "Draft");
        header.submission_date = Some(NaiveDate::from_ymd_opt(2026, 10, 16).unwrap());
        assert_eq!(status_label(&header), "Pending");
        header.status = Some(TimesheetStatus::Approved);
        assert_eq!(status_label(&header), "Approved");
    }
}
