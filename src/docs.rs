use crate::api::dashboard::{
    AllocationsResponse, ProjectAllocation, ProjectReport, RecentTimesheet, TeamMember,
};
use crate::api::notification::NotificationListResponse;
use crate::api::organization::{
    AddMembers, MembershipResponse, MembershipResults, OrganizationMember,
    OrganizationUsersResponse, RemoveMembers,
};
use crate::api::project::{CreateProject, WorkerChanges, WorkerIds};
use crate::api::time_record::{TimeRecordListResponse, UpsertTimeRecord};
use crate::api::timesheet::{CreateTimesheet, SubmitTimesheet, TimesheetListResponse};
use crate::auth::handlers::TokenResponse;
use crate::model::notification::{Notification, NotificationKind};
use crate::model::project::Project;
use crate::model::time_record::TimeRecord;
use crate::model::timesheet::{TimesheetHeader, TimesheetStatus, TransitionResponse};
use crate::model::user::OrganizationUser;
use crate::models::{LoginReqDto, RegisterReq};
use crate::workflow::approval::{ApproveRequest, RejectRequest};
use utoipa::Modify;
use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Timesheet API",
        version = "1.0.0",
        description = r#"
## Timesheet Tracking

Employees log clock-in/clock-out intervals on weekly timesheets, project
managers review and approve them, admins manage organization membership.

### Key Features
- **Timesheets**
  - Open, list, submit and delete weekly timesheets
- **Time records**
  - Record `HH:MM` intervals per weekday
- **Approval**
  - Weekly manager view, tracked hours per employee, approve / reopen / reject
- **Organization**
  - Add and remove members with a role
- **Dashboard**
  - Estimated versus logged hours, recent timesheets, team allocations
- **Notifications**
  - Submission and review events linking to the affected week

### Security
Everything under `/api` requires a **JWT Bearer** access token obtained from
`/auth/login` and rotated through `/auth/refresh`.

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::auth::handlers::register,
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,

        crate::api::project::get_manager_project,
        crate::api::project::list_projects,
        crate::api::project::create_project,
        crate::api::project::add_workers,
        crate::api::project::remove_workers,

        crate::api::timesheet::manager_timesheets,
        crate::api::timesheet::approve_timesheet,
        crate::api::timesheet::reject_timesheet,
        crate::api::timesheet::create_timesheet,
        crate::api::timesheet::list_timesheets,
        crate::api::timesheet::delete_timesheet,
        crate::api::timesheet::submit_timesheet,

        crate::api::time_record::list_time_records,
        crate::api::time_record::upsert_time_record,
        crate::api::time_record::tracked_records,

        crate::api::organization::list_users,
        crate::api::organization::add_users,
        crate::api::organization::remove_users,

        crate::api::dashboard::project_reports,
        crate::api::dashboard::recent_timesheets,
        crate::api::dashboard::project_allocations,

        crate::api::notification::list_notifications,
        crate::api::notification::mark_read
    ),
    components(
        schemas(
            RegisterReq,
            LoginReqDto,
            TokenResponse,
            Project,
            CreateProject,
            WorkerIds,
            WorkerChanges,
            TimesheetHeader,
            TimesheetStatus,
            TimesheetListResponse,
            CreateTimesheet,
            SubmitTimesheet,
            ApproveRequest,
            RejectRequest,
            TransitionResponse,
            TimeRecord,
            UpsertTimeRecord,
            TimeRecordListResponse,
            OrganizationUser,
            OrganizationMember,
            AddMembers,
            RemoveMembers,
            OrganizationUsersResponse,
            MembershipResults,
            MembershipResponse,
            ProjectReport,
            RecentTimesheet,
            TeamMember,
            ProjectAllocation,
            AllocationsResponse,
            Notification,
            NotificationKind,
            NotificationListResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Registration, login and token rotation"),
        (name = "Project", description = "Project management APIs"),
        (name = "Timesheet", description = "Weekly timesheet APIs"),
        (name = "TimeRecord", description = "Time record APIs"),
        (name = "Approval", description = "Manager approval APIs"),
        (name = "Organization", description = "Organization membership APIs"),
        (name = "Dashboard", description = "Dashboard reporting APIs"),
        (name = "Notification", description = "Notification feed APIs"),
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme referenced by the protected paths.
pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            let mut scheme = Http::new(HttpAuthScheme::Bearer);
            scheme.bearer_format = Some("JWT".to_string());
            components.add_security_scheme("bearer_auth", SecurityScheme::Http(scheme));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_approval_paths() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/timesheet/approve"));
        assert!(doc.paths.paths.contains_key("/api/timesheet/manager/{pid}"));
        assert!(
            doc.paths
                .paths
                .contains_key("/api/timesheet/timerecord/manager/{employee_id}")
        );
    }

    #[test]
    fn document_lists_allocation_and_notification_paths() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/dashboard/allocations"));
        assert!(doc.paths.paths.contains_key("/api/notification/{user_id}"));
        assert!(doc.paths.paths.contains_key("/api/notification/{id}/read"));
    }

    #[test]
    fn bearer_scheme_is_registered() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
