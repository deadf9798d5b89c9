use crate::{
    api::{dashboard, notification, organization, project, time_record, timesheet},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

// Helper to build per-route limiter
fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / requests_per_min as u64).max(1);
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .unwrap_or_default();
    Governor::new(&cfg)
}

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let register_limiter = Arc::new(build_limiter(config.rate_register_per_min));
    let refresh_limiter = Arc::new(build_limiter(config.rate_refresh_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/register")
                    .wrap(register_limiter.clone())
                    .route(web::post().to(handlers::register)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(refresh_limiter.clone())
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(protected_limiter) // rate limiting
            .service(
                web::scope("/project")
                    // /project
                    .service(
                        web::resource("")
                            .route(web::get().to(project::list_projects))
                            .route(web::post().to(project::create_project)),
                    )
                    // /project/manager/{pid}
                    .service(
                        web::resource("/manager/{pid}")
                            .route(web::get().to(project::get_manager_project)),
                    )
                    // /project/{pid}/workers
                    .service(
                        web::resource("/{pid}/workers")
                            .route(web::post().to(project::add_workers))
                            .route(web::delete().to(project::remove_workers)),
                    ),
            )
            .service(
                web::scope("/timesheet")
                    // /timesheet
                    .service(
                        web::resource("")
                            .route(web::get().to(timesheet::list_timesheets))
                            .route(web::post().to(timesheet::create_timesheet))
                            .route(web::delete().to(timesheet::delete_timesheet)),
                    )
                    .service(
                        web::resource("/submit").route(web::patch().to(timesheet::submit_timesheet)),
                    )
                    .service(
                        web::resource("/approve").route(web::post().to(timesheet::approve_timesheet)),
                    )
                    .service(
                        web::resource("/reject").route(web::post().to(timesheet::reject_timesheet)),
                    )
                    // /timesheet/manager/{pid}?start_date=
                    .service(
                        web::resource("/manager/{pid}")
                            .route(web::get().to(timesheet::manager_timesheets)),
                    )
                    // /timesheet/timerecord
                    .service(
                        web::resource("/timerecord")
                            .route(web::get().to(time_record::list_time_records))
                            .route(web::post().to(time_record::upsert_time_record)),
                    )
                    // /timesheet/timerecord/manager/{employee_id}?pid=
                    .service(
                        web::resource("/timerecord/manager/{employee_id}")
                            .route(web::get().to(time_record::tracked_records)),
                    ),
            )
            .service(
                web::resource("/organization/{oid}/users")
                    .route(web::get().to(organization::list_users))
                    .route(web::post().to(organization::add_users))
                    .route(web::delete().to(organization::remove_users)),
            )
            .service(
                web::scope("/dashboard")
                    .service(
                        web::resource("/projects/reports")
                            .route(web::get().to(dashboard::project_reports)),
                    )
                    .service(
                        web::resource("/timesheets/recent")
                            .route(web::get().to(dashboard::recent_timesheets)),
                    )
                    .service(
                        web::resource("/allocations")
                            .route(web::get().to(dashboard::project_allocations)),
                    ),
            )
            .service(
                web::scope("/notification")
                    // /notification/{user_id}
                    .service(
                        web::resource("/{user_id}")
                            .route(web::get().to(notification::list_notifications)),
                    )
                    // /notification/{id}/read
                    .service(
                        web::resource("/{id}/read")
                            .route(web::patch().to(notification::mark_read)),
                    ),
            ),
    );
}

// LOGIN
//  ├─ access_token (15 min)
//  └─ refresh_token (7 days)

// API REQUEST
//  └─ Authorization: Bearer access_token

// ACCESS EXPIRED
//  └─ POST /auth/refresh with refresh_token
//       └─ returns new access_token + refresh_token, old one revoked

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{generate_access_token, generate_refresh_token};
    use crate::model::role::Role;
    use actix_web::{App, http::StatusCode, test, web::Data};
    use serde_json::json;
    use sqlx::mysql::MySqlPoolOptions;
    use std::net::SocketAddr;

    const SECRET: &str = "test-secret";

    fn test_config() -> Config {
        Config {
            database_url: "mysql://nobody@127.0.0.1:1/none".to_string(),
            jwt_secret: SECRET.to_string(),
            server_addr: "127.0.0.1:0".to_string(),
            access_token_ttl: 900,
            refresh_token_ttl: 604_800,
            rate_login_per_min: 60,
            rate_register_per_min: 30,
            rate_refresh_per_min: 30,
            rate_protected_per_min: 1000,
            api_prefix: "/api".to_string(),
            log_dir: "logs".to_string(),
        }
    }

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    fn token(role: Role) -> String {
        generate_access_token(42, "jdoe".to_string(), role.id(), SECRET, 900).unwrap()
    }

    macro_rules! app {
        () => {{
            let config = test_config();
            // never connects; every request below is answered before a query runs
            let pool = MySqlPoolOptions::new()
                .connect_lazy(&config.database_url)
                .unwrap();
            test::init_service(
                App::new()
                    .app_data(Data::new(pool))
                    .app_data(Data::new(config.clone()))
                    .configure(|cfg| configure(cfg, config.clone())),
            )
            .await
        }};
    }

    #[actix_web::test]
    async fn protected_routes_require_a_token() {
        let app = app!();
        let req = test::TestRequest::get()
            .uri("/api/project")
            .peer_addr(peer())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn refresh_tokens_cannot_call_the_api() {
        let app = app!();
        let (refresh, _) =
            generate_refresh_token(42, "jdoe".to_string(), Role::Manager.id(), SECRET, 60).unwrap();
        let req = test::TestRequest::get()
            .uri("/api/timesheet/manager/1?start_date=2026-10-12")
            .peer_addr(peer())
            .insert_header(("Authorization", format!("Bearer {refresh}")))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn workers_cannot_approve() {
        let app = app!();
        let req = test::TestRequest::post()
            .uri("/api/timesheet/approve")
            .peer_addr(peer())
            .insert_header(("Authorization", format!("Bearer {}", token(Role::Worker))))
            .set_json(json!({"id": 4, "approved": true, "approved_date": null}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn workers_cannot_reject() {
        let app = app!();
        let req = test::TestRequest::post()
            .uri("/api/timesheet/reject")
            .peer_addr(peer())
            .insert_header(("Authorization", format!("Bearer {}", token(Role::Worker))))
            .set_json(json!({"id": 4}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn organization_users_are_admin_only() {
        let app = app!();
        let req = test::TestRequest::get()
            .uri("/api/organization/1/users")
            .peer_addr(peer())
            .insert_header(("Authorization", format!("Bearer {}", token(Role::Manager))))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn inverted_time_record_is_rejected() {
        let app = app!();
        let req = test::TestRequest::post()
            .uri("/api/timesheet/timerecord")
            .peer_addr(peer())
            .insert_header(("Authorization", format!("Bearer {}", token(Role::Worker))))
            .set_json(json!({
                "timesheet_id": 4,
                "day": "Monday",
                "start_time": "16:00",
                "end_time": "08:00"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "start_time must be before end_time");
    }

    #[actix_web::test]
    async fn notifications_of_another_user_are_forbidden() {
        let app = app!();
        let req = test::TestRequest::get()
            .uri("/api/notification/7")
            .peer_addr(peer())
            .insert_header(("Authorization", format!("Bearer {}", token(Role::Manager))))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn refresh_without_token_is_unauthorized() {
        let app = app!();
        let req = test::TestRequest::post()
            .uri("/auth/refresh")
            .peer_addr(peer())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn limiter_accepts_zero_rate() {
        let _ = build_limiter(0);
    }
}
