use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Method, RequestBuilder, header::AUTHORIZATION};
use serde::{
    Deserialize, Serialize,
    de::{DeserializeOwned, IgnoredAny},
};
use tracing::debug;

use crate::client::{error::ClientError, session::AuthSession};
use crate::model::{
    notification::Notification,
    project::Project,
    time_record::TimeRecord,
    timesheet::{TimesheetHeader, TransitionResponse},
};
use crate::workflow::{
    approval::{ApproveRequest, RejectRequest},
    reconcile::TrackedKey,
};

/// Backend calls the approval screen depends on.
#[async_trait]
pub trait TimesheetApi: Send + Sync {
    async fn project(&self, project_id: u64) -> Result<Project, ClientError>;

    async fn manager_timesheets(
        &self,
        project_id: u64,
        week_start: NaiveDate,
    ) -> Result<Vec<TimesheetHeader>, ClientError>;

    async fn time_records(&self, timesheet_id: u64) -> Result<Vec<TimeRecord>, ClientError>;

    async fn tracked_records(&self, key: TrackedKey) -> Result<Vec<TimeRecord>, ClientError>;

    async fn approve(&self, request: &ApproveRequest) -> Result<TransitionResponse, ClientError>;

    async fn reject(&self, request: &RejectRequest) -> Result<TransitionResponse, ClientError>;

    /// Creates the record, or updates it when `record.id` is set. Returns
    /// the record id.
    async fn upsert_time_record(&self, record: &TimeRecord) -> Result<u64, ClientError>;

    async fn notifications(&self, user_id: u64) -> Result<Vec<Notification>, ClientError>;

    async fn mark_notification_read(&self, notification_id: u64) -> Result<(), ClientError>;
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server origin, e.g. `http://localhost:8080`.
    pub base_url: String,
    /// Prefix of the protected routes, `/api` by default on the server.
    pub api_prefix: String,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_prefix: "/api".to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}{}{}",
            self.base_url.trim_end_matches('/'),
            self.api_prefix.trim_end_matches('/'),
            path
        )
    }
}

#[derive(Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

#[derive(Deserialize)]
struct SavedRecord {
    id: u64,
}

/// [`TimesheetApi`] over HTTP with bearer authentication.
pub struct HttpTimesheetApi {
    http: reqwest::Client,
    config: ClientConfig,
    session: Arc<AuthSession>,
}

impl HttpTimesheetApi {
    pub fn new(http: reqwest::Client, config: ClientConfig, session: Arc<AuthSession>) -> Self {
        Self {
            http,
            config,
            session,
        }
    }

    async fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        let token = self.session.access_token().await?;
        Ok(self
            .http
            .request(method, self.config.url(path))
            .header(AUTHORIZATION, format!("Bearer {token}")))
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ClientError> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(%status, bytes = body.len(), "Response received");

        if !status.is_success() {
            return Err(ClientError::Status { status, body });
        }
        Ok(serde_json::from_str(&body)?)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ClientError> {
        let builder = self.request(Method::GET, path).await?.query(query);
        self.send(builder).await
    }

    async fn post<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let builder = self.request(Method::POST, path).await?.json(body);
        self.send(builder).await
    }
}

#[async_trait]
impl TimesheetApi for HttpTimesheetApi {
    async fn project(&self, project_id: u64) -> Result<Project, ClientError> {
        self.get(&format!("/project/manager/{project_id}"), &[]).await
    }

    async fn manager_timesheets(
        &self,
        project_id: u64,
        week_start: NaiveDate,
    ) -> Result<Vec<TimesheetHeader>, ClientError> {
        let envelope: DataEnvelope<Vec<TimesheetHeader>> = self
            .get(
                &format!("/timesheet/manager/{project_id}"),
                &[("start_date", week_start.format("%Y-%m-%d").to_string())],
            )
            .await?;
        Ok(envelope.data)
    }

    async fn time_records(&self, timesheet_id: u64) -> Result<Vec<TimeRecord>, ClientError> {
        self.get(
            "/timesheet/timerecord",
            &[("timesheet_id", timesheet_id.to_string())],
        )
        .await
    }

    async fn tracked_records(&self, key: TrackedKey) -> Result<Vec<TimeRecord>, ClientError> {
        let envelope: DataEnvelope<Vec<TimeRecord>> = self
            .get(
                &format!("/timesheet/timerecord/manager/{}", key.employee_id),
                &[("pid", key.project_id.to_string())],
            )
            .await?;
        Ok(envelope.data)
    }

    async fn approve(&self, request: &ApproveRequest) -> Result<TransitionResponse, ClientError> {
        self.post("/timesheet/approve", request).await
    }

    async fn reject(&self, request: &RejectRequest) -> Result<TransitionResponse, ClientError> {
        self.post("/timesheet/reject", request).await
    }

    async fn upsert_time_record(&self, record: &TimeRecord) -> Result<u64, ClientError> {
        let saved: SavedRecord = self.post("/timesheet/timerecord", record).await?;
        Ok(saved.id)
    }

    async fn notifications(&self, user_id: u64) -> Result<Vec<Notification>, ClientError> {
        let envelope: DataEnvelope<Vec<Notification>> =
            self.get(&format!("/notification/{user_id}"), &[]).await?;
        Ok(envelope.data)
    }

    async fn mark_notification_read(&self, notification_id: u64) -> Result<(), ClientError> {
        let builder = self
            .request(Method::PATCH, &format!("/notification/{notification_id}/read"))
            .await?;
        let _: IgnoredAny = self.send(builder).await?;
        Ok(())
    }
}
