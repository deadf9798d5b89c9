use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use futures::lock::Mutex;
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::client::error::ClientError;

/// Token pair as returned by `/auth/login` and `/auth/refresh`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ClientError>;
}

/// Refreshes through the server's `/auth/refresh` endpoint.
pub struct HttpTokenRefresher {
    http: reqwest::Client,
    url: String,
}

impl HttpTokenRefresher {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            url: format!("{}/auth/refresh", base_url.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ClientError> {
        let response = self
            .http
            .post(&self.url)
            .header(AUTHORIZATION, format!("Bearer {refresh_token}"))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Auth(format!("refresh rejected ({status}): {body}")));
        }

        Ok(response.json::<TokenPair>().await?)
    }
}

struct Tokens {
    access_token: String,
    refresh_token: String,
    expires_at: DateTime<Utc>,
}

impl Tokens {
    fn from_pair(pair: TokenPair, now: DateTime<Utc>) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            expires_at: now + Duration::seconds(pair.expires_in),
        }
    }
}

/// Credentials shared by every authenticated call.
pub struct AuthSession {
    tokens: Mutex<Tokens>,
    refresher: Arc<dyn TokenRefresher>,
}

impl AuthSession {
    pub fn new(pair: TokenPair, refresher: Arc<dyn TokenRefresher>) -> Self {
        Self {
            tokens: Mutex::new(Tokens::from_pair(pair, Utc::now())),
            refresher,
        }
    }

    /// Current access token, refreshed first if the cached expiry has passed.
    /// Concurrent callers wait on the same refresh.
    pub async fn access_token(&self) -> Result<String, ClientError> {
        let mut tokens = self.tokens.lock().await;
        let now = Utc::now();

        if tokens.expires_at <= now {
            debug!(expired_at = %tokens.expires_at, "Access token expired, refreshing");
            let pair = self.refresher.refresh(&tokens.refresh_token).await?;
            *tokens = Tokens::from_pair(pair, now);
            info!("Access token refreshed");
        }

        Ok(tokens.access_token.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingRefresher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TokenRefresher for CountingRefresher {
        async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ClientError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(TokenPair {
                access_token: format!("access-{n}"),
                refresh_token: format!("{refresh_token}+"),
                expires_in: 900,
            })
        }
    }

    struct RejectingRefresher;

    #[async_trait]
    impl TokenRefresher for RejectingRefresher {
        async fn refresh(&self, _: &str) -> Result<TokenPair, ClientError> {
            Err(ClientError::Auth("revoked".into()))
        }
    }

    fn pair(expires_in: i64) -> TokenPair {
        TokenPair {
            access_token: "access-0".into(),
            refresh_token: "refresh".into(),
            expires_in,
        }
    }

    #[actix_web::test]
    async fn valid_token_is_reused() {
        let refresher = Arc::new(CountingRefresher::default());
        let session = AuthSession::new(pair(900), refresher.clone());

        assert_eq!(session.access_token().await.unwrap(), "access-0");
        assert_eq!(session.access_token().await.unwrap(), "access-0");
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 0);
    }

    #[actix_web::test]
    async fn expired_token_is_refreshed_once() {
        let refresher = Arc::new(CountingRefresher::default());
        let session = AuthSession::new(pair(0), refresher.clone());

        assert_eq!(session.access_token().await.unwrap(), "access-1");
        assert_eq!(session.access_token().await.unwrap(), "access-1");
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
    }

    #[actix_web::test]
    async fn refresh_failure_is_reported() {
        let session = AuthSession::new(pair(-5), Arc::new(RejectingRefresher));
        assert!(matches!(
            session.access_token().await,
            Err(ClientError::Auth(_))
        ));
    }
}
