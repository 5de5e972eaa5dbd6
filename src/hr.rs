//! HR collaborator (§6 "HR contract (read)"). Per the spec's stated
//! boundary, OAuth token acquisition is an injected capability
//! (`GetAccessToken`) rather than something this crate implements; the
//! client refreshes once on a 401 and otherwise surfaces persistent
//! failure as `StoreUnavailable` (the spec routes it "as `Unavailable`
//! from Store", since HR-sourced leave is cached there).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::Config;
use crate::errors::{AppError, AppResult};
use crate::models::{LeaveRequest, LeaveStatus};

#[derive(Debug, Clone, Deserialize)]
pub struct Employee {
    pub id: Uuid,
    pub email: String,
}

#[async_trait]
pub trait HrClient: Send + Sync {
    async fn list_employees(&self) -> AppResult<Vec<Employee>>;
    async fn list_approved_leave(&self, employee_id: Uuid, from: NaiveDate, to: NaiveDate) -> AppResult<Vec<LeaveRequest>>;
}

/// Supplies and refreshes bearer tokens for the HR client. Production code
/// wires this to the real OAuth handshake (out of scope here, per §1); the
/// crate only consumes the resulting access token.
#[async_trait]
pub trait GetAccessToken: Send + Sync {
    async fn fetch(&self) -> AppResult<String>;
}

#[derive(Deserialize)]
struct LeaveRecordDto {
    employee_id: Uuid,
    start_date: NaiveDate,
    end_date: NaiveDate,
    status: String,
}

impl From<LeaveRecordDto> for LeaveRequest {
    fn from(d: LeaveRecordDto) -> Self {
        LeaveRequest {
            employee_id: d.employee_id,
            start_date: d.start_date,
            end_date: d.end_date,
            status: match d.status.as_str() {
                "approved" => LeaveStatus::Approved,
                "rejected" => LeaveStatus::Rejected,
                _ => LeaveStatus::Pending,
            },
        }
    }
}

pub struct HttpHrClient {
    client: reqwest::Client,
    base_url: String,
    token_provider: Arc<dyn GetAccessToken>,
    cached_token: RwLock<Option<String>>,
}

impl HttpHrClient {
    pub fn new(config: &Config, token_provider: Arc<dyn GetAccessToken>) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.bulk_call_deadline_secs))
            .user_agent("adviser-allocation/1.0")
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to build HR client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.hr_base_url.trim_end_matches('/').to_string(),
            token_provider,
            cached_token: RwLock::new(None),
        })
    }

    async fn token(&self, force_refresh: bool) -> AppResult<String> {
        if !force_refresh {
            if let Some(t) = self.cached_token.read().await.clone() {
                return Ok(t);
            }
        }
        let fresh = self.token_provider.fetch().await?;
        *self.cached_token.write().await = Some(fresh.clone());
        Ok(fresh)
    }

    async fn get_with_refresh(&self, url: &str) -> AppResult<reqwest::Response> {
        let token = self.token(false).await?;
        let resp = self
            .client
            .get(url)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|_| AppError::StoreUnavailable)?;

        if resp.status() != reqwest::StatusCode::UNAUTHORIZED {
            return Ok(resp);
        }

        // Refresh once (§6: "refreshed on 401 once per call").
        let token = self.token(true).await?;
        self.client
            .get(url)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|_| AppError::StoreUnavailable)
    }
}

#[async_trait]
impl HrClient for HttpHrClient {
    async fn list_employees(&self) -> AppResult<Vec<Employee>> {
        let url = format!("{}/employees", self.base_url);
        let resp = self.get_with_refresh(&url).await?;
        if !resp.status().is_success() {
            return Err(AppError::StoreUnavailable);
        }
        resp.json::<Vec<Employee>>().await.map_err(|_| AppError::StoreUnavailable)
    }

    async fn list_approved_leave(&self, employee_id: Uuid, from: NaiveDate, to: NaiveDate) -> AppResult<Vec<LeaveRequest>> {
        let url = format!("{}/employees/{employee_id}/leave?from={from}&to={to}", self.base_url);
        let resp = self.get_with_refresh(&url).await?;
        if !resp.status().is_success() {
            return Err(AppError::StoreUnavailable);
        }
        let dtos: Vec<LeaveRecordDto> = resp.json().await.map_err(|_| AppError::StoreUnavailable)?;
        Ok(dtos
            .into_iter()
            .map(LeaveRequest::from)
            .filter(|l| l.status == LeaveStatus::Approved)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingTokenSource {
        calls: AtomicU32,
    }

    #[async_trait]
    impl GetAccessToken for CountingTokenSource {
        async fn fetch(&self) -> AppResult<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("token-{n}"))
        }
    }

    #[tokio::test]
    async fn token_is_cached_until_forced_refresh() {
        let source = Arc::new(CountingTokenSource { calls: AtomicU32::new(0) });
        let client = HttpHrClient {
            client: reqwest::Client::new(),
            base_url: "https://hr.example".into(),
            token_provider: source.clone(),
            cached_token: RwLock::new(None),
        };

        let first = client.token(false).await.unwrap();
        let second = client.token(false).await.unwrap();
        assert_eq!(first, second);

        let refreshed = client.token(true).await.unwrap();
        assert_ne!(first, refreshed);
    }
}
