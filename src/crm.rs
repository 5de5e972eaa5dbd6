//! CRM collaborator (§6 "CRM contract (read/write)"). `CrmClient` is a trait
//! so the Allocator can be exercised against a deterministic test double
//! without a live CRM; `HttpCrmClient` is the `reqwest`-backed production
//! implementation, grounded on the same `http_client()` + status-mapping
//! shape the teacher uses for its ARASAAC integration.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use crate::config::Config;
use crate::errors::{AppError, AppResult};
use crate::models::{Adviser, Deal, Meeting};

/// Outcome of `SetDealOwner` (§6): `Transient` is retried internally by the
/// client, `Permanent` surfaces immediately as `CrmUpdateFailed`.
#[derive(Debug)]
pub enum CrmUpdateOutcome {
    Ok,
    Transient(String),
    Permanent(String),
}

#[async_trait]
pub trait CrmClient: Send + Sync {
    async fn get_deal(&self, deal_id: Uuid) -> AppResult<Deal>;
    async fn list_advisers(&self) -> AppResult<Vec<Adviser>>;
    async fn list_meetings(&self, adviser_id: Uuid, from: NaiveDate, to: NaiveDate) -> AppResult<Vec<Meeting>>;
    async fn list_deals_without_first_meeting(&self, adviser_id: Uuid, before: NaiveDate) -> AppResult<Vec<Deal>>;

    /// Performs the owner update with internal retry/backoff for `Transient`
    /// failures (§5 step 5: base 0.5s, factor 2, cap 4s, 3 attempts). Returns
    /// `CrmUpdateFailed` only once retries are exhausted or the CRM reports
    /// a `Permanent` rejection.
    async fn set_deal_owner(&self, config: &Config, deal_id: Uuid, adviser_id: Uuid) -> AppResult<()> {
        let mut attempt = 0u32;
        let mut delay_ms = config.crm_retry_base_ms;

        loop {
            attempt += 1;
            match self.set_deal_owner_once(deal_id, adviser_id).await {
                CrmUpdateOutcome::Ok => return Ok(()),
                CrmUpdateOutcome::Permanent(reason) => return Err(AppError::CrmUpdateFailed(reason)),
                CrmUpdateOutcome::Transient(reason) => {
                    if attempt >= config.crm_retry_attempts {
                        return Err(AppError::CrmUpdateFailed(reason));
                    }
                    tracing::warn!(deal_id = %deal_id, attempt, reason = %reason, "crm owner update transient failure, retrying");
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    delay_ms = (delay_ms * config.crm_retry_factor).min(config.crm_retry_cap_ms);
                }
            }
        }
    }

    async fn set_deal_owner_once(&self, deal_id: Uuid, adviser_id: Uuid) -> CrmUpdateOutcome;
}

pub struct HttpCrmClient {
    client: reqwest::Client,
    /// Separate client for the bulk list operations (§5: "30s for bulk list
    /// operations" vs the 10s single-record deadline `client` carries).
    bulk_client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct CrmDealDto {
    id: Uuid,
    service_package: String,
    household_type: Option<String>,
    agreement_start_date: Option<NaiveDate>,
    owner_id: Option<Uuid>,
    has_clarify: bool,
}

impl From<CrmDealDto> for Deal {
    fn from(d: CrmDealDto) -> Self {
        Deal {
            id: d.id,
            service_package: d.service_package,
            household_type: d.household_type,
            agreement_start_date: d.agreement_start_date,
            owner_id: d.owner_id,
            has_clarify: d.has_clarify,
        }
    }
}

impl HttpCrmClient {
    pub fn new(config: &Config) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.store_call_deadline_secs))
            .user_agent("adviser-allocation/1.0")
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to build CRM client: {e}")))?;

        let bulk_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.bulk_call_deadline_secs))
            .user_agent("adviser-allocation/1.0")
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to build CRM bulk client: {e}")))?;

        Ok(Self {
            client,
            bulk_client,
            base_url: config.crm_base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl CrmClient for HttpCrmClient {
    async fn get_deal(&self, deal_id: Uuid) -> AppResult<Deal> {
        let url = format!("{}/deals/{deal_id}", self.base_url);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|_| AppError::CrmUnavailable)?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(AppError::DealNotFound);
        }
        if !resp.status().is_success() {
            return Err(AppError::CrmUnavailable);
        }

        let dto: CrmDealDto = resp.json().await.map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
        Ok(dto.into())
    }

    async fn list_advisers(&self) -> AppResult<Vec<Adviser>> {
        let url = format!("{}/advisers", self.base_url);
        let resp = self
            .bulk_client
            .get(&url)
            .send()
            .await
            .map_err(|_| AppError::CrmUnavailable)?;

        if !resp.status().is_success() {
            return Err(AppError::CrmUnavailable);
        }

        resp.json::<Vec<Adviser>>()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))
    }

    async fn list_meetings(&self, adviser_id: Uuid, from: NaiveDate, to: NaiveDate) -> AppResult<Vec<Meeting>> {
        let url = format!("{}/advisers/{adviser_id}/meetings?from={from}&to={to}", self.base_url);
        let resp = self
            .bulk_client
            .get(&url)
            .send()
            .await
            .map_err(|_| AppError::CrmUnavailable)?;

        if !resp.status().is_success() {
            return Err(AppError::CrmUnavailable);
        }

        resp.json::<Vec<Meeting>>()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))
    }

    async fn list_deals_without_first_meeting(&self, adviser_id: Uuid, before: NaiveDate) -> AppResult<Vec<Deal>> {
        let url = format!(
            "{}/advisers/{adviser_id}/deals_without_first_meeting?before={before}",
            self.base_url
        );
        let resp = self
            .bulk_client
            .get(&url)
            .send()
            .await
            .map_err(|_| AppError::CrmUnavailable)?;

        if !resp.status().is_success() {
            return Err(AppError::CrmUnavailable);
        }

        let dtos: Vec<CrmDealDto> = resp.json().await.map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
        Ok(dtos.into_iter().map(Deal::from).collect())
    }

    async fn set_deal_owner_once(&self, deal_id: Uuid, adviser_id: Uuid) -> CrmUpdateOutcome {
        let url = format!("{}/deals/{deal_id}/owner", self.base_url);
        let resp = match self.client.put(&url).json(&serde_json::json!({ "owner_id": adviser_id })).send().await {
            Ok(r) => r,
            Err(e) => return CrmUpdateOutcome::Transient(e.to_string()),
        };

        let status = resp.status();
        if status.is_success() {
            return CrmUpdateOutcome::Ok;
        }
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return CrmUpdateOutcome::Transient(format!("crm returned {status}"));
        }
        CrmUpdateOutcome::Permanent(format!("crm rejected owner update: {status}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct FlakyThenOk {
        fail_count: Arc<AtomicU32>,
    }

    #[async_trait]
    impl CrmClient for FlakyThenOk {
        async fn get_deal(&self, _deal_id: Uuid) -> AppResult<Deal> {
            unimplemented!()
        }
        async fn list_advisers(&self) -> AppResult<Vec<Adviser>> {
            unimplemented!()
        }
        async fn list_meetings(&self, _a: Uuid, _f: NaiveDate, _t: NaiveDate) -> AppResult<Vec<Meeting>> {
            unimplemented!()
        }
        async fn list_deals_without_first_meeting(&self, _a: Uuid, _b: NaiveDate) -> AppResult<Vec<Deal>> {
            unimplemented!()
        }
        async fn set_deal_owner_once(&self, _deal_id: Uuid, _adviser_id: Uuid) -> CrmUpdateOutcome {
            let remaining = self.fail_count.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                if n == 0 { None } else { Some(n - 1) }
            });
            if remaining.is_ok() {
                CrmUpdateOutcome::Transient("simulated transient failure".into())
            } else {
                CrmUpdateOutcome::Ok
            }
        }
    }

    fn test_config() -> Config {
        Config {
            db_host: String::new(),
            db_port: 0,
            db_name: String::new(),
            db_user: String::new(),
            db_password: String::new(),
            backend_host: String::new(),
            backend_port: 0,
            app_env: "test".into(),
            crm_base_url: String::new(),
            hr_base_url: String::new(),
            smtp_host: String::new(),
            smtp_port: 0,
            smtp_user: String::new(),
            smtp_password: String::new(),
            smtp_from: String::new(),
            horizon_weeks: 52,
            buffer_weeks: 2,
            default_prestart_weeks: 3,
            max_concurrent_adviser_lookups: 16,
            crm_retry_attempts: 3,
            crm_retry_base_ms: 1,
            crm_retry_factor: 2,
            crm_retry_cap_ms: 4,
            store_call_deadline_secs: 10,
            bulk_call_deadline_secs: 30,
            allocation_deadline_secs: 60,
            cache_ttl_secs: 300,
        }
    }

    #[tokio::test]
    async fn retries_transient_failures_then_succeeds() {
        let client = FlakyThenOk { fail_count: Arc::new(AtomicU32::new(2)) };
        let result = client.set_deal_owner(&test_config(), Uuid::new_v4(), Uuid::new_v4()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn exhausts_retries_and_surfaces_crm_update_failed() {
        let client = FlakyThenOk { fail_count: Arc::new(AtomicU32::new(10)) };
        let result = client.set_deal_owner(&test_config(), Uuid::new_v4(), Uuid::new_v4()).await;
        assert!(matches!(result, Err(AppError::CrmUpdateFailed(_))));
    }
}
