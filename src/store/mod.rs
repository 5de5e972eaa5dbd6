//! Store (§4.2 C1) — typed read/write access to every entity this service
//! itself owns: HR-sourced leave (cached per §3, "Source: HR sync (cached
//! in Store)"), admin-owned closures/overrides, allocation records, and
//! system settings. Adviser/Meeting/Deal are CRM-sourced and read through
//! `crm::CrmClient` instead — the Store never mirrors them (§1 non-goal:
//! "CRM/HR/document-store client code beyond the minimal read/write
//! contracts listed in §6"). Each method maps SQL rows into the domain
//! types in `models`, folds `sqlx::Error` into `AppError` (optional lookups
//! are coerced to empty/`None` at the call site), and is safe to call
//! concurrently — the pool handles connection multiplexing, and the cache
//! in front of overrides/closures is its own `Mutex`-guarded state.
//!
//! Every call-site additionally carries a per-call deadline (§5: "each
//! outbound Store/CRM call carries a per-call deadline"), enforced by
//! [`Store::call`]/[`Store::call_bulk`] rather than relying on the pool ever
//! hanging forever on its own.

pub mod allocations;
pub mod closures;
pub mod leave;
pub mod overrides;
pub mod settings;

use std::future::Future;
use std::time::Duration;

use crate::cache::TtlCache;
use crate::config::Config;
use crate::db::Db;
use crate::errors::{AppError, AppResult};
use crate::models::{CapacityOverride, OfficeClosure};

/// Bundles the DB pool with the bounded, TTL'd caches that sit in front of
/// the hottest read paths (active override lookup, closure lists) — every
/// Capacity Engine invocation for every eligible adviser hits these — plus
/// the per-call deadlines applied to every query this module issues.
pub struct Store {
    pub pool: Db,
    overrides_cache: TtlCache<Option<CapacityOverride>>,
    closures_cache: TtlCache<Vec<OfficeClosure>>,
    /// §5 default (10s): single-row reads/writes.
    store_deadline: Duration,
    /// §5 default (30s): multi-row list reads.
    bulk_deadline: Duration,
}

impl Store {
    pub fn new(pool: Db, config: &Config) -> Self {
        let ttl = Duration::from_secs(config.cache_ttl_secs);
        Self {
            pool,
            overrides_cache: TtlCache::new(ttl),
            closures_cache: TtlCache::new(ttl),
            store_deadline: Duration::from_secs(config.store_call_deadline_secs),
            bulk_deadline: Duration::from_secs(config.bulk_call_deadline_secs),
        }
    }

    /// Called by the Admin API on every closure/override write so the next
    /// Capacity Engine read observes it immediately rather than waiting out
    /// the TTL (§4.6: "Writes are immediately visible to subsequent Capacity
    /// Engine invocations").
    pub fn invalidate_overrides(&self, adviser_email: &str) {
        self.overrides_cache.invalidate_prefix(&format!("override:{adviser_email}:"));
    }

    pub fn invalidate_closures(&self) {
        self.closures_cache.invalidate_prefix("closures:");
    }

    /// Runs a single query future under the single-row deadline, folding a
    /// timeout into `StoreUnavailable` (§7: "Datastore transient failure" ->
    /// 503, retryable) and any `sqlx::Error` through the usual `From` impl.
    async fn call<T, Fut>(&self, fut: Fut) -> AppResult<T>
    where
        Fut: Future<Output = Result<T, sqlx::Error>>,
    {
        self.call_with_deadline(self.store_deadline, fut).await
    }

    /// Same as [`Store::call`], but under the bulk-list deadline (§5: "30s
    /// for bulk list operations").
    async fn call_bulk<T, Fut>(&self, fut: Fut) -> AppResult<T>
    where
        Fut: Future<Output = Result<T, sqlx::Error>>,
    {
        self.call_with_deadline(self.bulk_deadline, fut).await
    }

    async fn call_with_deadline<T, Fut>(&self, deadline: Duration, fut: Fut) -> AppResult<T>
    where
        Fut: Future<Output = Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout(deadline, fut).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(AppError::StoreUnavailable),
        }
    }
}

/// Shared eligibility filter applied to the CRM's adviser list by both the
/// Allocator and the `/availability/*` read views.
#[derive(Debug, Clone, Default)]
pub struct AdviserFilter {
    pub service_package: Option<String>,
    pub household_type: Option<String>,
    pub include_not_taking: bool,
}

impl AdviserFilter {
    pub fn matches(&self, adviser: &crate::models::Adviser) -> bool {
        if !self.include_not_taking && !adviser.taking_on_clients {
            return false;
        }
        if let Some(sp) = &self.service_package {
            if !adviser.service_packages.contains(sp) {
                return false;
            }
        }
        if let Some(ht) = &self.household_type {
            if !adviser.household_types.contains(ht) {
                return false;
            }
        }
        true
    }
}
