//! Allocator (§4.5 C5). End-to-end deal handling: eligibility filter,
//! bounded concurrent fan-out of Capacity Engine + Earliest-Week Selector
//! across eligible advisers, tie-break selection, CRM owner update,
//! idempotent persistence, and a best-effort notification hook.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::calendar::monday_of;
use crate::capacity::{compute_capacity_rows, CapacityInputs, WeekRow};
use crate::config::Config;
use crate::crm::CrmClient;
use crate::errors::{AppError, AppResult};
use crate::models::{AllocationRecord, ClosureScope};
use crate::notifier::{AllocationNotification, Notifier};
use crate::selector::{earliest_available_week, EarliestWeekResult};
use crate::store::{AdviserFilter, Store};

/// Detects the §5 cancellation scenario: the CRM owner update already
/// succeeded, so a future dropped (e.g. by the outer allocation deadline)
/// before `disarm()` is called leaves the CRM and the store out of sync.
/// `Drop` logs that inconsistency; the normal return paths call `disarm()`
/// first so nothing fires when the write actually completes.
struct InconsistencyGuard {
    deal_id: Uuid,
    adviser_id: Uuid,
    armed: bool,
}

impl InconsistencyGuard {
    fn new(deal_id: Uuid, adviser_id: Uuid) -> Self {
        Self { deal_id, adviser_id, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for InconsistencyGuard {
    fn drop(&mut self) {
        if self.armed {
            tracing::error!(
                deal_id = %self.deal_id,
                adviser_id = %self.adviser_id,
                "inconsistency: crm owner update succeeded but allocation record write was cancelled"
            );
        }
    }
}

pub struct RequesterMetadata {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

pub struct AllocateRequest {
    pub deal_id: Uuid,
    pub service_package: Option<String>,
    pub household_type: Option<String>,
    pub requester: RequesterMetadata,
}

pub struct AllocateOutcome {
    pub record: AllocationRecord,
    pub adviser_email: String,
    pub earliest_available_week: NaiveDate,
}

struct Candidate {
    adviser_id: Uuid,
    adviser_email: String,
    result: EarliestWeekResult,
    rows: Vec<WeekRow>,
}

pub struct Allocator {
    store: Arc<Store>,
    crm: Arc<dyn CrmClient>,
    notifier: Arc<dyn Notifier>,
    config: Config,
}

impl Allocator {
    pub fn new(store: Arc<Store>, crm: Arc<dyn CrmClient>, notifier: Arc<dyn Notifier>, config: Config) -> Self {
        Self { store, crm, notifier, config }
    }

    pub async fn allocate(&self, req: AllocateRequest, now: NaiveDateTime) -> AppResult<AllocateOutcome> {
        let today = now.date();

        // Step 1: fetch deal.
        let deal = self.crm.get_deal(req.deal_id).await?;
        let service_package = req.service_package.unwrap_or_else(|| deal.service_package.clone());
        let household_type = req.household_type.or_else(|| deal.household_type.clone());

        // Step 2: eligibility filter.
        let filter = AdviserFilter {
            service_package: Some(service_package.clone()),
            household_type: household_type.clone(),
            include_not_taking: false,
        };
        let advisers: Vec<_> = self
            .crm
            .list_advisers()
            .await?
            .into_iter()
            .filter(|a| filter.matches(a))
            .collect();

        if advisers.is_empty() {
            return Err(AppError::NoEligibleAdvisers);
        }

        // Step 3: bounded concurrent per-adviser computation.
        let prestart_weeks = self.store.get_prestart_weeks(self.config.default_prestart_weeks).await?;
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_adviser_lookups.min(advisers.len().max(1))));
        let baseline = monday_of(today);
        let horizon_end = baseline + chrono::Duration::weeks(self.config.horizon_weeks as i64);

        let mut join_set = JoinSet::new();
        for adviser in advisers {
            let semaphore = semaphore.clone();
            let crm = self.crm.clone();
            let store = self.store.clone();
            let config_horizon = self.config.horizon_weeks;
            let config_buffer = self.config.buffer_weeks;

            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore not closed");

                let meetings = crm.list_meetings(adviser.id, baseline, horizon_end).await?;
                let deals_without_clarify = crm
                    .list_deals_without_first_meeting(adviser.id, horizon_end)
                    .await?;
                let leave = store.get_leave_requests(adviser.id, baseline, horizon_end).await?;
                let global_closures = store.get_global_closures(baseline, horizon_end).await?;
                let adviser_closures = store.get_adviser_closures(&adviser.email, baseline, horizon_end).await?;
                let overrides = store.list_capacity_overrides(&adviser.email).await?;

                let mut ooo_ranges: Vec<(NaiveDate, NaiveDate)> =
                    leave.iter().map(|l| (l.start_date, l.end_date)).collect();
                ooo_ranges.extend(global_closures.iter().map(|c| (c.start_date, c.end_date)));
                ooo_ranges.extend(
                    adviser_closures
                        .iter()
                        .filter(|c| matches!(&c.scope, ClosureScope::AdviserEmail(email) if *email == adviser.email))
                        .map(|c| (c.start_date, c.end_date)),
                );

                let rows = compute_capacity_rows(&CapacityInputs {
                    adviser: &adviser,
                    baseline,
                    horizon_weeks: config_horizon,
                    prestart_weeks,
                    meetings: &meetings,
                    deals_without_clarify: &deals_without_clarify,
                    ooo_ranges: &ooo_ranges,
                    overrides: &overrides,
                });

                let result = earliest_available_week(&rows, today, config_buffer, adviser.adviser_start_date, prestart_weeks);

                Ok::<Candidate, AppError>(Candidate {
                    adviser_id: adviser.id,
                    adviser_email: adviser.email,
                    result,
                    rows,
                })
            });
        }

        let mut candidates = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(Ok(candidate)) => candidates.push(candidate),
                Ok(Err(err)) => return Err(err),
                Err(join_err) => return Err(AppError::Internal(anyhow::anyhow!(join_err))),
            }
        }

        // Step 4: selection.
        let chosen = select_candidate(&candidates).ok_or_else(|| {
            let diagnostics: Value = serde_json::json!({
                "advisers_considered": candidates.iter().map(|c| c.adviser_email.clone()).collect::<Vec<_>>(),
            });
            AppError::NoAvailability { diagnostics }
        })?;

        let earliest_week = match chosen.result {
            EarliestWeekResult::Found(week) => week,
            EarliestWeekResult::NoAvailability => unreachable!("select_candidate filters these out"),
        };

        // Step 5: CRM update with internal retry/backoff.
        let crm_update = self.crm.set_deal_owner(&self.config, req.deal_id, chosen.adviser_id).await;
        if let Err(err) = crm_update {
            return Err(err);
        }

        // Step 6: persist, idempotent per deal.
        let record = AllocationRecord {
            id: Uuid::new_v4(),
            deal_id: req.deal_id,
            adviser_id: chosen.adviser_id,
            service_package: service_package.clone(),
            household_type: household_type.clone(),
            earliest_week_anchor: earliest_week,
            decided_at: now,
            requester_ip: req.requester.ip.clone(),
            extra: serde_json::json!({ "user_agent": req.requester.user_agent }),
        };

        let guard = InconsistencyGuard::new(req.deal_id, chosen.adviser_id);
        let persisted_id = match self.store.put_allocation_record(&record).await {
            Ok(id) => {
                guard.disarm();
                id
            }
            Err(err) => {
                guard.disarm();
                tracing::error!(
                    deal_id = %req.deal_id,
                    adviser_id = %chosen.adviser_id,
                    "inconsistency: crm owner update succeeded but allocation record write failed"
                );
                return Err(err);
            }
        };

        // Step 7: notification hook, failures swallowed.
        self.notifier
            .notify_allocation(AllocationNotification {
                deal_id: req.deal_id,
                adviser_email: &chosen.adviser_email,
                service_package: &service_package,
                earliest_available_week: earliest_week,
            })
            .await;

        let mut record = record;
        record.id = persisted_id;

        Ok(AllocateOutcome {
            record,
            adviser_email: chosen.adviser_email.clone(),
            earliest_available_week: earliest_week,
        })
    }
}

/// §4.5 step 4: min earliest-week ordinal, then min utilisation ratio at
/// that week, then lexicographic email (the fixed total order this
/// implementation documents for the otherwise-unspecified second tie-break).
fn select_candidate(candidates: &[Candidate]) -> Option<&Candidate> {
    candidates
        .iter()
        .filter_map(|c| match c.result {
            EarliestWeekResult::Found(week) => Some((c, week)),
            EarliestWeekResult::NoAvailability => None,
        })
        .min_by(|(a, a_week), (b, b_week)| {
            a_week
                .cmp(b_week)
                .then_with(|| ratio_at(a, *a_week).partial_cmp(&ratio_at(b, *b_week)).unwrap())
                .then_with(|| a.adviser_email.cmp(&b.adviser_email))
        })
        .map(|(c, _)| c)
}

fn ratio_at(candidate: &Candidate, week: NaiveDate) -> f64 {
    candidate
        .rows
        .iter()
        .find(|r| r.anchor == week)
        .map(|r| r.clarify_count as f64 / (r.target.max(1) as f64))
        .unwrap_or(f64::MAX)
}

pub fn now_naive() -> NaiveDateTime {
    Utc::now().naive_utc()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OooState;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn row(anchor: NaiveDate, clarify: u32, target: u32) -> WeekRow {
        WeekRow {
            anchor,
            label: "2026-W03".into(),
            clarify_count: clarify,
            kickoff_count: 0,
            deal_no_clarify_count: 0,
            ooo_state: OooState::None,
            target,
            actual: clarify,
            difference: clarify as i64 - target as i64,
            backlog_after_block: 0,
        }
    }

    #[test]
    fn earliest_week_wins_regardless_of_ratio() {
        let early = Candidate {
            adviser_id: Uuid::new_v4(),
            adviser_email: "z@example.com".into(),
            result: EarliestWeekResult::Found(d(2026, 1, 12)),
            rows: vec![row(d(2026, 1, 12), 4, 4)],
        };
        let late = Candidate {
            adviser_id: Uuid::new_v4(),
            adviser_email: "a@example.com".into(),
            result: EarliestWeekResult::Found(d(2026, 1, 19)),
            rows: vec![row(d(2026, 1, 19), 0, 4)],
        };
        let chosen = select_candidate(&[early, late]).unwrap();
        assert_eq!(chosen.adviser_email, "z@example.com");
    }

    #[test]
    fn lower_ratio_wins_tie_on_week() {
        let week = d(2026, 1, 12);
        let busy = Candidate {
            adviser_id: Uuid::new_v4(),
            adviser_email: "busy@example.com".into(),
            result: EarliestWeekResult::Found(week),
            rows: vec![row(week, 3, 4)],
        };
        let free = Candidate {
            adviser_id: Uuid::new_v4(),
            adviser_email: "free@example.com".into(),
            result: EarliestWeekResult::Found(week),
            rows: vec![row(week, 0, 4)],
        };
        let chosen = select_candidate(&[busy, free]).unwrap();
        assert_eq!(chosen.adviser_email, "free@example.com");
    }

    #[test]
    fn lexicographic_email_breaks_final_tie() {
        let week = d(2026, 1, 12);
        let b = Candidate {
            adviser_id: Uuid::new_v4(),
            adviser_email: "bob@example.com".into(),
            result: EarliestWeekResult::Found(week),
            rows: vec![row(week, 0, 4)],
        };
        let a = Candidate {
            adviser_id: Uuid::new_v4(),
            adviser_email: "alice@example.com".into(),
            result: EarliestWeekResult::Found(week),
            rows: vec![row(week, 0, 4)],
        };
        let chosen = select_candidate(&[b, a]).unwrap();
        assert_eq!(chosen.adviser_email, "alice@example.com");
    }

    #[test]
    fn all_no_availability_yields_none() {
        let c = Candidate {
            adviser_id: Uuid::new_v4(),
            adviser_email: "a@example.com".into(),
            result: EarliestWeekResult::NoAvailability,
            rows: vec![],
        };
        assert!(select_candidate(&[c]).is_none());
    }
}
