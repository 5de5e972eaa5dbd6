//! `GET /availability/earliest` and `GET /availability/schedule` — the
//! read-only operator views over the same engine the allocator drives (§6).

use std::collections::BTreeSet;

use axum::{extract::{Query, State}, routing::get, Json, Router};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    calendar::monday_of,
    capacity::{compute_capacity_rows, CapacityInputs, WeekRow},
    errors::{AppError, AppResult},
    models::{ClosureScope, PodType},
    selector::{earliest_available_week, EarliestWeekResult},
    state::AppState,
    store::AdviserFilter,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/availability/earliest", get(earliest))
        .route("/availability/schedule", get(schedule))
}

#[derive(Deserialize)]
struct EarliestQuery {
    service_package: Option<String>,
    household_type: Option<String>,
    #[serde(default)]
    include_not_taking: bool,
}

#[derive(Serialize)]
struct EarliestRow {
    email: String,
    service_packages: BTreeSet<String>,
    household_types: BTreeSet<String>,
    pod_type: PodType,
    client_limit_monthly: i64,
    earliest_week_label: Option<String>,
    earliest_week_monday: Option<NaiveDate>,
}

async fn compute_rows_for_adviser(
    state: &AppState,
    adviser: &crate::models::Adviser,
    baseline: NaiveDate,
) -> AppResult<Vec<WeekRow>> {
    let horizon_end = baseline + chrono::Duration::weeks(state.config.horizon_weeks as i64);
    let prestart_weeks = state.store.get_prestart_weeks(state.config.default_prestart_weeks).await?;

    let meetings = state.crm.list_meetings(adviser.id, baseline, horizon_end).await?;
    let deals_without_clarify = state
        .crm
        .list_deals_without_first_meeting(adviser.id, horizon_end)
        .await?;
    let leave = state.store.get_leave_requests(adviser.id, baseline, horizon_end).await?;
    let global_closures = state.store.get_global_closures(baseline, horizon_end).await?;
    let adviser_closures = state.store.get_adviser_closures(&adviser.email, baseline, horizon_end).await?;
    let overrides = state.store.list_capacity_overrides(&adviser.email).await?;

    let mut ooo_ranges: Vec<(NaiveDate, NaiveDate)> = leave.iter().map(|l| (l.start_date, l.end_date)).collect();
    ooo_ranges.extend(global_closures.iter().map(|c| (c.start_date, c.end_date)));
    ooo_ranges.extend(
        adviser_closures
            .iter()
            .filter(|c| matches!(&c.scope, ClosureScope::AdviserEmail(email) if *email == adviser.email))
            .map(|c| (c.start_date, c.end_date)),
    );

    Ok(compute_capacity_rows(&CapacityInputs {
        adviser,
        baseline,
        horizon_weeks: state.config.horizon_weeks,
        prestart_weeks,
        meetings: &meetings,
        deals_without_clarify: &deals_without_clarify,
        ooo_ranges: &ooo_ranges,
        overrides: &overrides,
    }))
}

async fn earliest(
    State(state): State<AppState>,
    Query(q): Query<EarliestQuery>,
) -> AppResult<Json<Vec<EarliestRow>>> {
    let filter = AdviserFilter {
        service_package: q.service_package,
        household_type: q.household_type,
        include_not_taking: q.include_not_taking,
    };

    let advisers: Vec<_> = state
        .crm
        .list_advisers()
        .await?
        .into_iter()
        .filter(|a| filter.matches(a))
        .collect();

    let today = chrono::Utc::now().date_naive();
    let baseline = monday_of(today);
    let prestart_weeks = state.store.get_prestart_weeks(state.config.default_prestart_weeks).await?;

    let mut rows = Vec::with_capacity(advisers.len());
    for adviser in advisers {
        let week_rows = compute_rows_for_adviser(&state, &adviser, baseline).await?;
        let result = earliest_available_week(
            &week_rows,
            today,
            state.config.buffer_weeks,
            adviser.adviser_start_date,
            prestart_weeks,
        );
        let (label, monday) = match result {
            EarliestWeekResult::Found(week) => (Some(crate::calendar::iso_week_label(week)), Some(week)),
            EarliestWeekResult::NoAvailability => (None, None),
        };

        // Display the adviser's currently-effective limit, not their raw
        // profile limit (§3 T7: an active override takes precedence).
        let effective_limit = state
            .store
            .get_active_capacity_override(&adviser.email, today)
            .await?
            .map(|o| o.client_limit_monthly)
            .unwrap_or(adviser.client_limit_monthly);

        rows.push(EarliestRow {
            email: adviser.email,
            service_packages: adviser.service_packages,
            household_types: adviser.household_types,
            pod_type: adviser.pod_type,
            client_limit_monthly: effective_limit,
            earliest_week_label: label,
            earliest_week_monday: monday,
        });
    }

    Ok(Json(rows))
}

#[derive(Deserialize)]
struct ScheduleQuery {
    email: String,
}

#[derive(Serialize)]
struct ScheduleRow {
    #[serde(flatten)]
    week: WeekRow,
    is_earliest_available: bool,
}

#[derive(Serialize)]
struct ScheduleResponse {
    email: String,
    weeks: Vec<ScheduleRow>,
}

async fn schedule(
    State(state): State<AppState>,
    Query(q): Query<ScheduleQuery>,
) -> AppResult<Json<ScheduleResponse>> {
    let adviser = state
        .crm
        .list_advisers()
        .await?
        .into_iter()
        .find(|a| a.email == q.email)
        .ok_or(AppError::NotFound)?;

    let today = chrono::Utc::now().date_naive();
    let baseline = monday_of(today);
    let prestart_weeks = state.store.get_prestart_weeks(state.config.default_prestart_weeks).await?;

    let week_rows = compute_rows_for_adviser(&state, &adviser, baseline).await?;
    let result = earliest_available_week(
        &week_rows,
        today,
        state.config.buffer_weeks,
        adviser.adviser_start_date,
        prestart_weeks,
    );
    let earliest = match result {
        EarliestWeekResult::Found(week) => Some(week),
        EarliestWeekResult::NoAvailability => None,
    };

    let weeks = week_rows
        .into_iter()
        .map(|w| ScheduleRow {
            is_earliest_available: Some(w.anchor) == earliest,
            week: w,
        })
        .collect();

    Ok(Json(ScheduleResponse { email: adviser.email, weeks }))
}
