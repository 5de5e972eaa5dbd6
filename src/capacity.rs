//! Capacity Engine (§4.3). Produces, for one adviser and a baseline Monday,
//! an ordered sequence of weekly capacity rows covering `horizon_weeks`
//! consecutive weeks. Pure function over already-fetched Store data — the
//! caller (allocator, or the `/availability/schedule` read view) is
//! responsible for pulling meetings/deals/leave/closures out of the Store
//! first.

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::calendar::{self, monday_of};
use crate::models::{Adviser, CapacityOverride, Deal, Meeting, MeetingKind, OooState};

#[derive(Debug, Clone, Serialize)]
pub struct WeekRow {
    pub anchor: NaiveDate,
    pub label: String,
    pub clarify_count: u32,
    pub kickoff_count: u32,
    pub deal_no_clarify_count: u32,
    pub ooo_state: OooState,
    pub target: u32,
    pub actual: u32,
    pub difference: i64,
    /// Backlog remaining after the fortnight block this week belongs to has
    /// been processed (§4.3 step 2d). Shared by both weeks of a block; the
    /// Earliest-Week Selector uses it directly rather than recomputing
    /// carry-forward state.
    pub backlog_after_block: i64,
}

fn ceil_div(n: i64, d: i64) -> i64 {
    debug_assert!(d > 0);
    (n + d - 1) / d
}

/// Effective `client_limit_monthly` for week `w`: the active override with
/// the greatest `effective_date <= w`, or the adviser's profile limit.
fn effective_limit(adviser: &Adviser, overrides: &[CapacityOverride], w: NaiveDate) -> i64 {
    overrides
        .iter()
        .filter(|o| o.effective_date <= w)
        .max_by_key(|o| o.effective_date)
        .map(|o| o.client_limit_monthly)
        .unwrap_or(adviser.client_limit_monthly)
}

/// Weekly target before OOO/prestart adjustment: `ceil(ceil(L/2)/2)`.
fn base_weekly_target(limit: i64) -> i64 {
    let per_fortnight = ceil_div(limit, 2);
    ceil_div(per_fortnight, 2)
}

/// Union, over business days `[monday, monday+4]`, of whether each day is
/// covered by any OOO range; returned as a business-day count (0..=5).
fn ooo_business_days(ooo_ranges: &[(NaiveDate, NaiveDate)], monday: NaiveDate) -> u8 {
    (0..5)
        .filter(|&i| {
            let day = monday + Duration::days(i);
            ooo_ranges.iter().any(|&(s, e)| day >= s && day <= e)
        })
        .count() as u8
}

pub struct CapacityInputs<'a> {
    pub adviser: &'a Adviser,
    pub baseline: NaiveDate,
    pub horizon_weeks: u32,
    pub prestart_weeks: u32,
    pub meetings: &'a [Meeting],
    pub deals_without_clarify: &'a [Deal],
    pub ooo_ranges: &'a [(NaiveDate, NaiveDate)],
    pub overrides: &'a [CapacityOverride],
}

/// Compute the ordered capacity-row sequence for one adviser, including
/// fortnight-paced backlog carry-forward (§4.3 steps 1-3).
pub fn compute_capacity_rows(inputs: &CapacityInputs<'_>) -> Vec<WeekRow> {
    let CapacityInputs {
        adviser,
        baseline,
        horizon_weeks,
        prestart_weeks,
        meetings,
        deals_without_clarify,
        ooo_ranges,
        overrides,
    } = *inputs;

    let prestart_threshold = adviser
        .adviser_start_date
        .map(|start| monday_of(start) - Duration::weeks(prestart_weeks as i64));

    let mut rows: Vec<WeekRow> = (0..horizon_weeks)
        .map(|i| {
            let anchor = baseline + Duration::weeks(i as i64);

            let clarify_count = meetings
                .iter()
                .filter(|m| m.kind == MeetingKind::Clarify && monday_of(m.start_date) == anchor)
                .count() as u32;
            let kickoff_count = meetings
                .iter()
                .filter(|m| m.kind == MeetingKind::KickOff && monday_of(m.start_date) == anchor)
                .count() as u32;
            let deal_no_clarify_count = deals_without_clarify
                .iter()
                .filter(|d| d.agreement_start_date.map(monday_of) == Some(anchor))
                .count() as u32;

            let ooo_n = ooo_business_days(ooo_ranges, anchor);
            let ooo_state = OooState::from_business_days(ooo_n);

            let limit = effective_limit(adviser, overrides, anchor);
            let base_target = base_weekly_target(limit);

            let mut target = match ooo_state {
                OooState::Full => 0,
                OooState::Partial(n) => ceil_div(base_target * (5 - n as i64), 5),
                OooState::None => base_target,
            };

            if let Some(threshold) = prestart_threshold {
                if anchor < threshold {
                    target = 0;
                }
            }

            WeekRow {
                anchor,
                label: calendar::iso_week_label(anchor),
                clarify_count,
                kickoff_count,
                deal_no_clarify_count,
                ooo_state,
                target: target as u32,
                actual: clarify_count,
                difference: clarify_count as i64 - target,
                backlog_after_block: 0,
            }
        })
        .collect();

    // Pre-existing backlog: open deals without Clarify whose agreement
    // started before the baseline.
    let mut backlog: i64 = deals_without_clarify
        .iter()
        .filter(|d| d.agreement_start_date.is_some_and(|d| d < baseline))
        .count() as i64;

    let mut i = 0usize;
    while i < rows.len() {
        let has_pair = i + 1 < rows.len();
        let (target0, clarify0) = (rows[i].target as i64, rows[i].clarify_count as i64);
        let (target1, clarify1) = if has_pair {
            (rows[i + 1].target as i64, rows[i + 1].clarify_count as i64)
        } else {
            (0, 0)
        };

        backlog += rows[i].deal_no_clarify_count as i64;
        if has_pair {
            backlog += rows[i + 1].deal_no_clarify_count as i64;
        }

        let fortnight_target = target0 + target1;
        let fortnight_clarifies = clarify0 + clarify1;
        let spare = (fortnight_target - fortnight_clarifies).max(0);
        let drained = backlog.min(spare);
        backlog -= drained;

        let to_w0 = drained.min(target0);
        let to_w1 = drained - to_w0;

        rows[i].actual += to_w0 as u32;
        rows[i].difference = rows[i].actual as i64 - rows[i].target as i64;
        rows[i].backlog_after_block = backlog;
        if has_pair {
            rows[i + 1].actual += to_w1 as u32;
            rows[i + 1].difference = rows[i + 1].actual as i64 - rows[i + 1].target as i64;
            rows[i + 1].backlog_after_block = backlog;
        }

        i += 2;
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MeetingKind, PodType};
    use std::collections::BTreeSet;
    use uuid::Uuid;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn adviser(limit: i64, start: Option<NaiveDate>) -> Adviser {
        Adviser {
            id: Uuid::new_v4(),
            email: "a@example.com".into(),
            service_packages: BTreeSet::new(),
            household_types: BTreeSet::new(),
            pod_type: PodType::Solo,
            client_limit_monthly: limit,
            adviser_start_date: start,
            taking_on_clients: true,
        }
    }

    #[test]
    fn t1_non_negativity() {
        let a = adviser(8, None);
        let rows = compute_capacity_rows(&CapacityInputs {
            adviser: &a,
            baseline: d(2026, 1, 12),
            horizon_weeks: 12,
            prestart_weeks: 3,
            meetings: &[],
            deals_without_clarify: &[],
            ooo_ranges: &[],
            overrides: &[],
        });
        for row in &rows {
            assert!(row.target as i64 >= 0);
            assert!(row.clarify_count as i64 >= 0);
            assert!(row.actual as i64 >= 0);
        }
    }

    #[test]
    fn t2_full_ooo_zeroes_target() {
        let a = adviser(8, None);
        let w05 = d(2026, 1, 26);
        let rows = compute_capacity_rows(&CapacityInputs {
            adviser: &a,
            baseline: d(2026, 1, 12),
            horizon_weeks: 8,
            prestart_weeks: 3,
            meetings: &[],
            deals_without_clarify: &[],
            ooo_ranges: &[(w05, w05 + Duration::days(4))],
            overrides: &[],
        });
        let row = rows.iter().find(|r| r.anchor == w05).unwrap();
        assert_eq!(row.ooo_state, OooState::Full);
        assert_eq!(row.target, 0);
    }

    #[test]
    fn s4_partial_ooo_reduces_target_proportionally() {
        // base weekly target 4 => limit must satisfy ceil(ceil(L/2)/2)=4 => L=16 fits (per_fortnight=8,weekly=4)
        let a = adviser(16, None);
        let w05 = d(2026, 1, 26);
        let leave_start = w05; // two business days, Mon+Tue
        let leave_end = w05 + Duration::days(1);
        let rows = compute_capacity_rows(&CapacityInputs {
            adviser: &a,
            baseline: d(2026, 1, 12),
            horizon_weeks: 8,
            prestart_weeks: 3,
            meetings: &[],
            deals_without_clarify: &[],
            ooo_ranges: &[(leave_start, leave_end)],
            overrides: &[],
        });
        let row = rows.iter().find(|r| r.anchor == w05).unwrap();
        assert_eq!(row.ooo_state, OooState::Partial(2));
        assert_eq!(row.target, 3); // ceil(4*3/5) = ceil(12/5) = 3
    }

    #[test]
    fn t7_override_precedence() {
        let a = adviser(8, None);
        let w = d(2026, 1, 12);
        let overrides = vec![CapacityOverride {
            id: Uuid::new_v4(),
            adviser_email: a.email.clone(),
            effective_date: d(2025, 12, 1),
            client_limit_monthly: 20,
            pod_type: None,
            notes: None,
        }];
        let rows = compute_capacity_rows(&CapacityInputs {
            adviser: &a,
            baseline: w,
            horizon_weeks: 4,
            prestart_weeks: 3,
            meetings: &[],
            deals_without_clarify: &[],
            ooo_ranges: &[],
            overrides: &overrides,
        });
        // limit 20 -> per_fortnight 10 -> weekly target 5, vs base limit 8 -> weekly target 2
        assert_eq!(rows[0].target, 5);
    }

    #[test]
    fn prestart_future_starter_zeroes_target_until_window() {
        let start = d(2026, 3, 2);
        let a = adviser(8, Some(start));
        let rows = compute_capacity_rows(&CapacityInputs {
            adviser: &a,
            baseline: d(2026, 1, 12),
            horizon_weeks: 12,
            prestart_weeks: 3,
            meetings: &[],
            deals_without_clarify: &[],
            ooo_ranges: &[],
            overrides: &[],
        });
        // monday_of(2026-03-02) = 2026-03-02 (it's already a Monday), threshold = -3 weeks = 2026-02-09
        let w05 = d(2026, 1, 26);
        let w07 = d(2026, 2, 9);
        assert_eq!(rows.iter().find(|r| r.anchor == w05).unwrap().target, 0);
        assert!(rows.iter().find(|r| r.anchor == w07).unwrap().target > 0);
    }

    #[test]
    fn s3_backlog_drains_across_two_fortnights() {
        // weekly target 2, fortnight target 4 (limit=8). 6 pre-existing deals
        // without Clarify. Fortnight 1 (W03+W04) drains 4 -> backlog 2.
        // Fortnight 2 (W05+W06) drains remaining 2 into W05, leaving W06 with
        // zero carry and backlog exhausted: W06 is the earliest week with
        // backlog=0 and actual<target.
        let a = adviser(8, None);
        let baseline = d(2026, 1, 12); // W03
        let mut deals = Vec::new();
        for _ in 0..6 {
            deals.push(Deal {
                id: Uuid::new_v4(),
                service_package: "Series A".into(),
                household_type: None,
                agreement_start_date: Some(baseline - Duration::weeks(1)),
                owner_id: None,
                has_clarify: false,
            });
        }
        let rows = compute_capacity_rows(&CapacityInputs {
            adviser: &a,
            baseline,
            horizon_weeks: 8,
            prestart_weeks: 3,
            meetings: &[],
            deals_without_clarify: &deals,
            ooo_ranges: &[],
            overrides: &[],
        });
        let w03 = d(2026, 1, 12);
        let w04 = d(2026, 1, 19);
        let w05 = d(2026, 1, 26);
        let w06 = d(2026, 2, 2);
        let row = |anchor| rows.iter().find(|r| r.anchor == anchor).unwrap();
        assert_eq!(row(w03).actual, 2);
        assert_eq!(row(w04).actual, 2);
        assert_eq!(row(w05).actual, 2); // fully caught up, not yet < target
        assert_eq!(row(w06).actual, 0); // backlog exhausted, nothing left to carry
        assert!(row(w06).actual < row(w06).target);
    }

    #[test]
    fn t5_backlog_conservation() {
        let a = adviser(8, None);
        let baseline = d(2026, 1, 12);
        let mut deals = Vec::new();
        // 6 pre-existing deals without Clarify, agreement started before baseline.
        for _ in 0..6 {
            deals.push(Deal {
                id: Uuid::new_v4(),
                service_package: "Series A".into(),
                household_type: None,
                agreement_start_date: Some(baseline - Duration::weeks(1)),
                owner_id: None,
                has_clarify: false,
            });
        }
        let rows = compute_capacity_rows(&CapacityInputs {
            adviser: &a,
            baseline,
            horizon_weeks: 8,
            prestart_weeks: 3,
            meetings: &[],
            deals_without_clarify: &deals,
            ooo_ranges: &[],
            overrides: &[],
        });
        let total_drained: i64 = rows.iter().map(|r| r.actual as i64 - r.clarify_count as i64).sum();
        assert!(total_drained >= 0);
        assert!(total_drained <= 6);
    }
}
