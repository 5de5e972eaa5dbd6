//! Earliest-Week Selector (§4.4). Pure function over a capacity-row
//! sequence already produced by the Capacity Engine.

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::calendar::monday_of;
use crate::capacity::WeekRow;
use crate::models::OooState;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub enum EarliestWeekResult {
    Found(NaiveDate),
    NoAvailability,
}

/// Scan `rows` (already computed at baseline = `monday_of(now)`) for the
/// first week meeting the buffer/prestart/backlog/OOO rules of §4.4.
pub fn earliest_available_week(
    rows: &[WeekRow],
    now: NaiveDate,
    buffer_weeks: u32,
    adviser_start_date: Option<NaiveDate>,
    prestart_weeks: u32,
) -> EarliestWeekResult {
    let mut first_candidate = monday_of(now) + Duration::weeks(buffer_weeks as i64);
    if first_candidate < monday_of(now) {
        first_candidate = monday_of(now);
    }

    if let Some(start) = adviser_start_date {
        if start > now {
            let prestart_open = monday_of(start) - Duration::weeks(prestart_weeks as i64);
            first_candidate = first_candidate.max(prestart_open);
        }
    }

    let mut i = 0usize;
    while i < rows.len() {
        let has_pair = i + 1 < rows.len();
        let block: [&WeekRow; 2] = if has_pair {
            [&rows[i], &rows[i + 1]]
        } else {
            [&rows[i], &rows[i]]
        };
        let block_len = if has_pair { 2 } else { 1 };

        // A week with Full OOO always has target=0 and is never selectable;
        // its presence as a block's first week does not disqualify the
        // block's other week.
        for week in block.iter().take(block_len) {
            if week.anchor < first_candidate {
                continue;
            }
            if week.ooo_state == OooState::Full {
                continue;
            }
            if week.backlog_after_block == 0 && week.actual < week.target {
                return EarliestWeekResult::Found(week.anchor);
            }
        }

        i += 2;
    }

    EarliestWeekResult::NoAvailability
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capacity::{compute_capacity_rows, CapacityInputs};
    use crate::models::{Adviser, Deal, Meeting, MeetingKind, PodType};
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

    fn rows_for(
        adviser: &Adviser,
        baseline: NaiveDate,
        meetings: &[Meeting],
        deals: &[Deal],
        ooo: &[(NaiveDate, NaiveDate)],
    ) -> Vec<crate::capacity::WeekRow> {
        compute_capacity_rows(&CapacityInputs {
            adviser,
            baseline,
            horizon_weeks: 52,
            prestart_weeks: 3,
            meetings,
            deals_without_clarify: deals,
            ooo_ranges: ooo,
            overrides: &[],
        })
    }

    #[test]
    fn s1_happy_path_empty_backlog_respects_buffer() {
        let now = d(2026, 1, 12);
        let a_adviser_id = Uuid::new_v4();
        let a = Adviser { id: a_adviser_id, ..adviser(8, None) };
        let meetings = vec![Meeting {
            adviser_id: a_adviser_id,
            kind: MeetingKind::Clarify,
            start_date: d(2026, 1, 26), // W04 per ISO? check below
            deal_id: None,
        }];
        let rows = rows_for(&a, now, &meetings, &[], &[]);
        let result = earliest_available_week(&rows, now, 2, None, 3);
        assert_eq!(result, EarliestWeekResult::Found(d(2026, 1, 26)));
    }

    #[test]
    fn s2_full_week_ooo_skipped() {
        let now = d(2026, 1, 12);
        let a = adviser(8, None);
        let closure_start = d(2026, 1, 26);
        let closure_end = d(2026, 1, 30);
        let rows = rows_for(&a, now, &[], &[], &[(closure_start, closure_end)]);
        let result = earliest_available_week(&rows, now, 2, None, 3);
        assert_eq!(result, EarliestWeekResult::Found(d(2026, 2, 2)));
    }

    #[test]
    fn s3_backlog_drains_to_first_clear_week() {
        let now = d(2026, 1, 12);
        let a = adviser(8, None);
        let mut deals = Vec::new();
        for _ in 0..6 {
            deals.push(Deal {
                id: Uuid::new_v4(),
                service_package: "Series A".into(),
                household_type: None,
                agreement_start_date: Some(now - Duration::weeks(1)),
                owner_id: None,
                has_clarify: false,
            });
        }
        let rows = rows_for(&a, now, &[], &deals, &[]);
        let result = earliest_available_week(&rows, now, 2, None, 3);
        assert_eq!(result, EarliestWeekResult::Found(d(2026, 2, 2)));
    }

    #[test]
    fn s5_prestart_buffer_for_future_starter() {
        let now = d(2026, 1, 12);
        let start = d(2026, 3, 2);
        let a = adviser(8, Some(start));
        let rows = rows_for(&a, now, &[], &[], &[]);
        let result = earliest_available_week(&rows, now, 2, Some(start), 3);
        assert_eq!(result, EarliestWeekResult::Found(d(2026, 2, 9)));
    }

    #[test]
    fn t3_buffer_lower_bound() {
        let now = d(2026, 1, 12);
        let a = adviser(8, None);
        let rows = rows_for(&a, now, &[], &[], &[]);
        if let EarliestWeekResult::Found(week) = earliest_available_week(&rows, now, 2, None, 3) {
            assert!(week >= monday_of(now) + Duration::weeks(2));
        } else {
            panic!("expected a week");
        }
    }

    #[test]
    fn t4_horizon_upper_bound_or_no_availability() {
        let now = d(2026, 1, 12);
        // Adviser with zero capacity forever (limit 0) and an enormous backlog.
        let a = adviser(0, None);
        let mut deals = Vec::new();
        for _ in 0..500 {
            deals.push(Deal {
                id: Uuid::new_v4(),
                service_package: "Series A".into(),
                household_type: None,
                agreement_start_date: Some(now - Duration::weeks(1)),
                owner_id: None,
                has_clarify: false,
            });
        }
        let rows = rows_for(&a, now, &[], &deals, &[]);
        let result = earliest_available_week(&rows, now, 2, None, 3);
        assert_eq!(result, EarliestWeekResult::NoAvailability);
    }
}
