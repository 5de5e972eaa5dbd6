//! Pure date arithmetic (§4.1 Calendar). No I/O, no locale handling beyond
//! Monday-anchoring in the system timezone (the caller is responsible for
//! converting any timestamp into a civil `NaiveDate` in Australia/Sydney
//! before it reaches these functions).

use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// ISO Monday of the week containing `d`.
pub fn monday_of(d: NaiveDate) -> NaiveDate {
    let iso = d.iso_week();
    NaiveDate::from_isoywd_opt(iso.year(), iso.week(), Weekday::Mon)
        .expect("iso week of a valid date is always constructible")
}

/// Signed difference, in whole weeks, between two Mondays (or any two dates
/// a fixed number of days apart — truncates toward zero like integer
/// division).
pub fn weeks_between(m1: NaiveDate, m2: NaiveDate) -> i64 {
    (m2 - m1).num_days() / 7
}

/// `"YYYY-Www"` label for the ISO week containing `m`.
pub fn iso_week_label(m: NaiveDate) -> String {
    let iso = m.iso_week();
    format!("{:04}-W{:02}", iso.year(), iso.week())
}

/// Parse a `"YYYY-Www"` label back into its Monday. Inverse of
/// [`iso_week_label`] composed with [`monday_of`].
pub fn parse_iso_week_label(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    let (year_str, week_str) = s.split_once('-')?;
    let year: i32 = year_str.parse().ok()?;
    let week: u32 = week_str.strip_prefix('W')?.parse().ok()?;
    if week == 0 || week > 53 {
        return None;
    }
    NaiveDate::from_isoywd_opt(year, week, Weekday::Mon)
}

/// `count` consecutive, non-overlapping two-week windows starting at
/// `baseline`. Each block is returned as `(w0, w1)`, the Mondays of its two
/// weeks. Fortnight blocks are anchored to `baseline`, not ISO parity.
pub fn fortnight_blocks(baseline: NaiveDate, count: u32) -> Vec<(NaiveDate, NaiveDate)> {
    (0..count)
        .map(|i| {
            let w0 = baseline + Duration::weeks(2 * i as i64);
            let w1 = w0 + Duration::weeks(1);
            (w0, w1)
        })
        .collect()
}

/// Count of Mon–Fri dates in the inclusive range `[range_start, range_end]`.
pub fn business_days_in(range_start: NaiveDate, range_end: NaiveDate) -> u32 {
    if range_start > range_end {
        return 0;
    }
    let mut count = 0u32;
    let mut d = range_start;
    while d <= range_end {
        if !matches!(d.weekday(), Weekday::Sat | Weekday::Sun) {
            count += 1;
        }
        d += Duration::days(1);
    }
    count
}

/// Business-day count of the intersection of `[range_start, range_end]`
/// with the 5-day week `[monday, monday+4]`.
pub fn overlap_with_week(range_start: NaiveDate, range_end: NaiveDate, monday: NaiveDate) -> u32 {
    let week_start = monday;
    let week_end = monday + Duration::days(4);
    let start = range_start.max(week_start);
    let end = range_end.min(week_end);
    business_days_in(start, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn monday_of_mid_week() {
        // 2026-01-14 is a Wednesday; ISO week 2026-W03 starts Monday 2026-01-12.
        assert_eq!(monday_of(d(2026, 1, 14)), d(2026, 1, 12));
    }

    #[test]
    fn monday_of_a_monday_is_itself() {
        assert_eq!(monday_of(d(2026, 1, 12)), d(2026, 1, 12));
    }

    #[test]
    fn iso_week_label_round_trips() {
        // R3
        let m = monday_of(d(2026, 1, 14));
        let label = iso_week_label(m);
        assert_eq!(label, "2026-W03");
        assert_eq!(parse_iso_week_label(&label), Some(m));
    }

    #[test]
    fn fortnight_blocks_tile_without_gap_or_overlap() {
        // R4
        let baseline = d(2026, 1, 12);
        let blocks = fortnight_blocks(baseline, 6);
        assert_eq!(blocks.len(), 6);
        for i in 0..blocks.len() - 1 {
            let (_, w1) = blocks[i];
            let (next_w0, _) = blocks[i + 1];
            assert_eq!(next_w0 - w1, Duration::weeks(1));
        }
        assert_eq!(blocks[0].0, baseline);
    }

    #[test]
    fn full_week_overlap_is_five() {
        // T8
        let monday = d(2026, 1, 26);
        assert_eq!(overlap_with_week(monday, monday + Duration::days(4), monday), 5);
    }

    #[test]
    fn weekend_overlap_is_zero() {
        // T8
        let monday = d(2026, 1, 26);
        let sat = monday + Duration::days(5);
        let sun = monday + Duration::days(6);
        assert_eq!(overlap_with_week(sat, sun, monday), 0);
    }

    #[test]
    fn single_day_overlap() {
        // R1 precondition: a single Wednesday closure overlaps 1 business day.
        let monday = d(2026, 1, 26);
        let wed = monday + Duration::days(2);
        assert_eq!(overlap_with_week(wed, wed, monday), 1);
    }

    #[test]
    fn weeks_between_is_signed() {
        assert_eq!(weeks_between(d(2026, 1, 12), d(2026, 1, 26)), 2);
        assert_eq!(weeks_between(d(2026, 1, 26), d(2026, 1, 12)), -2);
    }

    #[test]
    fn business_days_in_handles_inverted_range() {
        assert_eq!(business_days_in(d(2026, 1, 26), d(2026, 1, 20)), 0);
    }
}
