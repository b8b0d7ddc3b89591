//! Busy-interval merging and free-window search

use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc, Weekday};
use serde::Serialize;

/// A half-open time range `[starts_at, ends_at)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(starts_at: DateTime<Utc>, ends_at: DateTime<Utc>) -> Self {
        Self { starts_at, ends_at }
    }

    pub fn duration(&self) -> Duration {
        self.ends_at - self.starts_at
    }
}

/// Daily bookable hours in UTC, `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkingHours {
    pub start: u32,
    pub end: u32,
}

/// Sort and coalesce overlapping or touching intervals
pub fn merge_intervals(mut intervals: Vec<TimeWindow>) -> Vec<TimeWindow> {
    intervals.retain(|w| w.ends_at > w.starts_at);
    intervals.sort_by_key(|w| w.starts_at);

    let mut merged: Vec<TimeWindow> = Vec::with_capacity(intervals.len());
    for w in intervals {
        match merged.last_mut() {
            Some(last) if w.starts_at <= last.ends_at => {
                if w.ends_at > last.ends_at {
                    last.ends_at = w.ends_at;
                }
            }
            _ => merged.push(w),
        }
    }
    merged
}

/// Free windows of at least `min_len` inside working hours on weekdays
///
/// `busy` must already be merged.
pub fn free_windows(
    busy: &[TimeWindow],
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    min_len: Duration,
    hours: WorkingHours,
) -> Vec<TimeWindow> {
    let mut free = Vec::new();
    let mut day = from.date_naive();
    let last_day = to.date_naive();

    while day <= last_day {
        if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            let midnight = day.and_time(NaiveTime::MIN).and_utc();
            let open = (midnight + Duration::hours(hours.start as i64)).max(from);
            let close = (midnight + Duration::hours(hours.end as i64)).min(to);

            if close > open {
                let mut cursor = open;
                for b in busy.iter().filter(|b| b.ends_at > open && b.starts_at < close) {
                    if b.starts_at > cursor {
                        push_if_long(&mut free, cursor, b.starts_at, min_len);
                    }
                    if b.ends_at > cursor {
                        cursor = b.ends_at;
                    }
                }
                if close > cursor {
                    push_if_long(&mut free, cursor, close, min_len);
                }
            }
        }

        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }

    free
}

fn push_if_long(out: &mut Vec<TimeWindow>, start: DateTime<Utc>, end: DateTime<Utc>, min_len: Duration) {
    if end - start >= min_len {
        out.push(TimeWindow::new(start, end));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const HOURS: WorkingHours = WorkingHours { start: 9, end: 17 };

    fn at(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        // March 2024: the 4th is a Monday
        Utc.with_ymd_and_hms(2024, 3, d, h, m, 0).unwrap()
    }

    #[test]
    fn test_merge_overlapping_and_touching() {
        let merged = merge_intervals(vec![
            TimeWindow::new(at(4, 13, 0), at(4, 14, 0)),
            TimeWindow::new(at(4, 9, 0), at(4, 10, 0)),
            TimeWindow::new(at(4, 9, 30), at(4, 11, 0)),
            TimeWindow::new(at(4, 11, 0), at(4, 12, 0)),
        ]);
        assert_eq!(
            merged,
            vec![
                TimeWindow::new(at(4, 9, 0), at(4, 12, 0)),
                TimeWindow::new(at(4, 13, 0), at(4, 14, 0)),
            ]
        );
    }

    #[test]
    fn test_free_windows_single_day() {
        let busy = merge_intervals(vec![
            TimeWindow::new(at(4, 10, 0), at(4, 11, 0)),
            TimeWindow::new(at(4, 13, 0), at(4, 13, 20)),
        ]);
        let free = free_windows(&busy, at(4, 0, 0), at(4, 23, 59), Duration::minutes(30), HOURS);
        assert_eq!(
            free,
            vec![
                TimeWindow::new(at(4, 9, 0), at(4, 10, 0)),
                TimeWindow::new(at(4, 11, 0), at(4, 13, 0)),
                TimeWindow::new(at(4, 13, 20), at(4, 17, 0)),
            ]
        );
    }

    #[test]
    fn test_short_gaps_dropped() {
        let busy = vec![
            TimeWindow::new(at(4, 9, 20), at(4, 16, 50)),
        ];
        let free = free_windows(&busy, at(4, 0, 0), at(5, 0, 0), Duration::minutes(30), HOURS);
        assert!(free.is_empty());
    }

    #[test]
    fn test_weekends_skipped() {
        // Friday 8th through Monday 11th
        let free = free_windows(&[], at(8, 0, 0), at(11, 23, 0), Duration::minutes(60), HOURS);
        let days: Vec<u32> = free.iter().map(|w| w.starts_at.day()).collect();
        assert_eq!(days, vec![8, 11]);
    }

    #[test]
    fn test_range_clips_working_hours() {
        let free = free_windows(&[], at(4, 15, 0), at(4, 16, 30), Duration::minutes(15), HOURS);
        assert_eq!(free, vec![TimeWindow::new(at(4, 15, 0), at(4, 16, 30))]);
    }
}
