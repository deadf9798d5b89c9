use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{Datelike, Duration, NaiveDate};

/// Monday of the week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// The week every manager fetch is anchored to. The current week is
/// derived from the `today` passed to each forward move, so a cursor kept
/// across midnight on Sunday can reach the new week.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeekCursor {
    current_week_start: NaiveDate,
}

impl WeekCursor {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            current_week_start: week_start(today),
        }
    }

    /// Starts at the week of a notification instead of the current week.
    /// The notification date is consumed so it only applies once.
    pub fn with_notification(today: NaiveDate, notification: &mut Option<NaiveDate>) -> Self {
        let mut cursor = Self::new(today);
        if let Some(date) = notification.take() {
            cursor.current_week_start = week_start(date);
        }
        cursor
    }

    pub fn start(&self) -> NaiveDate {
        self.current_week_start
    }

    pub fn end(&self) -> NaiveDate {
        self.current_week_start + Duration::days(6)
    }

    pub fn previous_week(&mut self) {
        self.current_week_start -= Duration::weeks(1);
    }

    pub fn can_go_next(&self, today: NaiveDate) -> bool {
        self.current_week_start + Duration::weeks(1) < week_start(today) + Duration::weeks(1)
    }

    /// Moves one week forward unless that would pass the week of `today`.
    /// Returns whether the cursor moved.
    pub fn next_week(&mut self, today: NaiveDate) -> bool {
        if !self.can_go_next(today) {
            return false;
        }
        self.current_week_start += Duration::weeks(1);
        true
    }

    /// e.g. `Oct 12 - Oct 18, 2026`
    pub fn label(&self) -> String {
        format!(
            "{} - {}",
            self.current_week_start.format("%b %-d"),
            self.end().format("%b %-d, %Y")
        )
    }
}

/// Monotonic request counter. A response is only applied while its
/// generation is still the latest one handed out.
#[derive(Debug, Default)]
pub struct Generation(AtomicU64);

impl Generation {
    pub fn advance(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.0.load(Ordering::Acquire) == generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn weeks_start_on_monday() {
        assert_eq!(week_start(day(2026, 10, 14)), day(2026, 10, 12));
        assert_eq!(week_start(day(2026, 10, 12)), day(2026, 10, 12));
        assert_eq!(week_start(day(2026, 10, 18)), day(2026, 10, 12));
    }

    #[test]
    fn cannot_move_past_current_week() {
        let today = day(2026, 10, 14);
        let mut cursor = WeekCursor::new(today);
        assert!(!cursor.can_go_next(today));
        assert!(!cursor.next_week(today));
        assert_eq!(cursor.start(), day(2026, 10, 12));
    }

    #[test]
    fn back_and_forth() {
        let today = day(2026, 10, 14);
        let mut cursor = WeekCursor::new(today);
        cursor.previous_week();
        cursor.previous_week();
        assert_eq!(cursor.start(), day(2026, 9, 28));

        assert!(cursor.next_week(today));
        assert!(cursor.next_week(today));
        assert!(!cursor.next_week(today));
        assert_eq!(cursor.start(), day(2026, 10, 12));
    }

    #[test]
    fn current_week_follows_the_clock() {
        let sunday = day(2026, 10, 18);
        let mut cursor = WeekCursor::new(sunday);
        assert!(!cursor.can_go_next(sunday));

        let monday = day(2026, 10, 19);
        assert!(cursor.can_go_next(monday));
        assert!(cursor.next_week(monday));
        assert_eq!(cursor.start(), monday);
        assert!(!cursor.next_week(monday));
    }

    #[test]
    fn notification_applies_once() {
        let mut notification = Some(day(2026, 8, 6));
        let cursor = WeekCursor::with_notification(day(2026, 10, 14), &mut notification);
        assert_eq!(cursor.start(), day(2026, 8, 3));
        assert_eq!(notification, None);

        let cursor = WeekCursor::with_notification(day(2026, 10, 14), &mut notification);
        assert_eq!(cursor.start(), day(2026, 10, 12));
    }

    #[test]
    fn range_label() {
        let cursor = WeekCursor::new(day(2026, 12, 30));
        assert_eq!(cursor.label(), "Dec 28 - Jan 3, 2027");
    }

    #[test]
    fn stale_generations() {
        let generation = Generation::default();
        let first = generation.advance();
        assert!(generation.is_current(first));
        let second = generation.advance();
        assert!(!generation.is_current(first));
        assert!(generation.is_current(second));
    }
}
