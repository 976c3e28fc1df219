use chrono::{DateTime, Datelike, Utc};

use crate::datekey::render_timezone;

/// Explicit render-state cursor feeding the grid builder. The only state
/// that survives a navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthCursor {
    pub year: i32,
    pub month0: u32,
}

impl MonthCursor {
    #[must_use]
    pub fn new(year: i32, month0: u32) -> Self {
        Self {
            year,
            month0: month0.min(11),
        }
    }

    /// Cursor for the month containing `now` in the rendering timezone.
    #[must_use]
    pub fn current(now: DateTime<Utc>) -> Self {
        let local = now.with_timezone(render_timezone());
        Self {
            year: local.year(),
            month0: local.month0(),
        }
    }

    pub fn prev(&mut self) {
        if self.month0 == 0 {
            self.month0 = 11;
            self.year -= 1;
        } else {
            self.month0 -= 1;
        }
    }

    pub fn next(&mut self) {
        if self.month0 == 11 {
            self.month0 = 0;
            self.year += 1;
        } else {
            self.month0 += 1;
        }
    }

    pub fn shift(&mut self, offset: i32) {
        for _ in 0..offset.unsigned_abs() {
            if offset < 0 {
                self.prev();
            } else {
                self.next();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::MonthCursor;

    #[test]
    fn prev_wraps_january_into_previous_december() {
        let mut cursor = MonthCursor::new(2025, 0);
        cursor.prev();
        assert_eq!(cursor, MonthCursor::new(2024, 11));
    }

    #[test]
    fn next_wraps_december_into_next_january() {
        let mut cursor = MonthCursor::new(2025, 11);
        cursor.next();
        assert_eq!(cursor, MonthCursor::new(2026, 0));
    }

    #[test]
    fn shift_applies_signed_offsets() {
        let mut cursor = MonthCursor::new(2025, 5);
        cursor.shift(-7);
        assert_eq!(cursor, MonthCursor::new(2024, 10));
        cursor.shift(14);
        assert_eq!(cursor, MonthCursor::new(2026, 0));
    }
}
