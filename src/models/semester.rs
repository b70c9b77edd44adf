//! Academic calendar helpers.

use std::fmt;

use chrono::{Datelike, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Offset between the Gregorian and ROC (Minguo) calendars.
const ROC_OFFSET: i32 = 1911;

/// One academic term, e.g. `114-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Semester {
    /// ROC academic year.
    pub year: u16,
    /// 1 (fall) or 2 (spring). 0 means "any term" in upstream queries.
    pub term: u8,
}

impl Semester {
    pub fn new(year: u16, term: u8) -> Self {
        Self { year, term }
    }

    /// The term that precedes this one.
    pub fn previous(self) -> Self {
        match self.term {
            2 => Self::new(self.year, 1),
            _ => Self::new(self.year.saturating_sub(1), 2),
        }
    }
}

impl fmt::Display for Semester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.year, self.term)
    }
}

/// Campus wall clock offset (UTC+8).
const CAMPUS_UTC_OFFSET_SECS: i32 = 8 * 60 * 60;

/// Today's date on the campus clock.
pub fn campus_today() -> NaiveDate {
    FixedOffset::east_opt(CAMPUS_UTC_OFFSET_SECS)
        .map(|tz| Utc::now().with_timezone(&tz).date_naive())
        .unwrap_or_else(|| Utc::now().date_naive())
}

/// Current ROC year for a Gregorian date.
pub fn roc_year(date: NaiveDate) -> u16 {
    (date.year() - ROC_OFFSET).max(0) as u16
}

/// Academic year that contains `date`. The academic year starts in August.
pub fn academic_year(date: NaiveDate) -> u16 {
    let roc = roc_year(date);
    if date.month() >= 8 {
        roc
    } else {
        roc.saturating_sub(1)
    }
}

/// The current and previous terms for `date`, newest first.
///
/// August through January belong to the fall term; February through July to
/// the spring term of the academic year that started the previous August.
pub fn semesters_for_date(date: NaiveDate) -> [Semester; 2] {
    let year = academic_year(date);
    let current = match date.month() {
        8..=12 | 1 => Semester::new(year, 1),
        _ => Semester::new(year, 2),
    };
    [current, current.previous()]
}
