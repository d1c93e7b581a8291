use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{NdviError, Result};

/// A calendar month of a specific year, the unit of one anomaly run.
///
/// The month is always within 1..=12, including when deserialized.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "YearMonthFields")]
pub struct YearMonth {
    year: i32,
    month: u32,
}

#[derive(Deserialize)]
struct YearMonthFields {
    year: i32,
    month: u32,
}

impl TryFrom<YearMonthFields> for YearMonth {
    type Error = NdviError;

    fn try_from(fields: YearMonthFields) -> Result<Self> {
        Self::new(fields.year, fields.month)
    }
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(NdviError::Config(format!("month {month} outside 1..=12")));
        }
        Ok(Self { year, month })
    }

    pub fn of(time: &DateTime<Utc>) -> Self {
        Self {
            year: time.year(),
            month: time.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    /// Month number, 1..=12.
    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn contains(&self, time: &DateTime<Utc>) -> bool {
        Self::of(time) == *self
    }

    /// Last day of the month; the time stamp attached to anomaly output.
    pub fn month_end(&self) -> NaiveDate {
        let (next_year, next_month) = if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        };
        NaiveDate::from_ymd_opt(next_year, next_month, 1)
            .and_then(|d| d.pred_opt())
            .unwrap_or(NaiveDate::MAX)
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Zero-based calendar month index of a time stamp.
pub fn month_index(time: &DateTime<Utc>) -> usize {
    time.month0() as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn month_end_handles_december_and_leap_years() {
        let dec = YearMonth::new(2021, 12).unwrap();
        assert_eq!(dec.month_end(), NaiveDate::from_ymd_opt(2021, 12, 31).unwrap());
        let feb = YearMonth::new(2024, 2).unwrap();
        assert_eq!(feb.month_end(), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
    }

    #[test]
    fn rejects_month_thirteen() {
        assert!(YearMonth::new(2020, 13).is_err());
        assert!(YearMonth::new(2020, 0).is_err());
    }

    #[test]
    fn display_is_zero_padded() {
        assert_eq!(YearMonth::new(2022, 3).unwrap().to_string(), "2022-03");
    }

    #[test]
    fn of_reads_calendar_month() {
        let t = Utc.with_ymd_and_hms(2023, 11, 30, 23, 0, 0).unwrap();
        let p = YearMonth::of(&t);
        assert_eq!((p.year(), p.month()), (2023, 11));
        assert!(p.contains(&t));
    }
}
