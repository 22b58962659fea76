use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Days, Months, NaiveDate};
use thiserror::Error;

/// Look-back window accepted by the history endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HistoryPeriod {
    OneDay,
    FiveDays,
    OneMonth,
    ThreeMonths,
    SixMonths,
    #[default]
    OneYear,
    TwoYears,
    FiveYears,
    TenYears,
    YearToDate,
    Max,
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("unknown history period: {0}")]
pub struct UnknownPeriod(pub String);

impl HistoryPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryPeriod::OneDay => "1d",
            HistoryPeriod::FiveDays => "5d",
            HistoryPeriod::OneMonth => "1m",
            HistoryPeriod::ThreeMonths => "3m",
            HistoryPeriod::SixMonths => "6m",
            HistoryPeriod::OneYear => "1y",
            HistoryPeriod::TwoYears => "2y",
            HistoryPeriod::FiveYears => "5y",
            HistoryPeriod::TenYears => "10y",
            HistoryPeriod::YearToDate => "ytd",
            HistoryPeriod::Max => "max",
        }
    }

    /// First day of the window that ends on `end`. Month arithmetic clamps to
    /// the last valid day, so 2024-03-31 minus one month is 2024-02-29.
    pub fn start_date(&self, end: NaiveDate) -> NaiveDate {
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or(NaiveDate::MIN);
        let start = match self {
            HistoryPeriod::OneDay => end.checked_sub_days(Days::new(1)),
            HistoryPeriod::FiveDays => end.checked_sub_days(Days::new(5)),
            HistoryPeriod::OneMonth => end.checked_sub_months(Months::new(1)),
            HistoryPeriod::ThreeMonths => end.checked_sub_months(Months::new(3)),
            HistoryPeriod::SixMonths => end.checked_sub_months(Months::new(6)),
            HistoryPeriod::OneYear => end.checked_sub_months(Months::new(12)),
            HistoryPeriod::TwoYears => end.checked_sub_months(Months::new(24)),
            HistoryPeriod::FiveYears => end.checked_sub_months(Months::new(60)),
            HistoryPeriod::TenYears => end.checked_sub_months(Months::new(120)),
            HistoryPeriod::YearToDate => NaiveDate::from_ymd_opt(end.year(), 1, 1),
            HistoryPeriod::Max => Some(epoch),
        };
        start.unwrap_or(epoch)
    }
}

impl FromStr for HistoryPeriod {
    type Err = UnknownPeriod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1d" => Ok(HistoryPeriod::OneDay),
            "5d" => Ok(HistoryPeriod::FiveDays),
            "1m" => Ok(HistoryPeriod::OneMonth),
            "3m" => Ok(HistoryPeriod::ThreeMonths),
            "6m" => Ok(HistoryPeriod::SixMonths),
            "1y" => Ok(HistoryPeriod::OneYear),
            "2y" => Ok(HistoryPeriod::TwoYears),
            "5y" => Ok(HistoryPeriod::FiveYears),
            "10y" => Ok(HistoryPeriod::TenYears),
            "ytd" => Ok(HistoryPeriod::YearToDate),
            "max" => Ok(HistoryPeriod::Max),
            _ => Err(UnknownPeriod(s.to_string())),
        }
    }
}

impl fmt::Display for HistoryPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
