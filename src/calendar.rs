//! Mois cible et conversion des horaires nominaux en instants UTC.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use std::fmt;
use std::str::FromStr;

/// Mois calendaire ciblé par un run (`YYYY-MM`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetMonth {
    year: i32,
    month: u32,
}

impl TargetMonth {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            bail!("month must be within 1..=12, got {month}");
        }
        NaiveDate::from_ymd_opt(year, month, 1)
            .with_context(|| format!("year out of range: {year}"))?;
        Ok(Self { year, month })
    }

    /// Mois contenant la date donnée.
    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn first_day(&self) -> NaiveDate {
        // validé à la construction
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// Premier jour du mois suivant (borne exclusive).
    pub fn next_first_day(&self) -> NaiveDate {
        let (year, month) = if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        };
        NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MAX)
    }

    pub fn last_day(&self) -> NaiveDate {
        self.next_first_day() - Duration::days(1)
    }

    /// Nombre de jours (années bissextiles comprises).
    pub fn num_days(&self) -> u32 {
        days_between(self.first_day(), self.next_first_day()) as u32
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let first = self.first_day();
        (0..i64::from(self.num_days())).map(move |offset| first + Duration::days(offset))
    }

    /// Fenêtre UTC `[start, end)` du mois.
    pub fn range(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (midnight_utc(self.first_day()), midnight_utc(self.next_first_day()))
    }
}

impl fmt::Display for TargetMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.first_day().format("%B %Y"))
    }
}

impl FromStr for TargetMonth {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let (year, month) = raw
            .split_once('-')
            .with_context(|| format!("expected YYYY-MM, got {raw}"))?;
        let year: i32 = year
            .parse()
            .with_context(|| format!("invalid year in {raw}"))?;
        let month: u32 = month
            .parse()
            .with_context(|| format!("invalid month in {raw}"))?;
        Self::new(year, month)
    }
}

pub fn midnight_utc(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&NaiveDateTime::new(date, NaiveTime::MIN))
}

/// Instants absolus d'un shift ; une fin `<=` au début bascule au lendemain
/// (ex. 16:00 → 00:00).
pub fn shift_datetimes(
    date: NaiveDate,
    start_time: NaiveTime,
    end_time: NaiveTime,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let start_dt = Utc.from_utc_datetime(&NaiveDateTime::new(date, start_time));
    let end_date = if end_time <= start_time {
        date + Duration::days(1)
    } else {
        date
    };
    let end_dt = Utc.from_utc_datetime(&NaiveDateTime::new(end_date, end_time));
    (start_dt, end_dt)
}

pub fn days_between(start: NaiveDate, current: NaiveDate) -> i64 {
    current.signed_duration_since(start).num_days()
}
