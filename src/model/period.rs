use crate::Result;
use anyhow::{bail, Context};
use chrono::{Datelike, NaiveDate, Utc};
use chrono_tz::Tz;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// A calendar month, written as `YYYYMM` in chat commands and matched against canonical
/// `YYYY-MM-DD` ledger dates by the `YYYY-MM` prefix.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            bail!("Invalid month {month}, expected 1 through 12");
        }
        if !(1..=9999).contains(&year) {
            bail!("Invalid year {year}");
        }
        Ok(Self { year, month })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// The current month in the timezone `tz`.
    pub fn current(tz: Tz) -> Self {
        Self::from_date(Utc::now().with_timezone(&tz).date_naive())
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// The `YYYY-MM` prefix shared by every canonical date in this month.
    pub fn prefix(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }

    /// A human readable label, e.g. `2024年08月`.
    pub fn label(&self) -> String {
        format!("{:04}年{:02}月", self.year, self.month)
    }
}

impl Display for YearMonth {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = anyhow::Error;

    /// Parses exactly six ASCII digits, `YYYYMM`.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.len() != 6 || !s.bytes().all(|b| b.is_ascii_digit()) {
            bail!("Expected a month in the form YYYYMM, got '{s}'");
        }
        let year: i32 = s[..4]
            .parse()
            .with_context(|| format!("Invalid year in '{s}'"))?;
        let month: u32 = s[4..]
            .parse()
            .with_context(|| format!("Invalid month in '{s}'"))?;
        Self::new(year, month)
    }
}

/// The set of ledger entries an organize run covers.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Period {
    /// Entries whose date carries this month's `YYYY-MM` prefix. Legacy `M/D` dates never match.
    Month(YearMonth),
    /// Every entry in the ledger, legacy dates included.
    All,
}

impl Period {
    /// Whether a ledger entry dated `date` belongs to this period.
    pub fn contains(&self, date: &str) -> bool {
        match self {
            Period::Month(month) => date.starts_with(&month.prefix()),
            Period::All => true,
        }
    }

    pub fn label(&self) -> String {
        match self {
            Period::Month(month) => month.label(),
            Period::All => "全部紀錄".to_string(),
        }
    }
}
