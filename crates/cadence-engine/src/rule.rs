//! Recurrence rule codec — parse, serialize, and validate RRULE-style text.
//!
//! The text format is `["RRULE:"] KEY=VALUE (";" KEY=VALUE)*` with the keys
//! FREQ, INTERVAL, COUNT, UNTIL, BYDAY, BYMONTHDAY, BYMONTH, BYYEARDAY,
//! BYWEEKNO, BYHOUR, BYMINUTE, BYSECOND, and WKST. Parsing is lenient where
//! the wire demands it (unknown keys are skipped, a malformed UNTIL is left
//! unset) and strict where a value cannot be represented (an unsupported
//! FREQ or an unknown weekday token is a hard error). Serialization emits
//! fields in a fixed order so that `parse(serialize(r))` reproduces every
//! supported field of `r`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc, Weekday};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{EngineError, Result};

/// The UNTIL wire form, always UTC.
const UNTIL_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// The four supported stepping frequencies. Anything else on the wire is
/// rejected up front rather than producing a degenerate expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub fn as_token(self) -> &'static str {
        match self {
            Frequency::Daily => "DAILY",
            Frequency::Weekly => "WEEKLY",
            Frequency::Monthly => "MONTHLY",
            Frequency::Yearly => "YEARLY",
        }
    }

    fn from_token(token: &str) -> Option<Self> {
        match token {
            "DAILY" => Some(Frequency::Daily),
            "WEEKLY" => Some(Frequency::Weekly),
            "MONTHLY" => Some(Frequency::Monthly),
            "YEARLY" => Some(Frequency::Yearly),
            _ => None,
        }
    }
}

fn weekday_token(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
        Weekday::Sun => "SU",
    }
}

fn weekday_from_token(token: &str) -> Option<Weekday> {
    match token {
        "MO" => Some(Weekday::Mon),
        "TU" => Some(Weekday::Tue),
        "WE" => Some(Weekday::Wed),
        "TH" => Some(Weekday::Thu),
        "FR" => Some(Weekday::Fri),
        "SA" => Some(Weekday::Sat),
        "SU" => Some(Weekday::Sun),
        _ => None,
    }
}

/// A declarative recurrence rule, owned by exactly one recurring entity.
///
/// `count` and `until` are mutually exclusive; by-part lists keep the order
/// they carried on the wire. `week_start` defaults to Monday.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceRule {
    pub freq: Frequency,
    pub interval: u32,
    pub count: Option<u32>,
    pub until: Option<DateTime<Utc>>,
    pub by_day: Vec<Weekday>,
    pub by_month_day: Vec<i32>,
    pub by_month: Vec<u32>,
    pub by_year_day: Vec<i32>,
    pub by_week_no: Vec<i32>,
    pub by_hour: Vec<u32>,
    pub by_minute: Vec<u32>,
    pub by_second: Vec<u32>,
    pub week_start: Weekday,
}

impl RecurrenceRule {
    pub fn new(freq: Frequency) -> Self {
        Self {
            freq,
            interval: 1,
            count: None,
            until: None,
            by_day: Vec::new(),
            by_month_day: Vec::new(),
            by_month: Vec::new(),
            by_year_day: Vec::new(),
            by_week_no: Vec::new(),
            by_hour: Vec::new(),
            by_minute: Vec::new(),
            by_second: Vec::new(),
            week_start: Weekday::Mon,
        }
    }

    /// Parse rule text, with or without the `RRULE:` prefix.
    ///
    /// Unknown keys are skipped. INTERVAL defaults to 1 when absent. An
    /// UNTIL value that does not match `YYYYMMDDTHHMMSSZ` is left unset.
    ///
    /// # Errors
    ///
    /// Returns an error when FREQ is missing or unsupported, or when a known
    /// key carries a value that cannot be represented (a malformed integer
    /// or an unknown weekday token).
    pub fn parse(text: &str) -> Result<Self> {
        let body = text.trim();
        let body = body.strip_prefix("RRULE:").unwrap_or(body);

        let mut freq = None;
        let mut interval = 1;
        let mut count = None;
        let mut until = None;
        let mut by_day = Vec::new();
        let mut by_month_day = Vec::new();
        let mut by_month = Vec::new();
        let mut by_year_day = Vec::new();
        let mut by_week_no = Vec::new();
        let mut by_hour = Vec::new();
        let mut by_minute = Vec::new();
        let mut by_second = Vec::new();
        let mut week_start = Weekday::Mon;

        for pair in body.split(';') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            // Tokens without '=' get the same treatment as unknown keys.
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            match key.to_ascii_uppercase().as_str() {
                "FREQ" => {
                    freq = Some(Frequency::from_token(value).ok_or_else(|| {
                        EngineError::UnsupportedFrequency(value.to_string())
                    })?);
                }
                "INTERVAL" => interval = parse_int(value, "INTERVAL")?,
                "COUNT" => count = Some(parse_int(value, "COUNT")?),
                "UNTIL" => until = parse_until(value),
                "BYDAY" => by_day = parse_weekday_list(value, "BYDAY")?,
                "BYMONTHDAY" => by_month_day = parse_int_list(value, "BYMONTHDAY")?,
                "BYMONTH" => by_month = parse_int_list(value, "BYMONTH")?,
                "BYYEARDAY" => by_year_day = parse_int_list(value, "BYYEARDAY")?,
                "BYWEEKNO" => by_week_no = parse_int_list(value, "BYWEEKNO")?,
                "BYHOUR" => by_hour = parse_int_list(value, "BYHOUR")?,
                "BYMINUTE" => by_minute = parse_int_list(value, "BYMINUTE")?,
                "BYSECOND" => by_second = parse_int_list(value, "BYSECOND")?,
                "WKST" => {
                    week_start = weekday_from_token(value).ok_or_else(|| {
                        EngineError::InvalidRule {
                            field: "WKST",
                            reason: format!("unknown weekday token '{value}'"),
                        }
                    })?;
                }
                _ => {}
            }
        }

        let freq = freq.ok_or(EngineError::InvalidRule {
            field: "FREQ",
            reason: "missing".to_string(),
        })?;

        Ok(Self {
            freq,
            interval,
            count,
            until,
            by_day,
            by_month_day,
            by_month,
            by_year_day,
            by_week_no,
            by_hour,
            by_minute,
            by_second,
            week_start,
        })
    }

    /// Check the invariants a rule must satisfy before it is expanded.
    ///
    /// # Errors
    ///
    /// Every violation names the offending field: interval below 1, COUNT
    /// and UNTIL both set, a non-positive COUNT, or an out-of-range by-part
    /// token.
    pub fn validate(&self) -> Result<()> {
        if self.interval < 1 {
            return Err(invalid("INTERVAL", "must be at least 1"));
        }
        if self.count.is_some() && self.until.is_some() {
            return Err(invalid("COUNT", "COUNT and UNTIL are mutually exclusive"));
        }
        if self.count == Some(0) {
            return Err(invalid("COUNT", "must be a positive integer"));
        }
        for &day in &self.by_month_day {
            if day == 0 || !(-31..=31).contains(&day) {
                return Err(invalid("BYMONTHDAY", format!("{day} outside [-31,31]\\{{0}}")));
            }
        }
        for &month in &self.by_month {
            if !(1..=12).contains(&month) {
                return Err(invalid("BYMONTH", format!("{month} outside [1,12]")));
            }
        }
        for &day in &self.by_year_day {
            if day == 0 || !(-366..=366).contains(&day) {
                return Err(invalid("BYYEARDAY", format!("{day} outside [-366,366]\\{{0}}")));
            }
        }
        for &week in &self.by_week_no {
            if week == 0 || !(-53..=53).contains(&week) {
                return Err(invalid("BYWEEKNO", format!("{week} outside [-53,53]\\{{0}}")));
            }
        }
        for &hour in &self.by_hour {
            if hour > 23 {
                return Err(invalid("BYHOUR", format!("{hour} outside [0,23]")));
            }
        }
        for &minute in &self.by_minute {
            if minute > 59 {
                return Err(invalid("BYMINUTE", format!("{minute} outside [0,59]")));
            }
        }
        for &second in &self.by_second {
            if second > 59 {
                return Err(invalid("BYSECOND", format!("{second} outside [0,59]")));
            }
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> EngineError {
    EngineError::InvalidRule {
        field,
        reason: reason.into(),
    }
}

fn parse_int<T: FromStr>(value: &str, field: &'static str) -> Result<T> {
    value.trim().parse().map_err(|_| EngineError::InvalidRule {
        field,
        reason: format!("malformed integer '{value}'"),
    })
}

fn parse_int_list<T: FromStr>(value: &str, field: &'static str) -> Result<Vec<T>> {
    value.split(',').map(|token| parse_int(token, field)).collect()
}

fn parse_weekday_list(value: &str, field: &'static str) -> Result<Vec<Weekday>> {
    value
        .split(',')
        .map(|token| {
            weekday_from_token(token.trim()).ok_or_else(|| EngineError::InvalidRule {
                field,
                reason: format!("unknown weekday token '{token}'"),
            })
        })
        .collect()
}

fn parse_until(value: &str) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(value, UNTIL_FORMAT).ok()?;
    Some(Utc.from_utc_datetime(&naive))
}

fn write_list<T: fmt::Display>(
    f: &mut fmt::Formatter<'_>,
    key: &str,
    items: &[T],
) -> fmt::Result {
    if items.is_empty() {
        return Ok(());
    }
    write!(f, ";{key}=")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ",")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for RecurrenceRule {
    /// Emission order is fixed: FREQ, INTERVAL (when not 1), COUNT, UNTIL,
    /// the BY* lists, then WKST (when not Monday).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FREQ={}", self.freq.as_token())?;
        if self.interval != 1 {
            write!(f, ";INTERVAL={}", self.interval)?;
        }
        if let Some(count) = self.count {
            write!(f, ";COUNT={count}")?;
        }
        if let Some(until) = self.until {
            write!(f, ";UNTIL={}", until.format(UNTIL_FORMAT))?;
        }
        let day_tokens: Vec<&str> = self.by_day.iter().map(|d| weekday_token(*d)).collect();
        write_list(f, "BYDAY", &day_tokens)?;
        write_list(f, "BYMONTHDAY", &self.by_month_day)?;
        write_list(f, "BYMONTH", &self.by_month)?;
        write_list(f, "BYYEARDAY", &self.by_year_day)?;
        write_list(f, "BYWEEKNO", &self.by_week_no)?;
        write_list(f, "BYHOUR", &self.by_hour)?;
        write_list(f, "BYMINUTE", &self.by_minute)?;
        write_list(f, "BYSECOND", &self.by_second)?;
        if self.week_start != Weekday::Mon {
            write!(f, ";WKST={}", weekday_token(self.week_start))?;
        }
        Ok(())
    }
}

impl FromStr for RecurrenceRule {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

// Rules cross the wire in their text form, so that is also the serde
// representation; deserialization is a parse.

impl Serialize for RecurrenceRule {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RecurrenceRule {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(de::Error::custom)
    }
}
