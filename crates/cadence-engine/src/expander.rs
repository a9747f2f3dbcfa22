//! Occurrence expansion — converts a rule plus anchor span into concrete
//! (start, end) instances inside a query window.
//!
//! A virtual cursor walks occurrence starts from the anchor in strictly
//! increasing order. COUNT is charged for every occurrence generated since
//! the anchor, including ones skipped because they fall before the window,
//! so a window deep into a finite series sees the correct tail. Termination
//! is checked in priority order: COUNT exhausted, UNTIL exceeded (UNTIL is
//! inclusive), cursor past the window end, returned set at the cap.
//!
//! Stepping is frequency-specific:
//!
//! - DAILY advances by `interval` days.
//! - WEEKLY with BYDAY enumerates the matching weekdays of each
//!   interval-week block in chronological order; without BYDAY it steps by
//!   `interval` weeks on the anchor's weekday.
//! - MONTHLY adds `interval` months preserving the anchor's day-of-month,
//!   clamping to the last day of shorter months (Jan 31 + 1 month is
//!   Feb 28/29).
//! - YEARLY adds `interval` years with the same clamp for Feb 29 anchors in
//!   non-leap years.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::rule::{Frequency, RecurrenceRule};

/// Default hard cap on the size of any returned occurrence set.
pub const DEFAULT_MAX_OCCURRENCES: usize = 10_000;

/// One concrete instance generated from a rule and an anchor span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
pub struct ExpandOptions {
    /// Cap on the size of the returned set (not on occurrences generated).
    pub max_occurrences: usize,
    /// When true the window behaves as (from, to): an occurrence starting
    /// exactly at `from` is skipped, though it still consumes the COUNT
    /// budget.
    pub strict_after: bool,
}

impl Default for ExpandOptions {
    fn default() -> Self {
        Self {
            max_occurrences: DEFAULT_MAX_OCCURRENCES,
            strict_after: false,
        }
    }
}

/// Expand `rule` into the occurrences whose starts fall inside [from, to).
///
/// The anchor span seeds the cursor and fixes the duration of every
/// occurrence. The result is ordered, deduplicated, and capped at
/// `options.max_occurrences`.
///
/// # Errors
///
/// Fails when the rule does not validate, when the anchor span is inverted,
/// or when date arithmetic leaves chrono's representable range.
pub fn expand_in_window(
    rule: &RecurrenceRule,
    anchor_start: DateTime<Utc>,
    anchor_end: DateTime<Utc>,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    options: &ExpandOptions,
) -> Result<Vec<Occurrence>> {
    let duration = anchor_duration(anchor_start, anchor_end)?;
    let mut iter = OccurrenceIter::new(rule, anchor_start)?;
    let mut out = Vec::new();
    if options.max_occurrences == 0 {
        return Ok(out);
    }
    while let Some(start) = iter.next_start()? {
        if start >= to {
            break;
        }
        if start < from {
            continue;
        }
        if options.strict_after && start == from {
            continue;
        }
        let end = start
            .checked_add_signed(duration)
            .ok_or_else(out_of_range)?;
        out.push(Occurrence { start, end });
        if out.len() >= options.max_occurrences {
            break;
        }
    }
    Ok(out)
}

/// First occurrence with a start strictly after `after`.
///
/// Returns `Ok(None)` when the series is finite and exhausted before
/// reaching `after`. The forward search is bounded by
/// [`DEFAULT_MAX_OCCURRENCES`] generated occurrences.
pub fn next_occurrence(
    rule: &RecurrenceRule,
    anchor_start: DateTime<Utc>,
    anchor_end: DateTime<Utc>,
    after: DateTime<Utc>,
) -> Result<Option<Occurrence>> {
    let duration = anchor_duration(anchor_start, anchor_end)?;
    let mut iter = OccurrenceIter::new(rule, anchor_start)?;
    let mut scanned = 0;
    while let Some(start) = iter.next_start()? {
        if start > after {
            let end = start
                .checked_add_signed(duration)
                .ok_or_else(out_of_range)?;
            return Ok(Some(Occurrence { start, end }));
        }
        scanned += 1;
        if scanned >= DEFAULT_MAX_OCCURRENCES {
            break;
        }
    }
    Ok(None)
}

/// Whether `at` lands exactly on an occurrence start of the series.
///
/// This is the alignment probe used before exception and bulk-modification
/// writes; matching is exact timestamp equality. The search is bounded by
/// [`DEFAULT_MAX_OCCURRENCES`] generated occurrences.
pub fn is_occurrence_start(
    rule: &RecurrenceRule,
    anchor_start: DateTime<Utc>,
    at: DateTime<Utc>,
) -> Result<bool> {
    let mut iter = OccurrenceIter::new(rule, anchor_start)?;
    let mut scanned = 0;
    while let Some(start) = iter.next_start()? {
        if start == at {
            return Ok(true);
        }
        if start > at {
            return Ok(false);
        }
        scanned += 1;
        if scanned >= DEFAULT_MAX_OCCURRENCES {
            break;
        }
    }
    Ok(false)
}

fn anchor_duration(anchor_start: DateTime<Utc>, anchor_end: DateTime<Utc>) -> Result<Duration> {
    if anchor_end < anchor_start {
        return Err(EngineError::InvalidOperation(
            "anchor end precedes anchor start".to_string(),
        ));
    }
    Ok(anchor_end - anchor_start)
}

fn out_of_range() -> EngineError {
    EngineError::Expansion("date arithmetic out of chrono's representable range".to_string())
}

/// Occurrence starts of a validated rule, honoring COUNT and UNTIL.
///
/// `next_start` yields every occurrence from the anchor forward in strictly
/// increasing order and returns `Ok(None)` once the series is exhausted.
/// Callers that iterate without a window bound must cap their own scan.
pub(crate) struct OccurrenceIter<'a> {
    cursor: Cursor<'a>,
    generated: u32,
    count: Option<u32>,
    until: Option<DateTime<Utc>>,
}

impl<'a> OccurrenceIter<'a> {
    pub(crate) fn new(rule: &'a RecurrenceRule, anchor: DateTime<Utc>) -> Result<Self> {
        rule.validate()?;
        Ok(Self {
            cursor: Cursor::new(rule, anchor)?,
            generated: 0,
            count: rule.count,
            until: rule.until,
        })
    }

    pub(crate) fn next_start(&mut self) -> Result<Option<DateTime<Utc>>> {
        if let Some(count) = self.count {
            if self.generated >= count {
                return Ok(None);
            }
        }
        let start = self.cursor.next()?;
        self.generated = self.generated.saturating_add(1);
        if let Some(until) = self.until {
            if start > until {
                return Ok(None);
            }
        }
        Ok(Some(start))
    }
}

/// The frequency-specific stepping state. Candidates are computed from the
/// anchor and an occurrence index rather than by repeated addition, so
/// month clamping never drifts (Jan 31, Feb 28, Mar 31, ...).
struct Cursor<'a> {
    rule: &'a RecurrenceRule,
    anchor: DateTime<Utc>,
    /// Occurrence index for the direct-stepping frequencies.
    step: u64,
    /// Week-block state for WEEKLY with BYDAY: the block anchor is the
    /// week_start-aligned start of the anchor's week, at the anchor's time
    /// of day.
    block_anchor: DateTime<Utc>,
    offsets: Vec<i64>,
    block: u64,
    position: usize,
}

impl<'a> Cursor<'a> {
    fn new(rule: &'a RecurrenceRule, anchor: DateTime<Utc>) -> Result<Self> {
        let mut block_anchor = anchor;
        let mut offsets = Vec::new();
        if rule.freq == Frequency::Weekly && !rule.by_day.is_empty() {
            let back = days_from_week_start(anchor.weekday(), rule.week_start);
            block_anchor = anchor
                .checked_sub_signed(Duration::days(back))
                .ok_or_else(out_of_range)?;
            offsets = rule
                .by_day
                .iter()
                .map(|day| days_from_week_start(*day, rule.week_start))
                .collect();
            offsets.sort_unstable();
            offsets.dedup();
        }
        Ok(Self {
            rule,
            anchor,
            step: 0,
            block_anchor,
            offsets,
            block: 0,
            position: 0,
        })
    }

    fn next(&mut self) -> Result<DateTime<Utc>> {
        let interval = u64::from(self.rule.interval);
        match self.rule.freq {
            Frequency::Daily => {
                let days = checked_days(self.step, interval)?;
                self.step += 1;
                add_days(self.anchor, days)
            }
            Frequency::Weekly if self.offsets.is_empty() => {
                let weeks = checked_days(self.step, interval)?;
                self.step += 1;
                add_days(self.anchor, weeks * 7)
            }
            Frequency::Weekly => loop {
                let block_days = checked_days(self.block, interval * 7)?;
                let days = block_days + self.offsets[self.position];
                self.position += 1;
                if self.position == self.offsets.len() {
                    self.position = 0;
                    self.block += 1;
                }
                let candidate = add_days(self.block_anchor, days)?;
                // Matching weekdays earlier in the anchor's own week are not
                // occurrences; the series starts at the anchor.
                if candidate < self.anchor {
                    continue;
                }
                return Ok(candidate);
            },
            Frequency::Monthly => {
                let months = self.step.checked_mul(interval).ok_or_else(out_of_range)?;
                self.step += 1;
                add_months_clamped(self.anchor, months)
            }
            Frequency::Yearly => {
                let months = self
                    .step
                    .checked_mul(interval)
                    .and_then(|years| years.checked_mul(12))
                    .ok_or_else(out_of_range)?;
                self.step += 1;
                add_months_clamped(self.anchor, months)
            }
        }
    }
}

fn days_from_week_start(day: Weekday, week_start: Weekday) -> i64 {
    i64::from((day.num_days_from_monday() + 7 - week_start.num_days_from_monday()) % 7)
}

fn checked_days(step: u64, per_step: u64) -> Result<i64> {
    step.checked_mul(per_step)
        .and_then(|days| i64::try_from(days).ok())
        .ok_or_else(out_of_range)
}

fn add_days(base: DateTime<Utc>, days: i64) -> Result<DateTime<Utc>> {
    let delta = Duration::try_days(days).ok_or_else(out_of_range)?;
    base.checked_add_signed(delta).ok_or_else(out_of_range)
}

/// Add whole months, preserving the anchor's day-of-month and clamping to
/// the target month's last day when it is shorter.
fn add_months_clamped(anchor: DateTime<Utc>, months: u64) -> Result<DateTime<Utc>> {
    let months = i64::try_from(months).map_err(|_| out_of_range())?;
    let total = i64::from(anchor.month0()) + months;
    let year = i64::from(anchor.year()) + total.div_euclid(12);
    let year = i32::try_from(year).map_err(|_| out_of_range())?;
    let month = u32::try_from(total.rem_euclid(12)).map_err(|_| out_of_range())? + 1;
    let day = anchor.day().min(days_in_month(year, month)?);
    let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(out_of_range)?;
    Ok(Utc.from_utc_datetime(&date.and_time(anchor.time())))
}

fn days_in_month(year: i32, month: u32) -> Result<u32> {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
        .ok_or_else(out_of_range)
}
