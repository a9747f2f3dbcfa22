//! Availability computation — combines recurring and non-recurring
//! obstructions into unavailable and available windows for a calendar.
//!
//! Events and blocked-time spans obstruct; available-time windows declare
//! bookable capacity. A calendar that declares available-time windows is
//! "managed" and only offers what those windows leave after subtracting
//! obstructions; an unmanaged calendar offers the query range itself unless
//! an obstruction fully covers it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{EntityId, EntityKind, EntityRecord, ExceptionSet};
use crate::resolver::{self, ResolveOptions};

/// One entity on a calendar, paired with its exception records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEntry {
    pub entity: EntityRecord,
    pub exceptions: ExceptionSet,
}

impl CalendarEntry {
    pub fn new(entity: EntityRecord) -> Self {
        Self {
            entity,
            exceptions: ExceptionSet::new(),
        }
    }
}

/// A calendar's entities as supplied by the host. Scoping (organization,
/// tenant) is the caller's concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calendar {
    pub calendar_id: String,
    pub entries: Vec<CalendarEntry>,
}

impl Calendar {
    pub fn new(calendar_id: impl Into<String>) -> Self {
        Self {
            calendar_id: calendar_id.into(),
            entries: Vec::new(),
        }
    }

    /// A calendar is managed when it declares explicit available-time
    /// windows.
    pub fn is_managed(&self) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.entity.kind == EntityKind::AvailableTime)
    }
}

/// An obstructed span, tagged with the entity that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnavailableWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub source: EntityId,
    pub kind: EntityKind,
}

/// A bookable span offered by a calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// False when the window is a remainder produced by subtracting an
    /// obstruction from a declared available-time span.
    pub partially_bookable: bool,
}

/// All concrete spans of one entry that overlap [from, to).
///
/// For recurring entries the expansion window is widened backwards by the
/// entity's duration, so an occurrence that starts before `from` but bleeds
/// into the range is still produced; the overlap filter then applies the
/// `start < to && end > from` test.
fn entry_spans(
    entry: &CalendarEntry,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Vec<(DateTime<Utc>, DateTime<Utc>)>> {
    let entity = &entry.entity;
    if entity.is_recurring() {
        let widened = from
            .checked_sub_signed(entity.duration())
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let resolved = resolver::resolve_occurrences(
            entity,
            &entry.exceptions,
            widened,
            to,
            &ResolveOptions::default(),
        )?;
        Ok(resolved
            .into_iter()
            .filter(|occurrence| occurrence.start < to && occurrence.end > from)
            .map(|occurrence| (occurrence.start, occurrence.end))
            .collect())
    } else if entity.start < to && entity.end > from {
        Ok(vec![(entity.start, entity.end)])
    } else {
        Ok(Vec::new())
    }
}

/// The union of event and blocked-time occurrences overlapping [from, to),
/// tagged with their source, sorted by start.
pub fn unavailable_windows(
    calendar: &Calendar,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Vec<UnavailableWindow>> {
    let mut windows = Vec::new();
    for entry in &calendar.entries {
        if entry.entity.kind == EntityKind::AvailableTime {
            continue;
        }
        for (start, end) in entry_spans(entry, from, to)? {
            windows.push(UnavailableWindow {
                start,
                end,
                source: entry.entity.id.clone(),
                kind: entry.entity.kind,
            });
        }
    }
    windows.sort_by_key(|window| (window.start, window.end));
    Ok(windows)
}

/// The bookable windows a calendar offers inside [from, to).
///
/// Managed: each available-time occurrence, clipped to the range, minus any
/// overlapping unavailable windows — an untouched window stays partially
/// bookable, carved remainders do not. Unmanaged: the range itself as one
/// partially-bookable window, unless an unavailable window fully covers it.
pub fn availability_windows(
    calendar: &Calendar,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Vec<AvailabilityWindow>> {
    let unavailable = unavailable_windows(calendar, from, to)?;

    if !calendar.is_managed() {
        let covered = unavailable
            .iter()
            .any(|window| window.start <= from && window.end >= to);
        if covered {
            return Ok(Vec::new());
        }
        return Ok(vec![AvailabilityWindow {
            start: from,
            end: to,
            partially_bookable: true,
        }]);
    }

    let mut windows = Vec::new();
    for entry in &calendar.entries {
        if entry.entity.kind != EntityKind::AvailableTime {
            continue;
        }
        for (span_start, span_end) in entry_spans(entry, from, to)? {
            let span_start = span_start.max(from);
            let span_end = span_end.min(to);
            let obstructions: Vec<(DateTime<Utc>, DateTime<Utc>)> = unavailable
                .iter()
                .filter(|window| window.start < span_end && window.end > span_start)
                .map(|window| (window.start, window.end))
                .collect();
            if obstructions.is_empty() {
                windows.push(AvailabilityWindow {
                    start: span_start,
                    end: span_end,
                    partially_bookable: true,
                });
            } else {
                for (start, end) in subtract_obstructions(span_start, span_end, &obstructions) {
                    windows.push(AvailabilityWindow {
                        start,
                        end,
                        partially_bookable: false,
                    });
                }
            }
        }
    }
    windows.sort_by_key(|window| (window.start, window.end));
    Ok(windows)
}

/// Merge the obstructions clipped to [span_start, span_end), then walk the
/// gaps between them.
fn subtract_obstructions(
    span_start: DateTime<Utc>,
    span_end: DateTime<Utc>,
    obstructions: &[(DateTime<Utc>, DateTime<Utc>)],
) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    let mut intervals: Vec<(DateTime<Utc>, DateTime<Utc>)> = obstructions
        .iter()
        .filter(|(start, end)| *start < span_end && *end > span_start)
        .map(|(start, end)| ((*start).max(span_start), (*end).min(span_end)))
        .collect();
    intervals.sort_by_key(|&(start, end)| (start, end));

    let mut merged: Vec<(DateTime<Utc>, DateTime<Utc>)> = Vec::new();
    for (start, end) in intervals {
        if let Some(last) = merged.last_mut() {
            if start <= last.1 {
                last.1 = last.1.max(end);
                continue;
            }
        }
        merged.push((start, end));
    }

    let mut gaps = Vec::new();
    let mut cursor = span_start;
    for (busy_start, busy_end) in merged {
        if cursor < busy_start {
            gaps.push((cursor, busy_start));
        }
        cursor = cursor.max(busy_end);
    }
    if cursor < span_end {
        gaps.push((cursor, span_end));
    }
    gaps
}

/// Calendars from `candidates` that are free in every range of `ranges`.
///
/// Per range, a managed calendar qualifies when some available-time
/// occurrence fully covers it; an unmanaged calendar qualifies when no
/// event or blocked-time occurrence overlaps it.
pub fn calendars_available_in_ranges<'a>(
    candidates: &'a [Calendar],
    ranges: &[(DateTime<Utc>, DateTime<Utc>)],
) -> Result<Vec<&'a Calendar>> {
    let mut qualified = Vec::new();
    for calendar in candidates {
        let mut available = true;
        for &(from, to) in ranges {
            if !available_in_range(calendar, from, to)? {
                available = false;
                break;
            }
        }
        if available {
            qualified.push(calendar);
        }
    }
    Ok(qualified)
}

fn available_in_range(calendar: &Calendar, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<bool> {
    if calendar.is_managed() {
        for entry in &calendar.entries {
            if entry.entity.kind != EntityKind::AvailableTime {
                continue;
            }
            for (start, end) in entry_spans(entry, from, to)? {
                if start <= from && end >= to {
                    return Ok(true);
                }
            }
        }
        return Ok(false);
    }
    for entry in &calendar.entries {
        if entry.entity.kind == EntityKind::AvailableTime {
            continue;
        }
        if !entry_spans(entry, from, to)?.is_empty() {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Available-time entries with an occurrence overlapping [start, end).
///
/// Writing an event or blocked-time over an available-time window deletes
/// the available-time record outright; this names the records the host must
/// delete for such a write.
pub fn displaced_available_times(
    calendar: &Calendar,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<EntityId>> {
    let mut displaced = Vec::new();
    for entry in &calendar.entries {
        if entry.entity.kind != EntityKind::AvailableTime {
            continue;
        }
        if !entry_spans(entry, start, end)?.is_empty() {
            displaced.push(entry.entity.id.clone());
        }
    }
    Ok(displaced)
}
