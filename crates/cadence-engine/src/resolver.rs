//! Exception resolution — merges raw occurrences with per-date overrides.
//!
//! Resolution walks the raw occurrence sequence in ascending start order.
//! The master's own slot can be filled by the master record itself; a slot
//! with a cancelled exception disappears; a slot with a modification is
//! replaced by the materialized modified entity (or omitted when exceptions
//! are excluded — never reverted to the unmodified synthetic); every other
//! slot becomes a transient instance carrying the master's fields.
//!
//! Writing an exception for the master's own start is a state transition
//! rather than a record insert: the master collapses into a single
//! non-recurring entity and the remainder of the series, if any, is handed
//! back as a continuation spec for the host to materialize.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::expander::{self, ExpandOptions, Occurrence, DEFAULT_MAX_OCCURRENCES};
use crate::model::{
    EntityRecord, ExceptionSet, OccurrenceDescriptor, OccurrenceKind, RecurrenceException,
};
use crate::rule::RecurrenceRule;
use crate::splitter;

/// Controls for one resolution pass.
#[derive(Debug, Clone, Copy)]
pub struct ResolveOptions<'a> {
    /// Emit the master record itself for its own (start, end) slot instead
    /// of a synthetic copy.
    pub include_master: bool,
    /// Emit modified entities for non-cancelling exceptions. When false the
    /// excepted slot is omitted entirely.
    pub include_exceptions: bool,
    pub max_occurrences: usize,
    /// Host-precomputed occurrence descriptors standing in for in-process
    /// expansion (the bulk-generation accelerator). The resolver's output
    /// is identical with or without it.
    pub precomputed: Option<&'a [OccurrenceDescriptor]>,
}

impl Default for ResolveOptions<'_> {
    fn default() -> Self {
        Self {
            include_master: true,
            include_exceptions: true,
            max_occurrences: DEFAULT_MAX_OCCURRENCES,
            precomputed: None,
        }
    }
}

/// One occurrence after exception resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedOccurrence {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub kind: OccurrenceKind,
    /// The master itself, the modified entity, or a transient instance.
    pub entity: EntityRecord,
}

impl ResolvedOccurrence {
    /// Project to the wire unit exchanged with collaborators.
    pub fn descriptor(&self) -> OccurrenceDescriptor {
        OccurrenceDescriptor {
            start: self.start,
            end: self.end,
            entity: self.entity.id.clone(),
            kind: self.kind,
        }
    }
}

/// Resolve the occurrences of `master` inside [from, to) against its
/// exception records.
///
/// # Errors
///
/// Fails when `master` has no rule, when an exception record is malformed
/// (not cancelled and missing its modified entity), or when expansion fails.
pub fn resolve_occurrences(
    master: &EntityRecord,
    exceptions: &ExceptionSet,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    options: &ResolveOptions<'_>,
) -> Result<Vec<ResolvedOccurrence>> {
    let rule = master
        .rule
        .as_ref()
        .ok_or_else(|| EngineError::NotRecurring(master.id.clone()))?;

    let raw: Vec<Occurrence> = match options.precomputed {
        Some(descriptors) => descriptors
            .iter()
            .filter(|d| d.start >= from && d.start < to)
            .map(|d| Occurrence {
                start: d.start,
                end: d.end,
            })
            .collect(),
        None => expander::expand_in_window(
            rule,
            master.start,
            master.end,
            from,
            to,
            &ExpandOptions {
                max_occurrences: options.max_occurrences,
                strict_after: false,
            },
        )?,
    };

    let mut out = Vec::with_capacity(raw.len());
    for occurrence in raw {
        if options.include_master
            && occurrence.start == master.start
            && occurrence.end == master.end
        {
            out.push(ResolvedOccurrence {
                start: occurrence.start,
                end: occurrence.end,
                kind: OccurrenceKind::Master,
                entity: master.clone(),
            });
            continue;
        }
        if let Some(exception) = exceptions.get(occurrence.start) {
            if exception.is_cancelled || !options.include_exceptions {
                continue;
            }
            let modified = exception
                .modified
                .clone()
                .ok_or(EngineError::MalformedException(exception.date))?;
            out.push(ResolvedOccurrence {
                start: modified.start,
                end: modified.end,
                kind: OccurrenceKind::Modified,
                entity: modified,
            });
            continue;
        }
        out.push(ResolvedOccurrence {
            start: occurrence.start,
            end: occurrence.end,
            kind: OccurrenceKind::Instance,
            entity: synthesize(master, occurrence),
        });
    }
    Ok(out)
}

/// Build the transient instance standing in for one occurrence of `master`.
fn synthesize(master: &EntityRecord, occurrence: Occurrence) -> EntityRecord {
    EntityRecord {
        id: master.id.clone(),
        kind: master.kind,
        start: occurrence.start,
        end: occurrence.end,
        rule: None,
        parent: Some(master.id.clone()),
        recurrence_marker: Some(occurrence.start),
        is_exception: false,
        bulk_parent: None,
    }
}

/// A requested per-occurrence override.
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionRequest {
    /// The occurrence start to override; must align exactly.
    pub date: DateTime<Utc>,
    pub is_cancelled: bool,
    /// The materialized override when not cancelling.
    pub modified: Option<EntityRecord>,
}

/// The remainder of a series spun off by a master-date conversion. The host
/// materializes this as a new recurring entity (minting its id and copying
/// the master's attendee/resource associations, which live outside the
/// engine's data).
#[derive(Debug, Clone, PartialEq)]
pub struct ContinuationSpec {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub rule: RecurrenceRule,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExceptionOutcome {
    /// The per-date record was inserted, or updated in place if one already
    /// existed for the date.
    Recorded,
    /// The request targeted the master's own start: the master is now a
    /// single non-recurring entity, its rule and exceptions are gone, and
    /// any remainder of the series is returned for the host to materialize.
    MasterConverted {
        continuation: Option<ContinuationSpec>,
    },
}

/// Record an exception against `master`, or convert the master when the
/// request targets its own start date.
///
/// # Errors
///
/// Rejects masters without a rule, requests that neither cancel nor carry a
/// modified entity, and dates that do not land on a true occurrence.
pub fn apply_exception(
    master: &mut EntityRecord,
    exceptions: &mut ExceptionSet,
    request: &ExceptionRequest,
) -> Result<ExceptionOutcome> {
    let rule = master
        .rule
        .clone()
        .ok_or_else(|| EngineError::NotRecurring(master.id.clone()))?;
    if !request.is_cancelled && request.modified.is_none() {
        return Err(EngineError::MalformedException(request.date));
    }
    if !expander::is_occurrence_start(&rule, master.start, request.date)? {
        return Err(EngineError::MisalignedDate {
            entity: master.id.clone(),
            date: request.date,
        });
    }

    if request.date == master.start {
        // State transition, not an exception insert: the master becomes a
        // single entity and the series restarts, COUNT-reduced, at the next
        // occurrence.
        let next = expander::next_occurrence(&rule, master.start, master.end, master.start)?;
        let continuation = match next {
            Some(next) => splitter::continuation(&rule, master.start, next.start)?.map(|tail| {
                ContinuationSpec {
                    start: next.start,
                    end: next.end,
                    rule: tail,
                }
            }),
            None => None,
        };
        if let Some(modified) = &request.modified {
            master.start = modified.start;
            master.end = modified.end;
        }
        master.rule = None;
        exceptions.clear();
        return Ok(ExceptionOutcome::MasterConverted { continuation });
    }

    exceptions.upsert(RecurrenceException {
        parent: master.id.clone(),
        date: request.date,
        is_cancelled: request.is_cancelled,
        modified: request.modified.clone(),
    });
    Ok(ExceptionOutcome::Recorded)
}

/// One segment of a logical series: a master (or a converted single entity)
/// paired with its exception records.
#[derive(Debug, Clone, Copy)]
pub struct SeriesSegment<'a> {
    pub entity: &'a EntityRecord,
    pub exceptions: &'a ExceptionSet,
}

/// Resolve every segment of a split series and merge the results.
///
/// Recurring segments are resolved against their own exceptions;
/// non-recurring segments (a converted master) contribute their single span
/// when it overlaps the window. The merged list is sorted by start and
/// truncated to `options.max_occurrences`. Any `precomputed` descriptors in
/// `options` are ignored here; the accelerator applies to single-master
/// resolution only.
pub fn occurrences_with_continuations(
    segments: &[SeriesSegment<'_>],
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    options: &ResolveOptions<'_>,
) -> Result<Vec<ResolvedOccurrence>> {
    let per_segment = ResolveOptions {
        precomputed: None,
        ..*options
    };
    let mut out = Vec::new();
    for segment in segments {
        if segment.entity.is_recurring() {
            out.extend(resolve_occurrences(
                segment.entity,
                segment.exceptions,
                from,
                to,
                &per_segment,
            )?);
        } else if segment.entity.start < to && segment.entity.end > from {
            out.push(ResolvedOccurrence {
                start: segment.entity.start,
                end: segment.entity.end,
                kind: OccurrenceKind::Master,
                entity: segment.entity.clone(),
            });
        }
    }
    out.sort_by_key(|occurrence| occurrence.start);
    out.truncate(options.max_occurrences);
    Ok(out)
}
