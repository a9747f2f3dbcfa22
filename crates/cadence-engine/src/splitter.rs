//! Series splitting — truncated heads, continuation rules, and bulk
//! modification of a running series.
//!
//! A split preserves the series' termination semantics: a COUNT-bounded
//! rule continues with the unconsumed remainder, an UNTIL-bounded rule
//! continues with the same UNTIL. Requests outside the series' lifetime
//! (before its first occurrence or past its last) yield `None` rather than
//! an error.

use chrono::{DateTime, Utc};

use crate::error::{EngineError, Result};
use crate::expander::{self, OccurrenceIter, DEFAULT_MAX_OCCURRENCES};
use crate::model::{BulkModification, EntityId, EntityRecord};
use crate::rule::RecurrenceRule;

/// Copy of `rule` terminated at `until` instead of any COUNT.
pub fn truncate_until(rule: &RecurrenceRule, until: DateTime<Utc>) -> RecurrenceRule {
    let mut truncated = rule.clone();
    truncated.count = None;
    truncated.until = Some(until);
    truncated
}

/// Rule for the remainder of the series once re-anchored at `new_start`.
///
/// For a COUNT-bounded rule, occurrences strictly before `new_start` are
/// charged against COUNT and the copy carries the remainder; a remainder of
/// zero means the series is spent and yields `None`. An UNTIL at or before
/// `new_start` also yields `None`; otherwise the UNTIL carries over.
pub fn continuation(
    rule: &RecurrenceRule,
    anchor_start: DateTime<Utc>,
    new_start: DateTime<Utc>,
) -> Result<Option<RecurrenceRule>> {
    if let Some(until) = rule.until {
        if until <= new_start {
            return Ok(None);
        }
    }
    let mut tail = rule.clone();
    if let Some(count) = rule.count {
        let consumed = occurrences_before(rule, anchor_start, new_start)?;
        if consumed >= count {
            return Ok(None);
        }
        tail.count = Some(count - consumed);
    }
    Ok(Some(tail))
}

/// Split a series at `split_date` into a truncated head and a continuation.
///
/// The head is `rule` with UNTIL set to the occurrence immediately before
/// the split date (`None` when no occurrence precedes it); the continuation
/// is [`continuation`] at the split date. The split date itself need not be
/// an occurrence.
pub fn split_at(
    rule: &RecurrenceRule,
    anchor_start: DateTime<Utc>,
    split_date: DateTime<Utc>,
) -> Result<(Option<RecurrenceRule>, Option<RecurrenceRule>)> {
    let truncated = occurrence_before(rule, anchor_start, split_date)?
        .map(|before| truncate_until(rule, before));
    let tail = continuation(rule, anchor_start, split_date)?;
    Ok((truncated, tail))
}

/// Number of occurrences with starts strictly before `cutoff`.
fn occurrences_before(
    rule: &RecurrenceRule,
    anchor_start: DateTime<Utc>,
    cutoff: DateTime<Utc>,
) -> Result<u32> {
    let mut iter = OccurrenceIter::new(rule, anchor_start)?;
    let mut consumed = 0u32;
    while let Some(start) = iter.next_start()? {
        if start >= cutoff {
            break;
        }
        consumed += 1;
        if consumed as usize >= DEFAULT_MAX_OCCURRENCES {
            break;
        }
    }
    Ok(consumed)
}

/// Last occurrence start strictly before `cutoff`, if any.
fn occurrence_before(
    rule: &RecurrenceRule,
    anchor_start: DateTime<Utc>,
    cutoff: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>> {
    let mut iter = OccurrenceIter::new(rule, anchor_start)?;
    let mut last = None;
    let mut scanned = 0;
    while let Some(start) = iter.next_start()? {
        if start >= cutoff {
            break;
        }
        last = Some(start);
        scanned += 1;
        if scanned >= DEFAULT_MAX_OCCURRENCES {
            break;
        }
    }
    Ok(last)
}

/// A from-this-date-forward edit of a recurring series.
#[derive(Debug, Clone, PartialEq)]
pub enum BulkModificationRequest {
    /// Cancel every occurrence from `start_date` forward.
    CancelRemaining { start_date: DateTime<Utc> },
    /// Reschedule the tail as a new series anchored at `start_date`. The
    /// host mints the continuation entity's id.
    Continue {
        start_date: DateTime<Utc>,
        continuation_id: EntityId,
    },
}

impl BulkModificationRequest {
    fn start_date(&self) -> DateTime<Utc> {
        match self {
            BulkModificationRequest::CancelRemaining { start_date }
            | BulkModificationRequest::Continue { start_date, .. } => *start_date,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BulkModificationOutcome {
    pub record: BulkModification,
    /// New tail entity for `Continue` requests, absent when the series does
    /// not extend past the split date.
    pub continuation: Option<EntityRecord>,
}

/// Apply a bulk modification to `parent`, truncating its rule at the
/// occurrence before the start date and producing the linking record (plus
/// the continuation entity for `Continue` requests).
///
/// The parent's rule is truncated on both paths, so aggregation across
/// segments never double-counts the tail.
///
/// # Errors
///
/// Rejects parents without a rule, start dates at or before the parent's
/// anchor (the master-date conversion owns that case), and start dates that
/// do not land on a true occurrence.
pub fn apply_bulk_modification(
    parent: &mut EntityRecord,
    request: &BulkModificationRequest,
) -> Result<BulkModificationOutcome> {
    let rule = parent
        .rule
        .clone()
        .ok_or_else(|| EngineError::NotRecurring(parent.id.clone()))?;
    let start_date = request.start_date();
    if start_date <= parent.start {
        return Err(EngineError::InvalidOperation(
            "bulk modification at or before the series anchor; edit the master occurrence instead"
                .to_string(),
        ));
    }
    if !expander::is_occurrence_start(&rule, parent.start, start_date)? {
        return Err(EngineError::MisalignedDate {
            entity: parent.id.clone(),
            date: start_date,
        });
    }

    let duration = parent.duration();
    let (truncated, tail) = split_at(&rule, parent.start, start_date)?;
    // start_date is aligned and strictly after the anchor, so an occurrence
    // precedes it and `truncated` is always present.
    parent.rule = truncated;

    match request {
        BulkModificationRequest::CancelRemaining { .. } => Ok(BulkModificationOutcome {
            record: BulkModification {
                parent: parent.id.clone(),
                start_date,
                is_cancelled: true,
                continuation: None,
            },
            continuation: None,
        }),
        BulkModificationRequest::Continue {
            continuation_id, ..
        } => {
            let continuation = match tail {
                Some(tail_rule) => {
                    let end = start_date.checked_add_signed(duration).ok_or_else(|| {
                        EngineError::Expansion(
                            "date arithmetic out of chrono's representable range".to_string(),
                        )
                    })?;
                    Some(EntityRecord {
                        id: continuation_id.clone(),
                        kind: parent.kind,
                        start: start_date,
                        end,
                        rule: Some(tail_rule),
                        parent: None,
                        recurrence_marker: None,
                        is_exception: false,
                        bulk_parent: Some(parent.id.clone()),
                    })
                }
                None => None,
            };
            let record = BulkModification {
                parent: parent.id.clone(),
                start_date,
                is_cancelled: false,
                continuation: continuation.as_ref().map(|entity| entity.id.clone()),
            };
            Ok(BulkModificationOutcome {
                record,
                continuation,
            })
        }
    }
}
