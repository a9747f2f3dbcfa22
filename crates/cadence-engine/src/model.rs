//! Plain data records exchanged with the host's collaborators.
//!
//! The engine performs no storage or network I/O: entity and exception
//! records arrive from the persistence layer as the types below, and
//! resolved occurrences leave as [`OccurrenceDescriptor`] values. Every
//! cross-entity link (instance → master, continuation → predecessor) is an
//! id-based back-reference, never ownership.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::rule::RecurrenceRule;

/// Opaque entity identity minted by the host.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        EntityId(value.to_string())
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        EntityId(value)
    }
}

/// The three calendar entity kinds sharing the recurring-entity role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityKind {
    Event,
    BlockedTime,
    AvailableTime,
}

/// A calendar entity record: an event, a blocked-time span, or an
/// available-time window.
///
/// A record with a rule is a recurring master; a record with a parent is an
/// instance of one. Duration (`end - start`) is constant across all of a
/// master's occurrences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: EntityId,
    pub kind: EntityKind,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub rule: Option<RecurrenceRule>,
    /// Master this record was expanded from, when the record is an instance.
    pub parent: Option<EntityId>,
    /// Which occurrence of the parent an instance represents.
    pub recurrence_marker: Option<DateTime<Utc>>,
    pub is_exception: bool,
    /// Predecessor segment, when this record continues a split series.
    pub bulk_parent: Option<EntityId>,
}

impl EntityRecord {
    pub fn new(
        id: impl Into<EntityId>,
        kind: EntityKind,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            start,
            end,
            rule: None,
            parent: None,
            recurrence_marker: None,
            is_exception: false,
            bulk_parent: None,
        }
    }

    pub fn with_rule(mut self, rule: RecurrenceRule) -> Self {
        self.rule = Some(rule);
        self
    }

    pub fn is_recurring(&self) -> bool {
        self.rule.is_some()
    }

    pub fn is_instance(&self) -> bool {
        self.parent.is_some()
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

/// A per-date override of a single occurrence: cancel it, or replace it with
/// an already-materialized modified entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurrenceException {
    pub parent: EntityId,
    /// The occurrence start this exception targets, matched by exact
    /// timestamp equality.
    pub date: DateTime<Utc>,
    pub is_cancelled: bool,
    pub modified: Option<EntityRecord>,
}

/// The exception records of one master, at most one per occurrence date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExceptionSet {
    by_date: BTreeMap<DateTime<Utc>, RecurrenceException>,
}

impl ExceptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert the record, replacing any existing record for the same date.
    pub fn upsert(&mut self, exception: RecurrenceException) {
        self.by_date.insert(exception.date, exception);
    }

    pub fn get(&self, date: DateTime<Utc>) -> Option<&RecurrenceException> {
        self.by_date.get(&date)
    }

    pub fn remove(&mut self, date: DateTime<Utc>) -> Option<RecurrenceException> {
        self.by_date.remove(&date)
    }

    pub fn clear(&mut self) {
        self.by_date.clear();
    }

    pub fn len(&self) -> usize {
        self.by_date.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_date.is_empty()
    }

    /// Records in ascending date order.
    pub fn iter(&self) -> impl Iterator<Item = &RecurrenceException> {
        self.by_date.values()
    }
}

/// Links a recurring entity to a from-this-date-forward edit of its series.
///
/// Continuation entities chain backward to their predecessor segment through
/// [`EntityRecord::bulk_parent`], forming a singly linked list per logical
/// series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkModification {
    pub parent: EntityId,
    pub start_date: DateTime<Utc>,
    /// True when the whole tail was cancelled rather than rescheduled.
    pub is_cancelled: bool,
    pub continuation: Option<EntityId>,
}

/// How a resolved occurrence came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OccurrenceKind {
    /// A synthesized, transient instance of the master.
    Instance,
    /// The master record itself standing in for its own anchor occurrence.
    Master,
    /// The materialized override from a non-cancelling exception.
    Modified,
}

/// The occurrence unit exchanged with persistence, API, and sync
/// collaborators, and the payload of the host's optional bulk-generation
/// accelerator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccurrenceDescriptor {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub entity: EntityId,
    pub kind: OccurrenceKind,
}
