//! # cadence-engine
//!
//! Recurrence expansion, exception resolution, series splitting, and
//! availability computation for calendar entities.
//!
//! The engine is pure computation: it consumes entity and exception records
//! as plain data, performs no storage or network I/O, and is safe to call
//! concurrently on independent series. Read-then-write edits of the same
//! series (exception upserts, bulk splits) need a host-provided mutual
//! exclusion boundary. Every expansion is bounded by a `max_occurrences`
//! cap.
//!
//! ## Modules
//!
//! - [`rule`] — RRULE-style text codec: parse, serialize, validate
//! - [`expander`] — rule + anchor span → ordered occurrence instances
//! - [`resolver`] — occurrences × per-date overrides → final instances
//! - [`splitter`] — truncated heads, continuations, bulk modification
//! - [`availability`] — unavailable/available windows for a calendar
//! - [`model`] — records exchanged with the host's collaborators
//! - [`error`] — error types

pub mod availability;
pub mod error;
pub mod expander;
pub mod model;
pub mod resolver;
pub mod rule;
pub mod splitter;

pub use availability::{
    availability_windows, calendars_available_in_ranges, displaced_available_times,
    unavailable_windows, AvailabilityWindow, Calendar, CalendarEntry, UnavailableWindow,
};
pub use error::EngineError;
pub use expander::{
    expand_in_window, is_occurrence_start, next_occurrence, ExpandOptions, Occurrence,
    DEFAULT_MAX_OCCURRENCES,
};
pub use model::{
    BulkModification, EntityId, EntityKind, EntityRecord, ExceptionSet, OccurrenceDescriptor,
    OccurrenceKind, RecurrenceException,
};
pub use resolver::{
    apply_exception, occurrences_with_continuations, resolve_occurrences, ContinuationSpec,
    ExceptionOutcome, ExceptionRequest, ResolveOptions, ResolvedOccurrence, SeriesSegment,
};
pub use rule::{Frequency, RecurrenceRule};
pub use splitter::{
    apply_bulk_modification, continuation, split_at, truncate_until, BulkModificationOutcome,
    BulkModificationRequest,
};
