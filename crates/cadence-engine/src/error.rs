//! Error types for engine operations.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::EntityId;

#[derive(Error, Debug)]
pub enum EngineError {
    /// A rule field failed validation or could not be parsed.
    #[error("invalid rule: {field}: {reason}")]
    InvalidRule { field: &'static str, reason: String },

    /// FREQ named something other than the four supported frequencies.
    #[error("unsupported frequency: {0}")]
    UnsupportedFrequency(String),

    /// A series operation was requested on an entity without a rule.
    #[error("entity {0} has no recurrence rule")]
    NotRecurring(EntityId),

    /// An exception or modification date does not land on a true occurrence.
    #[error("{date} does not match an occurrence of entity {entity}")]
    MisalignedDate { entity: EntityId, date: DateTime<Utc> },

    /// An exception record is neither cancelled nor carries a modified entity.
    #[error("exception at {0} is not cancelled but carries no modified entity")]
    MalformedException(DateTime<Utc>),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Date arithmetic left chrono's representable range.
    #[error("expansion error: {0}")]
    Expansion(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
