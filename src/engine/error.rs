use std::fmt;

use thiserror::Error;
use ulid::Ulid;

use crate::model::{Booking, BookingStatus, ResourceKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Room,
    Speaker,
    Booking,
    Attendance,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Room => f.write_str("room"),
            Entity::Speaker => f.write_str("speaker"),
            Entity::Booking => f.write_str("booking"),
            Entity::Attendance => f.write_str("attendance record"),
        }
    }
}

impl From<ResourceKind> for Entity {
    fn from(kind: ResourceKind) -> Self {
        match kind {
            ResourceKind::Room => Entity::Room,
            ResourceKind::Speaker => Entity::Speaker,
        }
    }
}

/// Every failure aborts the whole operation; nothing is written.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    Validation(&'static str),
    #[error("{entity} not found: {id}")]
    NotFound { entity: Entity, id: Ulid },
    #[error("code already in use: {0}")]
    DuplicateCode(String),
    #[error("{field} already in use: {value}")]
    DuplicateReference { field: &'static str, value: String },
    #[error("{kind} {id} is not available")]
    Unavailable { kind: ResourceKind, id: Ulid },
    /// Temporal overlap with the listed active bookings on `resource`.
    #[error("{resource} schedule conflict with {count} booking(s)", count = .conflicts.len())]
    Conflict {
        resource: ResourceKind,
        conflicts: Vec<Booking>,
    },
    /// Lost the race against concurrent moves of the same booking too many times.
    #[error("conflict: booking {0} kept changing under concurrent updates")]
    Contention(Ulid),
    #[error("booking {booking} is full: {expected} seat(s)")]
    CapacityExceeded { booking: Ulid, expected: u32 },
    #[error("attendee {attendee} already registered for booking {booking}")]
    DuplicateRegistration { booking: Ulid, attendee: String },
    #[error("booking {booking} is {status}")]
    InvalidStatus { booking: Ulid, status: BookingStatus },
    #[error("booking {booking} has {count} attendance record(s)")]
    HasDependentRecords { booking: Ulid, count: usize },
    /// Rooms count active bookings only; speakers count bookings of any status.
    #[error("{kind} {id} still has {count} booking(s)")]
    HasActiveBookings {
        kind: ResourceKind,
        id: Ulid,
        count: usize,
    },
    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),
    #[error("journal error: {0}")]
    Journal(String),
}

impl EngineError {
    pub(crate) fn not_found(entity: impl Into<Entity>, id: Ulid) -> Self {
        EngineError::NotFound {
            entity: entity.into(),
            id,
        }
    }

    /// Both flavours of conflict: a real overlap, or store-level contention.
    pub fn is_conflict(&self) -> bool {
        matches!(self, EngineError::Conflict { .. } | EngineError::Contention(_))
    }

    /// Short stable tag for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "validation",
            EngineError::NotFound { .. } => "not_found",
            EngineError::DuplicateCode(_) => "duplicate_code",
            EngineError::DuplicateReference { .. } => "duplicate_reference",
            EngineError::Unavailable { .. } => "unavailable",
            EngineError::Conflict { .. } => "conflict",
            EngineError::Contention(_) => "contention",
            EngineError::CapacityExceeded { .. } => "capacity_exceeded",
            EngineError::DuplicateRegistration { .. } => "duplicate_registration",
            EngineError::InvalidStatus { .. } => "invalid_status",
            EngineError::HasDependentRecords { .. } => "has_dependent_records",
            EngineError::HasActiveBookings { .. } => "has_active_bookings",
            EngineError::LimitExceeded(_) => "limit_exceeded",
            EngineError::Journal(_) => "journal",
        }
    }
}
