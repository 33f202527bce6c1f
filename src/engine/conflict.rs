use chrono::{NaiveDate, NaiveTime};
use ulid::Ulid;

use crate::limits::MAX_BOOKINGS_PER_RESOURCE_DAY;
use crate::model::*;
use crate::observability::{track, CONFLICTS_TOTAL};

use super::store::ResourceLocks;
use super::{validate, Engine, EngineError};

/// Active bookings on `schedule` whose window overlaps `span` on `date`,
/// minus `exclude`. Every conflict check in the engine comes through here.
pub(crate) fn conflicting_slots(
    schedule: &Schedule,
    date: NaiveDate,
    span: &Span,
    exclude: Option<Ulid>,
) -> Vec<Ulid> {
    schedule
        .overlapping(date, span)
        .filter(|slot| Some(slot.booking_id) != exclude)
        .map(|slot| slot.booking_id)
        .collect()
}

impl Engine {
    /// Overlapping active bookings on one room or speaker. Read-only.
    pub async fn find_conflicts(
        &self,
        kind: ResourceKind,
        resource_id: Ulid,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
        exclude: Option<Ulid>,
    ) -> Result<Vec<Booking>, EngineError> {
        let span = validate::window(start, end)?;
        let ids = match kind {
            ResourceKind::Room => {
                let shared = self.store.room(&resource_id)?;
                let guard = shared.read().await;
                conflicting_slots(&guard.schedule, date, &span, exclude)
            }
            ResourceKind::Speaker => {
                let shared = self.store.speaker(&resource_id)?;
                let guard = shared.read().await;
                conflicting_slots(&guard.schedule, date, &span, exclude)
            }
        };
        Ok(self.resolve_bookings(&ids).await)
    }

    /// `available` is true when no active booking overlaps the window.
    pub async fn check_availability(
        &self,
        kind: ResourceKind,
        resource_id: Ulid,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
        exclude: Option<Ulid>,
    ) -> Result<Availability, EngineError> {
        track("check_availability", async {
            let conflicts = self
                .find_conflicts(kind, resource_id, date, start, end, exclude)
                .await?;
            Ok(Availability {
                available: conflicts.is_empty(),
                conflicts,
            })
        })
        .await
    }

    /// Snapshot of each listed booking, skipping ids that no longer resolve.
    pub(super) async fn resolve_bookings(&self, ids: &[Ulid]) -> Vec<Booking> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            let Ok(shared) = self.store.booking(id) else { continue };
            out.push(shared.read().await.booking.clone());
        }
        out
    }

    /// Both resources exist in `locks` and neither is soft-deleted.
    pub(super) fn ensure_available(
        &self,
        locks: &ResourceLocks,
        room_id: Ulid,
        speaker_id: Ulid,
    ) -> Result<(), EngineError> {
        if !locks.room(&room_id)?.record.available {
            return Err(EngineError::Unavailable {
                kind: ResourceKind::Room,
                id: room_id,
            });
        }
        if !locks.speaker(&speaker_id)?.record.available {
            return Err(EngineError::Unavailable {
                kind: ResourceKind::Speaker,
                id: speaker_id,
            });
        }
        Ok(())
    }

    /// Room first, then speaker. The first resource with an overlap decides
    /// the error.
    pub(super) async fn ensure_free(
        &self,
        locks: &ResourceLocks,
        booking: &Booking,
        exclude: Option<Ulid>,
    ) -> Result<(), EngineError> {
        let room = locks.room(&booking.room_id)?;
        self.ensure_free_on(ResourceKind::Room, &room.schedule, booking, exclude)
            .await?;
        let speaker = locks.speaker(&booking.speaker_id)?;
        self.ensure_free_on(ResourceKind::Speaker, &speaker.schedule, booking, exclude)
            .await
    }

    async fn ensure_free_on(
        &self,
        kind: ResourceKind,
        schedule: &Schedule,
        booking: &Booking,
        exclude: Option<Ulid>,
    ) -> Result<(), EngineError> {
        let ids = conflicting_slots(schedule, booking.date, &booking.span, exclude);
        if ids.is_empty() {
            let booked = schedule
                .day(booking.date)
                .iter()
                .filter(|slot| Some(slot.booking_id) != exclude)
                .count();
            if booked >= MAX_BOOKINGS_PER_RESOURCE_DAY {
                return Err(EngineError::LimitExceeded("too many bookings on one day"));
            }
            return Ok(());
        }
        metrics::counter!(CONFLICTS_TOTAL, "resource" => kind.as_str()).increment(1);
        let conflicts = self.resolve_bookings(&ids).await;
        Err(EngineError::Conflict {
            resource: kind,
            conflicts,
        })
    }
}
