use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::info;
use ulid::Ulid;

use crate::model::*;
use crate::observability::{
    track, BOOKINGS_CANCELLED_TOTAL, BOOKINGS_CREATED_TOTAL, BOOKINGS_UPDATED_TOTAL,
};

use super::store::{BookingState, KeySpace};
use super::{validate, Engine, EngineError};

impl Engine {
    /// Schedule a new session. The room and speaker are both locked for the
    /// whole check-then-write, so two overlapping creates cannot both land.
    pub async fn create_booking(&self, draft: BookingDraft) -> Result<Booking, EngineError> {
        track("create_booking", self.create_booking_inner(draft)).await
    }

    async fn create_booking_inner(&self, draft: BookingDraft) -> Result<Booking, EngineError> {
        let span = validate::window(draft.start, draft.end)?;
        validate::details(&draft.details)?;
        if let Some(code) = &draft.code {
            validate::code(code)?;
        }
        let status = draft.status.unwrap_or(BookingStatus::Scheduled);
        if !status.is_active() {
            return Err(EngineError::Validation(
                "new bookings must be scheduled or confirmed",
            ));
        }

        let _gate = self.commit_gate.read().await;
        let mut locks = self
            .store
            .lock_resources(&[draft.room_id], &[draft.speaker_id])
            .await?;
        self.ensure_available(&locks, draft.room_id, draft.speaker_id)?;

        let id = Ulid::new();
        let now = Utc::now();
        let booking = Booking {
            id,
            code: draft.code.unwrap_or_else(|| format!("CONF-{id}")),
            room_id: draft.room_id,
            speaker_id: draft.speaker_id,
            date: draft.date,
            span,
            duration_minutes: draft.duration_minutes.unwrap_or_else(|| span.minutes()),
            status,
            expected: draft.expected,
            registered: 0,
            price: draft.price,
            details: draft.details,
            created_at: now,
            updated_at: now,
        };
        self.ensure_free(&locks, &booking, None).await?;

        self.store
            .keys
            .claim(KeySpace::BookingCode, &booking.code, id)
            .map_err(|_| EngineError::DuplicateCode(booking.code.clone()))?;
        if let Err(e) = self.persist(&Event::BookingCreated(booking.clone())).await {
            self.store.keys.release(KeySpace::BookingCode, &booking.code, id);
            return Err(e);
        }

        locks.rehome(None, &booking);
        self.store
            .bookings
            .insert(id, Arc::new(RwLock::new(BookingState::new(booking.clone()))));

        metrics::counter!(BOOKINGS_CREATED_TOTAL).increment(1);
        info!(
            booking = %id,
            code = %booking.code,
            room = %booking.room_id,
            speaker = %booking.speaker_id,
            date = %booking.date,
            "booking created"
        );
        Ok(booking)
    }

    /// Merge-patch a booking. Moving it (room, speaker, date or window)
    /// re-runs availability and conflict checks against the merged values,
    /// ignoring the booking's own slot.
    pub async fn update_booking(
        &self,
        id: Ulid,
        patch: BookingPatch,
    ) -> Result<Booking, EngineError> {
        track("update_booking", self.update_booking_inner(id, patch)).await
    }

    async fn update_booking_inner(
        &self,
        id: Ulid,
        patch: BookingPatch,
    ) -> Result<Booking, EngineError> {
        if let Some(code) = &patch.code {
            validate::code(code)?;
        }

        let _gate = self.commit_gate.read().await;
        let (mut locks, mut state) = self
            .lock_booking(id, patch.room_id, patch.speaker_id)
            .await?;
        let before = state.booking.clone();
        if before.status.is_terminal() {
            return Err(EngineError::InvalidStatus {
                booking: id,
                status: before.status,
            });
        }

        let moves = patch.moves(&before);
        let mut next = before.clone();
        replace(&mut next.room_id, patch.room_id);
        replace(&mut next.speaker_id, patch.speaker_id);
        replace(&mut next.date, patch.date);
        next.span = validate::window(
            patch.start.unwrap_or(before.span.start),
            patch.end.unwrap_or(before.span.end),
        )?;
        next.duration_minutes = match patch.duration_minutes {
            Some(minutes) => minutes,
            None if next.span != before.span => next.span.minutes(),
            None => before.duration_minutes,
        };
        replace(&mut next.status, patch.status);
        replace(&mut next.expected, patch.expected);
        replace(&mut next.price, patch.price);
        replace(&mut next.code, patch.code);
        patch.details.apply(&mut next.details);
        validate::details(&next.details)?;

        if next.expected < next.registered {
            return Err(EngineError::Validation(
                "expected attendance below current registrations",
            ));
        }
        if next.status == BookingStatus::Cancelled {
            self.ensure_cancellable(&state)?;
        }

        // A soft-deleted room may still hold a non-active booking; bringing
        // it back to an active status must not bypass the availability flag.
        let reactivated = !before.status.is_active() && next.status.is_active();
        if moves || reactivated {
            self.ensure_available(&locks, next.room_id, next.speaker_id)?;
        }
        if next.status.is_active() && (moves || reactivated) {
            self.ensure_free(&locks, &next, Some(id)).await?;
        }

        let code_changed = next.code != before.code;
        if code_changed {
            self.store
                .keys
                .claim(KeySpace::BookingCode, &next.code, id)
                .map_err(|_| EngineError::DuplicateCode(next.code.clone()))?;
        }

        next.updated_at = Utc::now();
        if let Err(e) = self.persist(&Event::BookingUpdated(next.clone())).await {
            if code_changed {
                self.store.keys.release(KeySpace::BookingCode, &next.code, id);
            }
            return Err(e);
        }
        if code_changed {
            self.store.keys.release(KeySpace::BookingCode, &before.code, id);
        }

        locks.rehome(Some(&before), &next);
        state.booking = next.clone();

        metrics::counter!(BOOKINGS_UPDATED_TOTAL).increment(1);
        info!(booking = %id, moved = moves, status = %next.status, "booking updated");
        Ok(next)
    }

    /// The only way a booking goes away. Refused while attendance exists.
    pub async fn cancel_booking(&self, id: Ulid) -> Result<Booking, EngineError> {
        track("cancel_booking", self.cancel_booking_inner(id)).await
    }

    async fn cancel_booking_inner(&self, id: Ulid) -> Result<Booking, EngineError> {
        let _gate = self.commit_gate.read().await;
        let (mut locks, mut state) = self.lock_booking(id, None, None).await?;
        self.ensure_cancellable(&state)?;

        let before = state.booking.clone();
        let at = Utc::now();
        self.persist(&Event::BookingCancelled { id, at }).await?;

        let mut next = before.clone();
        next.status = BookingStatus::Cancelled;
        next.updated_at = at;
        locks.rehome(Some(&before), &next);
        state.booking = next.clone();

        metrics::counter!(BOOKINGS_CANCELLED_TOTAL).increment(1);
        info!(booking = %id, "booking cancelled");
        Ok(next)
    }

    /// Attendance blocks cancellation first; then only active bookings may
    /// be cancelled.
    fn ensure_cancellable(&self, state: &BookingState) -> Result<(), EngineError> {
        if !state.roster.is_empty() {
            return Err(EngineError::HasDependentRecords {
                booking: state.booking.id,
                count: state.roster.len(),
            });
        }
        if !state.booking.status.is_active() {
            return Err(EngineError::InvalidStatus {
                booking: state.booking.id,
                status: state.booking.status,
            });
        }
        Ok(())
    }
}
