use chrono::Utc;
use tracing::info;
use ulid::Ulid;

use crate::model::*;
use crate::observability::{track, REGISTRATIONS_TOTAL};

use super::{validate, Engine, EngineError};

impl Engine {
    /// Enrol one attendee. Checks run in order: booking exists, is active,
    /// has a free seat, and the attendee is not already on it. The booking's
    /// write lock covers the checks, the journal write and the increment.
    pub async fn register_attendance(
        &self,
        booking_id: Ulid,
        attendee_id: impl Into<String>,
        payment_method: Option<String>,
        notes: Option<String>,
    ) -> Result<AttendanceRecord, EngineError> {
        let attendee_id = attendee_id.into();
        let result = track(
            "register_attendance",
            self.register_inner(booking_id, attendee_id, payment_method, notes),
        )
        .await;
        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.label(),
        };
        metrics::counter!(REGISTRATIONS_TOTAL, "outcome" => outcome).increment(1);
        result
    }

    async fn register_inner(
        &self,
        booking_id: Ulid,
        attendee_id: String,
        payment_method: Option<String>,
        notes: Option<String>,
    ) -> Result<AttendanceRecord, EngineError> {
        validate::attendee(&attendee_id, &notes)?;

        let _gate = self.commit_gate.read().await;
        let shared = self.store.booking(&booking_id)?;
        let mut state = shared.write().await;

        let booking = &state.booking;
        if !booking.status.is_active() {
            return Err(EngineError::InvalidStatus {
                booking: booking_id,
                status: booking.status,
            });
        }
        if booking.registered >= booking.expected {
            return Err(EngineError::CapacityExceeded {
                booking: booking_id,
                expected: booking.expected,
            });
        }
        if state.roster.contains_key(&attendee_id) {
            return Err(EngineError::DuplicateRegistration {
                booking: booking_id,
                attendee: attendee_id,
            });
        }

        let paid = booking.price > 0;
        let record = AttendanceRecord {
            id: Ulid::new(),
            booking_id,
            attendee_id,
            payment_status: if paid {
                PaymentStatus::Pending
            } else {
                PaymentStatus::NotRequired
            },
            payment_method: paid
                .then(|| payment_method.unwrap_or_else(|| DEFAULT_PAYMENT_METHOD.to_owned())),
            amount: booking.price,
            notes,
            registered_at: Utc::now(),
        };
        let registered = booking.registered + 1;

        self.persist(&Event::AttendanceRegistered {
            record: record.clone(),
            registered,
        })
        .await?;

        state.booking.registered = registered;
        state.booking.updated_at = record.registered_at;
        state.roster.insert(record.attendee_id.clone(), record.id);
        self.store.attendance.insert(record.id, record.clone());

        info!(
            booking = %booking_id,
            attendee = %record.attendee_id,
            registered,
            "attendance registered"
        );
        Ok(record)
    }
}
