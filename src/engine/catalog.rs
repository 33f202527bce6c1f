use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::info;
use ulid::Ulid;

use crate::model::*;
use crate::observability::track;

use super::store::KeySpace;
use super::{validate, Engine, EngineError};

impl Engine {
    // ── Rooms ────────────────────────────────────────────────

    pub async fn create_room(&self, draft: RoomDraft) -> Result<Room, EngineError> {
        track("create_room", self.create_room_inner(draft)).await
    }

    async fn create_room_inner(&self, draft: RoomDraft) -> Result<Room, EngineError> {
        validate::room_draft(&draft)?;
        let _gate = self.commit_gate.read().await;

        let id = Ulid::new();
        self.store
            .keys
            .claim(KeySpace::RoomCode, &draft.code, id)
            .map_err(|_| EngineError::DuplicateCode(draft.code.clone()))?;

        let now = Utc::now();
        let room = Room {
            id,
            code: draft.code,
            name: draft.name,
            location: draft.location,
            capacity: draft.capacity,
            room_type: draft.room_type,
            equipment: draft.equipment,
            hourly_rate: draft.hourly_rate,
            description: draft.description,
            contact: draft.contact,
            available: true,
            created_at: now,
            updated_at: now,
        };

        if let Err(e) = self.persist(&Event::RoomCreated(room.clone())).await {
            self.store.keys.release(KeySpace::RoomCode, &room.code, id);
            return Err(e);
        }
        self.store
            .rooms
            .insert(id, Arc::new(RwLock::new(ResourceState::new(room.clone()))));
        info!(room = %id, code = %room.code, "room created");
        Ok(room)
    }

    pub async fn update_room(&self, id: Ulid, patch: RoomPatch) -> Result<Room, EngineError> {
        track("update_room", self.update_room_inner(id, patch)).await
    }

    async fn update_room_inner(&self, id: Ulid, patch: RoomPatch) -> Result<Room, EngineError> {
        let _gate = self.commit_gate.read().await;
        let shared = self.store.room(&id)?;
        let mut guard = shared.write().await;
        let before = guard.record.clone();

        let mut next = before.clone();
        replace(&mut next.code, patch.code);
        replace(&mut next.name, patch.name);
        replace(&mut next.location, patch.location);
        replace(&mut next.capacity, patch.capacity);
        replace(&mut next.room_type, patch.room_type);
        replace(&mut next.equipment, patch.equipment);
        fill(&mut next.hourly_rate, patch.hourly_rate);
        fill(&mut next.description, patch.description);
        fill(&mut next.contact, patch.contact);
        replace(&mut next.available, patch.available);
        validate::room(&next)?;

        if before.available && !next.available {
            let active = guard.schedule.active_count();
            if active > 0 {
                return Err(EngineError::HasActiveBookings {
                    kind: ResourceKind::Room,
                    id,
                    count: active,
                });
            }
        }

        let code_changed = next.code != before.code;
        if code_changed {
            self.store
                .keys
                .claim(KeySpace::RoomCode, &next.code, id)
                .map_err(|_| EngineError::DuplicateCode(next.code.clone()))?;
        }

        next.updated_at = Utc::now();
        if let Err(e) = self.persist(&Event::RoomUpdated(next.clone())).await {
            if code_changed {
                self.store.keys.release(KeySpace::RoomCode, &next.code, id);
            }
            return Err(e);
        }
        if code_changed {
            self.store.keys.release(KeySpace::RoomCode, &before.code, id);
        }
        guard.record = next.clone();
        info!(room = %id, "room updated");
        Ok(next)
    }

    /// Clears the availability flag. Blocked while any Scheduled or Confirmed
    /// booking still uses the room; finished and cancelled ones don't count.
    pub async fn soft_delete_room(&self, id: Ulid) -> Result<Room, EngineError> {
        track("soft_delete_room", self.soft_delete_room_inner(id)).await
    }

    async fn soft_delete_room_inner(&self, id: Ulid) -> Result<Room, EngineError> {
        let _gate = self.commit_gate.read().await;
        let shared = self.store.room(&id)?;
        let mut guard = shared.write().await;

        let active = guard.schedule.active_count();
        if active > 0 {
            return Err(EngineError::HasActiveBookings {
                kind: ResourceKind::Room,
                id,
                count: active,
            });
        }
        if !guard.record.available {
            return Ok(guard.record.clone());
        }

        let mut next = guard.record.clone();
        next.available = false;
        next.updated_at = Utc::now();
        self.persist(&Event::RoomUpdated(next.clone())).await?;
        guard.record = next.clone();
        info!(room = %id, "room soft-deleted");
        Ok(next)
    }

    // ── Speakers ─────────────────────────────────────────────

    pub async fn create_speaker(&self, draft: SpeakerDraft) -> Result<Speaker, EngineError> {
        track("create_speaker", self.create_speaker_inner(draft)).await
    }

    async fn create_speaker_inner(&self, draft: SpeakerDraft) -> Result<Speaker, EngineError> {
        let now = Utc::now();
        let speaker = Speaker {
            id: Ulid::new(),
            external_ref: draft.external_ref,
            first_name: draft.first_name,
            last_name: draft.last_name,
            email: draft.email,
            phone: draft.phone,
            specialty: draft.specialty,
            biography: draft.biography,
            institution: draft.institution,
            position: draft.position,
            country: draft.country,
            years_experience: draft.years_experience,
            languages: draft.languages,
            fee_per_event: draft.fee_per_event,
            available: true,
            created_at: now,
            updated_at: now,
        };
        validate::speaker(&speaker)?;

        let _gate = self.commit_gate.read().await;
        self.claim_speaker_keys(&speaker, None)?;
        if let Err(e) = self.persist(&Event::SpeakerCreated(speaker.clone())).await {
            self.release_speaker_keys(&speaker, None);
            return Err(e);
        }
        self.store.speakers.insert(
            speaker.id,
            Arc::new(RwLock::new(ResourceState::new(speaker.clone()))),
        );
        info!(speaker = %speaker.id, "speaker created");
        Ok(speaker)
    }

    pub async fn update_speaker(
        &self,
        id: Ulid,
        patch: SpeakerPatch,
    ) -> Result<Speaker, EngineError> {
        track("update_speaker", self.update_speaker_inner(id, patch)).await
    }

    async fn update_speaker_inner(
        &self,
        id: Ulid,
        patch: SpeakerPatch,
    ) -> Result<Speaker, EngineError> {
        let _gate = self.commit_gate.read().await;
        let shared = self.store.speaker(&id)?;
        let mut guard = shared.write().await;
        let before = guard.record.clone();

        let mut next = before.clone();
        replace(&mut next.external_ref, patch.external_ref);
        replace(&mut next.first_name, patch.first_name);
        replace(&mut next.last_name, patch.last_name);
        replace(&mut next.email, patch.email);
        fill(&mut next.phone, patch.phone);
        replace(&mut next.specialty, patch.specialty);
        fill(&mut next.biography, patch.biography);
        fill(&mut next.institution, patch.institution);
        fill(&mut next.position, patch.position);
        fill(&mut next.country, patch.country);
        fill(&mut next.years_experience, patch.years_experience);
        replace(&mut next.languages, patch.languages);
        fill(&mut next.fee_per_event, patch.fee_per_event);
        replace(&mut next.available, patch.available);
        validate::speaker(&next)?;

        if before.available && !next.available && !guard.bookings.is_empty() {
            return Err(EngineError::HasActiveBookings {
                kind: ResourceKind::Speaker,
                id,
                count: guard.bookings.len(),
            });
        }

        self.claim_speaker_keys(&next, Some(&before))?;
        next.updated_at = Utc::now();
        if let Err(e) = self.persist(&Event::SpeakerUpdated(next.clone())).await {
            self.release_speaker_keys(&next, Some(&before));
            return Err(e);
        }
        self.release_speaker_keys(&before, Some(&next));
        guard.record = next.clone();
        info!(speaker = %id, "speaker updated");
        Ok(next)
    }

    /// Blocked by any booking at all, whatever its status.
    pub async fn soft_delete_speaker(&self, id: Ulid) -> Result<Speaker, EngineError> {
        track("soft_delete_speaker", self.soft_delete_speaker_inner(id)).await
    }

    async fn soft_delete_speaker_inner(&self, id: Ulid) -> Result<Speaker, EngineError> {
        let _gate = self.commit_gate.read().await;
        let shared = self.store.speaker(&id)?;
        let mut guard = shared.write().await;

        if !guard.bookings.is_empty() {
            return Err(EngineError::HasActiveBookings {
                kind: ResourceKind::Speaker,
                id,
                count: guard.bookings.len(),
            });
        }
        if !guard.record.available {
            return Ok(guard.record.clone());
        }

        let mut next = guard.record.clone();
        next.available = false;
        next.updated_at = Utc::now();
        self.persist(&Event::SpeakerUpdated(next.clone())).await?;
        guard.record = next.clone();
        info!(speaker = %id, "speaker soft-deleted");
        Ok(next)
    }

    /// Claim whichever of the speaker's unique keys differ from `current`.
    /// All or nothing: a half-claimed pair is rolled back.
    fn claim_speaker_keys(
        &self,
        speaker: &Speaker,
        current: Option<&Speaker>,
    ) -> Result<(), EngineError> {
        let keys = &self.store.keys;
        let ref_changed = current.is_none_or(|c| c.external_ref != speaker.external_ref);
        let email_changed = current.is_none_or(|c| c.email != speaker.email);

        if ref_changed && keys.claim(KeySpace::SpeakerRef, &speaker.external_ref, speaker.id).is_err() {
            return Err(EngineError::DuplicateReference {
                field: "external reference",
                value: speaker.external_ref.clone(),
            });
        }
        if email_changed && keys.claim(KeySpace::SpeakerEmail, &speaker.email, speaker.id).is_err() {
            if ref_changed {
                keys.release(KeySpace::SpeakerRef, &speaker.external_ref, speaker.id);
            }
            return Err(EngineError::DuplicateReference {
                field: "email",
                value: speaker.email.clone(),
            });
        }
        Ok(())
    }

    /// Release `speaker`'s keys that `keep` does not also hold.
    fn release_speaker_keys(&self, speaker: &Speaker, keep: Option<&Speaker>) {
        let keys = &self.store.keys;
        if keep.is_none_or(|k| k.external_ref != speaker.external_ref) {
            keys.release(KeySpace::SpeakerRef, &speaker.external_ref, speaker.id);
        }
        if keep.is_none_or(|k| k.email != speaker.email) {
            keys.release(KeySpace::SpeakerEmail, &speaker.email, speaker.id);
        }
    }
}
