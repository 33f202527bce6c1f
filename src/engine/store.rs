use std::collections::HashMap;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};
use ulid::Ulid;

use crate::model::*;

use super::EngineError;

pub type SharedRoom = Arc<RwLock<ResourceState<Room>>>;
pub type SharedSpeaker = Arc<RwLock<ResourceState<Speaker>>>;
pub type SharedBooking = Arc<RwLock<BookingState>>;

type ResourceGuard<R> = OwnedRwLockWriteGuard<ResourceState<R>>;

#[derive(Debug, Clone)]
pub struct BookingState {
    pub booking: Booking,
    /// attendee id → attendance record id
    pub roster: HashMap<String, Ulid>,
}

impl BookingState {
    pub fn new(booking: Booking) -> Self {
        Self {
            booking,
            roster: HashMap::new(),
        }
    }
}

// ── Natural-key index ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeySpace {
    RoomCode,
    SpeakerRef,
    SpeakerEmail,
    BookingCode,
}

/// Owner of every natural key. Claims are atomic per key, which is what keeps
/// two concurrent creates from both getting the same code.
#[derive(Default)]
pub struct KeyIndex {
    owners: DashMap<(KeySpace, String), Ulid>,
}

impl KeyIndex {
    #[cfg(test)]
    pub fn owner(&self, space: KeySpace, key: &str) -> Option<Ulid> {
        self.owners.get(&(space, key.to_owned())).map(|e| *e.value())
    }

    /// Claim `key` for `owner`. Re-claiming your own key succeeds; otherwise
    /// returns the current holder.
    pub fn claim(&self, space: KeySpace, key: &str, owner: Ulid) -> Result<(), Ulid> {
        match self.owners.entry((space, key.to_owned())) {
            Entry::Occupied(e) if *e.get() == owner => Ok(()),
            Entry::Occupied(e) => Err(*e.get()),
            Entry::Vacant(e) => {
                e.insert(owner);
                Ok(())
            }
        }
    }

    /// Release `key` if `owner` still holds it.
    pub fn release(&self, space: KeySpace, key: &str, owner: Ulid) {
        self.owners
            .remove_if(&(space, key.to_owned()), |_, holder| *holder == owner);
    }
}

// ── Tables ───────────────────────────────────────────────────────

#[derive(Default)]
pub struct Store {
    pub rooms: DashMap<Ulid, SharedRoom>,
    pub speakers: DashMap<Ulid, SharedSpeaker>,
    pub bookings: DashMap<Ulid, SharedBooking>,
    pub attendance: DashMap<Ulid, AttendanceRecord>,
    pub keys: KeyIndex,
}

impl Store {
    pub fn room(&self, id: &Ulid) -> Result<SharedRoom, EngineError> {
        self.rooms
            .get(id)
            .map(|e| e.value().clone())
            .ok_or_else(|| EngineError::not_found(ResourceKind::Room, *id))
    }

    pub fn speaker(&self, id: &Ulid) -> Result<SharedSpeaker, EngineError> {
        self.speakers
            .get(id)
            .map(|e| e.value().clone())
            .ok_or_else(|| EngineError::not_found(ResourceKind::Speaker, *id))
    }

    pub fn booking(&self, id: &Ulid) -> Result<SharedBooking, EngineError> {
        self.bookings
            .get(id)
            .map(|e| e.value().clone())
            .ok_or_else(|| EngineError::not_found(super::Entity::Booking, *id))
    }

    /// Clone out every handle so no map shard stays locked across an await.
    pub fn all_rooms(&self) -> Vec<SharedRoom> {
        self.rooms.iter().map(|e| e.value().clone()).collect()
    }

    pub fn all_speakers(&self) -> Vec<SharedSpeaker> {
        self.speakers.iter().map(|e| e.value().clone()).collect()
    }

    pub fn all_bookings(&self) -> Vec<SharedBooking> {
        self.bookings.iter().map(|e| e.value().clone()).collect()
    }

    pub async fn booking_snapshots(&self) -> Vec<Booking> {
        let mut out = Vec::with_capacity(self.bookings.len());
        for shared in self.all_bookings() {
            out.push(shared.read().await.booking.clone());
        }
        out
    }

    /// Write-lock rooms, then speakers, each set in id order. Every mutation
    /// that touches more than one resource goes through here, which is what
    /// rules out lock-order deadlocks.
    pub async fn lock_resources(
        &self,
        room_ids: &[Ulid],
        speaker_ids: &[Ulid],
    ) -> Result<ResourceLocks, EngineError> {
        let rooms = lock_sorted(&self.rooms, ResourceKind::Room, room_ids).await?;
        let speakers = lock_sorted(&self.speakers, ResourceKind::Speaker, speaker_ids).await?;
        Ok(ResourceLocks { rooms, speakers })
    }

    /// Rebuild every table from journal events. Events pointing at ids that
    /// were never created are skipped.
    pub fn replay(events: &[Event]) -> Self {
        let mut rooms: HashMap<Ulid, ResourceState<Room>> = HashMap::new();
        let mut speakers: HashMap<Ulid, ResourceState<Speaker>> = HashMap::new();
        let mut bookings: HashMap<Ulid, BookingState> = HashMap::new();
        let store = Store::default();

        for event in events {
            match event {
                Event::RoomCreated(room) | Event::RoomUpdated(room) => {
                    let prev = rooms.get(&room.id).map(|rs| rs.record.code.clone());
                    if let Some(code) = prev.filter(|c| *c != room.code) {
                        store.keys.release(KeySpace::RoomCode, &code, room.id);
                    }
                    let _ = store.keys.claim(KeySpace::RoomCode, &room.code, room.id);
                    rooms
                        .entry(room.id)
                        .and_modify(|rs| rs.record = room.clone())
                        .or_insert_with(|| ResourceState::new(room.clone()));
                }
                Event::SpeakerCreated(speaker) | Event::SpeakerUpdated(speaker) => {
                    if let Some(rs) = speakers.get(&speaker.id) {
                        let old = &rs.record;
                        store.keys.release(KeySpace::SpeakerRef, &old.external_ref, old.id);
                        store.keys.release(KeySpace::SpeakerEmail, &old.email, old.id);
                    }
                    let _ = store
                        .keys
                        .claim(KeySpace::SpeakerRef, &speaker.external_ref, speaker.id);
                    let _ = store.keys.claim(KeySpace::SpeakerEmail, &speaker.email, speaker.id);
                    speakers
                        .entry(speaker.id)
                        .and_modify(|rs| rs.record = speaker.clone())
                        .or_insert_with(|| ResourceState::new(speaker.clone()));
                }
                Event::BookingCreated(booking) | Event::BookingUpdated(booking) => {
                    if !rooms.contains_key(&booking.room_id)
                        || !speakers.contains_key(&booking.speaker_id)
                    {
                        continue;
                    }
                    let prev = bookings.get(&booking.id).map(|s| s.booking.clone());
                    if let Some(prev) = &prev {
                        relink(&mut rooms, &mut speakers, Some(prev), booking);
                        if prev.code != booking.code {
                            store.keys.release(KeySpace::BookingCode, &prev.code, prev.id);
                        }
                    } else {
                        relink(&mut rooms, &mut speakers, None, booking);
                    }
                    let _ = store.keys.claim(KeySpace::BookingCode, &booking.code, booking.id);
                    bookings
                        .entry(booking.id)
                        .and_modify(|s| s.booking = booking.clone())
                        .or_insert_with(|| BookingState::new(booking.clone()));
                }
                Event::BookingCancelled { id, at } => {
                    let Some(state) = bookings.get_mut(id) else { continue };
                    let before = state.booking.clone();
                    state.booking.status = BookingStatus::Cancelled;
                    state.booking.updated_at = *at;
                    let after = state.booking.clone();
                    relink(&mut rooms, &mut speakers, Some(&before), &after);
                }
                Event::AttendanceRegistered { record, registered } => {
                    let Some(state) = bookings.get_mut(&record.booking_id) else { continue };
                    state.booking.registered = *registered;
                    state.roster.insert(record.attendee_id.clone(), record.id);
                    store.attendance.insert(record.id, record.clone());
                }
            }
        }

        for (id, rs) in rooms {
            store.rooms.insert(id, Arc::new(RwLock::new(rs)));
        }
        for (id, rs) in speakers {
            store.speakers.insert(id, Arc::new(RwLock::new(rs)));
        }
        for (id, state) in bookings {
            store.bookings.insert(id, Arc::new(RwLock::new(state)));
        }
        store
    }

    /// The minimal event sequence that replays into the current state.
    pub async fn to_events(&self) -> Vec<Event> {
        let mut events = Vec::new();
        for shared in self.all_rooms() {
            events.push(Event::RoomCreated(shared.read().await.record.clone()));
        }
        for shared in self.all_speakers() {
            events.push(Event::SpeakerCreated(shared.read().await.record.clone()));
        }
        let mut registered = HashMap::new();
        for shared in self.all_bookings() {
            let state = shared.read().await;
            registered.insert(state.booking.id, state.booking.registered);
            events.push(Event::BookingCreated(state.booking.clone()));
        }
        let records: Vec<AttendanceRecord> =
            self.attendance.iter().map(|e| e.value().clone()).collect();
        for record in records {
            let Some(&count) = registered.get(&record.booking_id) else { continue };
            events.push(Event::AttendanceRegistered {
                record,
                registered: count,
            });
        }
        events
    }
}

fn relink(
    rooms: &mut HashMap<Ulid, ResourceState<Room>>,
    speakers: &mut HashMap<Ulid, ResourceState<Speaker>>,
    before: Option<&Booking>,
    after: &Booking,
) {
    if let Some(before) = before {
        if let Some(rs) = rooms.get_mut(&before.room_id) {
            rs.detach(before);
        }
        if let Some(rs) = speakers.get_mut(&before.speaker_id) {
            rs.detach(before);
        }
    }
    if let Some(rs) = rooms.get_mut(&after.room_id) {
        rs.attach(after);
    }
    if let Some(rs) = speakers.get_mut(&after.speaker_id) {
        rs.attach(after);
    }
}

async fn lock_sorted<R>(
    table: &DashMap<Ulid, Arc<RwLock<ResourceState<R>>>>,
    kind: ResourceKind,
    ids: &[Ulid],
) -> Result<Vec<(Ulid, ResourceGuard<R>)>, EngineError> {
    let mut ids = ids.to_vec();
    ids.sort();
    ids.dedup();

    let mut guards = Vec::with_capacity(ids.len());
    for id in ids {
        let shared = table
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or_else(|| EngineError::not_found(kind, id))?;
        guards.push((id, shared.write_owned().await));
    }
    Ok(guards)
}

// ── Held locks ───────────────────────────────────────────────────

/// Write guards over every room and speaker a mutation touches.
pub struct ResourceLocks {
    rooms: Vec<(Ulid, ResourceGuard<Room>)>,
    speakers: Vec<(Ulid, ResourceGuard<Speaker>)>,
}

impl ResourceLocks {
    pub fn room(&self, id: &Ulid) -> Result<&ResourceState<Room>, EngineError> {
        self.rooms
            .iter()
            .find(|(rid, _)| rid == id)
            .map(|(_, g)| &**g)
            .ok_or_else(|| EngineError::not_found(ResourceKind::Room, *id))
    }

    pub fn speaker(&self, id: &Ulid) -> Result<&ResourceState<Speaker>, EngineError> {
        self.speakers
            .iter()
            .find(|(sid, _)| sid == id)
            .map(|(_, g)| &**g)
            .ok_or_else(|| EngineError::not_found(ResourceKind::Speaker, *id))
    }

    /// Move a booking's footprint from `before` to `after`. `None` for a booking
    /// that did not exist yet. Every resource involved must be held here.
    pub fn rehome(&mut self, before: Option<&Booking>, after: &Booking) {
        if let Some(before) = before {
            if let Some((_, g)) = self.rooms.iter_mut().find(|(id, _)| *id == before.room_id) {
                g.detach(before);
            }
            if let Some((_, g)) = self
                .speakers
                .iter_mut()
                .find(|(id, _)| *id == before.speaker_id)
            {
                g.detach(before);
            }
        }
        if let Some((_, g)) = self.rooms.iter_mut().find(|(id, _)| *id == after.room_id) {
            g.attach(after);
        }
        if let Some((_, g)) = self
            .speakers
            .iter_mut()
            .find(|(id, _)| *id == after.speaker_id)
        {
            g.attach(after);
        }
    }
}
