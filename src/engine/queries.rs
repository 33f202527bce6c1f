use std::cmp::Reverse;
use std::collections::HashMap;

use chrono::{NaiveDate, NaiveTime};
use ulid::Ulid;

use crate::model::*;
use crate::observability::track;

use super::conflict::conflicting_slots;
use super::{validate, Engine, EngineError, Entity};

fn contains_ci(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

fn paginate<T>(mut items: Vec<T>, page: Page) -> Listing<T> {
    let total = items.len();
    let start = page.offset.min(total);
    let end = start.saturating_add(page.limit).min(total);
    items.truncate(end);
    Listing {
        items: items.split_off(start),
        total,
    }
}

/// Sorted, deduplicated, blanks dropped.
fn distinct(values: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = values
        .into_iter()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
        .collect();
    out.sort();
    out.dedup();
    out
}

fn in_range(date: NaiveDate, from: Option<NaiveDate>, to: Option<NaiveDate>) -> bool {
    from.is_none_or(|f| date >= f) && to.is_none_or(|t| date <= t)
}

impl Engine {
    // ── Point lookups ────────────────────────────────────────

    pub async fn get_room(&self, id: Ulid) -> Result<Room, EngineError> {
        let shared = self.store.room(&id)?;
        let guard = shared.read().await;
        Ok(guard.record.clone())
    }

    pub async fn get_speaker(&self, id: Ulid) -> Result<Speaker, EngineError> {
        let shared = self.store.speaker(&id)?;
        let guard = shared.read().await;
        Ok(guard.record.clone())
    }

    pub async fn get_booking(&self, id: Ulid) -> Result<Booking, EngineError> {
        let shared = self.store.booking(&id)?;
        let guard = shared.read().await;
        Ok(guard.booking.clone())
    }

    pub fn get_attendance(&self, id: Ulid) -> Result<AttendanceRecord, EngineError> {
        self.store
            .attendance
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or_else(|| EngineError::not_found(Entity::Attendance, id))
    }

    /// Attendance of one booking, oldest registration first.
    pub async fn list_attendance(
        &self,
        booking_id: Ulid,
    ) -> Result<Vec<AttendanceRecord>, EngineError> {
        let shared = self.store.booking(&booking_id)?;
        let ids: Vec<Ulid> = shared.read().await.roster.values().copied().collect();
        let mut records: Vec<AttendanceRecord> = ids
            .iter()
            .filter_map(|id| self.store.attendance.get(id).map(|e| e.value().clone()))
            .collect();
        records.sort_by_key(|r| (r.registered_at, r.id));
        Ok(records)
    }

    // ── Listings ─────────────────────────────────────────────

    pub async fn list_rooms(&self, query: RoomQuery) -> Result<Listing<Room>, EngineError> {
        let page = validate::page(query.page)?;
        let needle = query.search.as_deref().map(str::to_lowercase);

        let mut rooms = Vec::new();
        for shared in self.store.all_rooms() {
            let room = shared.read().await.record.clone();
            let matches = query.available.is_none_or(|a| room.available == a)
                && query.min_capacity.is_none_or(|c| room.capacity >= c)
                && query.max_capacity.is_none_or(|c| room.capacity <= c)
                && query
                    .room_type
                    .as_deref()
                    .is_none_or(|t| room.room_type.eq_ignore_ascii_case(t))
                && needle.as_deref().is_none_or(|n| {
                    contains_ci(&room.name, n)
                        || contains_ci(&room.code, n)
                        || contains_ci(&room.location, n)
                });
            if matches {
                rooms.push(room);
            }
        }
        rooms.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(paginate(rooms, page))
    }

    pub async fn list_speakers(
        &self,
        query: SpeakerQuery,
    ) -> Result<Listing<Speaker>, EngineError> {
        let page = validate::page(query.page)?;
        let needle = query.search.as_deref().map(str::to_lowercase);

        let mut speakers = Vec::new();
        for shared in self.store.all_speakers() {
            let speaker = shared.read().await.record.clone();
            let matches = query.available.is_none_or(|a| speaker.available == a)
                && query
                    .specialty
                    .as_deref()
                    .is_none_or(|s| speaker.specialty.eq_ignore_ascii_case(s))
                && query
                    .country
                    .as_deref()
                    .is_none_or(|c| speaker.country.as_deref() == Some(c))
                && needle.as_deref().is_none_or(|n| {
                    contains_ci(&speaker.first_name, n)
                        || contains_ci(&speaker.last_name, n)
                        || contains_ci(&speaker.specialty, n)
                });
            if matches {
                speakers.push(speaker);
            }
        }
        speakers.sort_by(|a, b| {
            a.first_name
                .cmp(&b.first_name)
                .then_with(|| a.last_name.cmp(&b.last_name))
                .then(a.id.cmp(&b.id))
        });
        Ok(paginate(speakers, page))
    }

    /// Newest day first, earliest session first within a day. Cancelled
    /// bookings only appear when asked for.
    pub async fn list_bookings(
        &self,
        query: BookingQuery,
    ) -> Result<Listing<Booking>, EngineError> {
        let page = validate::page(query.page)?;
        let needle = query.search.as_deref().map(str::to_lowercase);
        let show_cancelled =
            query.include_cancelled || query.status == Some(BookingStatus::Cancelled);

        let mut bookings: Vec<Booking> = self
            .store
            .booking_snapshots()
            .await
            .into_iter()
            .filter(|b| show_cancelled || b.status != BookingStatus::Cancelled)
            .filter(|b| query.status.is_none_or(|s| b.status == s))
            .filter(|b| in_range(b.date, query.from, query.to))
            .filter(|b| query.room_id.is_none_or(|r| b.room_id == r))
            .filter(|b| query.speaker_id.is_none_or(|s| b.speaker_id == s))
            .filter(|b| query.format.is_none_or(|f| b.details.format == f))
            .filter(|b| {
                query
                    .category
                    .as_deref()
                    .is_none_or(|c| b.details.category.as_deref() == Some(c))
            })
            .filter(|b| {
                needle.as_deref().is_none_or(|n| {
                    contains_ci(&b.details.title, n)
                        || b.details.description.as_deref().is_some_and(|d| contains_ci(d, n))
                        || b.details.category.as_deref().is_some_and(|c| contains_ci(c, n))
                })
            })
            .collect();
        bookings.sort_by(|a, b| {
            b.date
                .cmp(&a.date)
                .then(a.span.start.cmp(&b.span.start))
                .then(a.id.cmp(&b.id))
        });
        Ok(paginate(bookings, page))
    }

    /// Everything not cancelled or finished on `date`, by start time.
    pub async fn day_agenda(&self, date: NaiveDate) -> Vec<Booking> {
        let mut bookings: Vec<Booking> = self
            .store
            .booking_snapshots()
            .await
            .into_iter()
            .filter(|b| b.date == date)
            .filter(|b| b.status.is_active() || b.status == BookingStatus::InProgress)
            .collect();
        bookings.sort_by_key(|b| (b.span.start, b.id));
        bookings
    }

    // ── Availability ─────────────────────────────────────────

    /// Available rooms with no active booking overlapping the window, by
    /// capacity then name.
    pub async fn list_available_rooms(
        &self,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
        filter: RoomFilter,
    ) -> Result<Vec<Room>, EngineError> {
        track("list_available_rooms", async {
            let span = validate::window(start, end)?;
            let mut rooms = Vec::new();
            for shared in self.store.all_rooms() {
                let guard = shared.read().await;
                let room = &guard.record;
                let fits = room.available
                    && filter.min_capacity.is_none_or(|c| room.capacity >= c)
                    && filter
                        .room_type
                        .as_deref()
                        .is_none_or(|t| room.room_type.eq_ignore_ascii_case(t));
                if fits
                    && conflicting_slots(&guard.schedule, date, &span, filter.exclude_booking)
                        .is_empty()
                {
                    rooms.push(room.clone());
                }
            }
            rooms.sort_by(|a, b| a.capacity.cmp(&b.capacity).then(a.name.cmp(&b.name)));
            Ok(rooms)
        })
        .await
    }

    pub async fn list_available_speakers(
        &self,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
        exclude_booking: Option<Ulid>,
    ) -> Result<Vec<Speaker>, EngineError> {
        track("list_available_speakers", async {
            let span = validate::window(start, end)?;
            let mut speakers = Vec::new();
            for shared in self.store.all_speakers() {
                let guard = shared.read().await;
                if guard.record.available
                    && conflicting_slots(&guard.schedule, date, &span, exclude_booking)
                        .is_empty()
                {
                    speakers.push(guard.record.clone());
                }
            }
            speakers.sort_by(|a, b| {
                a.first_name
                    .cmp(&b.first_name)
                    .then_with(|| a.last_name.cmp(&b.last_name))
            });
            Ok(speakers)
        })
        .await
    }

    // ── Distinct values ──────────────────────────────────────

    /// Categories used by bookings that are not cancelled.
    pub async fn booking_categories(&self) -> Vec<String> {
        let bookings = self.store.booking_snapshots().await;
        distinct(
            bookings
                .into_iter()
                .filter(|b| b.status != BookingStatus::Cancelled)
                .filter_map(|b| b.details.category),
        )
    }

    /// Room types among available rooms.
    pub async fn room_types(&self) -> Vec<String> {
        let mut types = Vec::new();
        for shared in self.store.all_rooms() {
            let guard = shared.read().await;
            if guard.record.available {
                types.push(guard.record.room_type.clone());
            }
        }
        distinct(types)
    }

    pub async fn speaker_specialties(&self) -> Vec<String> {
        distinct(self.available_speakers().await.into_iter().map(|s| s.specialty))
    }

    pub async fn speaker_countries(&self) -> Vec<String> {
        distinct(self.available_speakers().await.into_iter().filter_map(|s| s.country))
    }

    async fn available_speakers(&self) -> Vec<Speaker> {
        let mut speakers = Vec::new();
        for shared in self.store.all_speakers() {
            let guard = shared.read().await;
            if guard.record.available {
                speakers.push(guard.record.clone());
            }
        }
        speakers
    }

    // ── Reports ──────────────────────────────────────────────

    pub async fn booking_stats(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> BookingStats {
        let mut stats = BookingStats::default();
        for b in self.store.booking_snapshots().await {
            if !in_range(b.date, from, to) {
                continue;
            }
            stats.total += 1;
            match b.status {
                BookingStatus::Scheduled => stats.scheduled += 1,
                BookingStatus::Confirmed => stats.confirmed += 1,
                BookingStatus::InProgress => stats.in_progress += 1,
                BookingStatus::Completed => stats.completed += 1,
                BookingStatus::Cancelled => stats.cancelled += 1,
            }
            stats.total_attendees += u64::from(b.registered);
            stats.estimated_revenue = stats
                .estimated_revenue
                .saturating_add(u64::from(b.registered).saturating_mul(b.price));
        }
        stats
    }

    /// Confirmed and completed sessions per room, busiest first. Rooms with
    /// no such sessions are left out.
    pub async fn room_usage(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Vec<RoomUsage> {
        let mut per_room: HashMap<Ulid, (u32, u64)> = HashMap::new();
        for b in self.store.booking_snapshots().await {
            let counted =
                matches!(b.status, BookingStatus::Confirmed | BookingStatus::Completed);
            if counted && in_range(b.date, from, to) {
                let entry = per_room.entry(b.room_id).or_default();
                entry.0 += 1;
                entry.1 += u64::from(b.duration_minutes);
            }
        }

        let mut usage = Vec::with_capacity(per_room.len());
        for (room_id, (sessions, total_minutes)) in per_room {
            let Ok(shared) = self.store.room(&room_id) else { continue };
            let room = shared.read().await.record.clone();
            usage.push(RoomUsage {
                room_id,
                code: room.code,
                name: room.name,
                room_type: room.room_type,
                sessions,
                total_minutes,
            });
        }
        usage.sort_by_key(|u| (Reverse(u.sessions), u.name.clone()));
        usage
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paginate_slices_and_counts() {
        let page = paginate((0..25).collect::<Vec<_>>(), Page { offset: 20, limit: 10 });
        assert_eq!(page.items, vec![20, 21, 22, 23, 24]);
        assert_eq!(page.total, 25);

        let past_end = paginate(vec![1, 2, 3], Page { offset: 10, limit: 5 });
        assert!(past_end.items.is_empty());
        assert_eq!(past_end.total, 3);
    }

    #[test]
    fn date_range_is_inclusive() {
        let d = |day| NaiveDate::from_ymd_opt(2025, 5, day).unwrap();
        assert!(in_range(d(10), Some(d(10)), Some(d(10))));
        assert!(!in_range(d(9), Some(d(10)), None));
        assert!(!in_range(d(11), None, Some(d(10))));
        assert!(in_range(d(11), None, None));
    }
}
