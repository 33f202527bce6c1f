use std::collections::{BTreeMap, HashSet};
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::limits::DEFAULT_PAGE_SIZE;

/// Minor currency units. Prices and charges are never negative.
pub type Money = u64;

/// Half-open window `[start, end)` within one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl Span {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    /// `None` unless `start < end`.
    pub fn try_new(start: NaiveTime, end: NaiveTime) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    pub fn minutes(&self) -> u32 {
        (self.end - self.start).num_minutes().max(0) as u32
    }

    /// The one overlap predicate. Touching endpoints do not overlap.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

// ── Catalog ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    Room,
    Speaker,
}

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Room => "room",
            ResourceKind::Speaker => "speaker",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: Ulid,
    pub code: String,
    pub name: String,
    pub location: String,
    pub capacity: u32,
    pub room_type: String,
    pub equipment: Vec<String>,
    pub hourly_rate: Option<Money>,
    pub description: Option<String>,
    pub contact: Option<String>,
    /// Cleared by soft-delete; never hard-deleted.
    pub available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Speaker {
    pub id: Ulid,
    /// National ID or similar; unique.
    pub external_ref: String,
    pub first_name: String,
    pub last_name: String,
    /// Unique contact address.
    pub email: String,
    pub phone: Option<String>,
    pub specialty: String,
    pub biography: Option<String>,
    pub institution: Option<String>,
    pub position: Option<String>,
    pub country: Option<String>,
    pub years_experience: Option<u32>,
    pub languages: Vec<String>,
    pub fee_per_event: Option<Money>,
    pub available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomDraft {
    pub code: String,
    pub name: String,
    pub location: String,
    pub capacity: u32,
    pub room_type: String,
    pub equipment: Vec<String>,
    pub hourly_rate: Option<Money>,
    pub description: Option<String>,
    pub contact: Option<String>,
}

impl RoomDraft {
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        location: impl Into<String>,
        capacity: u32,
        room_type: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            location: location.into(),
            capacity,
            room_type: room_type.into(),
            ..Self::default()
        }
    }
}

/// Merge-patch: `None` leaves the field as it is.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomPatch {
    pub code: Option<String>,
    pub name: Option<String>,
    pub location: Option<String>,
    pub capacity: Option<u32>,
    pub room_type: Option<String>,
    pub equipment: Option<Vec<String>>,
    pub hourly_rate: Option<Money>,
    pub description: Option<String>,
    pub contact: Option<String>,
    /// `Some(false)` goes through the soft-delete guard; `Some(true)` reactivates.
    pub available: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeakerDraft {
    pub external_ref: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub specialty: String,
    pub biography: Option<String>,
    pub institution: Option<String>,
    pub position: Option<String>,
    pub country: Option<String>,
    pub years_experience: Option<u32>,
    pub languages: Vec<String>,
    pub fee_per_event: Option<Money>,
}

impl SpeakerDraft {
    pub fn new(
        external_ref: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
        specialty: impl Into<String>,
    ) -> Self {
        Self {
            external_ref: external_ref.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: email.into(),
            specialty: specialty.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeakerPatch {
    pub external_ref: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub specialty: Option<String>,
    pub biography: Option<String>,
    pub institution: Option<String>,
    pub position: Option<String>,
    pub country: Option<String>,
    pub years_experience: Option<u32>,
    pub languages: Option<Vec<String>>,
    pub fee_per_event: Option<Money>,
    pub available: Option<bool>,
}

// ── Bookings ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookingStatus {
    Scheduled,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
}

impl BookingStatus {
    /// Only active bookings occupy rooms and speakers.
    pub fn is_active(self) -> bool {
        matches!(self, BookingStatus::Scheduled | BookingStatus::Confirmed)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BookingStatus::Scheduled => "scheduled",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::InProgress => "in progress",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionFormat {
    #[default]
    InPerson,
    Virtual,
    Hybrid,
}

/// Descriptive fields of a session. None of them take part in any invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionDetails {
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub format: SessionFormat,
    pub language: String,
    pub level: String,
    pub tags: Vec<String>,
    pub materials: Option<String>,
    pub certification: bool,
    pub certification_hours: u32,
    pub organizer: Option<String>,
    pub technical_requirements: Option<String>,
}

impl Default for SessionDetails {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: None,
            category: None,
            format: SessionFormat::InPerson,
            language: "Español".into(),
            level: "Intermediate".into(),
            tags: Vec::new(),
            materials: None,
            certification: false,
            certification_hours: 0,
            organizer: None,
            technical_requirements: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionDetailsPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub format: Option<SessionFormat>,
    pub language: Option<String>,
    pub level: Option<String>,
    pub tags: Option<Vec<String>>,
    pub materials: Option<String>,
    pub certification: Option<bool>,
    pub certification_hours: Option<u32>,
    pub organizer: Option<String>,
    pub technical_requirements: Option<String>,
}

impl SessionDetailsPatch {
    pub fn apply(self, details: &mut SessionDetails) {
        replace(&mut details.title, self.title);
        fill(&mut details.description, self.description);
        fill(&mut details.category, self.category);
        replace(&mut details.format, self.format);
        replace(&mut details.language, self.language);
        replace(&mut details.level, self.level);
        replace(&mut details.tags, self.tags);
        fill(&mut details.materials, self.materials);
        replace(&mut details.certification, self.certification);
        replace(&mut details.certification_hours, self.certification_hours);
        fill(&mut details.organizer, self.organizer);
        fill(&mut details.technical_requirements, self.technical_requirements);
    }
}

/// A scheduled session occupying one room and one speaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    /// Unique across all bookings, cancelled ones included.
    pub code: String,
    pub room_id: Ulid,
    pub speaker_id: Ulid,
    pub date: NaiveDate,
    pub span: Span,
    pub duration_minutes: u32,
    pub status: BookingStatus,
    pub expected: u32,
    /// Never exceeds `expected`.
    pub registered: u32,
    pub price: Money,
    pub details: SessionDetails,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingDraft {
    /// Generated when absent.
    pub code: Option<String>,
    pub room_id: Ulid,
    pub speaker_id: Ulid,
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
    /// Derived from `end - start` when absent.
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    /// `Scheduled` when absent.
    #[serde(default)]
    pub status: Option<BookingStatus>,
    #[serde(default)]
    pub expected: u32,
    #[serde(default)]
    pub price: Money,
    #[serde(default)]
    pub details: SessionDetails,
}

impl BookingDraft {
    pub fn new(
        title: impl Into<String>,
        room_id: Ulid,
        speaker_id: Ulid,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
    ) -> Self {
        Self {
            code: None,
            room_id,
            speaker_id,
            date,
            start,
            end,
            duration_minutes: None,
            status: None,
            expected: 0,
            price: 0,
            details: SessionDetails {
                title: title.into(),
                ..SessionDetails::default()
            },
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BookingPatch {
    pub code: Option<String>,
    pub room_id: Option<Ulid>,
    pub speaker_id: Option<Ulid>,
    pub date: Option<NaiveDate>,
    pub start: Option<NaiveTime>,
    pub end: Option<NaiveTime>,
    pub duration_minutes: Option<u32>,
    pub status: Option<BookingStatus>,
    pub expected: Option<u32>,
    pub price: Option<Money>,
    pub details: SessionDetailsPatch,
}

impl BookingPatch {
    /// True when the patch touches anything that decides where and when
    /// the booking sits.
    pub fn moves(&self, current: &Booking) -> bool {
        self.room_id.is_some_and(|r| r != current.room_id)
            || self.speaker_id.is_some_and(|s| s != current.speaker_id)
            || self.date.is_some_and(|d| d != current.date)
            || self.start.is_some_and(|t| t != current.span.start)
            || self.end.is_some_and(|t| t != current.span.end)
    }
}

// ── Attendance ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentStatus {
    NotRequired,
    Pending,
    Paid,
}

/// Recorded for paid sessions when the attendee names no method (cash).
pub const DEFAULT_PAYMENT_METHOD: &str = "Efectivo";

/// Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub id: Ulid,
    pub booking_id: Ulid,
    pub attendee_id: String,
    pub payment_status: PaymentStatus,
    pub payment_method: Option<String>,
    pub amount: Money,
    pub notes: Option<String>,
    pub registered_at: DateTime<Utc>,
}

// ── Per-resource calendar ────────────────────────────────────────

/// An active booking's footprint on a resource's calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub booking_id: Ulid,
    pub span: Span,
}

/// Active bookings of one resource, per day, each day sorted by `span.start`.
#[derive(Debug, Clone, Default)]
pub struct Schedule {
    days: BTreeMap<NaiveDate, Vec<Slot>>,
}

impl Schedule {
    pub fn insert(&mut self, date: NaiveDate, slot: Slot) {
        let day = self.days.entry(date).or_default();
        let pos = day.partition_point(|s| s.span.start <= slot.span.start);
        day.insert(pos, slot);
    }

    pub fn remove(&mut self, date: NaiveDate, booking_id: Ulid) -> Option<Slot> {
        let day = self.days.get_mut(&date)?;
        let pos = day.iter().position(|s| s.booking_id == booking_id)?;
        let slot = day.remove(pos);
        if day.is_empty() {
            self.days.remove(&date);
        }
        Some(slot)
    }

    pub fn day(&self, date: NaiveDate) -> &[Slot] {
        self.days.get(&date).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Slots on `date` overlapping `query`. Everything starting at or after
    /// `query.end` is skipped by binary search.
    pub fn overlapping<'a>(&'a self, date: NaiveDate, query: &'a Span) -> impl Iterator<Item = &'a Slot> {
        let day = self.day(date);
        let right_bound = day.partition_point(|s| s.span.start < query.end);
        day[..right_bound]
            .iter()
            .filter(move |s| s.span.overlaps(query))
    }

    pub fn active_count(&self) -> usize {
        self.days.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

/// A catalog record plus everything that references it.
#[derive(Debug, Clone)]
pub struct ResourceState<R> {
    pub record: R,
    pub schedule: Schedule,
    /// Every booking referencing this resource, whatever its status.
    pub bookings: HashSet<Ulid>,
}

impl<R> ResourceState<R> {
    pub fn new(record: R) -> Self {
        Self {
            record,
            schedule: Schedule::default(),
            bookings: HashSet::new(),
        }
    }

    pub fn attach(&mut self, booking: &Booking) {
        self.bookings.insert(booking.id);
        if booking.status.is_active() {
            self.schedule.insert(
                booking.date,
                Slot {
                    booking_id: booking.id,
                    span: booking.span,
                },
            );
        }
    }

    pub fn detach(&mut self, booking: &Booking) {
        self.bookings.remove(&booking.id);
        self.schedule.remove(booking.date, booking.id);
    }
}

/// Journal record format. Each variant is a committed fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    RoomCreated(Room),
    RoomUpdated(Room),
    SpeakerCreated(Speaker),
    SpeakerUpdated(Speaker),
    BookingCreated(Booking),
    BookingUpdated(Booking),
    BookingCancelled {
        id: Ulid,
        at: DateTime<Utc>,
    },
    AttendanceRegistered {
        record: AttendanceRecord,
        /// The booking's registered count after this registration.
        registered: u32,
    },
}

// ── Queries ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Page {
    pub offset: usize,
    pub limit: usize,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing<T> {
    pub items: Vec<T>,
    /// Matches before pagination.
    pub total: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BookingQuery {
    /// Asking for `Cancelled` here returns cancelled bookings even when
    /// `include_cancelled` is false.
    pub status: Option<BookingStatus>,
    pub include_cancelled: bool,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub room_id: Option<Ulid>,
    pub speaker_id: Option<Ulid>,
    pub category: Option<String>,
    pub format: Option<SessionFormat>,
    pub search: Option<String>,
    pub page: Page,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomQuery {
    pub search: Option<String>,
    pub room_type: Option<String>,
    pub available: Option<bool>,
    pub min_capacity: Option<u32>,
    pub max_capacity: Option<u32>,
    pub page: Page,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeakerQuery {
    pub search: Option<String>,
    pub specialty: Option<String>,
    pub available: Option<bool>,
    pub country: Option<String>,
    pub page: Page,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomFilter {
    pub min_capacity: Option<u32>,
    pub room_type: Option<String>,
    /// Ignore this booking's own footprint (rescheduling).
    pub exclude_booking: Option<Ulid>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Availability {
    pub available: bool,
    pub conflicts: Vec<Booking>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookingStats {
    pub total: usize,
    pub scheduled: usize,
    pub confirmed: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub cancelled: usize,
    pub total_attendees: u64,
    pub estimated_revenue: Money,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomUsage {
    pub room_id: Ulid,
    pub code: String,
    pub name: String,
    pub room_type: String,
    pub sessions: u32,
    pub total_minutes: u64,
}

// ── Merge helpers ────────────────────────────────────────────────

pub(crate) fn replace<T>(slot: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *slot = v;
    }
}

pub(crate) fn fill<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
    }

    fn slot(start: NaiveTime, end: NaiveTime) -> Slot {
        Slot {
            booking_id: Ulid::new(),
            span: Span::new(start, end),
        }
    }

    #[test]
    fn span_basics() {
        let s = Span::new(t(9, 0), t(10, 30));
        assert_eq!(s.minutes(), 90);
        assert!(Span::try_new(t(10, 0), t(10, 0)).is_none());
        assert!(Span::try_new(t(11, 0), t(10, 0)).is_none());
    }

    #[test]
    fn span_overlap() {
        let a = Span::new(t(9, 0), t(10, 0));
        let b = Span::new(t(9, 30), t(10, 30));
        let c = Span::new(t(10, 0), t(11, 0));
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c)); // adjacent, not overlapping
        assert!(!c.overlaps(&a));
    }

    #[test]
    fn schedule_keeps_day_sorted() {
        let mut sched = Schedule::default();
        sched.insert(day(), slot(t(14, 0), t(15, 0)));
        sched.insert(day(), slot(t(9, 0), t(10, 0)));
        sched.insert(day(), slot(t(11, 0), t(12, 0)));
        let starts: Vec<_> = sched.day(day()).iter().map(|s| s.span.start).collect();
        assert_eq!(starts, vec![t(9, 0), t(11, 0), t(14, 0)]);
        assert_eq!(sched.active_count(), 3);
    }

    #[test]
    fn schedule_remove_drops_empty_day() {
        let mut sched = Schedule::default();
        let s = slot(t(9, 0), t(10, 0));
        sched.insert(day(), s);
        assert_eq!(sched.remove(day(), s.booking_id), Some(s));
        assert!(sched.is_empty());
        assert!(sched.remove(day(), s.booking_id).is_none());
    }

    #[test]
    fn overlapping_is_per_day() {
        let mut sched = Schedule::default();
        sched.insert(day(), slot(t(9, 0), t(10, 0)));
        let other_day = day().succ_opt().unwrap();
        let query = Span::new(t(9, 0), t(10, 0));
        assert_eq!(sched.overlapping(day(), &query).count(), 1);
        assert_eq!(sched.overlapping(other_day, &query).count(), 0);
    }

    #[test]
    fn overlapping_skips_past_and_future() {
        let mut sched = Schedule::default();
        sched.insert(day(), slot(t(8, 0), t(9, 0)));
        let hit = slot(t(9, 30), t(11, 0));
        sched.insert(day(), hit);
        sched.insert(day(), slot(t(12, 0), t(13, 0)));

        let query = Span::new(t(10, 0), t(12, 0));
        let hits: Vec<_> = sched.overlapping(day(), &query).collect();
        assert_eq!(hits, vec![&hit]);
    }

    #[test]
    fn overlapping_adjacent_not_included() {
        let mut sched = Schedule::default();
        sched.insert(day(), slot(t(9, 0), t(10, 0)));
        sched.insert(day(), slot(t(11, 0), t(12, 0)));
        let query = Span::new(t(10, 0), t(11, 0));
        assert_eq!(sched.overlapping(day(), &query).count(), 0);
    }

    #[test]
    fn overlapping_long_slot_spanning_query() {
        let mut sched = Schedule::default();
        sched.insert(day(), slot(t(8, 0), t(18, 0)));
        let query = Span::new(t(12, 0), t(12, 15));
        assert_eq!(sched.overlapping(day(), &query).count(), 1);
    }

    #[test]
    fn attach_only_schedules_active_bookings() {
        let now = Utc::now();
        let mut booking = Booking {
            id: Ulid::new(),
            code: "C-1".into(),
            room_id: Ulid::new(),
            speaker_id: Ulid::new(),
            date: day(),
            span: Span::new(t(9, 0), t(10, 0)),
            duration_minutes: 60,
            status: BookingStatus::Completed,
            expected: 10,
            registered: 0,
            price: 0,
            details: SessionDetails::default(),
            created_at: now,
            updated_at: now,
        };
        let mut rs = ResourceState::new(());
        rs.attach(&booking);
        assert!(rs.schedule.is_empty());
        assert!(rs.bookings.contains(&booking.id));

        rs.detach(&booking);
        booking.status = BookingStatus::Confirmed;
        rs.attach(&booking);
        assert_eq!(rs.schedule.active_count(), 1);

        rs.detach(&booking);
        assert!(rs.schedule.is_empty());
        assert!(rs.bookings.is_empty());
    }

    #[test]
    fn details_patch_only_touches_supplied_fields() {
        let mut details = SessionDetails {
            title: "Rust in production".into(),
            category: Some("Systems".into()),
            ..SessionDetails::default()
        };
        SessionDetailsPatch {
            level: Some("Advanced".into()),
            ..SessionDetailsPatch::default()
        }
        .apply(&mut details);
        assert_eq!(details.title, "Rust in production");
        assert_eq!(details.category.as_deref(), Some("Systems"));
        assert_eq!(details.level, "Advanced");
        assert_eq!(details.language, "Español");
    }

    #[test]
    fn event_serialization_roundtrip() {
        let now = Utc::now();
        let event = Event::RoomCreated(Room {
            id: Ulid::new(),
            code: "A-101".into(),
            name: "Aula Magna".into(),
            location: "Building A".into(),
            capacity: 120,
            room_type: "Auditorium".into(),
            equipment: vec!["projector".into()],
            hourly_rate: Some(5_000),
            description: None,
            contact: None,
            available: true,
            created_at: now,
            updated_at: now,
        });
        let bytes = bincode::serialize(&event).unwrap();
        let decoded: Event = bincode::deserialize(&bytes).unwrap();
        assert_eq!(event, decoded);
    }
}
