//! Hard input limits. Anything past these is rejected with `LimitExceeded`.

pub const MAX_CODE_LEN: usize = 64;
pub const MAX_NAME_LEN: usize = 256;
pub const MAX_TEXT_LEN: usize = 8 * 1024;
pub const MAX_LIST_ITEMS: usize = 64;
pub const MAX_ATTENDEE_ID_LEN: usize = 128;

pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const MAX_PAGE_SIZE: usize = 500;

/// Active bookings one room or speaker may hold on a single day.
pub const MAX_BOOKINGS_PER_RESOURCE_DAY: usize = 256;

/// Attempts at locking a booking's resources before giving up on a booking
/// that keeps being moved underneath us.
pub const DEFAULT_LOCK_RETRIES: u32 = 8;

/// Largest journal frame payload. A length word above this is read as a
/// torn tail rather than allocated.
pub const MAX_JOURNAL_FRAME_LEN: usize = 16 * 1024 * 1024;
