/// Longest stay a single booking may cover.
pub const MAX_STAY_NIGHTS: i64 = 365;

/// How far ahead of today a stay may start.
pub const MAX_ADVANCE_DAYS: i64 = 730;

pub const MAX_BOOKINGS_PER_SPOT: usize = 10_000;

pub const MAX_SPOTS: usize = 100_000;

pub const MAX_USERS: usize = 100_000;

/// Usernames and first/last names.
pub const MAX_NAME_LEN: usize = 64;

/// Free-text spot fields (name, address, city, ...).
pub const MAX_TEXT_LEN: usize = 256;

/// Preview image URL.
pub const MAX_URL_LEN: usize = 2048;

/// Largest WAL frame payload replay will read. Anything longer is treated
/// as corruption and ends the log.
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Review body text.
pub const MAX_REVIEW_LEN: usize = 2000;

pub const MAX_REVIEWS: usize = 1_000_000;
