use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds, used for record timestamps.
pub type Ms = i64;

/// Half-open range of calendar days `[start, end)`.
///
/// `end` is the checkout day: a stay `[14th, 15th)` is one night, and a second
/// stay may begin on the 15th without overlapping it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        debug_assert!(start < end, "DateRange start must be before end");
        Self { start, end }
    }

    pub fn nights(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Where a booking sits relative to today. Derived at request time, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingPhase {
    /// Has not started yet (`start >= today`).
    Future,
    /// Started, checkout day not yet behind us.
    Ongoing,
    /// Checkout day is before today.
    Past,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub spot_id: Ulid,
    pub renter_id: Ulid,
    pub range: DateRange,
    pub created_at: Ms,
    pub updated_at: Ms,
}

/// A booking before the store has assigned its id and timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBooking {
    pub spot_id: Ulid,
    pub renter_id: Ulid,
    pub range: DateRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spot {
    pub id: Ulid,
    pub owner_id: Ulid,
    pub name: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub lat: f64,
    pub lng: f64,
    pub price: f64,
    pub preview_image: Option<String>,
}

impl Spot {
    pub fn snapshot(&self) -> SpotSnapshot {
        SpotSnapshot {
            id: self.id,
            name: self.name.clone(),
            address: self.address.clone(),
            city: self.city.clone(),
            state: self.state.clone(),
            country: self.country.clone(),
            lat: self.lat,
            lng: self.lng,
            price: self.price,
            preview_image: self.preview_image.clone(),
        }
    }
}

/// Listing input for a new spot; the owner comes from the session.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSpot {
    pub name: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub lat: f64,
    pub lng: f64,
    pub price: f64,
    pub preview_image: Option<String>,
}

/// Owner edit of a listing. `None` leaves a field as listed; for
/// `preview_image`, `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpotPatch {
    pub name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub price: Option<f64>,
    pub preview_image: Option<Option<String>>,
}

impl SpotPatch {
    pub fn is_empty(&self) -> bool {
        *self == SpotPatch::default()
    }

    /// The listing `spot` would have after this edit.
    pub fn apply_to(self, spot: &Spot) -> NewSpot {
        NewSpot {
            name: self.name.unwrap_or_else(|| spot.name.clone()),
            address: self.address.unwrap_or_else(|| spot.address.clone()),
            city: self.city.unwrap_or_else(|| spot.city.clone()),
            state: self.state.unwrap_or_else(|| spot.state.clone()),
            country: self.country.unwrap_or_else(|| spot.country.clone()),
            lat: self.lat.unwrap_or(spot.lat),
            lng: self.lng.unwrap_or(spot.lng),
            price: self.price.unwrap_or(spot.price),
            preview_image: self
                .preview_image
                .unwrap_or_else(|| spot.preview_image.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: Ulid,
    pub spot_id: Ulid,
    pub author_id: Ulid,
    pub text: String,
    /// 1 to 5.
    pub stars: u8,
    pub created_at: Ms,
    pub updated_at: Ms,
}

/// Review input; the author comes from the session. `stars` is checked by
/// the store, so out-of-range input survives parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReview {
    pub spot_id: Ulid,
    pub text: String,
    pub stars: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Ulid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

/// All bookings of one spot, sorted by `range.start`, plus the spot itself.
#[derive(Debug, Clone)]
pub struct SpotState {
    pub spot: Spot,
    pub bookings: Vec<Booking>,
    /// Set once the spot is deleted. A writer that fetched this state before
    /// the delete must not record anything on it.
    pub removed: bool,
}

impl SpotState {
    pub fn new(spot: Spot) -> Self {
        Self {
            spot,
            bookings: Vec::new(),
            removed: false,
        }
    }

    /// Insert booking maintaining sort order by range.start.
    pub fn insert_booking(&mut self, booking: Booking) {
        let pos = self
            .bookings
            .binary_search_by_key(&booking.range.start, |b| b.range.start)
            .unwrap_or_else(|e| e);
        self.bookings.insert(pos, booking);
    }

    pub fn remove_booking(&mut self, id: Ulid) -> Option<Booking> {
        let pos = self.bookings.iter().position(|b| b.id == id)?;
        Some(self.bookings.remove(pos))
    }

    pub fn get_booking(&self, id: Ulid) -> Option<&Booking> {
        self.bookings.iter().find(|b| b.id == id)
    }

    /// Bookings whose range overlaps the query.
    /// Binary search skips everything starting at or after `query.end`.
    pub fn overlapping(&self, query: &DateRange) -> impl Iterator<Item = &Booking> {
        let right_bound = self
            .bookings
            .partition_point(|b| b.range.start < query.end);
        self.bookings[..right_bound]
            .iter()
            .filter(move |b| b.range.end > query.start)
    }
}

/// The event types. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    UserRegistered {
        id: Ulid,
        username: String,
        first_name: String,
        last_name: String,
    },
    SpotListed {
        spot: Spot,
    },
    BookingCreated {
        id: Ulid,
        spot_id: Ulid,
        renter_id: Ulid,
        range: DateRange,
        created_at: Ms,
        updated_at: Ms,
    },
    BookingRescheduled {
        id: Ulid,
        spot_id: Ulid,
        range: DateRange,
        updated_at: Ms,
    },
    BookingDeleted {
        id: Ulid,
        spot_id: Ulid,
    },
    /// Carries the whole edited spot; replay overwrites the listing.
    SpotUpdated {
        spot: Spot,
    },
    /// Removes the spot with its remaining (past) bookings and its reviews.
    SpotDeleted {
        spot_id: Ulid,
    },
    ReviewPosted {
        review: Review,
    },
    ReviewEdited {
        id: Ulid,
        text: String,
        stars: u8,
        updated_at: Ms,
    },
    ReviewDeleted {
        id: Ulid,
    },
}

// ── Query result types ───────────────────────────────────────────

/// Public attributes of a spot, attached to a renter's bookings.
#[derive(Debug, Clone, PartialEq)]
pub struct SpotSnapshot {
    pub id: Ulid,
    pub name: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub lat: f64,
    pub lng: f64,
    pub price: f64,
    pub preview_image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenterIdentity {
    pub id: Ulid,
    pub first_name: String,
    pub last_name: String,
}

/// One of the requester's own bookings.
#[derive(Debug, Clone, PartialEq)]
pub struct RenterBooking {
    pub booking: Booking,
    /// `None` only if the spot vanished from the directory.
    pub spot: Option<SpotSnapshot>,
}

/// Review count and mean star rating of a spot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReviewStats {
    pub count: usize,
    /// `None` when the spot has no reviews.
    pub avg_stars: Option<f64>,
}

impl ReviewStats {
    pub fn of<'a>(reviews: impl IntoIterator<Item = &'a Review>) -> Self {
        let (count, total) = reviews
            .into_iter()
            .fold((0usize, 0u64), |(n, sum), r| (n + 1, sum + u64::from(r.stars)));
        Self {
            count,
            avg_stars: (count > 0).then(|| total as f64 / count as f64),
        }
    }
}

/// A single spot with its owner and review summary.
#[derive(Debug, Clone, PartialEq)]
pub struct SpotDetail {
    pub spot: Spot,
    /// `None` only if the owner vanished from the directory.
    pub owner: Option<RenterIdentity>,
    pub reviews: ReviewStats,
}

/// One of the requester's own reviews.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthorReview {
    pub review: Review,
    pub spot: Option<SpotSnapshot>,
}

/// A review as listed on its spot.
#[derive(Debug, Clone, PartialEq)]
pub struct SpotReview {
    pub review: Review,
    pub author: Option<RenterIdentity>,
}

/// A booking as seen through a spot's calendar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpotBooking {
    /// The spot owner sees who is staying.
    Owner {
        booking: Booking,
        renter: Option<RenterIdentity>,
    },
    /// Everyone else sees only which days are taken.
    Public {
        id: Ulid,
        spot_id: Ulid,
        range: DateRange,
    },
}
