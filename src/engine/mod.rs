mod conflict;
mod error;
mod mutations;
mod queries;

pub use conflict::phase;
pub use error::EngineError;

use std::sync::Arc;

use chrono::NaiveDate;

use crate::clock::Clock;
use crate::model::*;
use crate::store::{BookingStore, SpotDirectory, StoreError, UserDirectory};

/// Booking lifecycle manager.
///
/// Validates creation, rescheduling and cancellation of date-ranged bookings
/// against a spot. Holds no mutable state of its own: bookings live in the
/// [`BookingStore`], ownership in the [`SpotDirectory`], identities in the
/// [`UserDirectory`].
pub struct BookingManager {
    pub(super) bookings: Arc<dyn BookingStore>,
    pub(super) spots: Arc<dyn SpotDirectory>,
    pub(super) users: Arc<dyn UserDirectory>,
    pub(super) clock: Arc<dyn Clock>,
}

impl BookingManager {
    pub fn new(
        bookings: Arc<dyn BookingStore>,
        spots: Arc<dyn SpotDirectory>,
        users: Arc<dyn UserDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            bookings,
            spots,
            users,
            clock,
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Translate a store failure on a write path. A storage-level overlap is
    /// the same `Conflict` a caller gets from the proactive check.
    pub(super) fn write_err(e: StoreError) -> EngineError {
        if matches!(e, StoreError::Overlap(_)) {
            metrics::counter!(crate::observability::BOOKING_CONFLICTS_TOTAL, "source" => "store")
                .increment(1);
        }
        e.into()
    }
}
