use chrono::NaiveDate;

use crate::limits::*;
use crate::model::*;

use super::EngineError;

/// Temporal phase of a booking on `today`.
pub fn phase(today: NaiveDate, range: &DateRange) -> BookingPhase {
    if range.start >= today {
        BookingPhase::Future
    } else if range.end >= today {
        BookingPhase::Ongoing
    } else {
        BookingPhase::Past
    }
}

/// Validate requested dates against `today` and build the range.
/// Past start and inverted ranges are rejected before any size limits.
pub(crate) fn validate_dates(
    today: NaiveDate,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<DateRange, EngineError> {
    if start < today {
        return Err(EngineError::InvalidInput {
            field: "start_date",
            reason: "start_date cannot be in the past",
        });
    }
    if end <= start {
        return Err(EngineError::InvalidInput {
            field: "end_date",
            reason: "end_date cannot be on or before start_date",
        });
    }
    let range = DateRange::new(start, end);
    if range.nights() > MAX_STAY_NIGHTS {
        return Err(EngineError::InvalidInput {
            field: "end_date",
            reason: "stay is too long",
        });
    }
    if (start - today).num_days() > MAX_ADVANCE_DAYS {
        return Err(EngineError::InvalidInput {
            field: "start_date",
            reason: "start_date is too far in the future",
        });
    }
    Ok(range)
}

/// Half-open overlap test against the other bookings of the spot.
/// Touching boundaries (one checkout, next check-in same day) pass.
pub(crate) fn check_no_conflict(others: &[Booking], range: &DateRange) -> Result<(), EngineError> {
    match others.iter().find(|b| b.range.overlaps(range)) {
        Some(existing) => Err(EngineError::Conflict {
            existing: Some(existing.id),
        }),
        None => Ok(()),
    }
}
