use chrono::NaiveDate;
use tracing::{debug, info};
use ulid::Ulid;

use crate::model::*;

use super::conflict::{check_no_conflict, phase, validate_dates};
use super::{BookingManager, EngineError};

impl BookingManager {
    /// Book `spot_id` for `renter_id` over `[start, end)`.
    pub async fn create(
        &self,
        spot_id: Ulid,
        renter_id: Ulid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Booking, EngineError> {
        let owner_id = self
            .spots
            .spot_owner(spot_id)
            .await?
            .ok_or(EngineError::NotFound(spot_id))?;
        if owner_id == renter_id {
            return Err(EngineError::Forbidden("cannot book own spot"));
        }

        let range = validate_dates(self.today(), start, end)?;
        let existing = self.bookings.find_by_spot(spot_id, None).await?;
        check_no_conflict(&existing, &range).inspect_err(|_| proactive_conflict())?;

        let booking = self
            .bookings
            .insert(NewBooking {
                spot_id,
                renter_id,
                range,
            })
            .await
            .map_err(Self::write_err)?;
        info!(
            "booking {} created: spot {spot_id}, renter {renter_id}, [{}, {})",
            booking.id, range.start, range.end
        );
        Ok(booking)
    }

    /// Move a booking to `[start, end)`. Only its renter may do this, and
    /// only while the booking is not in the past.
    pub async fn update(
        &self,
        booking_id: Ulid,
        requester_id: Ulid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Booking, EngineError> {
        let mut booking = self
            .bookings
            .find_by_id(booking_id)
            .await?
            .ok_or(EngineError::NotFound(booking_id))?;
        if booking.renter_id != requester_id {
            return Err(EngineError::Forbidden("cannot edit someone else's booking"));
        }

        let today = self.today();
        if phase(today, &booking.range) == BookingPhase::Past {
            return Err(EngineError::Forbidden("past bookings can't be modified"));
        }
        let range = validate_dates(today, start, end)?;

        let others = self
            .bookings
            .find_by_spot(booking.spot_id, Some(booking_id))
            .await?;
        check_no_conflict(&others, &range).inspect_err(|_| proactive_conflict())?;

        booking.range = range;
        let booking = self.bookings.update(booking).await.map_err(Self::write_err)?;
        info!(
            "booking {booking_id} rescheduled to [{}, {})",
            range.start, range.end
        );
        Ok(booking)
    }

    /// Cancel a booking. The renter or the spot owner may do this until the
    /// stay starts.
    pub async fn delete(&self, booking_id: Ulid, requester_id: Ulid) -> Result<(), EngineError> {
        let booking = self
            .bookings
            .find_by_id(booking_id)
            .await?
            .ok_or(EngineError::NotFound(booking_id))?;

        let owner_id = self.spots.spot_owner(booking.spot_id).await?;
        if booking.renter_id != requester_id && owner_id != Some(requester_id) {
            return Err(EngineError::Forbidden(
                "you don't have permission to delete this booking",
            ));
        }
        if phase(self.today(), &booking.range) != BookingPhase::Future {
            return Err(EngineError::Forbidden(
                "bookings that have been started can't be deleted",
            ));
        }

        // Lost a race with another delete.
        if !self.bookings.delete(booking_id).await.map_err(Self::write_err)? {
            debug!("booking {booking_id} vanished before delete");
            return Err(EngineError::NotFound(booking_id));
        }
        info!("booking {booking_id} deleted by {requester_id}");
        Ok(())
    }
}

fn proactive_conflict() {
    metrics::counter!(crate::observability::BOOKING_CONFLICTS_TOTAL, "source" => "check")
        .increment(1);
}
