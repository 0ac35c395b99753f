use std::collections::HashMap;

use ulid::Ulid;

use crate::model::*;

use super::{BookingManager, EngineError};

impl BookingManager {
    /// The user's own bookings ordered by start date, each with a snapshot
    /// of the booked spot.
    pub async fn list_for_user(&self, user_id: Ulid) -> Result<Vec<RenterBooking>, EngineError> {
        let bookings = self.bookings.find_by_renter(user_id).await?;

        let mut snapshots: HashMap<Ulid, Option<SpotSnapshot>> = HashMap::new();
        let mut out = Vec::with_capacity(bookings.len());
        for booking in bookings {
            let spot = match snapshots.get(&booking.spot_id) {
                Some(s) => s.clone(),
                None => {
                    let s = self.spots.spot_snapshot(booking.spot_id).await?;
                    snapshots.insert(booking.spot_id, s.clone());
                    s
                }
            };
            out.push(RenterBooking { booking, spot });
        }
        Ok(out)
    }

    /// Every booking of the spot. The owner sees renters and timestamps;
    /// anyone else only the taken date ranges.
    pub async fn list_for_spot(
        &self,
        spot_id: Ulid,
        requester_id: Ulid,
    ) -> Result<Vec<SpotBooking>, EngineError> {
        let owner_id = self
            .spots
            .spot_owner(spot_id)
            .await?
            .ok_or(EngineError::NotFound(spot_id))?;
        let bookings = self.bookings.find_by_spot(spot_id, None).await?;

        if owner_id != requester_id {
            return Ok(bookings
                .into_iter()
                .map(|b| SpotBooking::Public {
                    id: b.id,
                    spot_id: b.spot_id,
                    range: b.range,
                })
                .collect());
        }

        let mut renters: HashMap<Ulid, Option<RenterIdentity>> = HashMap::new();
        let mut out = Vec::with_capacity(bookings.len());
        for booking in bookings {
            let renter = match renters.get(&booking.renter_id) {
                Some(r) => r.clone(),
                None => {
                    let r = self.users.renter_identity(booking.renter_id).await?;
                    renters.insert(booking.renter_id, r.clone());
                    r
                }
            };
            out.push(SpotBooking::Owner { booking, renter });
        }
        Ok(out)
    }
}
