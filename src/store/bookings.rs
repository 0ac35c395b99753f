use std::collections::HashSet;

use async_trait::async_trait;
use ulid::Ulid;

use crate::clock::now_ms;
use crate::limits::*;
use crate::model::*;

use super::{BookingStore, Store, StoreError};

#[async_trait]
impl BookingStore for Store {
    async fn insert(&self, new: NewBooking) -> Result<Booking, StoreError> {
        let _gate = self.compaction_gate.read().await;
        let st = self
            .get_spot(&new.spot_id)
            .ok_or(StoreError::NotFound(new.spot_id))?;
        let mut guard = st.write().await;
        if guard.removed {
            return Err(StoreError::NotFound(new.spot_id));
        }
        if guard.bookings.len() >= MAX_BOOKINGS_PER_SPOT {
            return Err(StoreError::LimitExceeded("too many bookings on spot"));
        }
        if let Some(existing) = guard.overlapping(&new.range).next() {
            return Err(StoreError::Overlap(existing.id));
        }

        let now = now_ms();
        let booking = Booking {
            id: Ulid::new(),
            spot_id: new.spot_id,
            renter_id: new.renter_id,
            range: new.range,
            created_at: now,
            updated_at: now,
        };
        let event = Event::BookingCreated {
            id: booking.id,
            spot_id: booking.spot_id,
            renter_id: booking.renter_id,
            range: booking.range,
            created_at: now,
            updated_at: now,
        };
        self.persist_and_apply(&mut guard, &event).await?;
        Ok(booking)
    }

    async fn find_by_id(&self, id: Ulid) -> Result<Option<Booking>, StoreError> {
        let Some(spot_id) = self.spot_for_booking(&id) else {
            return Ok(None);
        };
        let Some(st) = self.get_spot(&spot_id) else {
            return Ok(None);
        };
        let guard = st.read().await;
        Ok(guard.get_booking(id).cloned())
    }

    async fn find_by_spot(
        &self,
        spot_id: Ulid,
        exclude: Option<Ulid>,
    ) -> Result<Vec<Booking>, StoreError> {
        let Some(st) = self.get_spot(&spot_id) else {
            return Ok(vec![]);
        };
        let guard = st.read().await;
        Ok(guard
            .bookings
            .iter()
            .filter(|b| Some(b.id) != exclude)
            .cloned()
            .collect())
    }

    async fn find_by_renter(&self, renter_id: Ulid) -> Result<Vec<Booking>, StoreError> {
        let ids: Vec<Ulid> = self
            .renter_bookings
            .get(&renter_id)
            .map(|e| e.value().clone())
            .unwrap_or_default();

        // Group by spot so each spot lock is taken once.
        let mut spot_ids: Vec<Ulid> = ids.iter().filter_map(|id| self.spot_for_booking(id)).collect();
        spot_ids.sort();
        spot_ids.dedup();
        let wanted: HashSet<Ulid> = ids.into_iter().collect();

        let mut out = Vec::with_capacity(wanted.len());
        for spot_id in spot_ids {
            let Some(st) = self.get_spot(&spot_id) else {
                continue;
            };
            let guard = st.read().await;
            out.extend(
                guard
                    .bookings
                    .iter()
                    .filter(|b| b.renter_id == renter_id && wanted.contains(&b.id))
                    .cloned(),
            );
        }
        out.sort_by_key(|b| (b.range.start, b.id));
        Ok(out)
    }

    async fn update(&self, booking: Booking) -> Result<Booking, StoreError> {
        let _gate = self.compaction_gate.read().await;
        let spot_id = self
            .spot_for_booking(&booking.id)
            .ok_or(StoreError::NotFound(booking.id))?;
        if spot_id != booking.spot_id {
            return Err(StoreError::Invalid("booking cannot move to another spot"));
        }
        let st = self
            .get_spot(&spot_id)
            .ok_or(StoreError::NotFound(spot_id))?;
        let mut guard = st.write().await;
        let Some(current) = guard.get_booking(booking.id).cloned() else {
            return Err(StoreError::NotFound(booking.id));
        };
        if let Some(existing) = guard
            .overlapping(&booking.range)
            .find(|b| b.id != booking.id)
        {
            return Err(StoreError::Overlap(existing.id));
        }

        let updated_at = now_ms();
        let event = Event::BookingRescheduled {
            id: booking.id,
            spot_id,
            range: booking.range,
            updated_at,
        };
        self.persist_and_apply(&mut guard, &event).await?;
        Ok(Booking {
            range: booking.range,
            updated_at,
            ..current
        })
    }

    async fn delete(&self, id: Ulid) -> Result<bool, StoreError> {
        let _gate = self.compaction_gate.read().await;
        let Some(spot_id) = self.spot_for_booking(&id) else {
            return Ok(false);
        };
        let Some(st) = self.get_spot(&spot_id) else {
            return Ok(false);
        };
        let mut guard = st.write().await;
        if guard.get_booking(id).is_none() {
            return Ok(false);
        }

        let event = Event::BookingDeleted { id, spot_id };
        self.persist_and_apply(&mut guard, &event).await?;
        Ok(true)
    }
}
