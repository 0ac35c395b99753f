use tokio::sync::oneshot;

use crate::model::*;

use super::{Store, StoreError, WalCommand};

impl Store {
    /// Rewrite the WAL with only the events needed to recreate current state:
    /// users, then spots, then each live booking with its latest range, then
    /// each review as last edited.
    pub async fn compact_wal(&self) -> Result<(), StoreError> {
        // Exclusive: no mutation can append between the snapshot and the swap.
        let _gate = self.compaction_gate.write().await;

        let mut users: Vec<User> = self.users.iter().map(|e| e.value().clone()).collect();
        users.sort_by_key(|u| u.id);
        let mut events: Vec<Event> = users
            .into_iter()
            .map(|u| Event::UserRegistered {
                id: u.id,
                username: u.username,
                first_name: u.first_name,
                last_name: u.last_name,
            })
            .collect();

        let mut states: Vec<_> = self
            .spots
            .iter()
            .map(|e| (*e.key(), e.value().clone()))
            .collect();
        states.sort_by_key(|(id, _)| *id);

        let mut booking_events = Vec::new();
        for (_, st) in &states {
            let guard = st.read().await;
            events.push(Event::SpotListed {
                spot: guard.spot.clone(),
            });
            for b in &guard.bookings {
                booking_events.push(Event::BookingCreated {
                    id: b.id,
                    spot_id: b.spot_id,
                    renter_id: b.renter_id,
                    range: b.range,
                    created_at: b.created_at,
                    updated_at: b.updated_at,
                });
            }
        }
        events.extend(booking_events);

        let mut reviews: Vec<Review> = self.reviews.iter().map(|e| e.value().clone()).collect();
        reviews.sort_by_key(|r| r.id);
        events.extend(reviews.into_iter().map(|review| Event::ReviewPosted { review }));

        let count = events.len();
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| StoreError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| StoreError::WalError(e.to_string()))?;
        tracing::info!("compacted WAL to {count} events");
        Ok(())
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
