mod bookings;
mod catalog;
mod compaction;
mod error;
mod reviews;

pub use error::StoreError;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, Mutex, RwLock};
use ulid::Ulid;

use crate::model::*;
use crate::wal::Wal;

pub type SharedSpotState = Arc<RwLock<SpotState>>;

// ── Collaborator seams ───────────────────────────────────────────

/// Durable booking records. Every call is atomic on its own; `insert` and
/// `update` additionally refuse to store a range overlapping another booking
/// of the same spot (`StoreError::Overlap`).
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Assign an id and timestamps, then persist.
    async fn insert(&self, booking: NewBooking) -> Result<Booking, StoreError>;
    async fn find_by_id(&self, id: Ulid) -> Result<Option<Booking>, StoreError>;
    /// All bookings of a spot ordered by start date, minus `exclude`.
    async fn find_by_spot(
        &self,
        spot_id: Ulid,
        exclude: Option<Ulid>,
    ) -> Result<Vec<Booking>, StoreError>;
    async fn find_by_renter(&self, renter_id: Ulid) -> Result<Vec<Booking>, StoreError>;
    /// Overwrite the stored range and refresh `updated_at`.
    async fn update(&self, booking: Booking) -> Result<Booking, StoreError>;
    /// `Ok(false)` if the booking did not exist.
    async fn delete(&self, id: Ulid) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait SpotDirectory: Send + Sync {
    async fn spot_owner(&self, spot_id: Ulid) -> Result<Option<Ulid>, StoreError>;
    async fn spot_snapshot(&self, spot_id: Ulid) -> Result<Option<SpotSnapshot>, StoreError>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn renter_identity(&self, user_id: Ulid) -> Result<Option<RenterIdentity>, StoreError>;
    async fn user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;
}

// ── Group-commit WAL channel ─────────────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends.
/// 4. Single flush_sync for the whole batch.
/// 5. Respond to all senders with the batch result.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];
                let mut deferred = None;

                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            deferred = Some(other);
                            break;
                        }
                        Err(_) => break,
                    }
                }

                metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE)
                    .record(batch.len() as f64);
                let flush_start = std::time::Instant::now();
                let result = flush_batch(&mut wal, &batch);
                metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
                    .record(flush_start.elapsed().as_secs_f64());
                respond_batch(batch, &result);

                if let Some(other) = deferred {
                    handle_non_append(&mut wal, other);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn flush_batch(wal: &mut Wal, batch: &[(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    let mut append_err = None;
    for (event, _) in batch {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Flush even after an append error so half-buffered bytes don't leak
    // into the next batch.
    let flush_err = wal.flush_sync().err();
    match (append_err, flush_err) {
        (Some(e), _) | (None, Some(e)) => Err(e),
        (None, None) => Ok(()),
    }
}

fn respond_batch(batch: Vec<(Event, oneshot::Sender<io::Result<()>>)>, result: &io::Result<()>) {
    for (_, tx) in batch {
        let r = match result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!("appends are batched by the caller"),
    }
}

// ── Store ────────────────────────────────────────────────────────

/// WAL-backed in-memory marketplace state: users, spots, bookings and reviews.
///
/// Implements [`BookingStore`], [`SpotDirectory`] and [`UserDirectory`].
pub struct Store {
    pub(super) spots: DashMap<Ulid, SharedSpotState>,
    pub(super) users: DashMap<Ulid, User>,
    pub(super) usernames: DashMap<String, Ulid>,
    /// Reverse lookup: booking id → spot id.
    pub(super) booking_to_spot: DashMap<Ulid, Ulid>,
    /// Renter → their booking ids.
    pub(super) renter_bookings: DashMap<Ulid, Vec<Ulid>>,
    pub(super) reviews: DashMap<Ulid, Review>,
    /// Spot → its review ids.
    pub(super) spot_reviews: DashMap<Ulid, Vec<Ulid>>,
    /// Serializes user, spot and review changes.
    pub(super) catalog_lock: Mutex<()>,
    /// Mutations hold this shared; compaction holds it exclusively so the
    /// snapshot it writes can't miss an in-flight append.
    pub(super) compaction_gate: RwLock<()>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
}

impl Store {
    /// Replay the WAL at `wal_path` and start the group-commit writer.
    /// Must be called from within a tokio runtime.
    pub fn open(wal_path: PathBuf) -> io::Result<Self> {
        let events = Wal::recover(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let store = Self {
            spots: DashMap::new(),
            users: DashMap::new(),
            usernames: DashMap::new(),
            booking_to_spot: DashMap::new(),
            renter_bookings: DashMap::new(),
            reviews: DashMap::new(),
            spot_reviews: DashMap::new(),
            catalog_lock: Mutex::new(()),
            compaction_gate: RwLock::new(()),
            wal_tx,
        };

        // Sole owner of every Arc during replay, so try_write never contends.
        // blocking_write would panic when opened from async context.
        for event in &events {
            match event {
                Event::UserRegistered { .. }
                | Event::SpotListed { .. }
                | Event::ReviewPosted { .. }
                | Event::ReviewEdited { .. }
                | Event::ReviewDeleted { .. } => {
                    store.apply_catalog_event(event);
                }
                Event::BookingCreated { spot_id, .. }
                | Event::BookingRescheduled { spot_id, .. }
                | Event::BookingDeleted { spot_id, .. }
                | Event::SpotDeleted { spot_id }
                | Event::SpotUpdated {
                    spot: Spot { id: spot_id, .. },
                } => {
                    let Some(st) = store.get_spot(spot_id) else {
                        tracing::warn!("replay: event for unknown spot {spot_id}");
                        continue;
                    };
                    let Ok(mut guard) = st.try_write() else {
                        return Err(io::Error::other("replay: spot state contended"));
                    };
                    store.apply_spot_event(&mut guard, event);
                }
            }
        }

        tracing::info!(
            "store replayed {} events: {} users, {} spots, {} bookings, {} reviews",
            events.len(),
            store.users.len(),
            store.spots.len(),
            store.booking_to_spot.len(),
            store.reviews.len()
        );
        Ok(store)
    }

    pub fn get_spot(&self, id: &Ulid) -> Option<SharedSpotState> {
        self.spots.get(id).map(|e| e.value().clone())
    }

    pub fn spot_for_booking(&self, booking_id: &Ulid) -> Option<Ulid> {
        self.booking_to_spot.get(booking_id).map(|e| *e.value())
    }

    pub fn booking_count(&self) -> usize {
        self.booking_to_spot.len()
    }

    /// Write event to WAL via the background group-commit writer.
    pub(super) async fn wal_append(&self, event: &Event) -> Result<(), StoreError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| StoreError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| StoreError::WalError(e.to_string()))
    }

    /// WAL-append, then apply to the locked spot.
    pub(super) async fn persist_and_apply(
        &self,
        st: &mut SpotState,
        event: &Event,
    ) -> Result<(), StoreError> {
        self.wal_append(event).await?;
        self.apply_spot_event(st, event);
        Ok(())
    }

    /// Apply a booking or spot event to its spot and the indexes.
    /// Caller holds the spot's write lock.
    pub(super) fn apply_spot_event(&self, st: &mut SpotState, event: &Event) {
        match event {
            Event::BookingCreated {
                id,
                spot_id,
                renter_id,
                range,
                created_at,
                updated_at,
            } => {
                st.insert_booking(Booking {
                    id: *id,
                    spot_id: *spot_id,
                    renter_id: *renter_id,
                    range: *range,
                    created_at: *created_at,
                    updated_at: *updated_at,
                });
                self.booking_to_spot.insert(*id, *spot_id);
                self.renter_bookings.entry(*renter_id).or_default().push(*id);
            }
            Event::BookingRescheduled {
                id,
                range,
                updated_at,
                ..
            } => {
                if let Some(mut booking) = st.remove_booking(*id) {
                    booking.range = *range;
                    booking.updated_at = *updated_at;
                    st.insert_booking(booking);
                }
            }
            Event::BookingDeleted { id, .. } => {
                if let Some(booking) = st.remove_booking(*id) {
                    self.booking_to_spot.remove(id);
                    if let Some(mut ids) = self.renter_bookings.get_mut(&booking.renter_id) {
                        ids.retain(|b| b != id);
                    }
                }
            }
            Event::SpotUpdated { spot } => {
                st.spot = spot.clone();
            }
            Event::SpotDeleted { spot_id } => {
                for booking in st.bookings.drain(..) {
                    self.booking_to_spot.remove(&booking.id);
                    if let Some(mut ids) = self.renter_bookings.get_mut(&booking.renter_id) {
                        ids.retain(|b| *b != booking.id);
                    }
                }
                if let Some((_, ids)) = self.spot_reviews.remove(spot_id) {
                    for id in ids {
                        self.reviews.remove(&id);
                    }
                }
                st.removed = true;
                self.spots.remove(spot_id);
            }
            _ => {}
        }
    }

    /// Apply a user, spot listing or review event. Caller holds
    /// `catalog_lock` (or is replaying).
    pub(super) fn apply_catalog_event(&self, event: &Event) {
        match event {
            Event::UserRegistered {
                id,
                username,
                first_name,
                last_name,
            } => {
                self.users.insert(
                    *id,
                    User {
                        id: *id,
                        username: username.clone(),
                        first_name: first_name.clone(),
                        last_name: last_name.clone(),
                    },
                );
                self.usernames.insert(username.clone(), *id);
            }
            Event::SpotListed { spot } => {
                self.spots
                    .insert(spot.id, Arc::new(RwLock::new(SpotState::new(spot.clone()))));
            }
            Event::ReviewPosted { review } => {
                self.spot_reviews
                    .entry(review.spot_id)
                    .or_default()
                    .push(review.id);
                self.reviews.insert(review.id, review.clone());
            }
            Event::ReviewEdited {
                id,
                text,
                stars,
                updated_at,
            } => {
                if let Some(mut review) = self.reviews.get_mut(id) {
                    review.text = text.clone();
                    review.stars = *stars;
                    review.updated_at = *updated_at;
                }
            }
            Event::ReviewDeleted { id } => {
                if let Some((_, review)) = self.reviews.remove(id)
                    && let Some(mut ids) = self.spot_reviews.get_mut(&review.spot_id)
                {
                    ids.retain(|r| r != id);
                }
            }
            _ => {}
        }
    }
}
