use async_trait::async_trait;
use chrono::NaiveDate;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::{SpotDirectory, Store, StoreError, UserDirectory};

pub(super) fn check_text(value: &str, max: usize, empty: &'static str, long: &'static str) -> Result<(), StoreError> {
    if value.trim().is_empty() {
        return Err(StoreError::Invalid(empty));
    }
    if value.len() > max {
        return Err(StoreError::LimitExceeded(long));
    }
    Ok(())
}

fn validate_listing(listing: &NewSpot) -> Result<(), StoreError> {
    check_text(&listing.name, MAX_TEXT_LEN, "name is required", "name too long")?;
    check_text(&listing.address, MAX_TEXT_LEN, "address is required", "address too long")?;
    check_text(&listing.city, MAX_TEXT_LEN, "city is required", "city too long")?;
    check_text(&listing.state, MAX_TEXT_LEN, "state is required", "state too long")?;
    check_text(&listing.country, MAX_TEXT_LEN, "country is required", "country too long")?;
    if !(-90.0..=90.0).contains(&listing.lat) {
        return Err(StoreError::Invalid("latitude must be within -90 and 90"));
    }
    if !(-180.0..=180.0).contains(&listing.lng) {
        return Err(StoreError::Invalid("longitude must be within -180 and 180"));
    }
    if !listing.price.is_finite() || listing.price <= 0.0 {
        return Err(StoreError::Invalid("price per day must be a positive number"));
    }
    if let Some(url) = &listing.preview_image
        && url.len() > MAX_URL_LEN
    {
        return Err(StoreError::LimitExceeded("preview image url too long"));
    }
    Ok(())
}

fn spot_from_listing(id: Ulid, owner_id: Ulid, listing: NewSpot) -> Spot {
    Spot {
        id,
        owner_id,
        name: listing.name,
        address: listing.address,
        city: listing.city,
        state: listing.state,
        country: listing.country,
        lat: listing.lat,
        lng: listing.lng,
        price: listing.price,
        preview_image: listing.preview_image,
    }
}

impl Store {
    /// Register a login name. Usernames are unique.
    pub async fn register_user(
        &self,
        username: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<User, StoreError> {
        check_text(username, MAX_NAME_LEN, "username is required", "username too long")?;
        check_text(first_name, MAX_NAME_LEN, "first name is required", "first name too long")?;
        check_text(last_name, MAX_NAME_LEN, "last name is required", "last name too long")?;

        let _gate = self.compaction_gate.read().await;
        let _catalog = self.catalog_lock.lock().await;
        if self.usernames.contains_key(username) {
            return Err(StoreError::AlreadyExists(format!("username {username}")));
        }
        if self.users.len() >= MAX_USERS {
            return Err(StoreError::LimitExceeded("too many users"));
        }

        let id = Ulid::new();
        let event = Event::UserRegistered {
            id,
            username: username.to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
        };
        self.wal_append(&event).await?;
        self.apply_catalog_event(&event);
        tracing::info!("registered user {username} as {id}");
        Ok(User {
            id,
            username: username.to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
        })
    }

    /// List a new spot owned by `owner_id`.
    pub async fn list_spot(&self, owner_id: Ulid, listing: NewSpot) -> Result<Spot, StoreError> {
        validate_listing(&listing)?;

        let _gate = self.compaction_gate.read().await;
        let _catalog = self.catalog_lock.lock().await;
        if !self.users.contains_key(&owner_id) {
            return Err(StoreError::NotFound(owner_id));
        }
        if self.spots.len() >= MAX_SPOTS {
            return Err(StoreError::LimitExceeded("too many spots"));
        }

        let spot = spot_from_listing(Ulid::new(), owner_id, listing);
        let event = Event::SpotListed { spot: spot.clone() };
        self.wal_append(&event).await?;
        self.apply_catalog_event(&event);
        tracing::info!("owner {owner_id} listed spot {}", spot.id);
        Ok(spot)
    }

    /// Owner edit of a listing. The edited listing passes the same checks as
    /// a new one.
    pub async fn update_spot(
        &self,
        requester: Ulid,
        spot_id: Ulid,
        patch: SpotPatch,
    ) -> Result<Spot, StoreError> {
        if patch.is_empty() {
            return Err(StoreError::Invalid("nothing to update"));
        }

        let _gate = self.compaction_gate.read().await;
        let _catalog = self.catalog_lock.lock().await;
        let st = self.get_spot(&spot_id).ok_or(StoreError::NotFound(spot_id))?;
        let mut guard = st.write().await;
        if guard.spot.owner_id != requester {
            return Err(StoreError::Forbidden("only the owner can edit a spot"));
        }
        let listing = patch.apply_to(&guard.spot);
        validate_listing(&listing)?;

        let spot = spot_from_listing(spot_id, requester, listing);
        let event = Event::SpotUpdated { spot: spot.clone() };
        self.persist_and_apply(&mut guard, &event).await?;
        tracing::info!("owner {requester} edited spot {spot_id}");
        Ok(spot)
    }

    /// Owner removal of a listing, along with its reviews and its past
    /// bookings. Refused while any booking's checkout day is today or later.
    pub async fn delete_spot(
        &self,
        requester: Ulid,
        spot_id: Ulid,
        today: NaiveDate,
    ) -> Result<(), StoreError> {
        let _gate = self.compaction_gate.read().await;
        let _catalog = self.catalog_lock.lock().await;
        let st = self.get_spot(&spot_id).ok_or(StoreError::NotFound(spot_id))?;
        let mut guard = st.write().await;
        if guard.spot.owner_id != requester {
            return Err(StoreError::Forbidden("only the owner can delete a spot"));
        }
        if guard.bookings.iter().any(|b| b.range.end >= today) {
            return Err(StoreError::InUse("spot has current or upcoming bookings"));
        }

        let cascaded = guard.bookings.len();
        let event = Event::SpotDeleted { spot_id };
        self.persist_and_apply(&mut guard, &event).await?;
        tracing::info!("owner {requester} deleted spot {spot_id} with {cascaded} past bookings");
        Ok(())
    }

    /// Every listed spot, oldest first.
    pub async fn spots(&self) -> Vec<Spot> {
        let states: Vec<_> = self.spots.iter().map(|e| e.value().clone()).collect();
        let mut out = Vec::with_capacity(states.len());
        for st in states {
            out.push(st.read().await.spot.clone());
        }
        out.sort_by_key(|s| s.id);
        out
    }

    pub async fn spots_of_owner(&self, owner_id: Ulid) -> Vec<Spot> {
        let mut out = self.spots().await;
        out.retain(|s| s.owner_id == owner_id);
        out
    }

    /// One spot with its owner's name and review summary.
    pub async fn spot_detail(&self, spot_id: Ulid) -> Result<SpotDetail, StoreError> {
        let st = self.get_spot(&spot_id).ok_or(StoreError::NotFound(spot_id))?;
        let spot = st.read().await.spot.clone();
        let owner = self.renter_identity(spot.owner_id).await?;
        Ok(SpotDetail {
            owner,
            reviews: self.review_stats(&spot_id),
            spot,
        })
    }

    pub fn user(&self, id: &Ulid) -> Option<User> {
        self.users.get(id).map(|e| e.value().clone())
    }
}

#[async_trait]
impl SpotDirectory for Store {
    async fn spot_owner(&self, spot_id: Ulid) -> Result<Option<Ulid>, StoreError> {
        let Some(st) = self.get_spot(&spot_id) else {
            return Ok(None);
        };
        let guard = st.read().await;
        Ok(Some(guard.spot.owner_id))
    }

    async fn spot_snapshot(&self, spot_id: Ulid) -> Result<Option<SpotSnapshot>, StoreError> {
        let Some(st) = self.get_spot(&spot_id) else {
            return Ok(None);
        };
        let guard = st.read().await;
        Ok(Some(guard.spot.snapshot()))
    }
}

#[async_trait]
impl UserDirectory for Store {
    async fn renter_identity(&self, user_id: Ulid) -> Result<Option<RenterIdentity>, StoreError> {
        Ok(self.user(&user_id).map(|u| RenterIdentity {
            id: u.id,
            first_name: u.first_name,
            last_name: u.last_name,
        }))
    }

    async fn user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let Some(id) = self.usernames.get(username).map(|e| *e.value()) else {
            return Ok(None);
        };
        Ok(self.user(&id))
    }
}
