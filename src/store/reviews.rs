use ulid::Ulid;

use crate::clock::now_ms;
use crate::limits::*;
use crate::model::*;

use super::catalog::check_text;
use super::{SpotDirectory, Store, StoreError, UserDirectory};

fn validate_review(text: &str, stars: i64) -> Result<u8, StoreError> {
    check_text(text, MAX_REVIEW_LEN, "review text is required", "review too long")?;
    match u8::try_from(stars) {
        Ok(s @ 1..=5) => Ok(s),
        _ => Err(StoreError::Invalid("stars must be an integer from 1 to 5")),
    }
}

impl Store {
    /// One review per user per spot.
    pub async fn post_review(&self, author_id: Ulid, new: NewReview) -> Result<Review, StoreError> {
        let stars = validate_review(&new.text, new.stars)?;

        let _gate = self.compaction_gate.read().await;
        let _catalog = self.catalog_lock.lock().await;
        if !self.users.contains_key(&author_id) {
            return Err(StoreError::NotFound(author_id));
        }
        if !self.spots.contains_key(&new.spot_id) {
            return Err(StoreError::NotFound(new.spot_id));
        }
        if self
            .reviews_on(&new.spot_id)
            .iter()
            .any(|r| r.author_id == author_id)
        {
            return Err(StoreError::AlreadyExists(format!(
                "review by {author_id} for spot {}",
                new.spot_id
            )));
        }
        if self.reviews.len() >= MAX_REVIEWS {
            return Err(StoreError::LimitExceeded("too many reviews"));
        }

        let now = now_ms();
        let review = Review {
            id: Ulid::new(),
            spot_id: new.spot_id,
            author_id,
            text: new.text,
            stars,
            created_at: now,
            updated_at: now,
        };
        let event = Event::ReviewPosted {
            review: review.clone(),
        };
        self.wal_append(&event).await?;
        self.apply_catalog_event(&event);
        Ok(review)
    }

    /// Author edit. Unset fields keep their current value.
    pub async fn edit_review(
        &self,
        author_id: Ulid,
        id: Ulid,
        text: Option<String>,
        stars: Option<i64>,
    ) -> Result<Review, StoreError> {
        if text.is_none() && stars.is_none() {
            return Err(StoreError::Invalid("nothing to update"));
        }

        let _gate = self.compaction_gate.read().await;
        let _catalog = self.catalog_lock.lock().await;
        let current = self.review(&id).ok_or(StoreError::NotFound(id))?;
        if current.author_id != author_id {
            return Err(StoreError::Forbidden("only the author can edit a review"));
        }
        let text = text.unwrap_or(current.text);
        let stars = validate_review(&text, stars.unwrap_or(i64::from(current.stars)))?;

        let updated_at = now_ms();
        let event = Event::ReviewEdited {
            id,
            text: text.clone(),
            stars,
            updated_at,
        };
        self.wal_append(&event).await?;
        self.apply_catalog_event(&event);
        Ok(Review {
            text,
            stars,
            updated_at,
            ..current
        })
    }

    pub async fn delete_review(&self, author_id: Ulid, id: Ulid) -> Result<(), StoreError> {
        let _gate = self.compaction_gate.read().await;
        let _catalog = self.catalog_lock.lock().await;
        let current = self.review(&id).ok_or(StoreError::NotFound(id))?;
        if current.author_id != author_id {
            return Err(StoreError::Forbidden("only the author can delete a review"));
        }

        let event = Event::ReviewDeleted { id };
        self.wal_append(&event).await?;
        self.apply_catalog_event(&event);
        Ok(())
    }

    pub fn review(&self, id: &Ulid) -> Option<Review> {
        self.reviews.get(id).map(|e| e.value().clone())
    }

    /// Reviews of a spot, oldest first.
    pub(super) fn reviews_on(&self, spot_id: &Ulid) -> Vec<Review> {
        let ids = self
            .spot_reviews
            .get(spot_id)
            .map(|e| e.value().clone())
            .unwrap_or_default();
        let mut out: Vec<Review> = ids.iter().filter_map(|id| self.review(id)).collect();
        out.sort_by_key(|r| r.id);
        out
    }

    pub fn review_stats(&self, spot_id: &Ulid) -> ReviewStats {
        ReviewStats::of(&self.reviews_on(spot_id))
    }

    /// The author's reviews, oldest first, each with the spot it is about.
    pub async fn reviews_by_author(&self, author_id: Ulid) -> Result<Vec<AuthorReview>, StoreError> {
        let mut mine: Vec<Review> = self
            .reviews
            .iter()
            .filter(|e| e.value().author_id == author_id)
            .map(|e| e.value().clone())
            .collect();
        mine.sort_by_key(|r| r.id);

        let mut out = Vec::with_capacity(mine.len());
        for review in mine {
            let spot = self.spot_snapshot(review.spot_id).await?;
            out.push(AuthorReview { review, spot });
        }
        Ok(out)
    }

    /// Reviews of a spot with their authors' names.
    pub async fn reviews_of_spot(&self, spot_id: Ulid) -> Result<Vec<SpotReview>, StoreError> {
        if !self.spots.contains_key(&spot_id) {
            return Err(StoreError::NotFound(spot_id));
        }
        let mut out = Vec::new();
        for review in self.reviews_on(&spot_id) {
            let author = self.renter_identity(review.author_id).await?;
            out.push(SpotReview { review, author });
        }
        Ok(out)
    }
}
