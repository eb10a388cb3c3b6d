use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::DomainResult;
use crate::auth::Role;
use crate::error::DomainError;
use crate::identity::ActorIdentity;
use crate::ports::reviews::{ReviewFilter, ReviewRepository};
use crate::ports::tours::TourRepository;
use crate::triggers::{ReviewTriggers, Triggered};
use crate::util::{now_ms, uuid_v7_without_dashes};

pub const MIN_RATING: f64 = 1.0;
pub const MAX_RATING: f64 = 5.0;
const MAX_TEXT_LENGTH: usize = 2000;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Review {
    pub review_id: String,
    pub tour_id: String,
    pub user_id: String,
    pub username: String,
    pub text: String,
    pub rating: f64,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

impl Review {
    pub fn apply(&mut self, patch: &ReviewPatch, updated_at_ms: i64) {
        if let Some(text) = &patch.text {
            self.text = text.clone();
        }
        if let Some(rating) = patch.rating {
            self.rating = rating;
        }
        self.updated_at_ms = updated_at_ms;
    }
}

#[derive(Clone, Debug)]
pub struct ReviewCreate {
    pub tour_id: String,
    pub text: String,
    pub rating: f64,
}

/// Fields a review owner may change. The tour and author are fixed.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewPatch {
    pub text: Option<String>,
    pub rating: Option<f64>,
}

/// Review submission and moderation workflow.
///
/// All mutations are routed through [`ReviewTriggers`] so the owning tour's
/// summary follows every change.
#[derive(Clone)]
pub struct ReviewService {
    reviews: Arc<dyn ReviewRepository>,
    tours: Arc<dyn TourRepository>,
    triggers: ReviewTriggers,
}

impl ReviewService {
    pub fn new(reviews: Arc<dyn ReviewRepository>, tours: Arc<dyn TourRepository>) -> Self {
        let triggers = ReviewTriggers::new(reviews.clone(), tours.clone());
        Self {
            reviews,
            tours,
            triggers,
        }
    }

    pub async fn submit(
        &self,
        actor: ActorIdentity,
        token_role: &Role,
        input: ReviewCreate,
    ) -> DomainResult<Triggered<Review>> {
        if !token_role.can_review() {
            return Err(DomainError::Forbidden);
        }
        let payload = validate_review_create(&input)?;
        if self.tours.get(&payload.tour_id).await?.is_none() {
            return Err(DomainError::NotFound);
        }

        let now = now_ms();
        let review = Review {
            review_id: uuid_v7_without_dashes(),
            tour_id: payload.tour_id,
            user_id: actor.user_id,
            username: actor.username,
            text: payload.text,
            rating: payload.rating,
            created_at_ms: now,
            updated_at_ms: now,
        };
        let created = self.triggers.create(&review).await?;
        tracing::info!(
            review_id = %created.value.review_id,
            tour_id = %created.value.tour_id,
            user_id = %created.value.user_id,
            summary_stale = created.summary.is_stale(),
            "review submitted"
        );
        Ok(created)
    }

    pub async fn update(
        &self,
        actor: &ActorIdentity,
        token_role: &Role,
        review_id: &str,
        patch: ReviewPatch,
    ) -> DomainResult<Triggered<Review>> {
        let patch = validate_review_patch(&patch)?;
        self.authorize(actor, token_role, review_id).await?;
        self.triggers
            .update_one(&ReviewFilter::by_id(review_id), &patch, now_ms())
            .await?
            .ok_or(DomainError::NotFound)
    }

    pub async fn delete(
        &self,
        actor: &ActorIdentity,
        token_role: &Role,
        review_id: &str,
    ) -> DomainResult<Triggered<Review>> {
        self.authorize(actor, token_role, review_id).await?;
        let removed = self
            .triggers
            .delete_one(&ReviewFilter::by_id(review_id))
            .await?
            .ok_or(DomainError::NotFound)?;
        tracing::info!(
            review_id,
            tour_id = %removed.value.tour_id,
            summary_stale = removed.summary.is_stale(),
            "review deleted"
        );
        Ok(removed)
    }

    pub async fn get(&self, review_id: &str) -> DomainResult<Review> {
        self.reviews
            .find_one(&ReviewFilter::by_id(review_id))
            .await?
            .ok_or(DomainError::NotFound)
    }

    pub async fn list(&self, tour_id: Option<&str>) -> DomainResult<Vec<Review>> {
        let filter = match tour_id {
            Some(tour_id) => ReviewFilter::by_tour(tour_id),
            None => ReviewFilter::default(),
        };
        self.reviews.find(&filter).await
    }

    /// Manual resync of one tour's summary.
    pub async fn recompute(&self, tour_id: &str) -> DomainResult<()> {
        self.triggers.engine().recompute(tour_id).await
    }

    async fn authorize(
        &self,
        actor: &ActorIdentity,
        token_role: &Role,
        review_id: &str,
    ) -> DomainResult<()> {
        let existing = self.get(review_id).await?;
        if existing.user_id != actor.user_id && !token_role.is_admin() {
            return Err(DomainError::Forbidden);
        }
        Ok(())
    }
}

fn validate_rating(rating: f64) -> Result<f64, DomainError> {
    if !rating.is_finite() || !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(DomainError::Validation(format!(
            "rating must be between {MIN_RATING} and {MAX_RATING}"
        )));
    }
    Ok(rating)
}

fn validate_text(text: &str) -> Result<String, DomainError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(DomainError::Validation("review text is required".into()));
    }
    if text.chars().count() > MAX_TEXT_LENGTH {
        return Err(DomainError::Validation(format!(
            "review text exceeds max length of {MAX_TEXT_LENGTH}"
        )));
    }
    Ok(text.to_string())
}

fn validate_review_create(input: &ReviewCreate) -> Result<ReviewCreate, DomainError> {
    let tour_id = input.tour_id.trim().to_string();
    if tour_id.is_empty() {
        return Err(DomainError::Validation("tour_id is required".into()));
    }
    Ok(ReviewCreate {
        tour_id,
        text: validate_text(&input.text)?,
        rating: validate_rating(input.rating)?,
    })
}

fn validate_review_patch(patch: &ReviewPatch) -> Result<ReviewPatch, DomainError> {
    if patch.text.is_none() && patch.rating.is_none() {
        return Err(DomainError::Validation(
            "update must change text or rating".into(),
        ));
    }
    Ok(ReviewPatch {
        text: patch.text.as_deref().map(validate_text).transpose()?,
        rating: patch.rating.map(validate_rating).transpose()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_input(text: &str, rating: f64) -> ReviewCreate {
        ReviewCreate {
            tour_id: "tour-1".to_string(),
            text: text.to_string(),
            rating,
        }
    }

    #[test]
    fn text_is_required() {
        assert!(validate_review_create(&create_input("   ", 4.0)).is_err());
    }

    #[test]
    fn rating_bounds_are_inclusive() {
        assert!(validate_review_create(&create_input("ok", 1.0)).is_ok());
        assert!(validate_review_create(&create_input("ok", 5.0)).is_ok());
        assert!(validate_review_create(&create_input("ok", 0.99)).is_err());
        assert!(validate_review_create(&create_input("ok", 5.01)).is_err());
        assert!(validate_review_create(&create_input("ok", f64::NAN)).is_err());
    }

    #[test]
    fn fractional_ratings_are_accepted() {
        let payload = validate_review_create(&create_input("  lovely hike ", 3.5)).expect("valid");
        assert_eq!(payload.rating, 3.5);
        assert_eq!(payload.text, "lovely hike");
    }

    #[test]
    fn empty_patch_is_rejected() {
        assert!(validate_review_patch(&ReviewPatch::default()).is_err());
    }

    #[test]
    fn patch_fields_follow_create_rules() {
        let patch = ReviewPatch {
            text: None,
            rating: Some(6.0),
        };
        assert!(validate_review_patch(&patch).is_err());

        let patch = ReviewPatch {
            text: Some("".to_string()),
            rating: Some(4.0),
        };
        assert!(validate_review_patch(&patch).is_err());
    }

    #[test]
    fn apply_keeps_unpatched_fields() {
        let mut review = Review {
            review_id: "r1".to_string(),
            tour_id: "tour-1".to_string(),
            user_id: "u1".to_string(),
            username: "u1".to_string(),
            text: "before".to_string(),
            rating: 2.0,
            created_at_ms: 10,
            updated_at_ms: 10,
        };
        review.apply(
            &ReviewPatch {
                text: None,
                rating: Some(4.0),
            },
            20,
        );
        assert_eq!(review.text, "before");
        assert_eq!(review.rating, 4.0);
        assert_eq!(review.created_at_ms, 10);
        assert_eq!(review.updated_at_ms, 20);
    }
}
