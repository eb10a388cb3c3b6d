use serde::{Deserialize, Serialize};

use crate::DomainResult;
use crate::ports::BoxFuture;
use crate::reviews::{Review, ReviewPatch};

/// Equality predicates over review fields. Set fields are combined with AND.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewFilter {
    pub review_id: Option<String>,
    pub tour_id: Option<String>,
    pub user_id: Option<String>,
}

impl ReviewFilter {
    pub fn by_id(review_id: impl Into<String>) -> Self {
        Self {
            review_id: Some(review_id.into()),
            ..Self::default()
        }
    }

    pub fn by_tour(tour_id: impl Into<String>) -> Self {
        Self {
            tour_id: Some(tour_id.into()),
            ..Self::default()
        }
    }

    pub fn by_tour_and_user(tour_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            review_id: None,
            tour_id: Some(tour_id.into()),
            user_id: Some(user_id.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.review_id.is_none() && self.tour_id.is_none() && self.user_id.is_none()
    }

    pub fn matches(&self, review: &Review) -> bool {
        self.review_id
            .as_ref()
            .is_none_or(|value| *value == review.review_id)
            && self
                .tour_id
                .as_ref()
                .is_none_or(|value| *value == review.tour_id)
            && self
                .user_id
                .as_ref()
                .is_none_or(|value| *value == review.user_id)
    }
}

/// Persistence for reviews. Implementations must enforce uniqueness of
/// `(tour_id, user_id)` inside `create` and report it as `DomainError::Conflict`.
///
/// Raw mutations here do not touch tour summaries; callers go through
/// `triggers::ReviewTriggers`.
pub trait ReviewRepository: Send + Sync {
    fn find(&self, filter: &ReviewFilter) -> BoxFuture<'_, DomainResult<Vec<Review>>>;

    fn find_one(&self, filter: &ReviewFilter) -> BoxFuture<'_, DomainResult<Option<Review>>>;

    fn create(&self, review: &Review) -> BoxFuture<'_, DomainResult<Review>>;

    fn update_one(
        &self,
        filter: &ReviewFilter,
        patch: &ReviewPatch,
        updated_at_ms: i64,
    ) -> BoxFuture<'_, DomainResult<()>>;

    fn delete_one(&self, filter: &ReviewFilter) -> BoxFuture<'_, DomainResult<()>>;
}
