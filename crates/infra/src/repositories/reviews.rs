use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use surrealdb::{Surreal, engine::remote::ws::Client};
use tokio::sync::RwLock;
use tourbook_domain::DomainResult;
use tourbook_domain::error::DomainError;
use tourbook_domain::ports::BoxFuture;
use tourbook_domain::ports::reviews::{ReviewFilter, ReviewRepository};
use tourbook_domain::reviews::{Review, ReviewPatch};

use super::{parse_datetime_ms, to_rfc3339};
use crate::db::map_surreal_error;

#[derive(Default)]
struct InMemoryReviewState {
    reviews: HashMap<String, Review>,
    by_tour_user: HashMap<(String, String), String>,
}

impl InMemoryReviewState {
    fn matching(&self, filter: &ReviewFilter) -> Vec<Review> {
        let mut reviews = self
            .reviews
            .values()
            .filter(|review| filter.matches(review))
            .cloned()
            .collect::<Vec<_>>();
        sort_newest_first(&mut reviews);
        reviews
    }

    fn first_match_id(&self, filter: &ReviewFilter) -> Option<String> {
        self.matching(filter)
            .into_iter()
            .next()
            .map(|review| review.review_id)
    }
}

/// Process-local review store. The `(tour_id, user_id)` index is checked and
/// written under the same lock as the insert.
#[derive(Default)]
pub struct InMemoryReviewRepository {
    state: Arc<RwLock<InMemoryReviewState>>,
}

impl InMemoryReviewRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReviewRepository for InMemoryReviewRepository {
    fn find(&self, filter: &ReviewFilter) -> BoxFuture<'_, DomainResult<Vec<Review>>> {
        let filter = filter.clone();
        let state = self.state.clone();
        Box::pin(async move { Ok(state.read().await.matching(&filter)) })
    }

    fn find_one(&self, filter: &ReviewFilter) -> BoxFuture<'_, DomainResult<Option<Review>>> {
        let filter = filter.clone();
        let state = self.state.clone();
        Box::pin(async move { Ok(state.read().await.matching(&filter).into_iter().next()) })
    }

    fn create(&self, review: &Review) -> BoxFuture<'_, DomainResult<Review>> {
        let review = review.clone();
        let state = self.state.clone();
        Box::pin(async move {
            let mut state = state.write().await;
            let pair = (review.tour_id.clone(), review.user_id.clone());
            if state.reviews.contains_key(&review.review_id)
                || state.by_tour_user.contains_key(&pair)
            {
                return Err(DomainError::Conflict);
            }
            state.by_tour_user.insert(pair, review.review_id.clone());
            state
                .reviews
                .insert(review.review_id.clone(), review.clone());
            Ok(review)
        })
    }

    fn update_one(
        &self,
        filter: &ReviewFilter,
        patch: &ReviewPatch,
        updated_at_ms: i64,
    ) -> BoxFuture<'_, DomainResult<()>> {
        let filter = filter.clone();
        let patch = patch.clone();
        let state = self.state.clone();
        Box::pin(async move {
            let mut state = state.write().await;
            let Some(review_id) = state.first_match_id(&filter) else {
                return Ok(());
            };
            if let Some(review) = state.reviews.get_mut(&review_id) {
                review.apply(&patch, updated_at_ms);
            }
            Ok(())
        })
    }

    fn delete_one(&self, filter: &ReviewFilter) -> BoxFuture<'_, DomainResult<()>> {
        let filter = filter.clone();
        let state = self.state.clone();
        Box::pin(async move {
            let mut state = state.write().await;
            let Some(review_id) = state.first_match_id(&filter) else {
                return Ok(());
            };
            if let Some(review) = state.reviews.remove(&review_id) {
                state
                    .by_tour_user
                    .remove(&(review.tour_id, review.user_id));
            }
            Ok(())
        })
    }
}

fn sort_newest_first(reviews: &mut [Review]) {
    reviews.sort_by(|a, b| {
        b.created_at_ms
            .cmp(&a.created_at_ms)
            .then_with(|| b.review_id.cmp(&a.review_id))
    });
}

#[derive(Clone)]
pub struct SurrealReviewRepository {
    client: Arc<Surreal<Client>>,
}

impl SurrealReviewRepository {
    pub fn with_client(client: Arc<Surreal<Client>>) -> Self {
        Self { client }
    }

    fn build_payload(review: &Review) -> DomainResult<SurrealReviewCreateRow> {
        Ok(SurrealReviewCreateRow {
            review_id: review.review_id.clone(),
            tour_id: review.tour_id.clone(),
            user_id: review.user_id.clone(),
            username: review.username.clone(),
            text: review.text.clone(),
            rating: review.rating,
            created_at: to_rfc3339(review.created_at_ms)?,
            updated_at: to_rfc3339(review.updated_at_ms)?,
        })
    }

    fn map_row(row: SurrealReviewRow) -> DomainResult<Review> {
        Ok(Review {
            review_id: row.review_id,
            tour_id: row.tour_id,
            user_id: row.user_id,
            username: row.username,
            text: row.text,
            rating: row.rating,
            created_at_ms: parse_datetime_ms(&row.created_at)?,
            updated_at_ms: parse_datetime_ms(&row.updated_at)?,
        })
    }

    fn map_rows(rows: Vec<SurrealReviewRow>) -> DomainResult<Vec<Review>> {
        rows.into_iter().map(Self::map_row).collect()
    }

    /// `WHERE` clause for the set filter fields, bound as `$review_id`,
    /// `$tour_id` and `$user_id`.
    fn where_clause(filter: &ReviewFilter) -> String {
        let mut conditions = Vec::new();
        if filter.review_id.is_some() {
            conditions.push("review_id = $review_id");
        }
        if filter.tour_id.is_some() {
            conditions.push("tour_id = $tour_id");
        }
        if filter.user_id.is_some() {
            conditions.push("user_id = $user_id");
        }
        if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        }
    }

    fn select_statement(filter: &ReviewFilter, limit: Option<usize>) -> String {
        let limit = limit
            .map(|limit| format!(" LIMIT {limit}"))
            .unwrap_or_default();
        format!(
            "SELECT review_id, tour_id, user_id, username, text, rating, \
                    <string>created_at AS created_at, <string>updated_at AS updated_at \
             FROM review {} \
             ORDER BY created_at DESC, review_id DESC{limit}",
            Self::where_clause(filter)
        )
    }

    /// Binds a statement so that the first matching review id lands in `$target`.
    fn target_statement(filter: &ReviewFilter) -> String {
        format!(
            "LET $target = (SELECT VALUE review_id FROM review {} \
             ORDER BY created_at DESC, review_id DESC LIMIT 1)[0];",
            Self::where_clause(filter)
        )
    }

    async fn run_select(
        client: Arc<Surreal<Client>>,
        filter: ReviewFilter,
        limit: Option<usize>,
    ) -> DomainResult<Vec<Review>> {
        let mut query = client.query(Self::select_statement(&filter, limit));
        if let Some(review_id) = filter.review_id {
            query = query.bind(("review_id", review_id));
        }
        if let Some(tour_id) = filter.tour_id {
            query = query.bind(("tour_id", tour_id));
        }
        if let Some(user_id) = filter.user_id {
            query = query.bind(("user_id", user_id));
        }
        let mut response = query.await.map_err(map_surreal_error)?;
        let rows: Vec<SurrealReviewRow> = response.take(0).map_err(map_surreal_error)?;
        let mut reviews = Self::map_rows(rows)?;
        sort_newest_first(&mut reviews);
        Ok(reviews)
    }
}

#[derive(Debug, Serialize)]
struct SurrealReviewCreateRow {
    review_id: String,
    tour_id: String,
    user_id: String,
    username: String,
    text: String,
    rating: f64,
    created_at: String,
    updated_at: String,
}

#[derive(Debug, Deserialize)]
struct SurrealReviewRow {
    review_id: String,
    tour_id: String,
    user_id: String,
    username: String,
    text: String,
    rating: f64,
    created_at: String,
    updated_at: String,
}

impl ReviewRepository for SurrealReviewRepository {
    fn find(&self, filter: &ReviewFilter) -> BoxFuture<'_, DomainResult<Vec<Review>>> {
        let filter = filter.clone();
        let client = self.client.clone();
        Box::pin(Self::run_select(client, filter, None))
    }

    fn find_one(&self, filter: &ReviewFilter) -> BoxFuture<'_, DomainResult<Option<Review>>> {
        let filter = filter.clone();
        let client = self.client.clone();
        Box::pin(async move {
            let reviews = Self::run_select(client, filter, Some(1)).await?;
            Ok(reviews.into_iter().next())
        })
    }

    fn create(&self, review: &Review) -> BoxFuture<'_, DomainResult<Review>> {
        let payload = match Self::build_payload(review) {
            Ok(payload) => payload,
            Err(err) => return Box::pin(async move { Err(err) }),
        };
        let review_id = review.review_id.clone();
        let client = self.client.clone();
        Box::pin(async move {
            let response = client
                .query(
                    "CREATE type::thing('review', $review_id) SET \
                        review_id = $payload.review_id, \
                        tour_id = $payload.tour_id, \
                        user_id = $payload.user_id, \
                        username = $payload.username, \
                        text = $payload.text, \
                        rating = $payload.rating, \
                        created_at = <datetime>$payload.created_at, \
                        updated_at = <datetime>$payload.updated_at; \
                     SELECT review_id, tour_id, user_id, username, text, rating, \
                            <string>created_at AS created_at, <string>updated_at AS updated_at \
                     FROM review WHERE review_id = $review_id LIMIT 1",
                )
                .bind(("review_id", review_id))
                .bind(("payload", payload))
                .await
                .map_err(map_surreal_error)?;
            let mut response = response.check().map_err(map_surreal_error)?;
            let rows: Vec<SurrealReviewRow> = response.take(1).map_err(map_surreal_error)?;
            let mut reviews = Self::map_rows(rows)?;
            reviews
                .pop()
                .ok_or_else(|| DomainError::Unavailable("create returned no row".to_string()))
        })
    }

    fn update_one(
        &self,
        filter: &ReviewFilter,
        patch: &ReviewPatch,
        updated_at_ms: i64,
    ) -> BoxFuture<'_, DomainResult<()>> {
        let updated_at = match to_rfc3339(updated_at_ms) {
            Ok(updated_at) => updated_at,
            Err(err) => return Box::pin(async move { Err(err) }),
        };
        let filter = filter.clone();
        let patch = patch.clone();
        let client = self.client.clone();
        Box::pin(async move {
            let mut assignments = vec!["updated_at = <datetime>$updated_at"];
            if patch.text.is_some() {
                assignments.push("text = $text");
            }
            if patch.rating.is_some() {
                assignments.push("rating = $rating");
            }
            let statement = format!(
                "{} UPDATE review SET {} WHERE $target != NONE AND review_id = $target;",
                Self::target_statement(&filter),
                assignments.join(", ")
            );

            let mut query = client
                .query(statement)
                .bind(("updated_at", updated_at));
            if let Some(text) = patch.text {
                query = query.bind(("text", text));
            }
            if let Some(rating) = patch.rating {
                query = query.bind(("rating", rating));
            }
            if let Some(review_id) = filter.review_id {
                query = query.bind(("review_id", review_id));
            }
            if let Some(tour_id) = filter.tour_id {
                query = query.bind(("tour_id", tour_id));
            }
            if let Some(user_id) = filter.user_id {
                query = query.bind(("user_id", user_id));
            }
            query
                .await
                .map_err(map_surreal_error)?
                .check()
                .map_err(map_surreal_error)?;
            Ok(())
        })
    }

    fn delete_one(&self, filter: &ReviewFilter) -> BoxFuture<'_, DomainResult<()>> {
        let filter = filter.clone();
        let client = self.client.clone();
        Box::pin(async move {
            let statement = format!(
                "{} DELETE review WHERE $target != NONE AND review_id = $target;",
                Self::target_statement(&filter)
            );
            let mut query = client.query(statement);
            if let Some(review_id) = filter.review_id {
                query = query.bind(("review_id", review_id));
            }
            if let Some(tour_id) = filter.tour_id {
                query = query.bind(("tour_id", tour_id));
            }
            if let Some(user_id) = filter.user_id {
                query = query.bind(("user_id", user_id));
            }
            query
                .await
                .map_err(map_surreal_error)?
                .check()
                .map_err(map_surreal_error)?;
            Ok(())
        })
    }
}
