//! Review mutations wrapped with tour summary maintenance.
//!
//! Every write that changes the review set of a tour goes through
//! [`ReviewTriggers`], which runs the write and then recomputes the owning
//! tour's summary. Update and delete address reviews by filter, so the
//! matching review is captured first: once the mutation lands the filter may
//! no longer find it, and its `tour_id` would be lost.
//!
//! The review write is the source of truth. A failed recompute after a
//! committed write is logged and reported as [`SummaryRefresh::Stale`], never
//! as an error of the mutation.

use std::sync::Arc;

use serde::Serialize;

use crate::DomainResult;
use crate::error::DomainError;
use crate::ports::reviews::{ReviewFilter, ReviewRepository};
use crate::ports::tours::TourRepository;
use crate::reviews::{Review, ReviewPatch};
use crate::summary::SummaryEngine;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SummaryRefresh {
    Refreshed,
    Stale { reason: String },
}

impl SummaryRefresh {
    pub fn is_stale(&self) -> bool {
        matches!(self, SummaryRefresh::Stale { .. })
    }
}

/// Outcome of a committed review mutation plus the state of the summary refresh.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Triggered<T> {
    pub value: T,
    pub summary: SummaryRefresh,
}

#[derive(Clone)]
pub struct ReviewTriggers {
    reviews: Arc<dyn ReviewRepository>,
    engine: SummaryEngine,
}

impl ReviewTriggers {
    pub fn new(reviews: Arc<dyn ReviewRepository>, tours: Arc<dyn TourRepository>) -> Self {
        let engine = SummaryEngine::new(reviews.clone(), tours);
        Self { reviews, engine }
    }

    pub fn engine(&self) -> &SummaryEngine {
        &self.engine
    }

    /// Persist, then recompute `review.tour_id`. No capture: the new review
    /// already names its tour.
    pub async fn create(&self, review: &Review) -> DomainResult<Triggered<Review>> {
        let created = self.reviews.create(review).await?;
        let summary = self.refresh(&created.tour_id, "create").await;
        Ok(Triggered {
            value: created,
            summary,
        })
    }

    /// Capture, update, recompute the captured tour. `Ok(None)` when nothing
    /// matches; no recompute is issued in that case.
    ///
    /// The write is pinned to the captured `review_id`, so a review inserted
    /// between capture and write is never the one changed.
    ///
    /// The returned review is the captured document with the patch applied.
    pub async fn update_one(
        &self,
        filter: &ReviewFilter,
        patch: &ReviewPatch,
        updated_at_ms: i64,
    ) -> DomainResult<Option<Triggered<Review>>> {
        let Some(mut captured) = self.capture(filter).await? else {
            return Ok(None);
        };
        self.reviews
            .update_one(&ReviewFilter::by_id(&captured.review_id), patch, updated_at_ms)
            .await?;
        let summary = self.refresh(&captured.tour_id, "update").await;
        captured.apply(patch, updated_at_ms);
        Ok(Some(Triggered {
            value: captured,
            summary,
        }))
    }

    /// Capture, delete, recompute the captured tour. Returns the removed review.
    pub async fn delete_one(&self, filter: &ReviewFilter) -> DomainResult<Option<Triggered<Review>>> {
        let Some(captured) = self.capture(filter).await? else {
            return Ok(None);
        };
        self.reviews
            .delete_one(&ReviewFilter::by_id(&captured.review_id))
            .await?;
        let summary = self.refresh(&captured.tour_id, "delete").await;
        Ok(Some(Triggered {
            value: captured,
            summary,
        }))
    }

    async fn capture(&self, filter: &ReviewFilter) -> DomainResult<Option<Review>> {
        if filter.is_empty() {
            return Err(DomainError::Validation(
                "review filter must constrain at least one field".into(),
            ));
        }
        let captured = self.reviews.find_one(filter).await?;
        if captured.is_none() {
            tracing::debug!(?filter, "no review matched filter; skipping mutation");
        }
        Ok(captured)
    }

    /// Runs the recompute on its own task so it completes even if the caller
    /// is dropped. The outcome is logged from inside the task.
    async fn refresh(&self, tour_id: &str, operation: &'static str) -> SummaryRefresh {
        let engine = self.engine.clone();
        let task_tour_id = tour_id.to_string();
        let task = tokio::spawn(async move {
            let result = engine.recompute(&task_tour_id).await;
            if let Err(err) = &result {
                tracing::warn!(
                    tour_id = %task_tour_id,
                    operation,
                    error = %err,
                    "tour summary recompute failed; summary left stale"
                );
            }
            result
        });

        match task.await {
            Ok(Ok(())) => SummaryRefresh::Refreshed,
            Ok(Err(err)) => SummaryRefresh::Stale {
                reason: err.to_string(),
            },
            Err(err) => {
                tracing::error!(
                    tour_id,
                    operation,
                    error = %err,
                    "tour summary recompute task aborted"
                );
                SummaryRefresh::Stale {
                    reason: format!("recompute task aborted: {err}"),
                }
            }
        }
    }
}
