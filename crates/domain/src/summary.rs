use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::DomainResult;
use crate::ports::reviews::{ReviewFilter, ReviewRepository};
use crate::ports::tours::TourRepository;

/// Average reported for a tour without reviews. Product default, not a sentinel.
pub const DEFAULT_RATINGS_AVERAGE: f64 = 4.5;

/// Denormalized rating aggregate stored on a tour.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TourSummary {
    pub ratings_quantity: u64,
    pub ratings_average: f64,
}

impl TourSummary {
    pub const fn empty() -> Self {
        Self {
            ratings_quantity: 0,
            ratings_average: DEFAULT_RATINGS_AVERAGE,
        }
    }

    /// Unweighted mean over every rating, or the empty summary.
    pub fn from_ratings<I>(ratings: I) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        let (count, total) = ratings
            .into_iter()
            .fold((0_u64, 0.0_f64), |(count, total), rating| {
                (count + 1, total + rating)
            });
        if count == 0 {
            return Self::empty();
        }
        Self {
            ratings_quantity: count,
            ratings_average: total / count as f64,
        }
    }
}

impl Default for TourSummary {
    fn default() -> Self {
        Self::empty()
    }
}

/// Re-derives a tour's summary from its current review set.
///
/// Every call is a full read-aggregate-write. There is no locking around the
/// sequence; concurrent recomputes for one tour converge because the last one
/// to finish reads the settled review set.
#[derive(Clone)]
pub struct SummaryEngine {
    reviews: Arc<dyn ReviewRepository>,
    tours: Arc<dyn TourRepository>,
}

impl SummaryEngine {
    pub fn new(reviews: Arc<dyn ReviewRepository>, tours: Arc<dyn TourRepository>) -> Self {
        Self { reviews, tours }
    }

    pub async fn recompute(&self, tour_id: &str) -> DomainResult<()> {
        let reviews = self.reviews.find(&ReviewFilter::by_tour(tour_id)).await?;
        let summary = TourSummary::from_ratings(reviews.iter().map(|review| review.rating));
        self.tours.update_summary(tour_id, &summary).await?;
        tracing::debug!(
            tour_id,
            ratings_quantity = summary.ratings_quantity,
            ratings_average = summary.ratings_average,
            "tour summary recomputed"
        );
        Ok(())
    }
}
