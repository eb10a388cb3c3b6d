use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::DomainResult;
use crate::error::DomainError;
use crate::ports::tours::TourRepository;
use crate::summary::TourSummary;
use crate::util::{now_ms, uuid_v7_without_dashes};

const MAX_NAME_LENGTH: usize = 100;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Tour {
    pub tour_id: String,
    pub name: String,
    pub price: f64,
    pub ratings_average: f64,
    pub ratings_quantity: u64,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

impl Tour {
    pub fn summary(&self) -> TourSummary {
        TourSummary {
            ratings_quantity: self.ratings_quantity,
            ratings_average: self.ratings_average,
        }
    }
}

#[derive(Clone, Debug)]
pub struct TourCreate {
    pub name: String,
    pub price: f64,
}

/// Catalogue reads and admin creation. Summary fields are only written by
/// `summary::SummaryEngine`.
#[derive(Clone)]
pub struct TourService {
    repository: Arc<dyn TourRepository>,
}

impl TourService {
    pub fn new(repository: Arc<dyn TourRepository>) -> Self {
        Self { repository }
    }

    pub async fn create(&self, input: TourCreate) -> DomainResult<Tour> {
        let payload = validate_tour_create(&input)?;
        let now = now_ms();
        let empty = TourSummary::empty();
        let tour = Tour {
            tour_id: uuid_v7_without_dashes(),
            name: payload.name,
            price: payload.price,
            ratings_average: empty.ratings_average,
            ratings_quantity: empty.ratings_quantity,
            created_at_ms: now,
            updated_at_ms: now,
        };
        self.repository.create(&tour).await
    }

    pub async fn get(&self, tour_id: &str) -> DomainResult<Tour> {
        self.repository
            .get(tour_id)
            .await?
            .ok_or(DomainError::NotFound)
    }

    pub async fn list(&self) -> DomainResult<Vec<Tour>> {
        self.repository.list().await
    }
}

fn validate_tour_create(input: &TourCreate) -> Result<TourCreate, DomainError> {
    let name = input.name.trim().to_string();
    if name.is_empty() {
        return Err(DomainError::Validation("tour name is required".into()));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(DomainError::Validation(format!(
            "tour name exceeds max length of {MAX_NAME_LENGTH}"
        )));
    }
    if !input.price.is_finite() || input.price < 0.0 {
        return Err(DomainError::Validation(
            "price must be a non-negative number".into(),
        ));
    }
    Ok(TourCreate {
        name,
        price: input.price,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_name() {
        let input = TourCreate {
            name: " ".to_string(),
            price: 100.0,
        };
        assert!(validate_tour_create(&input).is_err());
    }

    #[test]
    fn rejects_negative_price() {
        let input = TourCreate {
            name: "The Forest Hiker".to_string(),
            price: -1.0,
        };
        assert!(validate_tour_create(&input).is_err());
    }
}
