use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use surrealdb::{Surreal, engine::remote::ws::Client};
use tokio::sync::RwLock;
use tourbook_domain::DomainResult;
use tourbook_domain::error::DomainError;
use tourbook_domain::ports::BoxFuture;
use tourbook_domain::ports::tours::TourRepository;
use tourbook_domain::summary::TourSummary;
use tourbook_domain::tours::Tour;
use tourbook_domain::util::now_ms;

use super::{parse_datetime_ms, to_rfc3339};
use crate::db::map_surreal_error;

const TOUR_FIELDS: &str = "tour_id, name, price, ratings_average, ratings_quantity, \
    <string>created_at AS created_at, <string>updated_at AS updated_at";

#[derive(Default)]
pub struct InMemoryTourRepository {
    store: Arc<RwLock<HashMap<String, Tour>>>,
}

impl InMemoryTourRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TourRepository for InMemoryTourRepository {
    fn create(&self, tour: &Tour) -> BoxFuture<'_, DomainResult<Tour>> {
        let tour = tour.clone();
        let store = self.store.clone();
        Box::pin(async move {
            let mut items = store.write().await;
            if items.contains_key(&tour.tour_id) {
                return Err(DomainError::Conflict);
            }
            items.insert(tour.tour_id.clone(), tour.clone());
            Ok(tour)
        })
    }

    fn get(&self, tour_id: &str) -> BoxFuture<'_, DomainResult<Option<Tour>>> {
        let tour_id = tour_id.to_string();
        let store = self.store.clone();
        Box::pin(async move { Ok(store.read().await.get(&tour_id).cloned()) })
    }

    fn list(&self) -> BoxFuture<'_, DomainResult<Vec<Tour>>> {
        let store = self.store.clone();
        Box::pin(async move {
            let mut tours = store.read().await.values().cloned().collect::<Vec<_>>();
            tours.sort_by(|a, b| {
                b.created_at_ms
                    .cmp(&a.created_at_ms)
                    .then_with(|| b.tour_id.cmp(&a.tour_id))
            });
            Ok(tours)
        })
    }

    fn update_summary(
        &self,
        tour_id: &str,
        summary: &TourSummary,
    ) -> BoxFuture<'_, DomainResult<()>> {
        let tour_id = tour_id.to_string();
        let summary = *summary;
        let store = self.store.clone();
        Box::pin(async move {
            let mut items = store.write().await;
            let tour = items.get_mut(&tour_id).ok_or(DomainError::NotFound)?;
            tour.ratings_quantity = summary.ratings_quantity;
            tour.ratings_average = summary.ratings_average;
            tour.updated_at_ms = now_ms();
            Ok(())
        })
    }
}

#[derive(Clone)]
pub struct SurrealTourRepository {
    client: Arc<Surreal<Client>>,
}

impl SurrealTourRepository {
    pub fn with_client(client: Arc<Surreal<Client>>) -> Self {
        Self { client }
    }

    fn build_payload(tour: &Tour) -> DomainResult<SurrealTourCreateRow> {
        Ok(SurrealTourCreateRow {
            tour_id: tour.tour_id.clone(),
            name: tour.name.clone(),
            price: tour.price,
            ratings_average: tour.ratings_average,
            ratings_quantity: tour.ratings_quantity,
            created_at: to_rfc3339(tour.created_at_ms)?,
            updated_at: to_rfc3339(tour.updated_at_ms)?,
        })
    }

    fn map_row(row: SurrealTourRow) -> DomainResult<Tour> {
        Ok(Tour {
            tour_id: row.tour_id,
            name: row.name,
            price: row.price,
            ratings_average: row.ratings_average,
            ratings_quantity: row.ratings_quantity,
            created_at_ms: parse_datetime_ms(&row.created_at)?,
            updated_at_ms: parse_datetime_ms(&row.updated_at)?,
        })
    }

    fn map_rows(rows: Vec<SurrealTourRow>) -> DomainResult<Vec<Tour>> {
        rows.into_iter().map(Self::map_row).collect()
    }
}

#[derive(Debug, Serialize)]
struct SurrealTourCreateRow {
    tour_id: String,
    name: String,
    price: f64,
    ratings_average: f64,
    ratings_quantity: u64,
    created_at: String,
    updated_at: String,
}

#[derive(Debug, Deserialize)]
struct SurrealTourRow {
    tour_id: String,
    name: String,
    price: f64,
    ratings_average: f64,
    ratings_quantity: u64,
    created_at: String,
    updated_at: String,
}

#[derive(Debug, Deserialize)]
struct SurrealTourIdRow {
    #[allow(dead_code)]
    tour_id: String,
}

impl TourRepository for SurrealTourRepository {
    fn create(&self, tour: &Tour) -> BoxFuture<'_, DomainResult<Tour>> {
        let payload = match Self::build_payload(tour) {
            Ok(payload) => payload,
            Err(err) => return Box::pin(async move { Err(err) }),
        };
        let tour_id = tour.tour_id.clone();
        let client = self.client.clone();
        Box::pin(async move {
            let response = client
                .query(format!(
                    "CREATE type::thing('tour', $tour_id) SET \
                        tour_id = $payload.tour_id, \
                        name = $payload.name, \
                        price = $payload.price, \
                        ratings_average = $payload.ratings_average, \
                        ratings_quantity = $payload.ratings_quantity, \
                        created_at = <datetime>$payload.created_at, \
                        updated_at = <datetime>$payload.updated_at; \
                     SELECT {TOUR_FIELDS} FROM tour WHERE tour_id = $tour_id LIMIT 1"
                ))
                .bind(("tour_id", tour_id))
                .bind(("payload", payload))
                .await
                .map_err(map_surreal_error)?;
            let mut response = response.check().map_err(map_surreal_error)?;
            let rows: Vec<SurrealTourRow> = response.take(1).map_err(map_surreal_error)?;
            let mut tours = Self::map_rows(rows)?;
            tours
                .pop()
                .ok_or_else(|| DomainError::Unavailable("create returned no row".to_string()))
        })
    }

    fn get(&self, tour_id: &str) -> BoxFuture<'_, DomainResult<Option<Tour>>> {
        let tour_id = tour_id.to_string();
        let client = self.client.clone();
        Box::pin(async move {
            let mut response = client
                .query(format!(
                    "SELECT {TOUR_FIELDS} FROM tour WHERE tour_id = $tour_id LIMIT 1"
                ))
                .bind(("tour_id", tour_id))
                .await
                .map_err(map_surreal_error)?;
            let rows: Vec<SurrealTourRow> = response.take(0).map_err(map_surreal_error)?;
            Ok(Self::map_rows(rows)?.into_iter().next())
        })
    }

    fn list(&self) -> BoxFuture<'_, DomainResult<Vec<Tour>>> {
        let client = self.client.clone();
        Box::pin(async move {
            let mut response = client
                .query(format!(
                    "SELECT {TOUR_FIELDS} FROM tour ORDER BY created_at DESC, tour_id DESC"
                ))
                .await
                .map_err(map_surreal_error)?;
            let rows: Vec<SurrealTourRow> = response.take(0).map_err(map_surreal_error)?;
            Self::map_rows(rows)
        })
    }

    fn update_summary(
        &self,
        tour_id: &str,
        summary: &TourSummary,
    ) -> BoxFuture<'_, DomainResult<()>> {
        let updated_at = match to_rfc3339(now_ms()) {
            Ok(updated_at) => updated_at,
            Err(err) => return Box::pin(async move { Err(err) }),
        };
        let tour_id = tour_id.to_string();
        let summary = *summary;
        let client = self.client.clone();
        Box::pin(async move {
            let mut response = client
                .query(
                    "UPDATE tour SET \
                        ratings_quantity = $ratings_quantity, \
                        ratings_average = $ratings_average, \
                        updated_at = <datetime>$updated_at \
                     WHERE tour_id = $tour_id \
                     RETURN tour_id",
                )
                .bind(("tour_id", tour_id))
                .bind(("ratings_quantity", summary.ratings_quantity))
                .bind(("ratings_average", summary.ratings_average))
                .bind(("updated_at", updated_at))
                .await
                .map_err(map_surreal_error)?;
            let rows: Vec<SurrealTourIdRow> = response.take(0).map_err(map_surreal_error)?;
            if rows.is_empty() {
                return Err(DomainError::NotFound);
            }
            Ok(())
        })
    }
}
