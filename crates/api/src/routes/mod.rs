use axum::extract::{Extension, Path, Query, State};
use axum::{
    Json, Router,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tourbook_domain::{
    auth::Role,
    identity::ActorIdentity,
    reviews::{Review, ReviewCreate, ReviewPatch},
    tours::{Tour, TourCreate},
    triggers::{SummaryRefresh, Triggered},
};
use validator::Validate;

use crate::middleware::AuthContext;
use crate::{error::ApiError, middleware as app_middleware, observability, state::AppState, validation};

pub fn router(state: AppState) -> Router {
    let admin = Router::new()
        .route(
            "/v1/tours/:tour_id/summary/recompute",
            post(recompute_tour_summary),
        )
        .route_layer(middleware::from_fn(app_middleware::require_auth_middleware));

    let mut app = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/v1/tours", get(list_tours).post(create_tour))
        .route("/v1/tours/:tour_id", get(get_tour))
        .route(
            "/v1/tours/:tour_id/reviews",
            get(list_tour_reviews).post(create_tour_review),
        )
        .route("/v1/reviews", get(list_reviews))
        .route(
            "/v1/reviews/:review_id",
            get(get_review).patch(update_review).delete(delete_review),
        )
        .merge(admin)
        .route_layer(middleware::from_fn(app_middleware::metrics_layer))
        .layer(app_middleware::timeout_layer())
        .layer(app_middleware::trace_layer())
        .layer(app_middleware::set_request_id_layer())
        .layer(app_middleware::propagate_request_id_layer())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            app_middleware::auth_middleware,
        ))
        .layer(middleware::from_fn(
            app_middleware::correlation_id_middleware,
        ));

    if !state.config.app_env.eq_ignore_ascii_case("test") {
        app = app.layer(app_middleware::rate_limit_layer());
    }

    app.with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    environment: String,
    store: &'static str,
}

async fn health(State(state): State<AppState>) -> Response {
    let store = state.store_health.backend();
    let (status_code, status) = match state.store_health.health_check().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(err) => {
            tracing::warn!(error = %err, store, "store health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "degraded")
        }
    };
    let body = HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        environment: state.config.app_env.clone(),
        store,
    };
    (status_code, Json(body)).into_response()
}

async fn metrics() -> Result<String, ApiError> {
    observability::render_metrics().ok_or(ApiError::NotFound)
}

#[derive(Debug, Deserialize, Validate)]
struct CreateTourRequest {
    #[validate(length(min = 1, max = 100))]
    name: String,
    #[validate(range(min = 0.0))]
    price: f64,
}

async fn list_tours(State(state): State<AppState>) -> Result<Json<Vec<Tour>>, ApiError> {
    Ok(Json(state.tour_service().list().await?))
}

async fn get_tour(
    State(state): State<AppState>,
    Path(tour_id): Path<String>,
) -> Result<Json<Tour>, ApiError> {
    Ok(Json(state.tour_service().get(&tour_id).await?))
}

async fn create_tour(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<CreateTourRequest>,
) -> Result<(StatusCode, Json<Tour>), ApiError> {
    actor_identity(&auth)?;
    if !auth.role.can_manage_tours() {
        return Err(ApiError::Forbidden);
    }
    validation::validate(&payload)?;
    let tour = state
        .tour_service()
        .create(TourCreate {
            name: payload.name,
            price: payload.price,
        })
        .await?;
    tracing::info!(tour_id = %tour.tour_id, "tour created");
    Ok((StatusCode::CREATED, Json(tour)))
}

#[derive(Debug, Deserialize, Validate)]
struct CreateReviewRequest {
    #[validate(length(min = 1, max = 2000))]
    text: String,
    #[validate(range(min = 1.0, max = 5.0))]
    rating: f64,
}

#[derive(Debug, Deserialize, Validate)]
struct UpdateReviewRequest {
    #[validate(length(min = 1, max = 2000))]
    text: Option<String>,
    #[validate(range(min = 1.0, max = 5.0))]
    rating: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ListReviewsQuery {
    tour_id: Option<String>,
}

/// A committed review mutation. `summary.status` is `stale` when the tour
/// summary could not be refreshed; the review change itself stands.
#[derive(Serialize)]
struct ReviewMutationResponse {
    review: Review,
    summary: SummaryRefresh,
}

impl ReviewMutationResponse {
    fn from_triggered(operation: &'static str, triggered: Triggered<Review>) -> Self {
        observability::register_summary_refresh(operation, &triggered.summary);
        Self {
            review: triggered.value,
            summary: triggered.summary,
        }
    }
}

async fn list_tour_reviews(
    State(state): State<AppState>,
    Path(tour_id): Path<String>,
) -> Result<Json<Vec<Review>>, ApiError> {
    state.tour_service().get(&tour_id).await?;
    Ok(Json(state.review_service().list(Some(&tour_id)).await?))
}

async fn create_tour_review(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(tour_id): Path<String>,
    Json(payload): Json<CreateReviewRequest>,
) -> Result<(StatusCode, Json<ReviewMutationResponse>), ApiError> {
    let actor = actor_identity(&auth)?;
    validation::validate(&payload)?;
    let created = state
        .review_service()
        .submit(
            actor,
            &auth.role,
            ReviewCreate {
                tour_id,
                text: payload.text,
                rating: payload.rating,
            },
        )
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ReviewMutationResponse::from_triggered("create", created)),
    ))
}

async fn list_reviews(
    State(state): State<AppState>,
    Query(query): Query<ListReviewsQuery>,
) -> Result<Json<Vec<Review>>, ApiError> {
    let reviews = state
        .review_service()
        .list(query.tour_id.as_deref())
        .await?;
    Ok(Json(reviews))
}

async fn get_review(
    State(state): State<AppState>,
    Path(review_id): Path<String>,
) -> Result<Json<Review>, ApiError> {
    Ok(Json(state.review_service().get(&review_id).await?))
}

async fn update_review(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(review_id): Path<String>,
    Json(payload): Json<UpdateReviewRequest>,
) -> Result<Json<ReviewMutationResponse>, ApiError> {
    let actor = actor_identity(&auth)?;
    validation::validate(&payload)?;
    let updated = state
        .review_service()
        .update(
            &actor,
            &auth.role,
            &review_id,
            ReviewPatch {
                text: payload.text,
                rating: payload.rating,
            },
        )
        .await?;
    Ok(Json(ReviewMutationResponse::from_triggered(
        "update", updated,
    )))
}

async fn delete_review(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(review_id): Path<String>,
) -> Result<Json<ReviewMutationResponse>, ApiError> {
    let actor = actor_identity(&auth)?;
    let removed = state
        .review_service()
        .delete(&actor, &auth.role, &review_id)
        .await?;
    Ok(Json(ReviewMutationResponse::from_triggered(
        "delete", removed,
    )))
}

async fn recompute_tour_summary(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(tour_id): Path<String>,
) -> Result<Json<Tour>, ApiError> {
    if !auth.role.is_admin() {
        return Err(ApiError::Forbidden);
    }
    state.review_service().recompute(&tour_id).await?;
    observability::register_summary_refresh("manual", &SummaryRefresh::Refreshed);
    tracing::info!(tour_id, "tour summary resynchronised");
    Ok(Json(state.tour_service().get(&tour_id).await?))
}

fn actor_identity(auth: &AuthContext) -> Result<ActorIdentity, ApiError> {
    if !auth.is_authenticated || auth.role == Role::Anonymous {
        return Err(ApiError::Unauthorized);
    }
    let user_id = auth
        .user_id
        .as_ref()
        .filter(|user_id| !user_id.trim().is_empty())
        .ok_or(ApiError::Unauthorized)?;
    Ok(ActorIdentity {
        user_id: user_id.to_string(),
        username: auth.username.clone().unwrap_or_else(|| user_id.to_string()),
    })
}
