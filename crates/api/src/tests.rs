use std::time::{SystemTime, UNIX_EPOCH};

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use jsonwebtoken::{EncodingKey, Header, encode};
use serde::Serialize;
use serde_json::{Value, json};
use tower::ServiceExt;

use crate::routes;
use crate::state::AppState;
use tourbook_infra::config::AppConfig;

const SECRET: &str = "test-secret";

#[derive(Serialize)]
struct Claims {
    sub: String,
    role: String,
    exp: usize,
}

fn test_config() -> AppConfig {
    AppConfig {
        app_env: "test".to_string(),
        port: 0,
        log_level: "info".to_string(),
        data_backend: "memory".to_string(),
        surreal_endpoint: "ws://127.0.0.1:8000".to_string(),
        surreal_ns: "tourbook".to_string(),
        surreal_db: "test".to_string(),
        surreal_user: "root".to_string(),
        surreal_pass: "root".to_string(),
        jwt_secret: SECRET.to_string(),
    }
}

fn test_app() -> axum::Router {
    routes::router(AppState::in_memory(test_config()))
}

fn test_token_with_identity(role: &str, sub: &str) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time")
        .as_secs();
    let claims = Claims {
        sub: sub.to_string(),
        role: role.to_string(),
        exp: (now + 3600) as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .expect("token")
}

fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    }
}

async fn json_body(response: Response) -> Value {
    serde_json::from_slice(
        &to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body"),
    )
    .expect("json")
}

async fn create_tour(app: &axum::Router, name: &str) -> String {
    let admin = test_token_with_identity("admin", "admin-1");
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/v1/tours",
            Some(&admin),
            Some(json!({ "name": name, "price": 397.0 })),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CREATED);
    let tour = json_body(response).await;
    assert_eq!(tour["ratings_quantity"], json!(0));
    assert_eq!(tour["ratings_average"], json!(4.5));
    tour["tour_id"].as_str().expect("tour_id").to_string()
}

async fn tour_summary(app: &axum::Router, tour_id: &str) -> (u64, f64) {
    let response = app
        .clone()
        .oneshot(request("GET", &format!("/v1/tours/{tour_id}"), None, None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let tour = json_body(response).await;
    (
        tour["ratings_quantity"].as_u64().expect("quantity"),
        tour["ratings_average"].as_f64().expect("average"),
    )
}

async fn post_review(
    app: &axum::Router,
    tour_id: &str,
    token: &str,
    rating: f64,
) -> Response {
    app.clone()
        .oneshot(request(
            "POST",
            &format!("/v1/tours/{tour_id}/reviews"),
            Some(token),
            Some(json!({ "text": "Would go again", "rating": rating })),
        ))
        .await
        .expect("response")
}

#[tokio::test]
async fn health_reports_memory_backend() {
    let response = test_app()
        .oneshot(request("GET", "/health", None, None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    assert!(response.headers().contains_key("x-correlation-id"));
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["store"], "memory");
}

#[tokio::test]
async fn review_flow_keeps_tour_summary_consistent() {
    let app = test_app();
    let tour_id = create_tour(&app, "The Sea Explorer").await;
    let first = test_token_with_identity("user", "user-1");
    let second = test_token_with_identity("user", "user-2");

    let response = post_review(&app, &tour_id, &first, 5.0).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await;
    assert_eq!(body["summary"]["status"], "refreshed");
    assert_eq!(body["review"]["user_id"], "user-1");
    assert_eq!(tour_summary(&app, &tour_id).await, (1, 5.0));

    let response = post_review(&app, &tour_id, &second, 3.0).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let second_review_id = json_body(response).await["review"]["review_id"]
        .as_str()
        .expect("review_id")
        .to_string();
    assert_eq!(tour_summary(&app, &tour_id).await, (2, 4.0));

    let response = post_review(&app, &tour_id, &first, 1.0).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(json_body(response).await["error"]["code"], "conflict");
    assert_eq!(tour_summary(&app, &tour_id).await, (2, 4.0));

    let response = app
        .clone()
        .oneshot(request(
            "DELETE",
            &format!("/v1/reviews/{second_review_id}"),
            Some(&second),
            None,
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(tour_summary(&app, &tour_id).await, (1, 5.0));

    let response = app
        .clone()
        .oneshot(request(
            "GET",
            &format!("/v1/tours/{tour_id}/reviews"),
            None,
            None,
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let reviews = json_body(response).await;
    assert_eq!(reviews.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn owner_can_update_rating_and_stranger_cannot() {
    let app = test_app();
    let tour_id = create_tour(&app, "The Forest Hiker").await;
    let owner = test_token_with_identity("user", "owner");
    let stranger = test_token_with_identity("user", "stranger");

    let response = post_review(&app, &tour_id, &owner, 2.0).await;
    let review_id = json_body(response).await["review"]["review_id"]
        .as_str()
        .expect("review_id")
        .to_string();

    let response = app
        .clone()
        .oneshot(request(
            "PATCH",
            &format!("/v1/reviews/{review_id}"),
            Some(&stranger),
            Some(json!({ "rating": 5.0 })),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(tour_summary(&app, &tour_id).await, (1, 2.0));

    let response = app
        .clone()
        .oneshot(request(
            "PATCH",
            &format!("/v1/reviews/{review_id}"),
            Some(&owner),
            Some(json!({ "rating": 4.0 })),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["review"]["rating"], json!(4.0));
    assert_eq!(tour_summary(&app, &tour_id).await, (1, 4.0));
}

#[tokio::test]
async fn invalid_reviews_are_rejected() {
    let app = test_app();
    let tour_id = create_tour(&app, "The Snow Adventurer").await;
    let user = test_token_with_identity("user", "user-1");

    let response = post_review(&app, &tour_id, &user, 6.0).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/v1/tours/{tour_id}/reviews"),
            Some(&user),
            Some(json!({ "text": "", "rating": 4.0 })),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = post_review(&app, "missing-tour", &user, 4.0).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    assert_eq!(tour_summary(&app, &tour_id).await, (0, 4.5));
}

#[tokio::test]
async fn anonymous_callers_cannot_review() {
    let app = test_app();
    let tour_id = create_tour(&app, "The City Wanderer").await;

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/v1/tours/{tour_id}/reviews"),
            None,
            Some(json!({ "text": "sneaky", "rating": 1.0 })),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/v1/tours/{tour_id}/reviews"),
            Some("not-a-jwt"),
            Some(json!({ "text": "sneaky", "rating": 1.0 })),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn only_tour_staff_create_tours() {
    let app = test_app();
    let user = test_token_with_identity("user", "user-1");
    let response = app
        .oneshot(request(
            "POST",
            "/v1/tours",
            Some(&user),
            Some(json!({ "name": "Unofficial", "price": 1.0 })),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn manual_recompute_requires_admin() {
    let app = test_app();
    let tour_id = create_tour(&app, "The Park Camper").await;
    let uri = format!("/v1/tours/{tour_id}/summary/recompute");

    let response = app
        .clone()
        .oneshot(request("POST", &uri, None, None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let user = test_token_with_identity("user", "user-1");
    let response = app
        .clone()
        .oneshot(request("POST", &uri, Some(&user), None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let admin = test_token_with_identity("admin", "admin-1");
    let response = app
        .clone()
        .oneshot(request("POST", &uri, Some(&admin), None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let tour = json_body(response).await;
    assert_eq!(tour["ratings_quantity"], json!(0));
    assert_eq!(tour["ratings_average"], json!(4.5));
}

#[tokio::test]
async fn caller_correlation_id_is_echoed() {
    let mut req = request("GET", "/v1/tours", None, None);
    req.headers_mut().insert(
        "x-correlation-id",
        axum::http::HeaderValue::from_static("booking-flow-42"),
    );
    let response = test_app().oneshot(req).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("x-correlation-id")
            .and_then(|value| value.to_str().ok()),
        Some("booking-flow-42")
    );
}
