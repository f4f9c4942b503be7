use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use glean_commands::Services;
use tower_http::trace::TraceLayer;

use crate::auth::require_identity;
use crate::handlers;
use crate::state::AppState;

/// Build the versioned HTTP surface. Every route sits behind the identity
/// middleware — no public endpoints.
pub fn build_app(services: Services) -> Router {
    let state = AppState { services };

    let v1 = Router::new()
        // Profile
        .route("/profile", get(handlers::get_profile).put(handlers::put_profile))
        .route("/profile/:user_id", get(handlers::get_profile_by_id))
        // Supply
        .route("/supply", post(handlers::create_supply).get(handlers::list_supply))
        .route("/supply/:id", get(handlers::get_supply).put(handlers::update_supply))
        .route("/supply/:id/cancel", post(handlers::cancel_supply))
        // Demand
        .route("/demand", post(handlers::create_demand).get(handlers::list_demand))
        .route("/demand/:id", get(handlers::get_demand).put(handlers::update_demand))
        .route("/demand/:id/close", post(handlers::close_demand))
        .route("/demand/:id/cancel", post(handlers::cancel_demand))
        // Matches
        .route("/matches/recommendations", post(handlers::run_recommendations))
        .route("/matches", get(handlers::list_matches))
        .route("/matches/:id", get(handlers::get_match))
        .route("/matches/:id/accept", post(handlers::accept_match))
        .route("/matches/:id/reject", post(handlers::reject_match))
        .route("/matches/:id/schedule", post(handlers::schedule_match))
        // Driver
        .route("/driver/tasks", get(handlers::list_driver_tasks))
        .route("/driver/tasks/:id", get(handlers::get_task))
        .route("/driver/tasks/:id/status", post(handlers::post_task_status))
        .route("/driver/tasks/:id/location", post(handlers::post_task_location))
        // Compliance
        .route("/compliance/queue", get(handlers::compliance_queue))
        .route("/compliance/:match_id/approve", post(handlers::approve_compliance))
        .route("/compliance/:match_id/block", post(handlers::block_compliance))
        // Ops
        .route("/ops/dashboard", get(handlers::ops_dashboard))
        .route("/ops/stuck", get(handlers::ops_stuck))
        .route("/ops/tasks/:id/override", post(handlers::ops_override_task))
        .route("/ops/audit/export", get(handlers::ops_audit_export))
        // Events & notifications
        .route("/events", get(handlers::poll_events))
        .route("/notifications", get(handlers::list_notifications))
        .route("/notifications/:id/read", post(handlers::read_notification));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/ready", get(handlers::ready))
        .nest("/v1", v1)
        // Identity middleware applies to all routes above
        .route_layer(middleware::from_fn(require_identity))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use chrono::{Duration, Utc};
    use glean_commands::Actor;
    use glean_config::Settings;
    use glean_domain::Role;
    use http_body_util::BodyExt as _;
    use tower::util::ServiceExt;

    use crate::auth::encode_identity;

    fn test_app() -> Router {
        let services = Services::ephemeral(Settings::default()).with_inline_orchestration();
        build_app(services)
    }

    fn bearer(roles: Vec<Role>, sub: &str) -> String {
        format!("Bearer {}", encode_identity(&Actor::new(sub, "user@example.org", roles)))
    }

    fn listing_body() -> serde_json::Value {
        let now = Utc::now();
        serde_json::json!({
            "title": "surplus produce",
            "category": "perishable_food",
            "quantity": { "amount": 100.0, "unit": "lbs" },
            "pickup_address": {
                "line1": "1 Market St",
                "city": "San Francisco",
                "region": "CA",
                "postal_code": "94105",
                "country": null,
            },
            "pickup_window": {
                "start": now + Duration::hours(2),
                "end": now + Duration::hours(4),
            },
        })
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn unauthenticated_request_returns_401() {
        let app = test_app();
        let resp = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn malformed_token_returns_401_with_error_shape() {
        let app = test_app();
        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/v1/supply")
                    .header("Authorization", "Bearer not-base64!!!")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(resp).await;
        assert_eq!(body["errorCode"], "AUTHENTICATION_ERROR");
        assert!(body["requestId"].is_string());
    }

    #[tokio::test]
    async fn health_with_identity_returns_200() {
        let app = test_app();
        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header("Authorization", bearer(vec![Role::Supplier], "sup-1"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn create_listing_returns_201() {
        let app = test_app();
        let resp = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/v1/supply")
                    .header("Authorization", bearer(vec![Role::Supplier], "sup-1"))
                    .header("content-type", "application/json")
                    .body(Body::from(listing_body().to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body = body_json(resp).await;
        assert_eq!(body["status"], "posted");
        assert_eq!(body["version"], 1);
        assert_eq!(body["supplier_id"], "sup-1");
        // Geocoded on write: geohash tracks coordinates.
        assert!(body["geohash"].is_string());
    }

    #[tokio::test]
    async fn recipient_cannot_create_listing() {
        let app = test_app();
        let resp = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/v1/supply")
                    .header("Authorization", bearer(vec![Role::Recipient], "rec-1"))
                    .header("content-type", "application/json")
                    .body(Body::from(listing_body().to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let body = body_json(resp).await;
        assert_eq!(body["errorCode"], "AUTHORIZATION_ERROR");
    }

    #[tokio::test]
    async fn invalid_listing_returns_400() {
        let app = test_app();
        let mut body = listing_body();
        body["quantity"]["amount"] = serde_json::json!(-5.0);
        let resp = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/v1/supply")
                    .header("Authorization", bearer(vec![Role::Supplier], "sup-1"))
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = body_json(resp).await;
        assert_eq!(body["errorCode"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn missing_listing_returns_404() {
        let app = test_app();
        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/v1/supply/nope")
                    .header("Authorization", bearer(vec![Role::Supplier], "sup-1"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body = body_json(resp).await;
        assert_eq!(body["errorCode"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn ops_dashboard_is_role_gated() {
        let app = test_app();
        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/v1/ops/dashboard")
                    .header("Authorization", bearer(vec![Role::Driver], "drv-1"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/v1/ops/dashboard")
                    .header("Authorization", bearer(vec![Role::Operator], "op-1"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn events_poll_returns_sequence() {
        let app = test_app();

        // Creating a listing publishes listing.created.
        app.clone()
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/v1/supply")
                    .header("Authorization", bearer(vec![Role::Supplier], "sup-1"))
                    .header("content-type", "application/json")
                    .body(Body::from(listing_body().to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/v1/events?since=0&limit=10")
                    .header("Authorization", bearer(vec![Role::Operator], "op-1"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        let events = body.as_array().unwrap();
        assert!(!events.is_empty());
        assert_eq!(events[0]["seq"], 1);
        assert_eq!(events[0]["event_type"], "listing.created");
    }

    #[tokio::test]
    async fn profile_roundtrip() {
        let app = test_app();
        let auth = bearer(vec![Role::Recipient], "rec-1");

        // No profile yet.
        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/v1/profile")
                    .header("Authorization", auth.clone())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        // Upsert, then read back.
        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::PUT)
                    .uri("/v1/profile")
                    .header("Authorization", auth.clone())
                    .header("content-type", "application/json")
                    .body(Body::from(
                        serde_json::json!({ "display_name": "East Bay Food Bank" }).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/v1/profile")
                    .header("Authorization", auth)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["display_name"], "East Bay Food Bank");
        assert_eq!(body["roles"][0], "recipient");
    }
}
