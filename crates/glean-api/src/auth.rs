use axum::{
    extract::Request,
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::Engine as _;
use glean_commands::Actor;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;

/// Per-request id, generated at the edge of this service and echoed in error
/// bodies and the `x-request-id` response header.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Identity assertion claims. JWT validation happens at the edge; what
/// reaches this service is the already-verified claim set, base64-encoded.
#[derive(Debug, Deserialize)]
struct IdentityClaims {
    sub: String,
    email: String,
    roles: Vec<glean_domain::Role>,
}

/// Encode an actor as a bearer identity assertion (the inverse of what the
/// middleware decodes). Used by tests and local tooling.
pub fn encode_identity(actor: &Actor) -> String {
    let claims = serde_json::json!({
        "sub": actor.user_id,
        "email": actor.email,
        "roles": actor.roles,
    });
    base64::engine::general_purpose::STANDARD.encode(claims.to_string())
}

fn decode_identity(token: &str) -> Option<Actor> {
    let bytes = base64::engine::general_purpose::STANDARD.decode(token).ok()?;
    let claims: IdentityClaims = serde_json::from_slice(&bytes).ok()?;
    if claims.sub.trim().is_empty() {
        return None;
    }
    Some(Actor::new(claims.sub, claims.email, claims.roles))
}

/// Stamp a request id and require a decodable `Authorization: Bearer`
/// identity assertion. Applied to every route — no public endpoints.
pub async fn require_identity(mut request: Request, next: Next) -> Response {
    let request_id = RequestId(Uuid::new_v4().to_string());
    request.extensions_mut().insert(request_id.clone());

    let actor = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .and_then(decode_identity);

    let mut response = match actor {
        Some(actor) => {
            request.extensions_mut().insert(actor);
            next.run(request).await
        }
        None => {
            tracing::debug!(request_id = %request_id.0, "rejected request without identity assertion");
            ApiError::unauthenticated(&request_id.0).into_response()
        }
    };

    if let Ok(value) = HeaderValue::from_str(&request_id.0) {
        response.headers_mut().insert("x-request-id", value);
    }
    if response.status() == StatusCode::UNAUTHORIZED {
        // Uniform challenge for missing and malformed assertions alike.
        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    }
    response
}
