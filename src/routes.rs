//! Route definitions and router setup
//!
//! Configures all API routes and middleware.

mod command;
mod query;

use crate::state::SharedState;
use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    request_id::MakeRequestUuid,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
    ServiceBuilderExt,
};
use tracing::Level;

/// Create the application router with all routes and middleware
pub fn create_router(state: SharedState) -> Router {
    let cors = build_cors_layer(&state.settings.cors.allowed_origins);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let middleware = ServiceBuilder::new()
        .set_x_request_id(MakeRequestUuid)
        .layer(trace_layer)
        .layer(CompressionLayer::new())
        .layer(cors)
        .propagate_x_request_id();

    Router::new()
        // Health check
        .route("/health", get(health_check))

        // Queries
        .route(
            "/api/proposals",
            get(query::list_proposals).post(command::create_proposal),
        )
        .route("/api/proposals/{id}", get(query::get_proposal))
        .route("/api/signatures/verify", post(query::verify_signature))

        // Signed commands
        .route("/api/proposals/{id}/votes", post(command::submit_vote))
        .route("/api/proposals/{id}/comments", post(command::submit_comment))
        .route("/api/proposals/{id}/close", post(command::close_voting))

        // Apply middleware and state
        .layer(middleware)
        .with_state(state)
}

/// Build CORS layer from the configured origins
fn build_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<_> = allowed_origins
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect();

    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .max_age(Duration::from_secs(3600));

    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(origins)
    }
}

/// Health check endpoint
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "success": true,
        "message": "Server is running fine.",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::identity::{member_key, sign, IdentityRecord, MemoryIdentityRegistry};
    use crate::state::AppState;
    use crate::store::{ChangeRequestState, ChangeRequestStore, MemoryStore};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use rsa::RsaPrivateKey;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    struct Harness {
        app: Router,
        store: Arc<MemoryStore>,
        alice: (String, RsaPrivateKey),
        bob: (String, RsaPrivateKey),
        suspended: (String, RsaPrivateKey),
    }

    fn harness() -> Harness {
        let alice = member_key(1);
        let bob = member_key(2);
        let suspended = member_key(3);
        let record = |token: &str, name: &str, status: &str| IdentityRecord {
            signature: token.to_string(),
            name: name.to_string(),
            status: status.to_string(),
        };
        let registry = Arc::new(MemoryIdentityRegistry::new(vec![
            record(&alice.0, "Alice", "ACTIVE"),
            record(&bob.0, "Bob", "ACTIVE"),
            record(&suspended.0, "Mallory", "SUSPENDED"),
        ]));
        let store = Arc::new(MemoryStore::default());
        let state = AppState::with_backends(Settings::default(), store.clone(), registry, None);
        Harness {
            app: create_router(Arc::new(state)),
            store,
            alice,
            bob,
            suspended,
        }
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(match body {
                Some(body) => Body::from(body.to_string()),
                None => Body::empty(),
            })
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    fn create_body(member: &(String, RsaPrivateKey), title: &str) -> Value {
        let signed = format!("I propose: {}", title);
        json!({
            "title": title,
            "body": "Spend 10 on X.",
            "digitalSignature": member.0,
            "signedText": signed,
            "requestSignature": sign(&member.1, &signed),
        })
    }

    fn vote_body(member: &(String, RsaPrivateKey), text: &str) -> Value {
        json!({
            "digitalSignature": member.0,
            "voteText": text,
            "requestSignature": sign(&member.1, text),
        })
    }

    fn close_body(member: &(String, RsaPrivateKey), id: u64) -> Value {
        let signed = format!("Close proposal #{}", id);
        json!({
            "digitalSignature": member.0,
            "signedText": signed,
            "requestSignature": sign(&member.1, &signed),
        })
    }

    fn comment_body(member: &(String, RsaPrivateKey), id: u64, text: &str) -> Value {
        let signed = format!("On proposal #{}: {}", id, text);
        json!({
            "text": text,
            "digitalSignature": member.0,
            "signedText": signed,
            "requestSignature": sign(&member.1, &signed),
        })
    }

    #[tokio::test]
    async fn test_health_check() {
        let h = harness();
        let (status, body) = call(&h.app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
    }

    #[tokio::test]
    async fn test_full_voting_flow() {
        let h = harness();

        let (status, created) =
            call(&h.app, "POST", "/api/proposals", Some(create_body(&h.alice, "Fund X"))).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["data"]["proposalId"].as_u64().unwrap();

        let (status, listed) = call(&h.app, "GET", "/api/proposals", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed["data"][0]["title"], "Fund X");
        assert_eq!(listed["data"][0]["branch"], "proposal-fund-x");

        let uri = format!("/api/proposals/{}/votes", id);
        let (status, receipt) =
            call(&h.app, "POST", &uri, Some(vote_body(&h.alice, "I vote YES"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(receipt["data"]["choice"], "YES");
        assert_eq!(receipt["data"]["voter"], "Alice");

        let (status, _) = call(&h.app, "POST", &uri, Some(vote_body(&h.bob, "no thanks"))).await;
        assert_eq!(status, StatusCode::OK);

        let (status, detail) =
            call(&h.app, "GET", &format!("/api/proposals/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(detail["data"]["status"], "open");
        assert_eq!(detail["data"]["tally"]["yes"], 1);
        assert_eq!(detail["data"]["tally"]["no"], 1);
        assert_eq!(detail["data"]["tally"]["majority"], "NO");
        assert_eq!(detail["data"]["tally"]["daysRemaining"], 7);

        let (status, closed) = call(
            &h.app,
            "POST",
            &format!("/api/proposals/{}/close", id),
            Some(close_body(&h.bob, id)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(closed["data"]["outcome"], "closed");
        assert_eq!(
            h.store.get(id).await.unwrap().state,
            ChangeRequestState::Closed
        );

        let (status, again) =
            call(&h.app, "POST", &uri, Some(vote_body(&h.alice, "YES again"))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(again["success"], false);
        assert_eq!(again["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn test_tampered_vote_is_rejected_before_any_mutation() {
        let h = harness();
        let (_, created) =
            call(&h.app, "POST", "/api/proposals", Some(create_body(&h.alice, "Fund X"))).await;
        let id = created["data"]["proposalId"].as_u64().unwrap();
        let before = h.store.list_entries(id).await.unwrap();

        let mut body = vote_body(&h.alice, "I vote NO");
        body["voteText"] = json!("I vote YES");
        let (status, error) = call(
            &h.app,
            "POST",
            &format!("/api/proposals/{}/votes", id),
            Some(body),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(error["code"], "INVALID_SIGNATURE");
        assert_eq!(h.store.list_entries(id).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_suspended_member_cannot_vote() {
        let h = harness();
        let (_, created) =
            call(&h.app, "POST", "/api/proposals", Some(create_body(&h.alice, "Fund X"))).await;
        let id = created["data"]["proposalId"].as_u64().unwrap();

        let (status, error) = call(
            &h.app,
            "POST",
            &format!("/api/proposals/{}/votes", id),
            Some(vote_body(&h.suspended, "YES")),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(error["code"], "INACTIVE_SIGNATURE");
        assert_eq!(h.store.list_entries(id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_vote_without_choice_is_a_validation_error() {
        let h = harness();
        let (_, created) =
            call(&h.app, "POST", "/api/proposals", Some(create_body(&h.alice, "Fund X"))).await;
        let id = created["data"]["proposalId"].as_u64().unwrap();

        let (status, error) = call(
            &h.app,
            "POST",
            &format!("/api/proposals/{}/votes", id),
            Some(vote_body(&h.alice, "maybe later")),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_create_requires_signed_text_covering_title() {
        let h = harness();
        let mut body = create_body(&h.alice, "Fund X");
        body["title"] = json!("Fund Y");
        let (status, error) = call(&h.app, "POST", "/api/proposals", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error["code"], "VALIDATION_ERROR");
        assert!(h.store.list_open().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_title_surfaces_store_error() {
        let h = harness();
        call(&h.app, "POST", "/api/proposals", Some(create_body(&h.alice, "Fund X"))).await;
        let (status, error) =
            call(&h.app, "POST", "/api/proposals", Some(create_body(&h.bob, "Fund X"))).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(error["code"], "STORE_ERROR");
        assert!(error["error"].as_str().unwrap().contains("branch creation"));
    }

    #[tokio::test]
    async fn test_comment_is_recorded_but_not_counted() {
        let h = harness();
        let (_, created) =
            call(&h.app, "POST", "/api/proposals", Some(create_body(&h.alice, "Fund X"))).await;
        let id = created["data"]["proposalId"].as_u64().unwrap();

        let text = "YES, but only if the budget is audited";
        let (status, _) = call(
            &h.app,
            "POST",
            &format!("/api/proposals/{}/comments", id),
            Some(comment_body(&h.bob, id, text)),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, detail) = call(&h.app, "GET", &format!("/api/proposals/{}", id), None).await;
        assert_eq!(detail["data"]["entryCount"], 2);
        assert_eq!(detail["data"]["tally"]["total"], 0);
    }

    #[tokio::test]
    async fn test_verify_signature_reports_lookup() {
        let h = harness();
        let (status, active) = call(
            &h.app,
            "POST",
            "/api/signatures/verify",
            Some(json!({ "signature": h.alice.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(active["data"]["status"], "active");
        assert_eq!(active["data"]["name"], "Alice");

        let (_, inactive) = call(
            &h.app,
            "POST",
            "/api/signatures/verify",
            Some(json!({ "signature": h.suspended.0 })),
        )
        .await;
        assert_eq!(inactive["data"]["status"], "inactive");
        assert_eq!(inactive["data"]["recordedStatus"], "SUSPENDED");

        let (_, unknown) = call(
            &h.app,
            "POST",
            "/api/signatures/verify",
            Some(json!({ "signature": "nobody" })),
        )
        .await;
        assert_eq!(unknown["data"]["status"], "not_found");
    }

    #[tokio::test]
    async fn test_unknown_proposal_is_not_found() {
        let h = harness();
        let (status, error) = call(&h.app, "GET", "/api/proposals/42", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(error["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_close_signed_for_another_proposal_is_rejected() {
        let h = harness();
        let (_, created) =
            call(&h.app, "POST", "/api/proposals", Some(create_body(&h.alice, "Fund X"))).await;
        let id = created["data"]["proposalId"].as_u64().unwrap();

        let (status, error) = call(
            &h.app,
            "POST",
            &format!("/api/proposals/{}/close", id),
            Some(close_body(&h.bob, 999)),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error["code"], "VALIDATION_ERROR");
        assert_eq!(h.store.get(id).await.unwrap().state, ChangeRequestState::Open);
    }

    #[tokio::test]
    async fn test_comment_signed_for_another_proposal_is_rejected() {
        let h = harness();
        let (_, created) =
            call(&h.app, "POST", "/api/proposals", Some(create_body(&h.alice, "Fund X"))).await;
        let id = created["data"]["proposalId"].as_u64().unwrap();
        let uri = format!("/api/proposals/{}/comments", id);

        let (status, _) = call(&h.app, "POST", &uri, Some(comment_body(&h.bob, id + 1, "Agreed"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let mut swapped = comment_body(&h.bob, id, "Agreed");
        swapped["text"] = json!("Rejected");
        let (status, _) = call(&h.app, "POST", &uri, Some(swapped)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        assert_eq!(h.store.list_entries(id).await.unwrap().len(), 1);
    }
}
