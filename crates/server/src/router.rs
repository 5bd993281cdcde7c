use axum::routing::{get, post};
use axum::Router;
use concilia_storage::DbPool;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{reconciliation, rules};

/// Uploads never come through this surface; a small limit is enough for
/// rule drafts and match bodies.
const BODY_LIMIT_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
}

pub fn build_router(pool: DbPool) -> Router {
    let state = AppState { pool };

    Router::new()
        .route("/bank-reconciliation/summary", get(reconciliation::summary))
        .route(
            "/bank-reconciliation/statements",
            get(reconciliation::list_statements),
        )
        .route(
            "/bank-reconciliation/statements/{id}/entries",
            get(reconciliation::list_entries),
        )
        .route(
            "/bank-reconciliation/entries/{id}/match",
            post(reconciliation::match_entry),
        )
        .route(
            "/bank-reconciliation/entries/{id}/unmatch",
            post(reconciliation::unmatch_entry),
        )
        .route(
            "/bank-reconciliation/entries/{id}/ignore",
            post(reconciliation::ignore_entry),
        )
        .route(
            "/bank-reconciliation/entries/{id}/suggestions",
            get(reconciliation::suggestions),
        )
        .route(
            "/bank-reconciliation/entries/{id}/suggest-rule",
            get(reconciliation::suggest_rule),
        )
        .route("/bank-reconciliation/bulk", post(reconciliation::bulk))
        .route(
            "/bank-reconciliation/dashboard",
            get(reconciliation::dashboard),
        )
        .route("/reconciliation-rules", get(rules::list).post(rules::create))
        .route(
            "/reconciliation-rules/{id}",
            axum::routing::put(rules::update).delete(rules::delete),
        )
        .route("/reconciliation-rules/{id}/toggle", post(rules::toggle))
        .route("/reconciliation-rules/test", post(rules::test))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT_BYTES))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn test_router() -> Router {
        let pool = concilia_storage::create_memory_pool().await.unwrap();
        build_router(pool)
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header("X-Tenant-Id", "1")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn missing_tenant_header_is_rejected() {
        let router = test_router().await;
        let resp = router
            .oneshot(
                Request::builder()
                    .uri("/bank-reconciliation/summary")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], false);
    }

    #[tokio::test]
    async fn summary_envelope() {
        let router = test_router().await;
        let resp = router
            .oneshot(get_req("/bank-reconciliation/summary"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["total_entries"], 0);
        assert_eq!(json["data"]["reconciliation_rate"], 0.0);
    }

    #[tokio::test]
    async fn statements_list_is_wrapped_with_total() {
        let router = test_router().await;
        let resp = router
            .oneshot(get_req("/bank-reconciliation/statements"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["data"]["total"], 0);
        assert!(json["data"]["data"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_entry_is_not_found() {
        let router = test_router().await;
        let resp = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/bank-reconciliation/entries/99/unmatch")
                    .header("X-Tenant-Id", "1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn invalid_rule_draft_is_unprocessable() {
        let router = test_router().await;
        let body = serde_json::json!({
            "name": "  ",
            "match_field": "description",
            "match_operator": "contains",
            "match_value": "x",
            "action": "categorize",
            "category": "fees"
        });
        let resp = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/reconciliation-rules")
                    .header("X-Tenant-Id", "1")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn rule_crud_round_trip() {
        let router = test_router().await;
        let draft = serde_json::json!({
            "name": "bank fees",
            "match_field": "description",
            "match_operator": "contains",
            "match_value": "tarifa",
            "action": "categorize",
            "category": "fees"
        });

        let resp = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/reconciliation-rules")
                    .header("X-Tenant-Id", "1")
                    .header("content-type", "application/json")
                    .body(Body::from(draft.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let id = json["data"]["id"].as_i64().unwrap();
        assert_eq!(json["data"]["priority"], 100);
        assert_eq!(json["data"]["is_active"], true);

        // Toggle flips activity.
        let resp = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/reconciliation-rules/{id}/toggle"))
                    .header("X-Tenant-Id", "1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["data"]["is_active"], false);

        // Another tenant cannot see or delete it.
        let resp = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/reconciliation-rules/{id}"))
                    .header("X-Tenant-Id", "2")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = router
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/reconciliation-rules/{id}"))
                    .header("X-Tenant-Id", "1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn dashboard_defaults_a_missing_bound() {
        let router = test_router().await;
        let resp = router
            .oneshot(get_req(
                "/bank-reconciliation/dashboard?start_date=2024-01-01",
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        // end falls back to today; the range stays well-formed.
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["period_start"], "2024-01-01");
    }

    #[tokio::test]
    async fn bulk_rejects_an_empty_batch() {
        let router = test_router().await;
        let body = serde_json::json!({ "action": "ignore", "entry_ids": [] });
        let resp = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/bank-reconciliation/bulk")
                    .header("X-Tenant-Id", "1")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn bulk_reports_processed_count() {
        let router = test_router().await;
        // Unknown ids are skipped, not errors.
        let body = serde_json::json!({ "action": "unmatch", "entry_ids": [41, 42] });
        let resp = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/bank-reconciliation/bulk")
                    .header("X-Tenant-Id", "1")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["data"]["processed"], 0);
    }
}
