//! HTTP surface smoke tests via tower's oneshot.

mod helpers;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use clip_ops::create_router;
use clip_ops::domain::{current_plan_month, UserTokenQuota};
use helpers::{queue_pipeline, test_app};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tower::ServiceExt;

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_endpoint_responds() {
    let app = test_app().await;
    let router = create_router(app.state.clone());

    let response = router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], json!("ok"));
}

#[tokio::test]
async fn webpage_summarize_endpoint_returns_the_outcome() {
    let app = test_app().await;
    queue_pipeline(&app.gateway, "api summary", r#"["alpha"]"#, r#"["Topic"]"#);
    let router = create_router(app.state.clone());

    let response = router
        .oneshot(post_json(
            "/v1/clipper/webpage/summarize",
            json!({
                "url": "https://ex.com/page",
                "html_content": "some page text",
                "user_id": 1,
                "tag_count": 3,
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["summary"], json!("api summary"));
    assert_eq!(body["cached"], json!(false));
    assert_eq!(body["tags"], json!(["alpha"]));
}

#[tokio::test]
async fn quota_exhaustion_maps_to_a_structured_4xx() {
    let app = test_app().await;
    let mut quota = UserTokenQuota::new(9, current_plan_month(), 10);
    quota.consume(9);
    app.state.accountant.set_quota(&quota).await.unwrap();

    let router = create_router(app.state.clone());
    let response = router
        .oneshot(post_json(
            "/v2/ai/smart-routing",
            json!({
                "request_type": "summary",
                "request_data": { "content": "text" },
                "user_id": 9,
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let body = body_json(response).await;
    assert_eq!(body["error_code"], json!("QUOTA_EXCEEDED"));
    assert_eq!(body["needed"], json!(2));
    assert_eq!(body["remaining"], json!(1));
}

#[tokio::test]
async fn mode_select_endpoint_returns_a_decision() {
    let app = test_app().await;
    let router = create_router(app.state.clone());

    let response = router
        .oneshot(post_json(
            "/v2/mode/select",
            json!({
                "user_id": 1,
                "task_type": "board_analysis",
                "complexity_preference": "thorough",
                "quality_threshold": 0.97,
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["selected_mode"], json!("agent"));
    assert_eq!(body["fallback_available"], json!(true));
}

#[tokio::test]
async fn system_status_reports_collaborators() {
    let app = test_app().await;
    let router = create_router(app.state.clone());

    let response = router
        .oneshot(
            Request::builder()
                .uri("/v2/monitoring/system-status")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["database"], json!("healthy"));
    assert_eq!(body["overall_status"], json!("healthy"));
    assert_eq!(body["plan_agents"].as_array().unwrap().len(), 3);
}
