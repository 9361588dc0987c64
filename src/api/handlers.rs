// API request handlers

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::Stream;
use serde_json::json;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use uuid::Uuid;

use super::error::ApiResult;
use super::types::*;
use super::AppState;
use crate::orchestration::{OrchestrationContext, Planner, StreamEvent};
use crate::routing::RoutingResult;
use crate::summarize::{SummarizeOutcome, SummarizeSource};

// ===== Health =====

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: crate::VERSION,
    })
}

/// Aggregated status of the database, router paths and orchestration
/// registries.
pub async fn system_status(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let database_healthy = state.pool.health_check().await.is_ok();
    let router_health = state.router.health_check().await;
    let routing_stats = state.router.routing_stats();
    let plan_agents = state.plan_executor.registered_agents();

    let overall_status = if database_healthy {
        router_health.overall_status.clone()
    } else {
        "unhealthy".to_string()
    };

    Json(json!({
        "database": if database_healthy { "healthy" } else { "unhealthy" },
        "router": router_health,
        "routing_stats": routing_stats,
        "plan_agents": plan_agents,
        "overall_status": overall_status,
    }))
}

pub async fn routing_stats(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let stats = state.router.routing_stats();
    Json(serde_json::to_value(stats).unwrap_or_default())
}

// ===== Summarization =====

pub async fn summarize_webpage(
    State(state): State<Arc<AppState>>,
    Json(request): Json<WebpageSummarizeRequest>,
) -> ApiResult<Json<SummarizeOutcome>> {
    let outcome = state
        .summarization
        .summarize(
            SummarizeSource::Webpage {
                url: &request.url,
                html: &request.html_content,
            },
            request.user_id,
            request.tag_count,
            request.refresh,
        )
        .await?;
    Ok(Json(outcome))
}

pub async fn summarize_youtube(
    State(state): State<Arc<AppState>>,
    Json(request): Json<YoutubeSummarizeRequest>,
) -> ApiResult<Json<SummarizeOutcome>> {
    let outcome = state
        .summarization
        .summarize(
            SummarizeSource::Youtube {
                url: &request.url,
                transcript: &request.transcript,
            },
            request.user_id,
            request.tag_count,
            request.refresh,
        )
        .await?;
    Ok(Json(outcome))
}

pub async fn summarize_pdf(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PdfSummarizeRequest>,
) -> ApiResult<Json<SummarizeOutcome>> {
    let outcome = state
        .summarization
        .summarize(
            SummarizeSource::Pdf {
                bytes: request.content.as_bytes(),
            },
            request.user_id,
            request.tag_count,
            request.refresh,
        )
        .await?;
    Ok(Json(outcome))
}

/// Write path for personalization: the user accepted tags/category for
/// a saved item.
pub async fn confirm_selection(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ConfirmSelectionRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    state
        .summarization
        .confirm_selection(request.user_id, &request.tags, request.category.as_deref())
        .await?;
    Ok(Json(json!({ "success": true })))
}

// ===== Mode selection & routing =====

pub async fn select_mode(
    State(state): State<Arc<AppState>>,
    Json(request): Json<crate::routing::ProcessingModeRequest>,
) -> Json<crate::routing::ProcessingModeResponse> {
    Json(state.mode_selector.select_processing_mode(&request).await)
}

pub async fn smart_routing(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SmartRoutingRequest>,
) -> ApiResult<Json<RoutingResult>> {
    let result = state
        .router
        .route(
            &request.request_type,
            request.request_data,
            request.user_id,
            request.board_id,
            request.processing_mode,
        )
        .await?;
    Ok(Json(result))
}

// ===== Plan execution (SSE) =====

pub async fn plan_stream(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PlanStreamRequest>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let request_id = request
        .request_id
        .unwrap_or_else(|| Uuid::new_v4().simple().to_string());

    let plan = Planner::build_plan(&request_id, request.request_type, request.retrieval_mode);
    let mut context =
        OrchestrationContext::new(request_id, request.user_id).with_prompt(request.prompt);
    context.selected_contents = request.selected_contents;
    context.stream = true;

    let (tx, rx) = tokio::sync::mpsc::channel::<StreamEvent>(32);
    let executor = Arc::clone(&state.plan_executor);

    tokio::spawn(async move {
        let result = executor.execute(&plan, &context, Some(tx.clone())).await;
        let final_event = match result {
            Ok(result) => StreamEvent {
                event: "result".to_string(),
                data: serde_json::to_value(&result).unwrap_or_default(),
            },
            Err(e) => StreamEvent {
                event: "error".to_string(),
                data: json!({ "message": e.to_string() }),
            },
        };
        let _ = tx.send(final_event).await;
    });

    let stream = ReceiverStream::new(rx)
        .map(|frame| Ok(Event::default().event(frame.event).data(frame.data.to_string())));

    Sse::new(stream).keep_alive(KeepAlive::default())
}
