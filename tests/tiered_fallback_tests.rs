//! Tier fallback end to end against the seeded catalog.

mod helpers;

use clip_ops::domain::{CallStatus, ClipOpsError, LlmMessage, LlmTier};
use clip_ops::gateway::CompletionOptions;
use clip_ops::storage::{CallLogRepository, SqliteCallLogRepository};
use clip_ops::testing::ScriptedGateway;
use futures::StreamExt;
use helpers::app_with_gateway;
use pretty_assertions::assert_eq;

#[tokio::test]
async fn fallback_chain_logs_every_attempt_in_order() {
    let app = app_with_gateway(ScriptedGateway::failing_models(&["light-a", "light-b"])).await;

    let result = app
        .state
        .tiered
        .call(
            LlmTier::Light,
            &[LlmMessage::user("hi")],
            &CompletionOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(result.model_alias, "light-c");

    let call_logs = SqliteCallLogRepository::new(app.state.pool.pool().clone());
    let mut logs = call_logs.list_recent(10).await.unwrap();
    logs.reverse();

    assert_eq!(logs.len(), 3);
    assert_eq!(
        (logs[0].model_alias.as_str(), logs[0].status, logs[0].fallback_to.as_deref()),
        ("light-a", CallStatus::Fallback, Some("light-b"))
    );
    assert_eq!(
        (logs[1].model_alias.as_str(), logs[1].status, logs[1].fallback_to.as_deref()),
        ("light-b", CallStatus::Fallback, Some("light-c"))
    );
    assert_eq!(
        (logs[2].model_alias.as_str(), logs[2].status, logs[2].fallback_to.as_deref()),
        ("light-c", CallStatus::Success, None)
    );
}

#[tokio::test]
async fn exhausted_tier_reports_every_attempt() {
    let app =
        app_with_gateway(ScriptedGateway::failing_models(&["light-a", "light-b", "light-c"]))
            .await;

    let err = app
        .state
        .tiered
        .call(
            LlmTier::Light,
            &[LlmMessage::user("hi")],
            &CompletionOptions::default(),
        )
        .await
        .unwrap_err();

    match err {
        ClipOpsError::AllProvidersFailed { tier, attempted } => {
            assert_eq!(tier, "light");
            assert_eq!(attempted, vec!["light-a", "light-b", "light-c"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn stream_commits_to_the_first_model_that_produces_output() {
    let app = app_with_gateway(ScriptedGateway::failing_models(&["light-a"])).await;

    let stream = app
        .state
        .tiered
        .stream(
            LlmTier::Light,
            &[LlmMessage::user("hi")],
            &CompletionOptions::default(),
        )
        .await
        .unwrap();

    let text: String = stream.map(|c| c.unwrap()).collect().await;
    assert_eq!(text, "response from light-b");
}

#[tokio::test]
async fn mid_stream_failure_surfaces_instead_of_switching_models() {
    let app = app_with_gateway(ScriptedGateway::new()).await;

    let stream = app
        .state
        .tiered
        .stream(
            LlmTier::Light,
            &[LlmMessage::user(clip_ops::testing::MID_STREAM_FAILURE_PROMPT)],
            &CompletionOptions::default(),
        )
        .await
        .unwrap();

    let items: Vec<_> = stream.collect().await;
    assert_eq!(items.len(), 2);
    // The prefix came from light-a and is never followed by another
    // model's continuation
    assert!(items[0].as_ref().unwrap().contains("light-a"));
    assert!(items[1].is_err());
}

#[tokio::test]
async fn missing_tier_is_a_configuration_error() {
    let app = app_with_gateway(ScriptedGateway::new()).await;
    app.state.catalog.set_active("prem-a", false).await.unwrap();

    let err = app
        .state
        .tiered
        .call(
            LlmTier::Premium,
            &[LlmMessage::user("hi")],
            &CompletionOptions::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ClipOpsError::NoModelsForTier(_)));
}
