//! WTU quota accounting under contention and at admission time.

mod helpers;

use std::sync::Arc;

use clip_ops::domain::{current_plan_month, ClipOpsError, PurchaseType, UserTokenQuota};
use clip_ops::routing::ProcessingMode;
use helpers::test_app;
use pretty_assertions::assert_eq;
use serde_json::json;

#[tokio::test]
async fn remaining_never_goes_negative() {
    let app = test_app().await;
    let month = current_plan_month();

    app.state
        .accountant
        .set_quota(&UserTokenQuota::new(1, month, 100))
        .await
        .unwrap();

    for _ in 0..12 {
        let _ = app.state.accountant.try_consume(1, month, 10).await.unwrap();
    }

    let quota = app
        .state
        .accountant
        .try_consume(1, month, 1)
        .await
        .unwrap();
    assert!(!quota.ok);
    assert_eq!(quota.remaining, 0);
}

#[tokio::test]
async fn concurrent_consumers_and_purchases_serialize() {
    let app = test_app().await;
    let month = current_plan_month();
    let accountant = Arc::clone(&app.state.accountant);

    accountant
        .set_quota(&UserTokenQuota::new(2, month, 50))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..10 {
        let accountant = Arc::clone(&accountant);
        handles.push(tokio::spawn(async move {
            if i % 5 == 0 {
                accountant
                    .add_quota(2, month, 10, PurchaseType::Bonus)
                    .await
                    .map(|_| 0)
                    .unwrap()
            } else {
                let outcome = accountant.try_consume(2, month, 10).await.unwrap();
                i64::from(outcome.ok) * 10
            }
        }));
    }

    let mut consumed = 0;
    for handle in handles {
        consumed += handle.await.unwrap();
    }

    let quota = app
        .state
        .accountant
        .try_consume(2, month, 0)
        .await
        .unwrap();

    // 50 initial + 20 purchased; admitted consumption can never exceed
    // what was allocated at the moment of each deduction.
    assert!(consumed <= 70);
    assert_eq!(quota.remaining, 70 - consumed);
}

#[tokio::test]
async fn routing_rejects_before_any_llm_call_when_budget_is_short() {
    let app = test_app().await;
    let month = current_plan_month();

    // allocated=10, used=9: one WTU left, the estimate needs two
    let mut quota = UserTokenQuota::new(3, month, 10);
    quota.consume(9);
    app.state.accountant.set_quota(&quota).await.unwrap();

    let err = app
        .state
        .router
        .route(
            "summary",
            json!({ "content": "some text" }),
            3,
            None,
            ProcessingMode::Auto,
        )
        .await
        .unwrap_err();

    match err {
        ClipOpsError::QuotaExceeded { needed, remaining } => {
            assert_eq!(needed, 2);
            assert_eq!(remaining, 1);
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(app.gateway.completions(), 0);
}

#[tokio::test]
async fn purchases_append_to_the_audit_log() {
    let app = test_app().await;
    let month = current_plan_month();

    app.state
        .accountant
        .add_quota(4, month, 1_000, PurchaseType::Purchase)
        .await
        .unwrap();
    app.state
        .accountant
        .add_quota(4, month, 200, PurchaseType::Bonus)
        .await
        .unwrap();

    let quota = app
        .state
        .accountant
        .try_consume(4, month, 0)
        .await
        .unwrap();
    // Default allocation plus both grants
    assert_eq!(quota.remaining, 10_000 + 1_200);
}
