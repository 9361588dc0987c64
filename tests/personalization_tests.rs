//! Personalized re-ranking: cold start, history, and failure handling.

mod helpers;

use clip_ops::testing::ScriptedGateway;
use helpers::{app_with_gateway, test_app};
use pretty_assertions::assert_eq;

fn candidates(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

#[tokio::test]
async fn cold_start_preserves_llm_order() {
    let app = test_app().await;

    let tags = app
        .state
        .personalization
        .personalize_tags(&candidates(&["rust", "async", "tokio"]), 42, 3)
        .await
        .unwrap();

    assert_eq!(tags, vec!["rust", "async", "tokio"]);
    // No history means no embedding work either
    assert_eq!(app.gateway.embed_calls(), 0);
}

#[tokio::test]
async fn popularity_alone_cannot_overtake_the_top_candidate() {
    let app = test_app().await;

    // Another user makes "d" the globally most-used tag
    app.state
        .personalization
        .record_usage(99, &["d".to_string()], None)
        .await
        .unwrap();

    let scored = app
        .state
        .personalization
        .score_candidates(&candidates(&["A", "B", "C", "D", "E"]), 42)
        .await
        .unwrap();

    let by_name: std::collections::HashMap<&str, f64> = scored
        .iter()
        .map(|s| (s.candidate.as_str(), s.final_score))
        .collect();

    assert!((by_name["A"] - 1.0).abs() < 1e-9);
    assert!((by_name["B"] - 0.775).abs() < 1e-9);
    assert!((by_name["C"] - 0.55).abs() < 1e-9);
    // D gets the full popularity boost on top of its base 0.325
    assert!((by_name["D"] - 0.425).abs() < 1e-9);
    assert!((by_name["E"] - 0.1).abs() < 1e-9);

    let top3 = app
        .state
        .personalization
        .personalize_tags(&candidates(&["A", "B", "C", "D", "E"]), 42, 3)
        .await
        .unwrap();
    assert_eq!(top3, vec!["A", "B", "C"]);
}

#[tokio::test]
async fn history_promotes_a_lower_candidate() {
    let app = test_app().await;

    app.gateway.set_embedding("networking", vec![1.0, 0.0, 0.0]);
    app.gateway.set_embedding("caching", vec![0.0, 1.0, 0.0]);
    app.gateway.set_embedding("databases", vec![0.0, 0.0, 1.0]);

    for _ in 0..20 {
        app.state
            .personalization
            .record_usage(7, &["databases".to_string()], None)
            .await
            .unwrap();
    }

    // databases sits last in the LLM order (base 0.1) but picks up the
    // full personalization, recency and popularity terms (+0.8), enough
    // to pass the middle candidate (base 0.55) but not the top one.
    let tags = app
        .state
        .personalization
        .personalize_tags(&candidates(&["networking", "caching", "databases"]), 7, 3)
        .await
        .unwrap();

    assert_eq!(tags, vec!["networking", "databases", "caching"]);
}

#[tokio::test]
async fn embedding_failure_degrades_that_candidate_only() {
    let app = app_with_gateway(ScriptedGateway::new().fail_embedding_for("broken")).await;

    app.gateway.set_embedding("fine", vec![1.0, 0.0]);
    app.state
        .personalization
        .record_usage(5, &["fine".to_string()], None)
        .await
        .unwrap();

    // Both candidates still score; "broken" just loses its similarity term
    let tags = app
        .state
        .personalization
        .personalize_tags(&candidates(&["fine", "broken"]), 5, 2)
        .await
        .unwrap();

    assert_eq!(tags, vec!["fine", "broken"]);
}

#[tokio::test]
async fn category_selection_returns_the_argmax() {
    let app = test_app().await;

    let category = app
        .state
        .personalization
        .personalize_category(&candidates(&["Development", "Science"]), 1)
        .await
        .unwrap();
    assert_eq!(category.unwrap(), "Development");

    let none = app
        .state
        .personalization
        .personalize_category(&[], 1)
        .await
        .unwrap();
    assert!(none.is_none());
}

#[tokio::test]
async fn record_usage_backfills_embeddings() {
    let app = test_app().await;

    app.state
        .personalization
        .record_usage(8, &["Graphs".to_string()], Some("Computer Science"))
        .await
        .unwrap();

    // One embedding per accepted entry (tag + category)
    assert_eq!(app.gateway.embed_calls(), 2);

    // A second acceptance of the same tag reuses the stored embedding
    app.state
        .personalization
        .record_usage(8, &["graphs".to_string()], None)
        .await
        .unwrap();
    assert_eq!(app.gateway.embed_calls(), 2);
}
