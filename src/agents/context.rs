//! Per-execution agent context and session-scoped shared state.
//!
//! A context is created per routed request, handed to every agent in
//! the chain, and cleaned up on scope exit. Shared data and execution
//! history for one session are serialized through that session's mutex.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::{Result, UserModelPreferences};

pub const DEFAULT_CONTEXT_MAX_AGE_HOURS: i64 = 24;

/// Immutable per-request context handed to agents. Mutable shared state
/// lives in the manager, scoped by `session_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentContext {
    pub user_id: i64,
    pub board_id: Option<i64>,
    pub topic_id: Option<i64>,
    pub session_id: String,
    pub task_type: String,
    /// Task complexity, clamped into 1..=5.
    pub complexity: u8,
    pub user_preferences: UserModelPreferences,
    pub reference_materials: Vec<String>,
}

/// One finished agent execution inside a session.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionRecord {
    pub agent_name: String,
    pub timestamp: DateTime<Utc>,
    pub execution_time_ms: i64,
    pub wtu_consumed: i64,
    pub success: bool,
    pub result_summary: String,
}

/// Aggregated metrics snapshot for a session.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ContextMetrics {
    pub total_agents_executed: usize,
    pub total_wtu_consumed: i64,
    pub total_execution_time_ms: i64,
    pub success_rate: f64,
    pub avg_execution_time_ms: f64,
    pub avg_wtu_per_agent: f64,
    pub agents_executed: Vec<String>,
    pub context_age_seconds: f64,
}

struct SessionData {
    context: AgentContext,
    created_at: DateTime<Utc>,
    shared_data: HashMap<String, Value>,
    history: Vec<ExecutionRecord>,
}

impl SessionData {
    fn metrics(&self) -> ContextMetrics {
        let total = self.history.len();
        let total_wtu: i64 = self.history.iter().map(|r| r.wtu_consumed).sum();
        let total_time: i64 = self.history.iter().map(|r| r.execution_time_ms).sum();
        let successes = self.history.iter().filter(|r| r.success).count();

        ContextMetrics {
            total_agents_executed: total,
            total_wtu_consumed: total_wtu,
            total_execution_time_ms: total_time,
            success_rate: if total > 0 {
                successes as f64 / total as f64
            } else {
                0.0
            },
            avg_execution_time_ms: if total > 0 {
                total_time as f64 / total as f64
            } else {
                0.0
            },
            avg_wtu_per_agent: if total > 0 {
                total_wtu as f64 / total as f64
            } else {
                0.0
            },
            agents_executed: self.history.iter().map(|r| r.agent_name.clone()).collect(),
            context_age_seconds: (Utc::now() - self.created_at).num_milliseconds() as f64 / 1000.0,
        }
    }
}

/// Options for context creation.
#[derive(Debug, Clone, Default)]
pub struct ContextOptions {
    pub board_id: Option<i64>,
    pub topic_id: Option<i64>,
    pub complexity: u8,
    pub user_preferences: Option<UserModelPreferences>,
    pub reference_materials: Vec<String>,
    pub session_id: Option<String>,
}

#[derive(Default)]
pub struct AgentContextManager {
    sessions: Mutex<HashMap<String, Arc<tokio::sync::Mutex<SessionData>>>>,
}

impl AgentContextManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create_context(
        &self,
        user_id: i64,
        task_type: &str,
        options: ContextOptions,
    ) -> AgentContext {
        let session_id = options
            .session_id
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let context = AgentContext {
            user_id,
            board_id: options.board_id,
            topic_id: options.topic_id,
            session_id: session_id.clone(),
            task_type: task_type.to_string(),
            complexity: options.complexity.clamp(1, 5),
            user_preferences: options
                .user_preferences
                .unwrap_or_else(UserModelPreferences::balanced),
            reference_materials: options.reference_materials,
        };

        let data = SessionData {
            context: context.clone(),
            created_at: Utc::now(),
            shared_data: HashMap::new(),
            history: Vec::new(),
        };

        self.sessions
            .lock()
            .expect("session map poisoned")
            .insert(session_id.clone(), Arc::new(tokio::sync::Mutex::new(data)));

        info!(%session_id, user_id, task_type, "Created agent context");
        context
    }

    fn session(&self, session_id: &str) -> Option<Arc<tokio::sync::Mutex<SessionData>>> {
        self.sessions
            .lock()
            .expect("session map poisoned")
            .get(session_id)
            .cloned()
    }

    pub async fn get_context(&self, session_id: &str) -> Option<AgentContext> {
        let session = self.session(session_id)?;
        let data = session.lock().await;
        Some(data.context.clone())
    }

    pub async fn share_data(&self, session_id: &str, key: &str, value: Value) -> bool {
        let Some(session) = self.session(session_id) else {
            warn!(session_id, "Context not found for data sharing");
            return false;
        };
        let mut data = session.lock().await;
        data.shared_data.insert(key.to_string(), value);
        debug!(session_id, key, "Shared data in context");
        true
    }

    pub async fn get_shared_data(&self, session_id: &str, key: &str) -> Option<Value> {
        let session = self.session(session_id)?;
        let data = session.lock().await;
        data.shared_data.get(key).cloned()
    }

    pub async fn record_agent_execution(
        &self,
        session_id: &str,
        agent_name: &str,
        execution_time_ms: i64,
        wtu_consumed: i64,
        success: bool,
        result_summary: &str,
    ) -> bool {
        let Some(session) = self.session(session_id) else {
            return false;
        };
        let mut data = session.lock().await;
        data.history.push(ExecutionRecord {
            agent_name: agent_name.to_string(),
            timestamp: Utc::now(),
            execution_time_ms,
            wtu_consumed,
            success,
            result_summary: result_summary.to_string(),
        });
        debug!(session_id, agent_name, "Recorded agent execution");
        true
    }

    /// Consistent snapshot; taken under the session mutex so it never
    /// interleaves with an in-flight `record_agent_execution`.
    pub async fn get_context_metrics(&self, session_id: &str) -> Option<ContextMetrics> {
        let session = self.session(session_id)?;
        let data = session.lock().await;
        Some(data.metrics())
    }

    /// Remove the session, logging its final metrics. Idempotent.
    pub async fn cleanup_context(&self, session_id: &str) -> bool {
        let removed = self
            .sessions
            .lock()
            .expect("session map poisoned")
            .remove(session_id);

        match removed {
            Some(session) => {
                let data = session.lock().await;
                let metrics = data.metrics();
                info!(
                    session_id,
                    agents = metrics.total_agents_executed,
                    wtu = metrics.total_wtu_consumed,
                    success_rate = metrics.success_rate,
                    "Cleaning up context"
                );
                true
            }
            None => false,
        }
    }

    pub fn active_session_ids(&self) -> Vec<String> {
        self.sessions
            .lock()
            .expect("session map poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// Janitor sweep: clean up sessions older than `max_age`.
    pub async fn cleanup_expired(&self, max_age: chrono::Duration) -> usize {
        let cutoff = Utc::now() - max_age;
        let mut expired = Vec::new();

        {
            let sessions = self.sessions.lock().expect("session map poisoned");
            for (id, session) in sessions.iter() {
                if let Ok(data) = session.try_lock() {
                    if data.created_at < cutoff {
                        expired.push(id.clone());
                    }
                }
            }
        }

        let mut cleaned = 0;
        for session_id in expired {
            if self.cleanup_context(&session_id).await {
                cleaned += 1;
            }
        }

        if cleaned > 0 {
            info!(cleaned, "Cleaned up expired contexts");
        }
        cleaned
    }

    /// Background janitor; sweeps until the handle is aborted.
    pub fn spawn_janitor(
        self: Arc<Self>,
        interval: Duration,
        max_age: chrono::Duration,
    ) -> tokio::task::JoinHandle<()> {
        let manager = self;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                manager.cleanup_expired(max_age).await;
            }
        })
    }

    /// Scoped context: creates, runs `f`, and guarantees cleanup on
    /// success, error, and cancellation alike.
    pub async fn with_context<F, Fut, T>(
        self: Arc<Self>,
        user_id: i64,
        task_type: &str,
        options: ContextOptions,
        f: F,
    ) -> Result<T>
    where
        F: FnOnce(AgentContext) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let context = self.create_context(user_id, task_type, options).await;
        let session_id = context.session_id.clone();

        // The guard covers the cancellation path; the explicit cleanup
        // below covers the ordinary ones and disarms it.
        let mut guard = ContextGuard {
            manager: Arc::clone(&self),
            session_id: Some(session_id.clone()),
        };

        let result = f(context).await;

        guard.session_id = None;
        self.cleanup_context(&session_id).await;

        result
    }
}

struct ContextGuard {
    manager: Arc<AgentContextManager>,
    session_id: Option<String>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        if let Some(session_id) = self.session_id.take() {
            let manager = Arc::clone(&self.manager);
            tokio::spawn(async move {
                manager.cleanup_context(&session_id).await;
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_shared_data_roundtrip() {
        let manager = AgentContextManager::new();
        let context = manager
            .create_context(1, "board_analysis", ContextOptions::default())
            .await;

        assert!(
            manager
                .share_data(&context.session_id, "key", json!({"a": 1}))
                .await
        );
        let value = manager
            .get_shared_data(&context.session_id, "key")
            .await
            .unwrap();
        assert_eq!(value, json!({"a": 1}));

        assert!(manager.get_shared_data(&context.session_id, "other").await.is_none());
        assert!(!manager.share_data("missing", "key", json!(1)).await);
    }

    #[tokio::test]
    async fn test_metrics_aggregation() {
        let manager = AgentContextManager::new();
        let context = manager
            .create_context(1, "summary", ContextOptions::default())
            .await;

        manager
            .record_agent_execution(&context.session_id, "a", 100, 3, true, "ok")
            .await;
        manager
            .record_agent_execution(&context.session_id, "b", 300, 5, false, "boom")
            .await;

        let metrics = manager
            .get_context_metrics(&context.session_id)
            .await
            .unwrap();
        assert_eq!(metrics.total_agents_executed, 2);
        assert_eq!(metrics.total_wtu_consumed, 8);
        assert_eq!(metrics.total_execution_time_ms, 400);
        assert!((metrics.success_rate - 0.5).abs() < 1e-9);
        assert_eq!(metrics.agents_executed, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_with_context_cleans_up_on_success_and_error() {
        let manager = Arc::new(AgentContextManager::new());

        let seen_id = Arc::clone(&manager)
            .with_context(1, "summary", ContextOptions::default(), |ctx| async move {
                Ok(ctx.session_id)
            })
            .await
            .unwrap();
        assert!(manager.get_context(&seen_id).await.is_none());

        let err: Result<()> = Arc::clone(&manager)
            .with_context(1, "summary", ContextOptions::default(), |_| async move {
                Err(crate::domain::ClipOpsError::internal("boom"))
            })
            .await;
        assert!(err.is_err());
        assert!(manager.active_session_ids().is_empty());
    }

    #[tokio::test]
    async fn test_with_context_cleans_up_on_cancellation() {
        let manager = Arc::new(AgentContextManager::new());
        let inner = Arc::clone(&manager);

        let handle = tokio::spawn(async move {
            inner
                .with_context(1, "summary", ContextOptions::default(), |_| async move {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(())
                })
                .await
        });

        // Let the context get created, then cancel the task
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(manager.active_session_ids().len(), 1);
        handle.abort();
        let _ = handle.await;

        // The drop guard spawns cleanup; give it a moment
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(manager.active_session_ids().is_empty());
    }

    #[tokio::test]
    async fn test_expired_context_sweep() {
        let manager = AgentContextManager::new();
        manager.create_context(1, "summary", ContextOptions::default()).await;

        // Nothing is older than a day yet
        assert_eq!(manager.cleanup_expired(chrono::Duration::hours(24)).await, 0);
        // Everything is older than "zero seconds ago"
        assert_eq!(manager.cleanup_expired(chrono::Duration::zero()).await, 1);
    }

    #[tokio::test]
    async fn test_complexity_is_clamped() {
        let manager = AgentContextManager::new();
        let context = manager
            .create_context(
                1,
                "summary",
                ContextOptions {
                    complexity: 9,
                    ..Default::default()
                },
            )
            .await;
        assert_eq!(context.complexity, 5);
    }
}
