//! Durable checkpointing of pipeline state, keyed by thread id.
//!
//! The full [`PipelineState`] is serialized as JSON; the step and error
//! columns are denormalized so `status` listings never deserialize whole
//! states. Checkpoints are strictly namespaced by thread id, so
//! independent threads can share one database.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::state::{PipelineState, RunStatus, Step};

/// One row of a `status` listing.
#[derive(Debug, Clone)]
pub struct ThreadSummary {
    pub thread_id: String,
    pub url: String,
    pub step: Step,
    pub error: Option<String>,
    /// Unix seconds of the last checkpoint write.
    pub updated_at: i64,
}

impl ThreadSummary {
    pub fn status(&self) -> RunStatus {
        if self.error.is_some() {
            RunStatus::Failed
        } else if self.step == Step::Done {
            RunStatus::Done
        } else {
            RunStatus::Pending
        }
    }
}

/// Trait for checkpoint stores.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Load the last checkpoint for a thread, if any.
    async fn load(&self, thread_id: &str) -> Result<Option<PipelineState>>;

    /// Durably record the state for a thread, replacing any prior
    /// checkpoint.
    async fn save(&self, thread_id: &str, state: &PipelineState) -> Result<()>;

    /// Summaries of all known threads, most recently updated first.
    async fn list(&self) -> Result<Vec<ThreadSummary>>;
}

// ============ SQLite store ============

/// Checkpoint store persisting to the shared SQLite database.
pub struct SqliteCheckpointStore {
    pool: SqlitePool,
}

impl SqliteCheckpointStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn load(&self, thread_id: &str) -> Result<Option<PipelineState>> {
        let row: Option<String> =
            sqlx::query_scalar("SELECT state FROM checkpoints WHERE thread_id = ?")
                .bind(thread_id)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some(json) => {
                let state: PipelineState = serde_json::from_str(&json)
                    .with_context(|| format!("Corrupt checkpoint for thread {}", thread_id))?;
                Ok(Some(state))
            }
            None => Ok(None),
        }
    }

    async fn save(&self, thread_id: &str, state: &PipelineState) -> Result<()> {
        let json = serde_json::to_string(state)?;
        sqlx::query(
            r#"
            INSERT INTO checkpoints (thread_id, url, step, error, state, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(thread_id) DO UPDATE SET
                url = excluded.url,
                step = excluded.step,
                error = excluded.error,
                state = excluded.state,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(thread_id)
        .bind(&state.url)
        .bind(state.current_step.as_str())
        .bind(&state.error)
        .bind(&json)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list(&self) -> Result<Vec<ThreadSummary>> {
        let rows = sqlx::query(
            "SELECT thread_id, url, step, error, updated_at FROM checkpoints \
             ORDER BY updated_at DESC, thread_id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut summaries = Vec::with_capacity(rows.len());
        for row in &rows {
            let step_str: String = row.get("step");
            let step = step_str
                .parse::<Step>()
                .map_err(|e| anyhow::anyhow!("Corrupt checkpoint row: {}", e))?;
            summaries.push(ThreadSummary {
                thread_id: row.get("thread_id"),
                url: row.get("url"),
                step,
                error: row.get("error"),
                updated_at: row.get("updated_at"),
            });
        }

        Ok(summaries)
    }
}

// ============ In-memory store ============

/// In-memory checkpoint store for tests.
#[derive(Default)]
pub struct InMemoryCheckpointStore {
    states: RwLock<HashMap<String, (PipelineState, i64)>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn load(&self, thread_id: &str) -> Result<Option<PipelineState>> {
        Ok(self
            .states
            .read()
            .unwrap()
            .get(thread_id)
            .map(|(state, _)| state.clone()))
    }

    async fn save(&self, thread_id: &str, state: &PipelineState) -> Result<()> {
        self.states.write().unwrap().insert(
            thread_id.to_string(),
            (state.clone(), chrono::Utc::now().timestamp()),
        );
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ThreadSummary>> {
        let states = self.states.read().unwrap();
        let mut summaries: Vec<ThreadSummary> = states
            .iter()
            .map(|(thread_id, (state, updated_at))| ThreadSummary {
                thread_id: thread_id.clone(),
                url: state.url.clone(),
                step: state.current_step,
                error: state.error.clone(),
                updated_at: *updated_at,
            })
            .collect();
        summaries.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then(a.thread_id.cmp(&b.thread_id))
        });
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CalendarConfig;
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use std::str::FromStr;

    fn make_state(thread_id: &str, url: &str) -> PipelineState {
        PipelineState::new(
            thread_id.to_string(),
            url.to_string(),
            CalendarConfig::default(),
            None,
            None,
            "output".into(),
            vec!["markdown".to_string()],
            50,
        )
    }

    #[tokio::test]
    async fn test_memory_store_namespaces_threads() {
        let store = InMemoryCheckpointStore::new();
        let a = make_state("a", "https://www.youtube.com/@a");
        let mut b = make_state("b", "https://www.youtube.com/@b");
        b.error = Some("boom".to_string());

        store.save("a", &a).await.unwrap();
        store.save("b", &b).await.unwrap();

        let loaded_a = store.load("a").await.unwrap().unwrap();
        let loaded_b = store.load("b").await.unwrap().unwrap();
        assert_eq!(loaded_a.url, "https://www.youtube.com/@a");
        assert_eq!(loaded_b.error.as_deref(), Some("boom"));
        assert!(store.load("c").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sqlite_store_roundtrip_and_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoints.db");
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .unwrap()
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap();
        crate::migrate::apply_schema(&pool).await.unwrap();

        let store = SqliteCheckpointStore::new(pool.clone());
        let mut state = make_state("t1", "https://www.tiktok.com/@x");
        store.save("t1", &state).await.unwrap();

        // Second save for the same thread replaces, not duplicates
        state.current_step = Step::Strategize;
        store.save("t1", &state).await.unwrap();

        let loaded = store.load("t1").await.unwrap().unwrap();
        assert_eq!(loaded.current_step, Step::Strategize);

        let summaries = store.list().await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].thread_id, "t1");
        assert_eq!(summaries[0].step, Step::Strategize);
        assert_eq!(summaries[0].status(), RunStatus::Pending);

        pool.close().await;
    }
}
