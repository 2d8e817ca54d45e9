//! Async persistence gateway over the blocking repository.
//!
//! SQLite calls are synchronous; [`SqliteHistory`] moves each one onto the
//! blocking thread pool so a slow disk never stalls the async scheduler
//! servicing other sessions.

use async_trait::async_trait;
use relay_core::turns::Turn;
use tracing::instrument;

use crate::connection::ConnectionPool;
use crate::errors::{HistoryError, Result};
use crate::repo::TurnRepo;

/// Durable append/load for per-session conversation history.
///
/// `append` must not return `Ok` until the write is durable. `load` for an
/// unknown session yields an empty history.
#[async_trait]
pub trait HistoryGateway: Send + Sync {
    /// Durably append one turn to a session's history.
    async fn append(&self, session_id: &str, turn: Turn) -> Result<()>;

    /// Load a session's turns in append order.
    async fn load(&self, session_id: &str) -> Result<Vec<Turn>>;
}

/// SQLite-backed [`HistoryGateway`].
#[derive(Clone)]
pub struct SqliteHistory {
    pool: ConnectionPool,
}

impl SqliteHistory {
    /// Create a gateway over an existing pool (migrations already run).
    #[must_use]
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HistoryGateway for SqliteHistory {
    #[instrument(skip(self, turn), fields(session_id, role = turn.role.as_str()))]
    async fn append(&self, session_id: &str, turn: Turn) -> Result<()> {
        let pool = self.pool.clone();
        let session_id = session_id.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            let _ = TurnRepo::append(&conn, &session_id, &turn)?;
            Ok(())
        })
        .await
        .map_err(|e| HistoryError::Internal(format!("append task failed: {e}")))?
    }

    #[instrument(skip(self), fields(session_id))]
    async fn load(&self, session_id: &str) -> Result<Vec<Turn>> {
        let pool = self.pool.clone();
        let session_id = session_id.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            TurnRepo::load(&conn, &session_id)
        })
        .await
        .map_err(|e| HistoryError::Internal(format!("load task failed: {e}")))?
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{ConnectionConfig, new_in_memory};
    use crate::schema::run_migrations;

    fn make_store() -> SqliteHistory {
        let pool = new_in_memory(&ConnectionConfig::default()).unwrap();
        run_migrations(&pool.get().unwrap()).unwrap();
        SqliteHistory::new(pool)
    }

    #[tokio::test]
    async fn append_then_load() {
        let store = make_store();
        store.append("s1", Turn::user("hello")).await.unwrap();
        store.append("s1", Turn::assistant("Hello!")).await.unwrap();

        let turns = store.load("s1").await.unwrap();
        assert_eq!(turns, vec![Turn::user("hello"), Turn::assistant("Hello!")]);
    }

    #[tokio::test]
    async fn load_unknown_session_is_empty() {
        let store = make_store();
        assert!(store.load("nope").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrent_appends_to_distinct_sessions() {
        let store = make_store();
        let a = {
            let store = store.clone();
            tokio::spawn(async move {
                for i in 0..20 {
                    store.append("sa", Turn::user(format!("a{i}"))).await.unwrap();
                }
            })
        };
        let b = {
            let store = store.clone();
            tokio::spawn(async move {
                for i in 0..20 {
                    store.append("sb", Turn::user(format!("b{i}"))).await.unwrap();
                }
            })
        };
        a.await.unwrap();
        b.await.unwrap();

        assert_eq!(store.load("sa").await.unwrap().len(), 20);
        assert_eq!(store.load("sb").await.unwrap().len(), 20);
    }

    #[tokio::test]
    async fn trait_object_is_usable() {
        let store: std::sync::Arc<dyn HistoryGateway> = std::sync::Arc::new(make_store());
        store.append("s1", Turn::user("x")).await.unwrap();
        assert_eq!(store.load("s1").await.unwrap().len(), 1);
    }
}
