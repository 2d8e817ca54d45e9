//! Turn repository — stateless, every method takes `&Connection`.

use relay_core::turns::{Role, Turn};
use rusqlite::{Connection, params};

use crate::errors::{HistoryError, Result};

/// Turn repository.
pub struct TurnRepo;

impl TurnRepo {
    /// Append a turn to a session's history. Returns the rowid.
    pub fn append(conn: &Connection, session_id: &str, turn: &Turn) -> Result<i64> {
        let now = chrono::Utc::now().to_rfc3339();
        let _ = conn.execute(
            "INSERT INTO turns (session_id, role, content, error, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![session_id, turn.role.as_str(), turn.content, turn.error, now],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Load a session's turns in append order.
    ///
    /// A session identifier never seen before yields an empty vec, not an
    /// error.
    pub fn load(conn: &Connection, session_id: &str) -> Result<Vec<Turn>> {
        let mut stmt = conn.prepare(
            "SELECT role, content, error FROM turns WHERE session_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![session_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
            ))
        })?;

        let mut turns = Vec::new();
        for row in rows {
            let (role, content, error) = row?;
            let role = Role::parse(&role)
                .ok_or_else(|| HistoryError::Corrupt(format!("unknown role '{role}'")))?;
            turns.push(Turn {
                role,
                content,
                error,
            });
        }
        Ok(turns)
    }

    /// Number of turns recorded for a session.
    pub fn count(conn: &Connection, session_id: &str) -> Result<i64> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM turns WHERE session_id = ?1",
            params![session_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Delete a session's history. Returns the number of rows removed.
    pub fn delete_session(conn: &Connection, session_id: &str) -> Result<usize> {
        let removed = conn.execute(
            "DELETE FROM turns WHERE session_id = ?1",
            params![session_id],
        )?;
        Ok(removed)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
