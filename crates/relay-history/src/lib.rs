//! # relay-history
//!
//! SQLite-backed conversation history for the relay service.
//!
//! The persistence contract: `append(session_id, turn)` is durable before
//! it returns (WAL + `synchronous=FULL`), and `load(session_id)` returns a
//! session's turns in append order — empty for a session never seen.
//!
//! Layers:
//! - [`connection`]: r2d2 pool construction + pragma discipline
//! - [`schema`]: idempotent migrations
//! - [`repo`]: stateless [`repo::TurnRepo`], every method takes `&Connection`
//! - [`store`]: async [`store::HistoryGateway`] trait and the
//!   [`store::SqliteHistory`] implementation (`spawn_blocking` per call)

#![deny(unsafe_code)]

pub mod connection;
pub mod errors;
pub mod repo;
pub mod schema;
pub mod store;

pub use connection::{ConnectionConfig, ConnectionPool, PooledConnection, new_file, new_in_memory};
pub use errors::{HistoryError, Result};
pub use repo::TurnRepo;
pub use schema::run_migrations;
pub use store::{HistoryGateway, SqliteHistory};
