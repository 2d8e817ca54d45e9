//! # relay-core
//!
//! Foundation types and the client wire contract for the relay service.
//!
//! This crate provides the shared vocabulary that all other relay crates
//! depend on:
//!
//! - **Turns**: [`turns::Turn`] conversation entries with an explicit
//!   failure marker, and [`turns::Role`]
//! - **Frames**: [`frames::InboundFrame`] / [`frames::OutboundFrame`] —
//!   the structured messages exchanged with a connected client
//! - **Error kinds**: [`frames::ErrorKind`] — the client-visible error
//!   taxonomy carried by error frames
//! - **Logging**: [`logging::init`] tracing subscriber setup
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by all other relay crates.

#![deny(unsafe_code)]

pub mod frames;
pub mod logging;
pub mod turns;
