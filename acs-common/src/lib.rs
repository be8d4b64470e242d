//! # ACS Common Library
//!
//! Shared code for the access control service:
//! - Error type and result alias
//! - Configuration loading and root folder resolution
//! - Event types and the EventBus used for live updates
//! - SSE stream helper
//! - Database initialization
//! - Time and duration formatting helpers

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod human_time;
pub mod sse;
pub mod time;

pub use error::{Error, Result};
