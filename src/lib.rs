//! Generic table CRUD over HTTP, backed by a single SQLite file.
//!
//! Requests such as `/get/oximeter/user_id/3/filter/(temperature > '100.4')`
//! are translated into parameterized statements by [sqlite],
//! dispatched by [action] and served by [server].

pub mod action;
pub mod config;
pub mod credential;
pub mod server;
pub mod sqlite;
pub mod store;

pub use rusqlite::{types, Connection};
pub use serde_json;
