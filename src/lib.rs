//! Document store and generic REST API behind the campus website.
//!
//! Records live in named collections of an embedded store (`engine`, `collection`,
//! `wal`). The `http` module exposes every registered table under `/api/:table`, with
//! query-string filters translated by `query::translate` and batch upserts resolved by
//! `upsert`.

pub mod cli;
pub mod collection;
pub mod config;
pub mod document;
pub mod engine;
pub mod errors;
pub mod http;
pub mod identity;
pub mod logger;
pub mod query;
pub mod registry;
pub mod storage;
pub mod telemetry;
pub mod types;
pub mod upsert;
pub mod utils;
pub mod wal;
