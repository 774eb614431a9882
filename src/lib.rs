//! Walk tracking: elapsed time, GPS distance and step counting behind a
//! single session tracker, plus the account backend and offline cache that
//! ship alongside it.
pub mod api;
pub mod app_dirs;
pub mod bridge;
pub mod config;
pub mod error;
pub mod geo;
pub mod identity;
pub mod motion;
pub mod offline;
pub mod path;
pub mod runtime;
pub mod server;
pub mod session;
pub mod store;
pub mod trace;
pub mod tracker;
