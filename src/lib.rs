pub mod api;
pub mod classify;
pub mod config;
pub mod error;
pub mod metrics;
pub mod notes;
pub mod profile;
pub mod registry;
pub mod tail;
pub mod watch;
