//! Activity event API: an in-memory activity store, its HTTP surface, and
//! the hook that hands new activities to real-time subscribers.

pub mod activities;
pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod notifier;
pub mod server;
