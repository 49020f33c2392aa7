//! Bounded-concurrency execution of playlist backend scripts.
//!
//! Every backend operation (channel lookups, EPG refreshes, playlist
//! rebuilds) runs as an interpreter process. [`services::TaskQueue`] caps how
//! many of those run at once, queues the rest in arrival order and gives
//! each task exactly one outcome.

pub mod config;
pub mod errors;
pub mod services;
pub mod web;
