//! Berth - filter-and-weigh placement for share backends
//!
//! This library chooses a backend pool for a new share, replica or share
//! group. Candidate pools come from a [`host::HostStateProvider`], pass an
//! ordered chain of filters, are ranked by a chain of weighers, and the
//! winner's capacity is debited in memory.

pub mod cli;
pub mod config;
pub mod host;
pub mod logging;
pub mod scheduler;
