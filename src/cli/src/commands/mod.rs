//! CLI command implementations.

pub mod bounty;
pub mod config;
pub mod events;
pub mod health;
