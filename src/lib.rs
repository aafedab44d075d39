//! eventdesk library
//!
//! Conversational intake and moderation for community event listings:
//! guided submission flows, an admin review queue, publishing to a public
//! venue, and day-based search.

pub mod cli;
pub mod config;
pub mod flows;
pub mod jobs;
pub mod models;
pub mod moderation;
pub mod render;
pub mod routing;
pub mod staging;
pub mod store;
pub mod transport;

#[cfg(test)]
mod testutil;
