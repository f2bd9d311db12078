//! Fan-out Hub - spectator streaming
//!
//! One component, three concerns bound by a shared connection registry: the
//! binary frame channel at `/stream`, the structured event channel at `/ws`,
//! and the circular history buffers that hydrate a fresh connection without
//! waiting for the next window.

pub mod cache;
pub mod hub;
pub mod messages;
pub mod server;

#[cfg(test)]
mod tests;

pub use hub::{HubConfig, StreamHub};
pub use messages::WireMessage;
pub use server::router;
