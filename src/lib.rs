//! Ticket Resolver — support-ticket lifecycle automation.

pub mod classify;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod llm;
pub mod mail;
pub mod reply;
pub mod server;
pub mod store;
pub mod ticket;
