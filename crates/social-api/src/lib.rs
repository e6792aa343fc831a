//! HTTP adapter for the social graph service.

pub mod config;
pub mod server;
