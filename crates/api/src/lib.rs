//! HTTP API: gates, routing, handlers and the realtime socket.

pub mod app;
pub mod config;
pub mod context;
pub mod cookies;
pub mod middleware;
pub mod rate_limit;
