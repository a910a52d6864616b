//! HTTP API: configuration, authentication, routing and module wiring.

pub mod app;
pub mod config;
pub mod jwt;
pub mod middleware;
pub mod modules;
