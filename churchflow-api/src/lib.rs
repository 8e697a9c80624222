//! # ChurchFlow API Server Library
//!
//! HTTP surface of ChurchFlow, a multi-tenant church administration service.
//!
//! ## Modules
//!
//! - `app`: application state and router builder
//! - `config`: configuration from the environment
//! - `error`: error handling and HTTP response mapping
//! - `middleware`: module gate, public rate limiting, security headers
//! - `routes`: route handlers
//! - `session`: session cookie helpers

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod session;
