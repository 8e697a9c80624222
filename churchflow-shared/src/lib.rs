//! # ChurchFlow Shared Library
//!
//! Types, persistence and domain logic shared by the ChurchFlow API server,
//! the communication worker and the seed tool.
//!
//! ## Module Organization
//!
//! - `models`: tenant-scoped database models (every query takes `church_id`)
//! - `auth`: passwords, session tokens, request extractors, role checks
//! - `db`: connection pool and embedded migrations
//! - `website`: content blocks for the page builder
//! - `onboarding`: the three-step church setup wizard
//! - `offline`: offline sync contract and service worker script
//! - `plan_limits`: subscription tier limits
//! - `seed`: idempotent demo data

pub mod auth;
pub mod db;
pub mod models;
pub mod offline;
pub mod onboarding;
pub mod plan_limits;
pub mod seed;
pub mod website;

/// Current version of the ChurchFlow shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
