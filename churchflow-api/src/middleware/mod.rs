/// Custom middleware
///
/// - `security`: response security headers
/// - `rate_limit`: in-memory token bucket for public submissions
/// - `modules`: 404s routes of modules a church has switched off

pub mod modules;
pub mod rate_limit;
pub mod security;
