/// Database layer
///
/// - `pool`: connection pool construction and health checks
/// - `migrations`: embedded schema migrations
///
/// Row types and their queries live in `crate::models`.

pub mod migrations;
pub mod pool;
