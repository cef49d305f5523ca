/// Database layer
///
/// # Modules
///
/// - `pool`: Postgres connection pool with health checks
/// - `migrations`: Embedded schema migrations
///
/// Table access lives in `crate::models`; the trait-facing adapters are in
/// `crate::store::postgres`.

pub mod migrations;
pub mod pool;
