/// Database layer
///
/// - `pool`: PostgreSQL connection pool with health check
/// - `migrations`: embedded migration runner
///
/// Queries live next to the models in [`crate::models`]; the Postgres store
/// in [`crate::store::postgres`] composes them into transactions.

pub mod migrations;
pub mod pool;
