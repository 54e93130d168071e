//! Database migration support.
//!
//! Embeds the SQL migrations under `centinela_core/migrations/` (ledger,
//! roles, users, learning-platform users, API keys).

use sqlx::PgPool;

/// Run all embedded database migrations against the given pool.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
