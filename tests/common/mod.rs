//! Common test utilities

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Setup test database - connect and apply migrations.
///
/// Returns `None` when `DATABASE_URL` is not set so database tests skip.
/// Tests run in parallel against the same tables, so each one works on
/// wallets with fresh uuids instead of truncating.
pub async fn setup_test_db() -> Option<PgPool> {
    dotenvy::dotenv().ok();
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping database test");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    wallet_service::db::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    Some(pool)
}

/// A wallet uuid no other test uses
pub fn fresh_wallet() -> String {
    uuid::Uuid::new_v4().to_string()
}
