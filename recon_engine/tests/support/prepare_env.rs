use log::*;
use recon_engine::SqliteDatabase;
use sqlx::{migrate::MigrateDatabase, Sqlite};

pub fn random_db_path() -> String {
    let dir = std::env::temp_dir();
    format!("sqlite://{}/recon_cucumber_{}.db", dir.display(), rand::random::<u64>())
}

/// Creates a fresh, migrated database and returns its URL.
pub async fn prepare_test_env() -> String {
    let url = random_db_path();
    if Sqlite::database_exists(&url).await.unwrap_or(false) {
        Sqlite::drop_database(&url).await.expect("Error dropping stale database");
    }
    Sqlite::create_database(&url).await.expect("Error creating database");
    let db = SqliteDatabase::new_with_url(&url, 1).await.expect("Error creating connection to database");
    db.migrate().await.expect("Error running DB migrations");
    db.close().await;
    debug!("🚀️ Created test database {url}");
    url
}
