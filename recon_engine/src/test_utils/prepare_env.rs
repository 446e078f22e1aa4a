use std::{io::ErrorKind, path::PathBuf};

use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};

use crate::SqliteDatabase;

pub async fn prepare_test_env(url: &str) {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    debug!("🚀️ Logging initialised");
    create_database(url).await;
    run_migrations(url).await;
}

pub fn random_db_path() -> String {
    let dir = std::env::temp_dir();
    format!("sqlite://{}/recon_test_{}.db", dir.display(), rand::random::<u64>())
}

/// A fresh, migrated database. The files are deleted when the returned [`TempDatabase`] is dropped, so keep it
/// alive for the length of the test.
pub async fn temporary_database() -> (SqliteDatabase, TempDatabase) {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 1).await.expect("Error creating test database");
    (db, TempDatabase::new(&url))
}

pub async fn run_migrations(url: &str) {
    let db = SqliteDatabase::new_with_url(url, 5).await.expect("Error creating connection to database");
    db.migrate().await.expect("Error running DB migrations");
    db.close().await;
    info!("🚀️ Migrations complete");
}

pub async fn create_database(url: &str) {
    if let Err(e) = Sqlite::drop_database(url).await {
        trace!("Nothing to drop at {url}: {e:?}");
    }
    Sqlite::create_database(url).await.expect("Error creating database");
    info!("Created Sqlite database {url}");
}

/// Deletes a test database, along with its journal files, when dropped. Runs whether the test passed or panicked.
#[derive(Debug)]
pub struct TempDatabase {
    path: PathBuf,
}

impl TempDatabase {
    pub fn new(url: &str) -> Self {
        Self { path: PathBuf::from(url.trim_start_matches("sqlite://")) }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl Drop for TempDatabase {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm", "-journal"] {
            let mut file = self.path.clone().into_os_string();
            file.push(suffix);
            match std::fs::remove_file(&file) {
                Ok(()) => trace!("🚀️ Removed {}", file.to_string_lossy()),
                Err(e) if e.kind() == ErrorKind::NotFound => {},
                Err(e) => warn!("🚀️ Could not remove {}: {e}", file.to_string_lossy()),
            }
        }
    }
}
