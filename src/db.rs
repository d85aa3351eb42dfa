//! Global database connection pool
//!
//! The pool is established once at startup and shared for the lifetime of
//! the process. Handlers reach it through `get_db_pool()`; library code
//! that wants to be testable takes a `&DatabaseConnection` parameter
//! instead.

use once_cell::sync::OnceCell;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};

static DB_POOL: OnceCell<DatabaseConnection> = OnceCell::new();

/// Connect to the database and install the global pool.
/// Panics if the connection fails or if called twice; both are startup bugs.
pub async fn init_db(url: String) {
    let mut options = ConnectOptions::new(url);
    options.sqlx_logging(false);

    let pool = Database::connect(options)
        .await
        .expect("Failed to connect to database");

    DB_POOL
        .set(pool)
        .expect("init_db() may only be called once");
}

/// Borrow the global connection pool.
pub fn get_db_pool() -> &'static DatabaseConnection {
    DB_POOL.get().expect("Database pool is not initialized")
}
