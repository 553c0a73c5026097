/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Database connection management.
//!
//! This module provides an async connection pool implementation using
//! `deadpool-diesel` for managing SQLite connections. It handles connection
//! pooling, connection lifecycle, and provides a thread-safe way to access
//! database connections.
//!
//! # Example
//!
//! ```rust,ignore
//! use sluice::database::Database;
//!
//! let db = Database::new("path/to/sluice.db", "", 1);
//! db.run_migrations().await?;
//! ```

use deadpool_diesel::sqlite::{Manager, Object, Pool, Runtime};
use tracing::info;

/// A pool of database connections.
///
/// This struct is `Clone` and can be safely shared between tasks; each
/// clone references the same underlying pool.
#[derive(Clone)]
pub struct Database {
    pool: Pool,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Database(...)")
    }
}

impl Database {
    /// Creates a new database connection pool.
    ///
    /// Connection strings may be a file path, `:memory:`, a `sqlite://`
    /// URL, or a `file:` URI (e.g. `file:test?mode=memory&cache=shared`).
    ///
    /// # Arguments
    ///
    /// * `connection_string` - The database path or URL
    /// * `_database_name` - Unused, kept for interface symmetry with
    ///   server-based backends
    /// * `_max_size` - Requested pool size; SQLite always uses a single
    ///   connection
    ///
    /// # Panics
    ///
    /// Panics if the connection pool cannot be created.
    pub fn new(connection_string: &str, _database_name: &str, _max_size: u32) -> Self {
        let connection_url = Self::build_sqlite_url(connection_string);
        let manager = Manager::new(connection_url, Runtime::Tokio1);
        // SQLite has limited concurrent write support even with WAL mode.
        // Using a single connection avoids "database is locked" errors.
        let pool_size = 1;
        let pool = Pool::builder(manager)
            .max_size(pool_size)
            .build()
            .expect("Failed to create SQLite connection pool");

        info!("SQLite connection pool initialized (size: {})", pool_size);

        Self { pool }
    }

    /// Gets a connection from the pool.
    pub async fn get_connection(
        &self,
    ) -> Result<Object, deadpool::managed::PoolError<deadpool_diesel::Error>> {
        self.pool.get().await
    }

    /// Builds a SQLite connection URL.
    fn build_sqlite_url(connection_string: &str) -> String {
        // Strip sqlite:// prefix if present
        if let Some(path) = connection_string.strip_prefix("sqlite://") {
            path.to_string()
        } else {
            connection_string.to_string()
        }
    }

    /// Runs pending database migrations.
    ///
    /// Also sets the WAL and busy_timeout pragmas, so this should be called
    /// once at startup before any other operation.
    pub async fn run_migrations(&self) -> Result<(), String> {
        use diesel::prelude::*;
        use diesel_migrations::MigrationHarness;

        let conn = self.pool.get().await.map_err(|e| e.to_string())?;
        conn.interact(|conn| {
            // WAL mode allows concurrent reads during writes
            diesel::sql_query("PRAGMA journal_mode=WAL;")
                .execute(conn)
                .map_err(|e| format!("Failed to set WAL mode: {}", e))?;
            // busy_timeout makes SQLite wait instead of immediately failing on locks
            diesel::sql_query("PRAGMA busy_timeout=30000;")
                .execute(conn)
                .map_err(|e| format!("Failed to set busy_timeout: {}", e))?;

            conn.run_pending_migrations(crate::database::MIGRATIONS)
                .map_err(|e| format!("Failed to run migrations: {}", e))?;
            Ok::<_, String>(())
        })
        .await
        .map_err(|e| format!("Failed to run migrations: {}", e))??;

        info!("Database migrations applied");
        Ok(())
    }
}
