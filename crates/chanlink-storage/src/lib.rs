// SPDX-FileCopyrightText: 2026 Chanlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Registry backends for the chanlink delivery system.
//!
//! [`MemoryRegistry`] keeps everything in process. [`SqliteRegistry`] stores
//! channels, participants and both message lanes in a WAL-mode SQLite file
//! with embedded migrations, all writes serialized through `tokio-rusqlite`.

pub mod database;
pub mod memory;
pub mod migrations;
pub mod queries;
pub mod sqlite;

use std::sync::Arc;

use chanlink_config::{StorageBackend, StorageConfig};
use chanlink_core::{ChanlinkError, Registry};
use tracing::info;

pub use database::Database;
pub use memory::MemoryRegistry;
pub use sqlite::SqliteRegistry;

/// Open the registry selected by `config`.
pub async fn open_registry(config: &StorageConfig) -> Result<Arc<dyn Registry>, ChanlinkError> {
    match config.backend {
        StorageBackend::Memory => {
            info!(backend = "memory", "registry ready");
            Ok(Arc::new(MemoryRegistry::new()))
        }
        StorageBackend::Sqlite => {
            let registry = SqliteRegistry::open(&config.database_path).await?;
            info!(backend = "sqlite", path = %config.database_path, "registry ready");
            Ok(Arc::new(registry))
        }
    }
}
