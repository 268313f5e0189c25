//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod in_memory_access_repository;
mod in_memory_user_directory;
mod postgres_access_repository;
mod postgres_user_directory;

pub use in_memory_access_repository::InMemoryAccessRepository;
pub use in_memory_user_directory::InMemoryUserDirectory;
pub use postgres_access_repository::PostgresAccessRepository;
pub use postgres_user_directory::PostgresUserDirectory;

/// Embedded SQL migrations for the access schema.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
