//! SQLite schema and initialization

pub mod init;
pub mod migrations;

pub use init::{create_schema, init_database};
pub use migrations::{get_schema_version, run_migrations};
