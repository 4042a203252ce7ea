pub mod config;
pub mod database;
pub mod models;

pub use config::{Config, DatabaseConfig};
pub use database::{apply_ddl_file, connect, get_db_connection, prepare_schema};
pub use models::*;
