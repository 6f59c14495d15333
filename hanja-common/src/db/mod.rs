//! Database initialization and schema for the dictionary store

pub mod init;

pub use init::{init_database, SCHEMA_VERSION};
