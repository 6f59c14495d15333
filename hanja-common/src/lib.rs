//! # Hanja Common Library
//!
//! Shared code for the Hanja dictionary workspace including:
//! - Error type shared by every crate
//! - Five-element / yin-yang vocabulary and the stroke and sound rules
//! - Pipeline configuration loading (TOML + environment)
//! - SQLite initialization and dictionary schema

pub mod config;
pub mod db;
pub mod error;
pub mod oheng;

pub use error::{Error, Result};
pub use oheng::{Element, YinYang};
