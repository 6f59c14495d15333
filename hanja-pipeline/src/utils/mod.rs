//! Utility modules for hanja-pipeline

pub mod db_retry;
pub mod parallel;

pub use db_retry::retry_on_lock;
pub use parallel::map_ordered;
