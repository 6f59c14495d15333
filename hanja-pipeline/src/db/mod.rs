//! Dictionary persistence and read queries
//!
//! Every function takes an explicit pool (or connection) owned by the caller.

pub mod dictionary;
pub mod readings;

pub use dictionary::{
    dictionary_stats, get_entry, list_by_element, manual_resolve, review_queue, upsert_entry,
    DictionaryEntry, DictionaryStats, Page, Paged,
};
pub use readings::{find_by_reading, load_readings, replace_readings};
