pub mod backup;
pub mod config;
pub mod content;
pub mod db;
pub mod errors;
pub mod index;
pub mod models;
pub mod path_codec;
pub mod runtime;
pub mod server;
pub mod session_service;

/// Current version of the indexing logic. Increment to trigger re-index suggestions.
pub const INDEX_VERSION: i32 = 1;
