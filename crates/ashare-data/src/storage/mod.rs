//! 저장소.
//!
//! - [`StoreWriter`]: SQLite/MySQL 멱등 upsert
//! - [`CodeCache`]: 종목 코드 캐시 파일

mod code_cache;
pub mod schema;
mod writer;

pub use code_cache::CodeCache;
pub use schema::Dialect;
pub use writer::{normalize_dsn, StoreWriter};
