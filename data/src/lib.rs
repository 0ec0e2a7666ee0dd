//! Relational metadata store (SQLite via sqlx).
//!
//! Holds brains, the per-kind source tables, chat sessions and chat
//! messages, plus the sequence counter that mints source and chat ids.
//! WAL journaling with a 30 s busy timeout covers transient writer
//! contention; id minting happens in the same transaction as the dependent
//! insert.

mod brains;
mod chats;
mod db;
mod errors;
mod sources;

pub use brains::BrainRecord;
pub use chats::{ChatRecord, SessionRecord};
pub use db::MetadataStore;
pub use errors::{DataError, DataResult};
pub use sources::{SourceMetrics, SourceRecord, TitleHit};
