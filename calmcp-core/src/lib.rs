//! Core of the calmcp calendar and reminder server.
//!
//! This crate provides:
//! - the domain types (`Calendar`, `Event`, `Reminder`) and their argument forms
//! - the `CalendarStore` boundary with in-memory and file-backed stores
//! - the `Engine`, which adds consent, calendar resolution, queries and batches
//! - `tools`, the named-operation surface, and `protocol`, its line format

pub mod access;
pub mod analyze;
pub mod batch;
pub mod calendar;
pub mod constants;
pub mod date_range;
pub mod dates;
pub mod engine;
pub mod error;
pub mod event;
pub mod protocol;
pub mod query;
pub mod recurrence;
pub mod reminder;
pub mod resolver;
pub mod store;
pub mod tools;

pub use calendar::{Calendar, EntityKind};
pub use dates::{DateParser, Zone};
pub use engine::{Engine, EngineSettings};
pub use error::{CalMcpError, CalMcpResult};
pub use event::Event;
pub use reminder::Reminder;
pub use store::{CalendarStore, Consent, FileStore, MemoryStore};
pub use tools::{Tool, ToolOutput, call_tool};
