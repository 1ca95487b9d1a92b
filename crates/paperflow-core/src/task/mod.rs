//! Background task tracking (translation and analysis jobs).

pub mod model;

pub use model::{LogLevel, TaskLogEntry, TaskPatch, TaskStatus};
