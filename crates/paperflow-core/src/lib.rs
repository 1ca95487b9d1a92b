//! Paperflow Core Library
//!
//! Domain models and collaborator seams for the paper-management
//! live-update channel.

pub mod error;
pub mod notification;
pub mod store;
pub mod task;

pub use error::{PaperflowError, PaperflowResult};
pub use notification::{NoticeKind, SystemNotice};
pub use store::{Notifier, TaskStore};
pub use task::model::{LogLevel, TaskLogEntry, TaskPatch, TaskStatus};
