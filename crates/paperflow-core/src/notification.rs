//! User-visible notification model.
//!
//! The live channel never renders anything itself; it hands these to the
//! embedding application's notification surface.

use serde::{Deserialize, Serialize};

/// Visual category of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Info,
    Success,
    Warning,
    Error,
}

/// A notification pushed by the server or raised by the channel itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemNotice {
    #[serde(default = "NoticeKind::default_info")]
    pub kind: NoticeKind,
    pub title: String,
    pub message: String,
    /// How long the UI should keep the notice visible. `None` means the
    /// surface's own default.
    #[serde(default)]
    pub duration_ms: Option<u64>,
}

impl NoticeKind {
    fn default_info() -> Self {
        Self::Info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notice_defaults() {
        let notice: SystemNotice =
            serde_json::from_str(r#"{"title": "Maintenance", "message": "Back at 9"}"#).unwrap();
        assert_eq!(notice.kind, NoticeKind::Info);
        assert!(notice.duration_ms.is_none());
    }
}
