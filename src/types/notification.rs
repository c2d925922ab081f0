//! User notification types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    ImportCompleted,
}

impl NotificationType {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationType::ImportCompleted => "import_completed",
        }
    }
}

/// Fire-and-forget event shown as a badge in the UI
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNotification {
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub message: String,
    pub user_id: Uuid,
}

impl NewNotification {
    pub fn import_completed(user_id: Uuid, successful: u64, file_name: &str) -> Self {
        Self {
            notification_type: NotificationType::ImportCompleted,
            message: format!("Imported {} contacts from {}", successful, file_name),
            user_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_completed_message() {
        let n = NewNotification::import_completed(Uuid::nil(), 2500, "leads.csv");
        assert_eq!(n.message, "Imported 2500 contacts from leads.csv");
        assert_eq!(n.notification_type, NotificationType::ImportCompleted);
    }

    #[test]
    fn test_notification_serializes_type_field() {
        let n = NewNotification::import_completed(Uuid::nil(), 1, "a.csv");
        let json = serde_json::to_string(&n).unwrap();
        assert!(json.contains("\"type\":\"import_completed\""));
        assert!(json.contains("userId"));
    }
}
