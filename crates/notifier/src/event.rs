//! JSON frames exchanged over the notification socket.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use agrihub_common::types::Notification;

/// Server → client frame, encoded as `{"event": <name>, "data": <payload>}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "newNotification")]
    NewNotification(Notification),
    #[serde(rename = "getOnlineUsers")]
    OnlineUsers(Vec<Uuid>),
    #[serde(rename = "pong")]
    Pong,
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::NewNotification(_) => "newNotification",
            ServerEvent::OnlineUsers(_) => "getOnlineUsers",
            ServerEvent::Pong => "pong",
        }
    }

    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Client → server frame. Anything that fails to parse is ignored by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event")]
pub enum ClientEvent {
    #[serde(rename = "ping")]
    Ping,
}

impl ClientEvent {
    pub fn parse(frame: &str) -> Option<Self> {
        serde_json::from_str(frame).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    use agrihub_common::types::NotificationType;

    #[test]
    fn test_new_notification_frame_shape() {
        let now = Utc::now();
        let notification = Notification {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            kind: NotificationType::Offer,
            title: "Harvest sale".to_string(),
            message: "20% off seeds".to_string(),
            related_product: None,
            is_read: false,
            metadata: json!({}),
            created_at: now,
            updated_at: now,
        };

        let frame = ServerEvent::NewNotification(notification.clone())
            .to_frame()
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["event"], "newNotification");
        assert_eq!(value["data"]["id"], notification.id.to_string());
        assert_eq!(value["data"]["type"], "offer");
        assert_eq!(value["data"]["is_read"], false);
    }

    #[test]
    fn test_online_users_frame_shape() {
        let user = Uuid::new_v4();
        let frame = ServerEvent::OnlineUsers(vec![user]).to_frame().unwrap();
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value, json!({"event": "getOnlineUsers", "data": [user]}));
    }

    #[test]
    fn test_client_ping_parse() {
        assert_eq!(ClientEvent::parse(r#"{"event":"ping"}"#), Some(ClientEvent::Ping));
        assert_eq!(ClientEvent::parse(r#"{"event":"subscribe"}"#), None);
        assert_eq!(ClientEvent::parse("garbage"), None);
    }
}
