use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Marketplace role of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Buyer,
    Farmer,
    Admin,
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserRole::Buyer => write!(f, "buyer"),
            UserRole::Farmer => write!(f, "farmer"),
            UserRole::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buyer" => Ok(UserRole::Buyer),
            "farmer" => Ok(UserRole::Farmer),
            "admin" => Ok(UserRole::Admin),
            other => Err(format!("Unknown role '{}'", other)),
        }
    }
}

/// Category of a notification. Each category can be muted per user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    PriceChange,
    Offer,
    AdminUpdate,
    Warning,
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationType::PriceChange => write!(f, "price_change"),
            NotificationType::Offer => write!(f, "offer"),
            NotificationType::AdminUpdate => write!(f, "admin_update"),
            NotificationType::Warning => write!(f, "warning"),
        }
    }
}

fn enabled() -> bool {
    true
}

/// Per-user opt-outs, stored as JSONB on the user row.
///
/// Keys missing from the stored document count as enabled, so categories added
/// later reach existing users until they opt out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPreferences {
    #[serde(default = "enabled")]
    pub price_change: bool,
    #[serde(default = "enabled")]
    pub offer: bool,
    #[serde(default = "enabled")]
    pub admin_update: bool,
    #[serde(default = "enabled")]
    pub warning: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            price_change: true,
            offer: true,
            admin_update: true,
            warning: true,
        }
    }
}

impl NotificationPreferences {
    /// Parse a stored preferences document key by key. A missing or non-boolean
    /// key reads as enabled without disturbing the keys that are readable.
    pub fn from_json(value: &serde_json::Value) -> Self {
        let flag = |key: &str| {
            value
                .get(key)
                .and_then(serde_json::Value::as_bool)
                .unwrap_or(true)
        };
        Self {
            price_change: flag("price_change"),
            offer: flag("offer"),
            admin_update: flag("admin_update"),
            warning: flag("warning"),
        }
    }

    pub fn allows(&self, kind: NotificationType) -> bool {
        match kind {
            NotificationType::PriceChange => self.price_change,
            NotificationType::Offer => self.offer,
            NotificationType::AdminUpdate => self.admin_update,
            NotificationType::Warning => self.warning,
        }
    }
}

/// A marketplace user, as far as notification delivery needs to know.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub notification_preferences: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn preferences(&self) -> NotificationPreferences {
        NotificationPreferences::from_json(&self.notification_preferences)
    }
}

/// A product listing. Only the fields the price-alert fan-out reads.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub price_per_kg: f64,
}

/// A persisted notification record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    pub related_product: Option<Uuid>,
    pub is_read: bool,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a notification addressed to one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewNotification {
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub related_product: Option<Uuid>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_preferences_missing_keys_default_enabled() {
        let prefs = NotificationPreferences::from_json(&json!({"offer": false}));
        assert!(!prefs.allows(NotificationType::Offer));
        assert!(prefs.allows(NotificationType::PriceChange));
        assert!(prefs.allows(NotificationType::AdminUpdate));
        assert!(prefs.allows(NotificationType::Warning));
    }

    #[test]
    fn test_preferences_malformed_falls_back() {
        let prefs = NotificationPreferences::from_json(&json!("not an object"));
        assert_eq!(prefs, NotificationPreferences::default());

        let prefs = NotificationPreferences::from_json(&serde_json::Value::Null);
        assert_eq!(prefs, NotificationPreferences::default());
    }

    #[test]
    fn test_preferences_bad_key_keeps_other_mutes() {
        let prefs =
            NotificationPreferences::from_json(&json!({"price_change": false, "offer": null}));
        assert!(!prefs.allows(NotificationType::PriceChange));
        assert!(prefs.allows(NotificationType::Offer));

        let prefs = NotificationPreferences::from_json(&json!({"warning": "no", "admin_update": false}));
        assert!(prefs.allows(NotificationType::Warning));
        assert!(!prefs.allows(NotificationType::AdminUpdate));
    }

    #[test]
    fn test_notification_type_wire_names() {
        assert_eq!(
            serde_json::to_value(NotificationType::PriceChange).unwrap(),
            json!("price_change")
        );
        assert_eq!(NotificationType::AdminUpdate.to_string(), "admin_update");
        let kind: NotificationType = serde_json::from_value(json!("warning")).unwrap();
        assert_eq!(kind, NotificationType::Warning);
    }

    #[test]
    fn test_user_role_parse() {
        assert_eq!("admin".parse::<UserRole>().unwrap(), UserRole::Admin);
        assert!("superuser".parse::<UserRole>().is_err());
    }
}
