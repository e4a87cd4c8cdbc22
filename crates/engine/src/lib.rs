pub mod cooldown;
pub mod notifications;
pub mod preferences;
pub mod triggers;
