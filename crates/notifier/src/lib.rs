//! Real-time notification delivery.
//!
//! Tracks which users hold an open socket (`presence`) and pushes
//! `ServerEvent` frames to them (`hub`). Delivery is best effort: a push to an
//! offline or backed-up user is dropped, and the recipient catches up by
//! polling persisted notifications.

pub mod event;
pub mod hub;
pub mod presence;

pub use event::{ClientEvent, ServerEvent};
pub use hub::{Connection, Delivery, NotificationHub, ReplyHandle};
pub use presence::{ConnectionHandle, PresenceMap};
