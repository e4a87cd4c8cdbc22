//! Fan-out of live events to connected users.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

use crate::event::ServerEvent;
use crate::presence::PresenceMap;

/// Outcome of a single push attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Frame queued on the recipient's socket.
    Delivered,
    /// Recipient has no open socket.
    Offline,
    /// Socket queue full or closed; the frame was discarded.
    Dropped,
}

/// An open socket registered with the hub.
///
/// The gateway drains `outbound` into the socket, answers the client through
/// `reply` and hands `conn_id` back to `NotificationHub::disconnect` when the
/// socket closes.
#[derive(Debug)]
pub struct Connection {
    pub user_id: Uuid,
    pub conn_id: u64,
    pub outbound: mpsc::Receiver<String>,
    pub reply: ReplyHandle,
}

/// Sends frames to one specific socket rather than to whichever socket the
/// user currently has registered.
///
/// Holds a weak sender, so a socket replaced by a newer connection still sees
/// its queue close once the presence map lets go of it.
#[derive(Debug, Clone)]
pub struct ReplyHandle {
    user_id: Uuid,
    conn_id: u64,
    tx: mpsc::WeakSender<String>,
}

impl ReplyHandle {
    pub fn send(&self, event: &ServerEvent) -> Delivery {
        let Some(tx) = self.tx.upgrade() else {
            tracing::debug!(user_id = %self.user_id, conn_id = self.conn_id, "Socket replaced, reply dropped");
            return Delivery::Dropped;
        };

        match event.to_frame() {
            Ok(frame) => send_frame(self.user_id, self.conn_id, &tx, frame),
            Err(e) => {
                tracing::error!(error = %e, event = event.name(), "Failed to encode event");
                Delivery::Dropped
            }
        }
    }
}

/// Shared handle to the presence map plus push/broadcast operations.
#[derive(Debug, Clone)]
pub struct NotificationHub {
    presence: Arc<PresenceMap>,
}

impl NotificationHub {
    pub fn new(outbound_buffer: usize) -> Self {
        Self {
            presence: Arc::new(PresenceMap::new(outbound_buffer)),
        }
    }

    pub fn presence(&self) -> &PresenceMap {
        &self.presence
    }

    /// Mark `user_id` online and tell everyone the new online set.
    pub fn connect(&self, user_id: Uuid) -> Connection {
        let (handle, outbound) = self.presence.register(user_id);

        tracing::info!(
            user_id = %user_id,
            conn_id = handle.conn_id,
            online = self.presence.len(),
            "User connected"
        );

        self.announce_presence();

        Connection {
            user_id,
            conn_id: handle.conn_id,
            outbound,
            reply: ReplyHandle {
                user_id,
                conn_id: handle.conn_id,
                tx: handle.tx.downgrade(),
            },
        }
    }

    /// Drop the presence entry for this socket, if it is still the current one.
    pub fn disconnect(&self, user_id: Uuid, conn_id: u64) {
        if self.presence.unregister(user_id, conn_id) {
            tracing::info!(
                user_id = %user_id,
                conn_id,
                online = self.presence.len(),
                "User disconnected"
            );
            self.announce_presence();
        } else {
            tracing::debug!(user_id = %user_id, conn_id, "Stale connection closed");
        }
    }

    /// Push one event to one user. Never waits and never retries.
    pub fn push(&self, user_id: Uuid, event: &ServerEvent) -> Delivery {
        let Some(handle) = self.presence.get(user_id) else {
            tracing::debug!(user_id = %user_id, event = event.name(), "User offline, push skipped");
            return Delivery::Offline;
        };

        let frame = match event.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(error = %e, event = event.name(), "Failed to encode event");
                return Delivery::Dropped;
            }
        };

        send_frame(user_id, handle.conn_id, &handle.tx, frame)
    }

    /// Push one event to every online user. Returns how many queued it.
    pub fn broadcast(&self, event: &ServerEvent) -> usize {
        let frame = match event.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(error = %e, event = event.name(), "Failed to encode event");
                return 0;
            }
        };

        self.presence
            .handles()
            .into_iter()
            .filter(|(user_id, handle)| {
                send_frame(*user_id, handle.conn_id, &handle.tx, frame.clone())
                    == Delivery::Delivered
            })
            .count()
    }

    pub fn online_users(&self) -> Vec<Uuid> {
        self.presence.online_users()
    }

    pub fn online_count(&self) -> usize {
        self.presence.len()
    }

    pub fn is_online(&self, user_id: Uuid) -> bool {
        self.presence.is_online(user_id)
    }

    fn announce_presence(&self) {
        self.broadcast(&ServerEvent::OnlineUsers(self.presence.online_users()));
    }
}

fn send_frame(user_id: Uuid, conn_id: u64, tx: &mpsc::Sender<String>, frame: String) -> Delivery {
    match tx.try_send(frame) {
        Ok(()) => Delivery::Delivered,
        Err(TrySendError::Full(_)) => {
            tracing::debug!(user_id = %user_id, conn_id, "Outbound queue full, frame dropped");
            Delivery::Dropped
        }
        Err(TrySendError::Closed(_)) => {
            tracing::debug!(user_id = %user_id, conn_id, "Outbound queue closed, frame dropped");
            Delivery::Dropped
        }
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new(32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    use agrihub_common::types::{Notification, NotificationType};

    fn sample_notification(user_id: Uuid) -> Notification {
        let now = Utc::now();
        Notification {
            id: Uuid::new_v4(),
            user_id,
            kind: NotificationType::AdminUpdate,
            title: "Maintenance".to_string(),
            message: "Marketplace closes at 22:00".to_string(),
            related_product: None,
            is_read: false,
            metadata: json!({}),
            created_at: now,
            updated_at: now,
        }
    }

    fn next_event(conn: &mut Connection) -> serde_json::Value {
        let frame = conn.outbound.try_recv().expect("expected a queued frame");
        serde_json::from_str(&frame).unwrap()
    }

    #[test]
    fn test_push_to_online_user() {
        let hub = NotificationHub::new(8);
        let user = Uuid::new_v4();
        let mut conn = hub.connect(user);

        // Presence announcement comes first
        assert_eq!(next_event(&mut conn)["event"], "getOnlineUsers");

        let notification = sample_notification(user);
        let delivery = hub.push(user, &ServerEvent::NewNotification(notification.clone()));
        assert_eq!(delivery, Delivery::Delivered);

        let event = next_event(&mut conn);
        assert_eq!(event["event"], "newNotification");
        assert_eq!(event["data"]["id"], notification.id.to_string());
    }

    #[test]
    fn test_push_to_offline_user() {
        let hub = NotificationHub::new(8);
        let user = Uuid::new_v4();
        let delivery = hub.push(user, &ServerEvent::NewNotification(sample_notification(user)));
        assert_eq!(delivery, Delivery::Offline);
    }

    #[test]
    fn test_push_to_full_queue_is_dropped() {
        let hub = NotificationHub::new(1);
        let user = Uuid::new_v4();
        let _conn = hub.connect(user);

        // The presence announcement already fills the single slot
        let delivery = hub.push(user, &ServerEvent::NewNotification(sample_notification(user)));
        assert_eq!(delivery, Delivery::Dropped);
        assert!(hub.is_online(user));
    }

    #[test]
    fn test_push_to_closed_socket_is_dropped() {
        let hub = NotificationHub::new(8);
        let user = Uuid::new_v4();
        let conn = hub.connect(user);
        drop(conn);

        let delivery = hub.push(user, &ServerEvent::NewNotification(sample_notification(user)));
        assert_eq!(delivery, Delivery::Dropped);
    }

    #[test]
    fn test_presence_announced_on_connect_and_disconnect() {
        let hub = NotificationHub::new(8);
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        let mut alice_conn = hub.connect(alice);
        assert_eq!(next_event(&mut alice_conn)["data"], json!([alice]));

        let bob_conn = hub.connect(bob);
        let mut expected = vec![alice, bob];
        expected.sort();
        assert_eq!(next_event(&mut alice_conn)["data"], json!(expected));

        hub.disconnect(bob, bob_conn.conn_id);
        assert_eq!(next_event(&mut alice_conn)["data"], json!([alice]));
        assert_eq!(hub.online_users(), vec![alice]);
    }

    #[test]
    fn test_stale_disconnect_keeps_new_socket() {
        let hub = NotificationHub::new(8);
        let user = Uuid::new_v4();

        let mut old = hub.connect(user);
        let mut new = hub.connect(user);

        // The replaced socket's queue is closed once drained
        while old.outbound.try_recv().is_ok() {}
        assert!(matches!(
            old.outbound.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));

        hub.disconnect(user, old.conn_id);

        assert!(hub.is_online(user));
        while new.outbound.try_recv().is_ok() {}
        let delivery = hub.push(user, &ServerEvent::NewNotification(sample_notification(user)));
        assert_eq!(delivery, Delivery::Delivered);
        assert_eq!(next_event(&mut new)["event"], "newNotification");
    }

    #[test]
    fn test_reply_stays_on_its_own_socket() {
        let hub = NotificationHub::new(8);
        let user = Uuid::new_v4();

        let mut old = hub.connect(user);
        while old.outbound.try_recv().is_ok() {}
        assert_eq!(old.reply.send(&ServerEvent::Pong), Delivery::Delivered);
        assert_eq!(next_event(&mut old)["event"], "pong");

        let mut new = hub.connect(user);
        while new.outbound.try_recv().is_ok() {}

        // A ping on the replaced socket must not be answered on the new one
        assert_eq!(old.reply.send(&ServerEvent::Pong), Delivery::Dropped);
        assert!(new.outbound.try_recv().is_err());

        assert_eq!(new.reply.send(&ServerEvent::Pong), Delivery::Delivered);
        assert_eq!(next_event(&mut new)["event"], "pong");
    }

    #[test]
    fn test_broadcast_counts_deliveries() {
        let hub = NotificationHub::new(8);
        let mut conns: Vec<Connection> = (0..3).map(|_| hub.connect(Uuid::new_v4())).collect();
        for conn in &mut conns {
            while conn.outbound.try_recv().is_ok() {}
        }

        let delivered = hub.broadcast(&ServerEvent::OnlineUsers(hub.online_users()));
        assert_eq!(delivered, 3);
        assert_eq!(hub.online_count(), 3);
    }
}
