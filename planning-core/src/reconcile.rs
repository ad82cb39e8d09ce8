//! Re-attach live connections to a room rebuilt from a snapshot
//!
//! The snapshot says what a room holds (tickets, votes, who is in it); the
//! [`ConnectionRegistry`] says who is reachable right now. Reconciliation
//! merges the two:
//!
//! - user in both: the registry's stream is attached
//! - user only in the snapshot: kept, without a stream, until they leave
//! - user only in the registry: re-inserted, since their socket is open and
//!   the entry was lost to a concurrent writer

use crate::registry::ConnectionRegistry;
use crate::room::Room;

/// What a reconciliation pass changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Users whose stream was attached
    pub attached: Vec<String>,
    /// Users re-inserted from the registry
    pub restored: Vec<String>,
    /// Users in the room with no live connection
    pub unreachable: Vec<String>,
}

pub fn reconcile(room: &mut Room, registry: &ConnectionRegistry) -> ReconcileReport {
    let mut report = ReconcileReport::default();

    let names: Vec<String> = room.user_names().map(str::to_string).collect();
    for name in names {
        match registry.lookup(room.id(), &name) {
            Some(stream) => {
                room.attach_stream(&name, stream);
                report.attached.push(name);
            }
            None => {
                room.detach_stream(&name);
                report.unreachable.push(name);
            }
        }
    }

    for (name, stream) in registry.connections_in(room.id()) {
        if !room.has_user(&name) {
            tracing::warn!(
                room_id = %room.id(),
                user = %name,
                "Live connection missing from room snapshot, restoring user"
            );
            room.restore_user(&name, stream);
            report.restored.push(name);
        }
    }

    if !report.unreachable.is_empty() {
        tracing::debug!(
            room_id = %room.id(),
            unreachable = ?report.unreachable,
            "Users without a live connection"
        );
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Connection;

    fn snapshot_room(users: &[&str]) -> Room {
        let mut room = Room::create("r1", vec!["T1".to_string()]).unwrap();
        for user in users {
            room.join(user, false);
        }
        Room::from_record(room.to_record()).unwrap()
    }

    #[test]
    fn attaches_only_registered_users() {
        let mut room = snapshot_room(&["alice", "bob"]);
        let registry = ConnectionRegistry::new();
        let (bob, _bob_rx) = Connection::channel(4);
        registry.register("r1", "bob", bob.clone());

        let report = reconcile(&mut room, &registry);

        assert_eq!(report.attached, vec!["bob"]);
        assert_eq!(report.unreachable, vec!["alice"]);
        assert!(report.restored.is_empty());
        assert!(room.has_user("alice"));

        let streams: Vec<_> = room
            .users()
            .filter_map(|u| u.stream().map(|s| (u.name.clone(), s.id().clone())))
            .collect();
        assert_eq!(streams, vec![("bob".to_string(), bob.id().clone())]);
    }

    #[test]
    fn restores_live_user_missing_from_snapshot() {
        let mut room = snapshot_room(&["alice"]);
        let registry = ConnectionRegistry::new();
        let (carol, _carol_rx) = Connection::channel(4);
        registry.register("r1", "carol", carol);

        let report = reconcile(&mut room, &registry);

        assert_eq!(report.restored, vec!["carol"]);
        assert!(room.has_user("carol"));
    }

    #[test]
    fn ignores_other_rooms_and_closed_sockets() {
        let mut room = snapshot_room(&["alice"]);
        let registry = ConnectionRegistry::new();
        let (other, _other_rx) = Connection::channel(4);
        let (closed, closed_rx) = Connection::channel(4);
        registry.register("r2", "dave", other);
        registry.register("r1", "alice", closed);
        drop(closed_rx);

        let report = reconcile(&mut room, &registry);

        assert!(report.attached.is_empty());
        assert!(report.restored.is_empty());
        assert_eq!(report.unreachable, vec!["alice"]);
        assert!(!room.has_user("dave"));
    }
}
