//! Fan-out of the room state to every reachable participant

use crate::protocol::ServerMessage;
use crate::room::Room;

/// Delivery summary of one broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: usize,
    /// Users without an attached stream
    pub skipped: usize,
}

/// Send the current `roomState` to every user with an attached stream
///
/// Best effort: a failed send is logged and delivery continues with the next
/// recipient. Nothing is retried or buffered.
pub fn broadcast(room: &Room) -> BroadcastReport {
    let mut report = BroadcastReport::default();

    let json = match ServerMessage::RoomState(room.to_record()).to_json() {
        Ok(json) => json,
        Err(e) => {
            tracing::error!(room_id = %room.id(), error = %e, "Failed to serialize room state");
            return report;
        }
    };

    for user in room.users() {
        let Some(stream) = user.stream() else {
            report.skipped += 1;
            continue;
        };

        match stream.send(json.clone()) {
            Ok(()) => report.delivered += 1,
            Err(e) => {
                tracing::warn!(
                    room_id = %room.id(),
                    user = %user.name,
                    error = %e,
                    "Error broadcasting room state"
                );
                report.failed += 1;
            }
        }
    }

    tracing::trace!(
        room_id = %room.id(),
        delivered = report.delivered,
        failed = report.failed,
        skipped = report.skipped,
        "Broadcast room state"
    );
    report
}
