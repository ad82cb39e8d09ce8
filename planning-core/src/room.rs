//! Room state and its invariant-preserving mutators
//!
//! A [`Room`] is one estimation session: an ordered, fixed list of tickets,
//! the participants currently in the room, at most one game master, and the
//! index of the ticket under estimation. Fields are private; every change
//! goes through a method that keeps the invariants:
//!
//! - a room always has at least one ticket
//! - `0 <= current_ticket_index < tickets.len()`
//! - only the game master reveals or moves between tickets
//! - the game master never votes

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::RoomError;
use crate::registry::Connection;

/// Storage key prefix for room snapshots
pub const ROOM_PREFIX: &str = "room:";

/// Snapshot store key for a room
pub fn room_key(room_id: &str) -> String {
    format!("{ROOM_PREFIX}{room_id}")
}

/// One work item under estimation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: String,
    /// Estimates by user name. Kept after the ticket stops being current.
    #[serde(default)]
    pub votes: BTreeMap<String, i64>,
}

impl Ticket {
    fn new(id: String) -> Self {
        Self {
            id,
            votes: BTreeMap::new(),
        }
    }
}

/// A participant and, while connected, its outbound stream
#[derive(Debug, Clone)]
pub struct User {
    pub name: String,
    stream: Option<Connection>,
}

impl User {
    fn new(name: String) -> Self {
        Self { name, stream: None }
    }

    /// The live stream attached by the last reconciliation, if any
    pub fn stream(&self) -> Option<&Connection> {
        self.stream.as_ref()
    }
}

/// Serialized form of a room, used both for snapshots and the `roomState`
/// broadcast. Carries user names only, never stream handles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomRecord {
    pub id: String,
    pub tickets: Vec<Ticket>,
    #[serde(default)]
    pub users: Vec<String>,
    #[serde(default)]
    pub game_master: Option<String>,
    #[serde(default)]
    pub current_ticket_index: usize,
    #[serde(default)]
    pub votes_revealed: bool,
}

impl RoomRecord {
    /// The ticket under estimation
    pub fn current_ticket(&self) -> Option<&Ticket> {
        self.tickets.get(self.current_ticket_index)
    }
}

/// Why a request left the room unchanged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Reveal or ticket navigation from someone other than the game master
    NotGameMaster,
    /// The game master tried to vote
    GameMasterCannotVote,
    /// Vote addressed to a ticket that is not current
    StaleTicket,
    /// Vote payload did not carry an integral estimate
    InvalidVote,
    /// Advance while on the last ticket
    AtLastTicket,
    /// Retreat while on the first ticket
    AtFirstTicket,
    /// The user is not part of the room
    UnknownUser,
    /// Message type the server does not handle
    UnsupportedMessage,
}

impl IgnoreReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            IgnoreReason::NotGameMaster => "not_game_master",
            IgnoreReason::GameMasterCannotVote => "game_master_cannot_vote",
            IgnoreReason::StaleTicket => "stale_ticket",
            IgnoreReason::InvalidVote => "invalid_vote",
            IgnoreReason::AtLastTicket => "at_last_ticket",
            IgnoreReason::AtFirstTicket => "at_first_ticket",
            IgnoreReason::UnknownUser => "unknown_user",
            IgnoreReason::UnsupportedMessage => "unsupported_message",
        }
    }
}

impl std::fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a room mutation that may be refused by policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Ignored(IgnoreReason),
}

impl Outcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied)
    }
}

/// Role granted to a joining user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinRole {
    Participant,
    GameMaster,
    /// Asked for the game master role while someone else holds it
    GameMasterClaimIgnored,
}

/// Authoritative in-memory state of one room
#[derive(Debug, Clone)]
pub struct Room {
    id: String,
    tickets: Vec<Ticket>,
    users: BTreeMap<String, User>,
    game_master: Option<String>,
    current_ticket_index: usize,
    votes_revealed: bool,
}

impl Room {
    /// Create a room with one empty ticket per id
    ///
    /// Fails with [`RoomError::InvalidInput`] when `ticket_ids` is empty or
    /// contains a blank or repeated id.
    pub fn create(id: impl Into<String>, ticket_ids: Vec<String>) -> Result<Self, RoomError> {
        if ticket_ids.is_empty() {
            return Err(RoomError::InvalidInput("no tickets provided".to_string()));
        }
        let mut seen = std::collections::HashSet::new();
        for ticket_id in &ticket_ids {
            if ticket_id.trim().is_empty() {
                return Err(RoomError::InvalidInput("blank ticket id".to_string()));
            }
            if !seen.insert(ticket_id.as_str()) {
                return Err(RoomError::InvalidInput(format!(
                    "duplicate ticket id: {ticket_id}"
                )));
            }
        }

        Ok(Self {
            id: id.into(),
            tickets: ticket_ids.into_iter().map(Ticket::new).collect(),
            users: BTreeMap::new(),
            game_master: None,
            current_ticket_index: 0,
            votes_revealed: false,
        })
    }

    /// Rebuild a room from its snapshot. No user has a stream attached.
    pub fn from_record(record: RoomRecord) -> Result<Self, RoomError> {
        if record.tickets.is_empty() {
            return Err(RoomError::InvalidInput(format!(
                "snapshot for room {} has no tickets",
                record.id
            )));
        }

        let last = record.tickets.len() - 1;
        let current_ticket_index = if record.current_ticket_index > last {
            tracing::warn!(
                room_id = %record.id,
                index = record.current_ticket_index,
                "Snapshot ticket index out of range, clamping"
            );
            last
        } else {
            record.current_ticket_index
        };

        let users = record
            .users
            .into_iter()
            .map(|name| (name.clone(), User::new(name)))
            .collect();

        Ok(Self {
            id: record.id,
            tickets: record.tickets,
            users,
            game_master: record.game_master.filter(|gm| !gm.is_empty()),
            current_ticket_index,
            votes_revealed: record.votes_revealed,
        })
    }

    pub fn to_record(&self) -> RoomRecord {
        RoomRecord {
            id: self.id.clone(),
            tickets: self.tickets.clone(),
            users: self.users.keys().cloned().collect(),
            game_master: self.game_master.clone(),
            current_ticket_index: self.current_ticket_index,
            votes_revealed: self.votes_revealed,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tickets(&self) -> &[Ticket] {
        &self.tickets
    }

    pub fn current_ticket_index(&self) -> usize {
        self.current_ticket_index
    }

    pub fn current_ticket(&self) -> &Ticket {
        &self.tickets[self.current_ticket_index]
    }

    pub fn game_master(&self) -> Option<&str> {
        self.game_master.as_deref()
    }

    pub fn votes_revealed(&self) -> bool {
        self.votes_revealed
    }

    pub fn has_user(&self, name: &str) -> bool {
        self.users.contains_key(name)
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// User names in sorted order
    pub fn user_names(&self) -> impl Iterator<Item = &str> {
        self.users.keys().map(String::as_str)
    }

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    fn is_game_master(&self, name: &str) -> bool {
        self.game_master.as_deref() == Some(name)
    }

    /// Add a user (or keep the existing entry on reconnect) and settle its role
    ///
    /// The game master role is only granted while it is vacant; a second
    /// claimant joins as a regular participant.
    pub fn join(&mut self, name: &str, as_game_master: bool) -> JoinRole {
        self.users
            .entry(name.to_string())
            .or_insert_with(|| User::new(name.to_string()));

        if self.is_game_master(name) {
            return JoinRole::GameMaster;
        }
        if !as_game_master {
            return JoinRole::Participant;
        }
        if self.game_master.is_none() {
            self.game_master = Some(name.to_string());
            JoinRole::GameMaster
        } else {
            JoinRole::GameMasterClaimIgnored
        }
    }

    /// Record `value` for `user` on the current ticket
    pub fn vote(&mut self, user: &str, ticket_id: &str, value: i64) -> Outcome {
        if self.is_game_master(user) {
            return Outcome::Ignored(IgnoreReason::GameMasterCannotVote);
        }
        if !self.has_user(user) {
            return Outcome::Ignored(IgnoreReason::UnknownUser);
        }
        let index = self.current_ticket_index;
        let ticket = &mut self.tickets[index];
        if ticket.id != ticket_id {
            return Outcome::Ignored(IgnoreReason::StaleTicket);
        }

        ticket.votes.insert(user.to_string(), value);
        Outcome::Applied
    }

    pub fn reveal(&mut self, user: &str) -> Outcome {
        if !self.is_game_master(user) {
            return Outcome::Ignored(IgnoreReason::NotGameMaster);
        }
        self.votes_revealed = true;
        Outcome::Applied
    }

    /// Move to the next ticket, hiding votes again
    pub fn advance(&mut self, user: &str) -> Outcome {
        if !self.is_game_master(user) {
            return Outcome::Ignored(IgnoreReason::NotGameMaster);
        }
        if self.current_ticket_index + 1 >= self.tickets.len() {
            return Outcome::Ignored(IgnoreReason::AtLastTicket);
        }
        self.current_ticket_index += 1;
        self.votes_revealed = false;
        Outcome::Applied
    }

    /// Move to the previous ticket, hiding votes again
    pub fn retreat(&mut self, user: &str) -> Outcome {
        if !self.is_game_master(user) {
            return Outcome::Ignored(IgnoreReason::NotGameMaster);
        }
        if self.current_ticket_index == 0 {
            return Outcome::Ignored(IgnoreReason::AtFirstTicket);
        }
        self.current_ticket_index -= 1;
        self.votes_revealed = false;
        Outcome::Applied
    }

    /// Remove a user; vacates the game master role if they held it
    pub fn leave(&mut self, user: &str) -> Outcome {
        if self.users.remove(user).is_none() {
            return Outcome::Ignored(IgnoreReason::UnknownUser);
        }
        if self.is_game_master(user) {
            self.game_master = None;
        }
        Outcome::Applied
    }

    /// Attach a live stream to an existing user. Returns false if the user is unknown.
    pub fn attach_stream(&mut self, user: &str, stream: Connection) -> bool {
        match self.users.get_mut(user) {
            Some(entry) => {
                entry.stream = Some(stream);
                true
            }
            None => false,
        }
    }

    /// Insert a user that exists only as a live connection
    pub(crate) fn restore_user(&mut self, user: &str, stream: Connection) {
        let mut entry = User::new(user.to_string());
        entry.stream = Some(stream);
        self.users.insert(user.to_string(), entry);
    }

    pub fn detach_stream(&mut self, user: &str) {
        if let Some(entry) = self.users.get_mut(user) {
            entry.stream = None;
        }
    }
}
