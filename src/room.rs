//! Room struct definition
//!
//! Represents a named chat room with a name-sorted member list.

use crate::client::Client;
use crate::types::ClientId;

/// A named user inside a room
#[derive(Debug, Clone)]
pub struct Member {
    /// Registered display name
    pub name: String,
    /// Handle used to reach the member
    pub client: Client,
}

impl Member {
    pub fn new(name: impl Into<String>, client: Client) -> Self {
        Self {
            name: name.into(),
            client,
        }
    }
}

/// Room name and member count, as shown by `/rooms`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSummary {
    pub name: String,
    pub members: usize,
}

/// Chat room
///
/// Members are kept sorted by name (byte-wise, case-sensitive). Names are
/// globally unique, so there are never ties. A persistent room survives
/// having no members; any other room is dropped by the registry when the
/// last member leaves.
#[derive(Debug, Clone)]
pub struct Room {
    /// Room name
    pub name: String,
    /// Survives zero membership
    pub persistent: bool,
    /// Members, sorted by name
    members: Vec<Member>,
}

impl Room {
    /// Create an empty room
    pub fn new(name: impl Into<String>, persistent: bool) -> Self {
        Self {
            name: name.into(),
            persistent,
            members: Vec::new(),
        }
    }

    /// Add a member, keeping the list sorted by name
    ///
    /// Returns false if a member with that name is already present.
    pub fn join(&mut self, member: Member) -> bool {
        match self
            .members
            .binary_search_by(|m| m.name.as_str().cmp(member.name.as_str()))
        {
            Ok(_) => false,
            Err(pos) => {
                self.members.insert(pos, member);
                true
            }
        }
    }

    /// Remove a member by client id
    ///
    /// Returns true if the room should be deleted (non-persistent and now
    /// empty). A client that wasn't in the room leaves it untouched.
    pub fn leave(&mut self, client_id: ClientId) -> bool {
        let Some(pos) = self.position(client_id) else {
            return false;
        };
        self.members.remove(pos);
        self.is_empty() && !self.persistent
    }

    /// Current members, sorted by name
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// Get the number of members in the room
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn summary(&self) -> RoomSummary {
        RoomSummary {
            name: self.name.clone(),
            members: self.member_count(),
        }
    }

    fn position(&self, client_id: ClientId) -> Option<usize> {
        self.members.iter().position(|m| m.client.id == client_id)
    }
}
