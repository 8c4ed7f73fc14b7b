//! Shared room and user registry
//!
//! All server state lives behind one `RwLock`: rooms by name, users by name
//! and the room each client currently sits in. Reads take the shared lock,
//! mutations the exclusive one. Every method returns owned snapshots so the
//! lock is released before any message is delivered.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::client::Client;
use crate::room::{Member, Room, RoomSummary};
use crate::types::ClientId;

/// Rooms seeded at startup; they persist with zero members
pub const DEFAULT_ROOMS: [&str; 3] = ["lobby", "64digits", "hottub"];

/// Result of removing a client from its room
#[derive(Debug, Clone)]
pub struct Departure {
    /// Room that was left
    pub room: String,
    /// Members still in the room afterwards
    pub remaining: Vec<Member>,
    /// The room was non-persistent and has been removed
    pub room_deleted: bool,
}

/// Result of `Registry::join_room`
#[derive(Debug, Clone)]
pub enum JoinOutcome {
    /// The client was already in the requested room; nothing changed
    AlreadyMember { roster: Vec<Member> },
    /// The client is now in the requested room
    Joined {
        /// The room did not exist and was created by this join
        created: bool,
        /// Room left on the way, if the client was in one
        departure: Option<Departure>,
        /// Members after the join, joiner included
        roster: Vec<Member>,
    },
}

#[derive(Debug, Default)]
struct RegistryState {
    /// Room name -> Room, ordered so `/rooms` lists by name
    rooms: BTreeMap<String, Room>,
    /// Registered name -> Client
    users: HashMap<String, Client>,
    /// Client -> name of the room it is in
    client_rooms: HashMap<ClientId, String>,
}

impl RegistryState {
    fn create_room_if_absent(&mut self, name: &str, persistent: bool) -> bool {
        if self.rooms.contains_key(name) {
            return false;
        }
        self.rooms
            .insert(name.to_string(), Room::new(name, persistent));
        true
    }

    fn room_mut(&mut self, name: &str) -> &mut Room {
        match self.rooms.get_mut(name) {
            Some(room) => room,
            None => panic!("room {name} is referenced by a member but missing from the registry"),
        }
    }

    fn unregister(&mut self, name: &str, client_id: ClientId) -> bool {
        if self.users.get(name).is_some_and(|c| c.id == client_id) {
            self.users.remove(name);
            true
        } else {
            false
        }
    }

    fn leave(&mut self, client_id: ClientId) -> Option<Departure> {
        let room_name = self.client_rooms.remove(&client_id)?;
        let room = self.room_mut(&room_name);
        let room_deleted = room.leave(client_id);
        let remaining = room.members().to_vec();

        if room_deleted {
            self.rooms.remove(&room_name);
        }

        Some(Departure {
            room: room_name,
            remaining,
            room_deleted,
        })
    }
}

/// Handle to the shared registry
///
/// Cheap to clone; every connection holds one.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    state: Arc<RwLock<RegistryState>>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry seeded with the persistent default rooms
    pub fn with_default_rooms() -> Self {
        let registry = Self::new();
        for name in DEFAULT_ROOMS {
            registry.create_room_if_absent(name, true);
        }
        registry
    }

    /// Snapshot of a room by name
    pub fn find_room(&self, name: &str) -> Option<Room> {
        self.state.read().rooms.get(name).cloned()
    }

    /// Handle of the user registered under `name`
    pub fn find_user(&self, name: &str) -> Option<Client> {
        self.state.read().users.get(name).cloned()
    }

    /// Create a room unless one with that name exists
    ///
    /// Check and insert happen in one critical section, so concurrent
    /// callers with the same name create exactly one room. Returns true if
    /// this call created it.
    pub fn create_room_if_absent(&self, name: &str, persistent: bool) -> bool {
        let created = self
            .state
            .write()
            .create_room_if_absent(name, persistent);
        if created {
            info!("Room {} created (persistent: {})", name, persistent);
        }
        created
    }

    /// Claim `name` for `client`
    ///
    /// Returns false if the name is already held.
    pub fn register_user(&self, name: &str, client: Client) -> bool {
        let client_id = client.id;
        let registered = {
            let mut state = self.state.write();
            if state.users.contains_key(name) {
                false
            } else {
                state.users.insert(name.to_string(), client);
                true
            }
        };
        if registered {
            info!("Client {} assumed the name '{}'", client_id, name);
        }
        registered
    }

    /// Release `name` if it is held by `client_id`
    pub fn unregister_user(&self, name: &str, client_id: ClientId) -> bool {
        self.state.write().unregister(name, client_id)
    }

    /// Move a member into `room`, creating it (non-persistent) if needed
    ///
    /// Leaving the previous room, creating the target and inserting the
    /// member form one critical section: the client is never seen in two
    /// rooms, and concurrent first joins of a new name share one room.
    pub fn join_room(&self, room: &str, member: Member) -> JoinOutcome {
        let client_id = member.client.id;
        let name = member.name.clone();

        let outcome = {
            let mut state = self.state.write();

            if state.client_rooms.get(&client_id).is_some_and(|r| r == room) {
                let roster = state.room_mut(room).members().to_vec();
                JoinOutcome::AlreadyMember { roster }
            } else {
                let departure = state.leave(client_id);
                let created = state.create_room_if_absent(room, false);
                let target = state.room_mut(room);
                let seated = target.join(member);
                assert!(seated, "{name} is already seated in room {room}");
                let roster = target.members().to_vec();
                state.client_rooms.insert(client_id, room.to_string());

                JoinOutcome::Joined {
                    created,
                    departure,
                    roster,
                }
            }
        };

        if let JoinOutcome::Joined {
            created, departure, ..
        } = &outcome
        {
            if let Some(departure) = departure {
                log_departure(&name, departure);
            }
            if *created {
                info!("{} created room {}", name, room);
            } else {
                info!("{} entered room {}", name, room);
            }
        }

        outcome
    }

    /// Remove a client from whatever room it is in
    ///
    /// Returns `None` if the client was in no room. A non-persistent room
    /// left empty is removed in the same critical section.
    pub fn leave_room(&self, client_id: ClientId) -> Option<Departure> {
        let departure = self.state.write().leave(client_id);
        if let Some(departure) = &departure {
            log_departure(client_id, departure);
        }
        departure
    }

    /// Disconnect cleanup: leave the current room and release `name`
    ///
    /// Both happen under one exclusive lock, so the name can be claimed by
    /// a new connection as soon as this returns and not before.
    pub fn disconnect(&self, client_id: ClientId, name: &str) -> Option<Departure> {
        let departure = {
            let mut state = self.state.write();
            let departure = state.leave(client_id);
            state.unregister(name, client_id);
            departure
        };
        if let Some(departure) = &departure {
            log_departure(name, departure);
        }
        departure
    }

    /// Name of the room the client is in
    pub fn room_of(&self, client_id: ClientId) -> Option<String> {
        self.state.read().client_rooms.get(&client_id).cloned()
    }

    /// Members of the client's current room, or `None` if it is in no room
    pub fn roster_of(&self, client_id: ClientId) -> Option<Vec<Member>> {
        let state = self.state.read();
        let room = state.client_rooms.get(&client_id)?;
        state.rooms.get(room).map(|r| r.members().to_vec())
    }

    /// All rooms with their member counts, ordered by name
    pub fn list_rooms(&self) -> Vec<RoomSummary> {
        self.state.read().rooms.values().map(Room::summary).collect()
    }

    /// Number of registered (named) users
    pub fn user_count(&self) -> usize {
        self.state.read().users.len()
    }

    /// Number of rooms
    pub fn room_count(&self) -> usize {
        self.state.read().rooms.len()
    }

    /// Panic unless every registry invariant holds
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        let state = self.state.read();
        let mut seated = 0;

        for (key, room) in &state.rooms {
            assert_eq!(key, &room.name);
            assert_eq!(room.member_count(), room.members().len());
            assert!(
                room.persistent || !room.is_empty(),
                "empty non-persistent room {key} still registered"
            );
            assert!(
                room.members().windows(2).all(|w| w[0].name < w[1].name),
                "room {key} is not sorted by name"
            );
            for member in room.members() {
                assert_eq!(state.client_rooms.get(&member.client.id), Some(key));
                let registered = state.users.get(&member.name).map(|c| c.id);
                assert_eq!(registered, Some(member.client.id));
            }
            seated += room.member_count();
        }

        assert_eq!(seated, state.client_rooms.len(), "client in more than one room");
    }
}

fn log_departure(who: impl std::fmt::Display, departure: &Departure) {
    debug!("{} left room {}", who, departure.room);
    if departure.room_deleted {
        info!("Non-persistent room {} has been deleted", departure.room);
    }
}
