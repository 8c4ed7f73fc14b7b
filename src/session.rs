//! Per-connection protocol state machine
//!
//! A `Session` owns one connection's login state and turns each input line
//! into registry mutations plus outbound messages. Everything here is
//! synchronous: registry calls return snapshots and delivery only queues
//! onto the recipients' writers, so no lock is ever held across I/O.

use tracing::{debug, info};

use crate::broadcast::{broadcast_room, send_to};
use crate::client::Client;
use crate::message::{ClientMessage, RosterEntry, ServerMessage};
use crate::registry::{Departure, JoinOutcome, Registry};
use crate::room::Member;
use crate::types::ClientId;

/// Login state of a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, waiting for a free display name
    Connecting,
    /// Registered under `name`
    Active { name: String },
    /// Cleaned up; no further input is processed
    Disconnected,
}

/// What the connection loop should do after a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// One connection's protocol state
#[derive(Debug)]
pub struct Session {
    client: Client,
    registry: Registry,
    state: SessionState,
}

impl Session {
    pub fn new(client: Client, registry: Registry) -> Self {
        Self {
            client,
            registry,
            state: SessionState::Connecting,
        }
    }

    pub fn id(&self) -> ClientId {
        self.client.id
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Display name, once registered
    pub fn name(&self) -> Option<&str> {
        match &self.state {
            SessionState::Active { name } => Some(name),
            _ => None,
        }
    }

    /// Send the connect greeting and login prompt
    pub fn greet(&self, server_name: &str) {
        self.reply(ServerMessage::Greeting {
            server_name: server_name.to_string(),
        });
    }

    /// Process one input line
    pub fn handle_line(&mut self, line: &str) -> Flow {
        if self.state == SessionState::Disconnected {
            return Flow::Quit;
        }

        let Some(msg) = ClientMessage::parse(line) else {
            self.reply(ServerMessage::Prompt);
            return Flow::Continue;
        };

        let name = match &self.state {
            SessionState::Active { name } => name.clone(),
            _ if msg == ClientMessage::Quit => {
                self.quit();
                return Flow::Quit;
            }
            _ => {
                // Any first token other than /quit is the requested name
                let requested = line.split_whitespace().next().unwrap_or_default();
                self.request_name(requested);
                return Flow::Continue;
            }
        };

        match msg {
            ClientMessage::Quit => {
                self.quit();
                return Flow::Quit;
            }
            ClientMessage::Help => self.reply(ServerMessage::Help),
            ClientMessage::Join { room: None } => self.reply(ServerMessage::NoRoomSpecified),
            ClientMessage::Join { room: Some(room) } => self.join(&name, &room),
            ClientMessage::Rooms => self.list_rooms(),
            ClientMessage::Leave => self.leave(&name),
            ClientMessage::Users => self.list_users(),
            ClientMessage::Msg { to, body } => self.private_message(&name, to, body),
            ClientMessage::Text(text) => self.chat(&name, text),
        }
        Flow::Continue
    }

    /// Disconnect cleanup: leave the current room and release the name
    ///
    /// Idempotent. Remaining room members are told about the departure.
    pub fn disconnect(&mut self) {
        let name = match std::mem::replace(&mut self.state, SessionState::Disconnected) {
            SessionState::Active { name } => name,
            SessionState::Connecting => {
                debug!("Client {} disconnected before choosing a name", self.client.id);
                return;
            }
            SessionState::Disconnected => return,
        };

        if let Some(departure) = self.registry.disconnect(self.client.id, &name) {
            self.announce_departure(&name, &departure);
        }
        info!("User {} has disconnected from the server", name);
    }

    fn quit(&mut self) {
        self.disconnect();
        self.reply(ServerMessage::Bye);
    }

    fn request_name(&mut self, name: &str) {
        if self.registry.register_user(name, self.client.clone()) {
            self.state = SessionState::Active {
                name: name.to_string(),
            };
            self.reply(ServerMessage::Welcome {
                name: name.to_string(),
            });
        } else {
            debug!("Client {} asked for taken name '{}'", self.client.id, name);
            self.reply(ServerMessage::NameTaken);
        }
    }

    fn join(&self, name: &str, room: &str) {
        let member = Member::new(name, self.client.clone());

        let (roster, notify) = match self.registry.join_room(room, member) {
            JoinOutcome::AlreadyMember { roster } => {
                self.reply(ServerMessage::AlreadyInRoom {
                    room: room.to_string(),
                });
                (roster, false)
            }
            JoinOutcome::Joined {
                created,
                departure,
                roster,
            } => {
                self.reply(ServerMessage::EnteringRoom {
                    room: room.to_string(),
                    created,
                });
                if let Some(departure) = departure {
                    self.announce_departure(name, &departure);
                }
                (roster, true)
            }
        };

        self.reply(self.roster_message(&roster));

        if notify {
            let others: Vec<Member> = roster
                .into_iter()
                .filter(|m| m.client.id != self.client.id)
                .collect();
            broadcast_room(&others, |_| ServerMessage::UserJoined {
                name: name.to_string(),
            });
        }
    }

    fn leave(&self, name: &str) {
        match self.registry.leave_room(self.client.id) {
            Some(departure) => self.announce_departure(name, &departure),
            None => self.reply(ServerMessage::NotInRoom),
        }
    }

    fn list_rooms(&self) {
        self.reply(ServerMessage::RoomList {
            rooms: self.registry.list_rooms(),
        });
    }

    fn list_users(&self) {
        match self.registry.roster_of(self.client.id) {
            Some(roster) => self.reply(self.roster_message(&roster)),
            None => self.reply(ServerMessage::Prompt),
        }
    }

    fn private_message(&self, name: &str, to: Option<String>, body: Option<String>) {
        let Some(to) = to else {
            self.reply(ServerMessage::Prompt);
            return;
        };

        let Some(dest) = self.registry.find_user(&to) else {
            self.reply(ServerMessage::UnknownUser { name: to });
            return;
        };

        if let Some(text) = body {
            let _ = send_to(
                &dest,
                ServerMessage::PrivateMessage {
                    from: name.to_string(),
                    text,
                },
            );
        }
        self.reply(ServerMessage::Prompt);
    }

    fn chat(&self, name: &str, text: String) {
        let Some(roster) = self.registry.roster_of(self.client.id) else {
            self.reply(ServerMessage::Prompt);
            return;
        };

        broadcast_room(&roster, |_| ServerMessage::Chat {
            from: name.to_string(),
            text: text.clone(),
        });
    }

    /// Tell the leaver and everyone still in the room
    fn announce_departure(&self, name: &str, departure: &Departure) {
        self.reply(ServerMessage::UserLeft {
            name: name.to_string(),
            is_self: true,
        });
        broadcast_room(&departure.remaining, |_| ServerMessage::UserLeft {
            name: name.to_string(),
            is_self: false,
        });
    }

    fn roster_message(&self, roster: &[Member]) -> ServerMessage {
        ServerMessage::Roster {
            entries: roster
                .iter()
                .map(|m| RosterEntry {
                    name: m.name.clone(),
                    is_self: m.client.id == self.client.id,
                })
                .collect(),
        }
    }

    /// Queue a message for this session's own client
    fn reply(&self, msg: ServerMessage) {
        let _ = send_to(&self.client, msg);
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;

    struct TestUser {
        session: Session,
        rx: mpsc::UnboundedReceiver<ServerMessage>,
    }

    impl TestUser {
        fn connect(registry: &Registry) -> Self {
            let (tx, rx) = mpsc::unbounded_channel();
            let client = Client::new(ClientId::new(), tx);
            Self {
                session: Session::new(client, registry.clone()),
                rx,
            }
        }

        fn named(registry: &Registry, name: &str) -> Self {
            let mut user = Self::connect(registry);
            user.send(name);
            assert!(user.output().contains(&format!("Welcome, {name}!")));
            user
        }

        fn send(&mut self, line: &str) -> Flow {
            self.session.handle_line(line)
        }

        /// Everything queued for this user so far, as wire text
        fn output(&mut self) -> String {
            let mut out = String::new();
            while let Ok(msg) = self.rx.try_recv() {
                out.push_str(&msg.to_string());
            }
            out
        }
    }

    #[test]
    fn test_first_line_registers_name() {
        let registry = Registry::with_default_rooms();
        let mut alice = TestUser::connect(&registry);

        assert_eq!(alice.send("alice"), Flow::Continue);

        assert!(alice.output().contains("Welcome, alice!"));
        assert_eq!(alice.session.name(), Some("alice"));
        assert!(registry.find_user("alice").is_some());
    }

    #[test]
    fn test_name_is_first_token_only() {
        let registry = Registry::new();
        let mut user = TestUser::connect(&registry);

        user.send("  carol the great ");

        assert_eq!(user.session.name(), Some("carol"));
    }

    #[test]
    fn test_blank_line_keeps_connecting() {
        let registry = Registry::new();
        let mut user = TestUser::connect(&registry);

        user.send("   ");

        assert_eq!(user.output(), "\r=> ");
        assert_eq!(user.session.state(), &SessionState::Connecting);
    }

    #[test]
    fn test_taken_name_stays_connecting() {
        let registry = Registry::new();
        let _bob = TestUser::named(&registry, "bob");
        let mut other = TestUser::connect(&registry);

        other.send("bob");

        assert_eq!(other.output(), "\r<= Sorry, name taken.\n<= Login name?\n=> ");
        assert_eq!(other.session.state(), &SessionState::Connecting);

        other.send("robert");
        assert_eq!(other.session.name(), Some("robert"));
    }

    #[test]
    fn test_quit_before_naming() {
        let registry = Registry::new();
        let mut user = TestUser::connect(&registry);

        assert_eq!(user.send("/quit"), Flow::Quit);

        assert_eq!(user.output(), "\r<= BYE\n");
        assert_eq!(user.session.state(), &SessionState::Disconnected);
        assert_eq!(registry.user_count(), 0);
    }

    #[test]
    fn test_join_notifies_members_and_sends_roster() {
        let registry = Registry::with_default_rooms();
        let mut bob = TestUser::named(&registry, "bob");
        let mut alice = TestUser::named(&registry, "alice");
        bob.send("/join lobby");
        bob.output();

        alice.send("/join lobby");

        assert_eq!(
            alice.output(),
            "\r<= entering room: lobby\n\
             \r<= Users in room:\n<= * alice (** this is you)\n<= * bob\n\r<= end of list.\n=> "
        );
        assert_eq!(bob.output(), "\r<= * new user joined chat: alice\n=> ");
        registry.assert_consistent();
    }

    #[test]
    fn test_join_unknown_room_creates_it() {
        let registry = Registry::with_default_rooms();
        let mut alice = TestUser::named(&registry, "alice");

        alice.send("/join x");

        assert!(alice.output().starts_with("\r<= creating and entering room: x\n"));
        let room = registry.find_room("x").unwrap();
        assert!(!room.persistent);
        assert_eq!(room.member_count(), 1);
    }

    #[test]
    fn test_join_without_room() {
        let registry = Registry::new();
        let mut alice = TestUser::named(&registry, "alice");

        alice.send("/join");

        assert_eq!(alice.output(), "\r<= No room specified\n=> ");
    }

    #[test]
    fn test_join_elsewhere_leaves_previous_room() {
        let registry = Registry::with_default_rooms();
        let mut alice = TestUser::named(&registry, "alice");
        let mut bob = TestUser::named(&registry, "bob");
        alice.send("/join lobby");
        bob.send("/join lobby");
        alice.output();
        bob.output();

        alice.send("/join hottub");

        assert!(alice.output().starts_with(
            "\r<= entering room: hottub\n\r<= * user has left the chat: alice (** this is you)\n=> \r<= Users in room:\n"
        ));
        assert_eq!(bob.output(), "\r<= * user has left the chat: alice\n=> ");
        assert_eq!(registry.room_of(alice.session.id()).as_deref(), Some("hottub"));
        registry.assert_consistent();
    }

    #[test]
    fn test_rejoin_current_room_resends_roster() {
        let registry = Registry::with_default_rooms();
        let mut alice = TestUser::named(&registry, "alice");
        let mut bob = TestUser::named(&registry, "bob");
        alice.send("/join lobby");
        bob.send("/join lobby");
        bob.output();

        alice.output();
        alice.send("/join lobby");

        assert!(alice.output().starts_with("\r<= already in room: lobby\n\r<= Users in room:"));
        assert_eq!(bob.output(), "");
    }

    #[test]
    fn test_leave_when_roomless() {
        let registry = Registry::new();
        let mut alice = TestUser::named(&registry, "alice");

        alice.send("/leave");

        assert_eq!(alice.output(), "\r<= You are not in a room\n=> ");
    }

    #[test]
    fn test_both_leave_removes_room() {
        let registry = Registry::with_default_rooms();
        let mut alice = TestUser::named(&registry, "alice");
        let mut bob = TestUser::named(&registry, "bob");
        alice.send("/join x");
        bob.send("/join x");

        alice.send("/leave");
        assert!(registry.find_room("x").is_some());
        bob.send("/leave");

        assert!(registry.find_room("x").is_none());
        registry.assert_consistent();
    }

    #[test]
    fn test_rooms_lists_counts() {
        let registry = Registry::with_default_rooms();
        let mut alice = TestUser::named(&registry, "alice");
        alice.send("/join lobby");
        alice.output();

        alice.send("/rooms");

        assert_eq!(
            alice.output(),
            "\r<= Active rooms are:\n<= * 64digits (0)\n<= * hottub (0)\n<= * lobby (1)\n\r<= end of list.\n=> "
        );
    }

    #[test]
    fn test_users_roomless_and_in_room() {
        let registry = Registry::with_default_rooms();
        let mut alice = TestUser::named(&registry, "alice");

        alice.send("/users");
        assert_eq!(alice.output(), "\r=> ");

        alice.send("/join lobby");
        alice.output();
        alice.send("/users");
        assert_eq!(
            alice.output(),
            "\r<= Users in room:\n<= * alice (** this is you)\n\r<= end of list.\n=> "
        );
    }

    #[test]
    fn test_private_message_delivered() {
        let registry = Registry::new();
        let mut alice = TestUser::named(&registry, "alice");
        let mut bob = TestUser::named(&registry, "bob");

        alice.send("/msg bob hello");

        assert_eq!(bob.output(), "\r<= PM from alice: hello\n=> ");
        assert_eq!(alice.output(), "\r=> ");
    }

    #[test]
    fn test_private_message_unknown_user() {
        let registry = Registry::new();
        let mut alice = TestUser::named(&registry, "alice");

        alice.send("/msg bob hello");

        assert_eq!(alice.output(), "\r<= User \"bob\" does not exist\n=> ");
    }

    #[test]
    fn test_private_message_without_body_is_ignored() {
        let registry = Registry::new();
        let mut alice = TestUser::named(&registry, "alice");
        let mut bob = TestUser::named(&registry, "bob");

        alice.send("/msg bob");

        assert_eq!(bob.output(), "");
        assert_eq!(alice.output(), "\r=> ");
    }

    #[test]
    fn test_chat_reaches_every_member_including_sender() {
        let registry = Registry::with_default_rooms();
        let mut alice = TestUser::named(&registry, "alice");
        let mut bob = TestUser::named(&registry, "bob");
        let mut carol = TestUser::named(&registry, "carol");
        alice.send("/join lobby");
        bob.send("/join lobby");
        carol.send("/join hottub");
        alice.output();
        bob.output();
        carol.output();

        alice.send("hi there");

        assert_eq!(alice.output(), "\r<= alice: hi there\n=> ");
        assert_eq!(bob.output(), "\r<= alice: hi there\n=> ");
        assert_eq!(carol.output(), "");
    }

    #[test]
    fn test_chat_roomless_is_dropped() {
        let registry = Registry::new();
        let mut alice = TestUser::named(&registry, "alice");
        let mut bob = TestUser::named(&registry, "bob");

        alice.send("anyone?");

        assert_eq!(alice.output(), "\r=> ");
        assert_eq!(bob.output(), "");
    }

    #[test]
    fn test_quit_cleans_up_before_bye() {
        let registry = Registry::with_default_rooms();
        let mut alice = TestUser::named(&registry, "alice");
        let mut bob = TestUser::named(&registry, "bob");
        alice.send("/join lobby");
        bob.send("/join lobby");
        alice.output();
        bob.output();

        assert_eq!(alice.send("/quit"), Flow::Quit);

        assert_eq!(
            alice.output(),
            "\r<= * user has left the chat: alice (** this is you)\n=> \r<= BYE\n"
        );
        assert_eq!(bob.output(), "\r<= * user has left the chat: alice\n=> ");
        assert!(registry.find_user("alice").is_none());
        assert_eq!(alice.send("hello?"), Flow::Quit);
        registry.assert_consistent();
    }

    #[test]
    fn test_disconnect_keeps_persistent_room() {
        let registry = Registry::with_default_rooms();
        let mut alice = TestUser::named(&registry, "alice");
        alice.send("/join lobby");

        alice.session.disconnect();
        alice.session.disconnect();

        assert!(registry.find_user("alice").is_none());
        assert!(registry.find_room("lobby").unwrap().is_empty());
        assert_eq!(alice.session.state(), &SessionState::Disconnected);
        registry.assert_consistent();
    }

    #[test]
    fn test_name_reusable_after_disconnect() {
        let registry = Registry::new();
        let mut alice = TestUser::named(&registry, "alice");
        alice.session.disconnect();

        let _again = TestUser::named(&registry, "alice");
    }

    #[test]
    fn test_help() {
        let registry = Registry::new();
        let mut alice = TestUser::named(&registry, "alice");

        alice.send("/help");

        assert_eq!(alice.output(), ServerMessage::Help.to_string());
    }
}
