//! Message protocol definitions
//!
//! Line-oriented text protocol. `ClientMessage` is parsed from one input
//! line; `ServerMessage` renders itself (via `Display`) to the exact bytes
//! written back, prompt included.

use std::fmt;

use crate::room::RoomSummary;

/// Marker appended to the recipient's own entry in rosters and notices
const SELF_MARKER: &str = " (** this is you)";

/// Command summary sent in response to `/help`
const HELP_LINES: [&str; 7] = [
    "To view a list of rooms, type \"/rooms\"",
    "To join or create a room, type \"/join [roomname]\"",
    "To view a list of users in a room, type \"/users\"",
    "To send a private message to a user, type \"/msg [username] [message]\"",
    "To leave a room, type \"/leave\"",
    "To disconnect from the server, type \"/quit\"",
    "To bring up this list again, type \"/help\"",
];

/// Client → Server message
///
/// Commands are matched on the first whitespace-delimited token,
/// case-sensitively. Anything else is room chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// Disconnect from the server
    Quit,
    /// Show the command summary
    Help,
    /// Join (creating if needed) a room
    Join { room: Option<String> },
    /// List all rooms with member counts
    Rooms,
    /// Leave the current room
    Leave,
    /// List members of the current room
    Users,
    /// Private message; `body` is the rest of the line after the user name
    Msg {
        to: Option<String>,
        body: Option<String>,
    },
    /// Plain text, broadcast to the current room
    Text(String),
}

impl ClientMessage {
    /// Parse one input line. Returns `None` for a blank line.
    pub fn parse(line: &str) -> Option<Self> {
        let (command, rest) = split_token(line)?;

        let msg = match command {
            "/quit" => Self::Quit,
            "/help" => Self::Help,
            "/join" => Self::Join {
                room: split_token(rest).map(|(room, _)| room.to_string()),
            },
            "/rooms" => Self::Rooms,
            "/leave" => Self::Leave,
            "/users" => Self::Users,
            "/msg" => match split_token(rest) {
                Some((to, body)) => {
                    let body = body.trim_start();
                    Self::Msg {
                        to: Some(to.to_string()),
                        body: (!body.is_empty()).then(|| body.to_string()),
                    }
                }
                None => Self::Msg { to: None, body: None },
            },
            _ => Self::Text(line.to_string()),
        };
        Some(msg)
    }
}

/// Split off the first whitespace-delimited token, returning it and the
/// remainder (with the single separating character still attached).
fn split_token(input: &str) -> Option<(&str, &str)> {
    let input = input.trim_start();
    if input.is_empty() {
        return None;
    }
    match input.find(char::is_whitespace) {
        Some(end) => Some((&input[..end], &input[end..])),
        None => Some((input, "")),
    }
}

/// One line of a room roster as seen by a particular recipient
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub name: String,
    pub is_self: bool,
}

/// Server → Client message
///
/// `Display` produces the wire text. Every message that ends an exchange
/// finishes with the `=> ` input prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Sent on connect, asks for a login name
    Greeting { server_name: String },
    /// Name accepted
    Welcome { name: String },
    /// Name already registered by another user
    NameTaken,
    /// Neutral prompt
    Prompt,
    /// Sent right before the server closes the connection
    Bye,
    /// Command summary
    Help,
    /// `/join` without a room name
    NoRoomSpecified,
    /// Room entered, `created` when the join brought it into existence
    EnteringRoom { room: String, created: bool },
    /// `/join` of the room the user is already in
    AlreadyInRoom { room: String },
    /// Members of a room, sorted by name
    Roster { entries: Vec<RosterEntry> },
    /// Another user entered the recipient's room
    UserJoined { name: String },
    /// A user left the recipient's room
    UserLeft { name: String, is_self: bool },
    /// Room-scoped command issued while in no room
    NotInRoom,
    /// All rooms with member counts
    RoomList { rooms: Vec<RoomSummary> },
    /// `/msg` to a name nobody holds
    UnknownUser { name: String },
    /// Private message delivered to its destination
    PrivateMessage { from: String, text: String },
    /// Room chat line
    Chat { from: String, text: String },
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Greeting { server_name } => write!(
                f,
                "\r<= Welcome to the {server_name} Chat Server!\n\r<= Login name?\n=> "
            ),
            Self::Welcome { name } => write!(
                f,
                "\r<= Welcome, {name}!\n\r<= For a list of commands, type \"/help\"\n=> "
            ),
            Self::NameTaken => f.write_str("\r<= Sorry, name taken.\n<= Login name?\n=> "),
            Self::Prompt => f.write_str("\r=> "),
            Self::Bye => f.write_str("\r<= BYE\n"),
            Self::Help => {
                for line in HELP_LINES {
                    writeln!(f, "\r<= {line}")?;
                }
                f.write_str("=> ")
            }
            Self::NoRoomSpecified => f.write_str("\r<= No room specified\n=> "),
            Self::EnteringRoom { room, created: true } => {
                writeln!(f, "\r<= creating and entering room: {room}")
            }
            Self::EnteringRoom { room, created: false } => {
                writeln!(f, "\r<= entering room: {room}")
            }
            Self::AlreadyInRoom { room } => writeln!(f, "\r<= already in room: {room}"),
            Self::Roster { entries } => {
                f.write_str("\r<= Users in room:\n")?;
                for entry in entries {
                    let marker = if entry.is_self { SELF_MARKER } else { "" };
                    writeln!(f, "<= * {}{marker}", entry.name)?;
                }
                f.write_str("\r<= end of list.\n=> ")
            }
            Self::UserJoined { name } => write!(f, "\r<= * new user joined chat: {name}\n=> "),
            Self::UserLeft { name, is_self } => {
                let marker = if *is_self { SELF_MARKER } else { "" };
                write!(f, "\r<= * user has left the chat: {name}{marker}\n=> ")
            }
            Self::NotInRoom => f.write_str("\r<= You are not in a room\n=> "),
            Self::RoomList { rooms } => {
                f.write_str("\r<= Active rooms are:\n")?;
                for room in rooms {
                    writeln!(f, "<= * {} ({})", room.name, room.members)?;
                }
                f.write_str("\r<= end of list.\n=> ")
            }
            Self::UnknownUser { name } => write!(f, "\r<= User \"{name}\" does not exist\n=> "),
            Self::PrivateMessage { from, text } => write!(f, "\r<= PM from {from}: {text}\n=> "),
            Self::Chat { from, text } => write!(f, "\r<= {from}: {text}\n=> "),
        }
    }
}
