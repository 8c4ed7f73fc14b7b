//! Multi-room Text Chat Server Library
//!
//! A line-oriented chat server: clients connect over a byte stream, pick a
//! display name, and talk inside named rooms.
//!
//! # Features
//! - Unique display names, claimed by the first line a client sends
//! - Persistent seed rooms (`lobby`, `64digits`, `hottub`)
//! - Rooms created on first `/join`, removed when the last member leaves
//! - Room chat, private messages, room and member listings
//! - Disconnection cleanup
//!
//! # Architecture
//! Shared state behind one lock:
//! - `Registry` holds rooms and users behind a `RwLock`; reads share it,
//!   mutations take it exclusively
//! - Each connection runs a `Session` that snapshots what it needs under the
//!   lock and delivers messages after releasing it
//! - Delivery goes through per-client queues drained by a writer task, so a
//!   slow peer never stalls anyone else
//!
//! # Example
//! ```ignore
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//! use roomchat::{handle_connection, Registry, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Arc::new(ServerConfig::default());
//!     let registry = Registry::with_default_rooms();
//!     let listener = TcpListener::bind(config.bind_addr()).await.unwrap();
//!
//!     while let Ok((stream, _)) = listener.accept().await {
//!         tokio::spawn(handle_connection(stream, registry.clone(), config.clone()));
//!     }
//! }
//! ```

pub mod broadcast;
pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod handler;
pub mod message;
pub mod registry;
pub mod room;
pub mod session;
pub mod types;

// Re-export main types for convenience
pub use client::Client;
pub use codec::LineCodec;
pub use config::ServerConfig;
pub use error::{AppError, SendError};
pub use handler::handle_connection;
pub use message::{ClientMessage, ServerMessage};
pub use registry::{Departure, JoinOutcome, Registry};
pub use room::{Member, Room};
pub use session::{Session, SessionState};
pub use types::ClientId;
