//! Server configuration
//!
//! Taken from positional command-line arguments:
//! `roomchat [server-name] [port]`. Missing values fall back to defaults.

use std::net::{Ipv4Addr, SocketAddr};

use tracing::warn;

use crate::error::AppError;

/// Name shown in the connect greeting when none is given
pub const DEFAULT_SERVER_NAME: &str = "[INSERT NAME HERE]";

/// Port used when none is given
pub const DEFAULT_PORT: u16 = 8000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Display name used in the greeting
    pub server_name: String,
    /// TCP port to listen on, all interfaces
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_name: DEFAULT_SERVER_NAME.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl ServerConfig {
    /// Build from positional arguments, program name excluded
    pub fn from_args<I>(args: I) -> Result<Self, AppError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        let mut config = Self::default();

        match args.next() {
            Some(name) => config.server_name = name,
            None => warn!("No server name specified, using \"{}\"", DEFAULT_SERVER_NAME),
        }

        match args.next() {
            Some(port) => {
                config.port = port
                    .parse()
                    .map_err(|_| AppError::InvalidPort(port.clone()))?;
            }
            None => warn!("No port provided, defaulting to port {}", DEFAULT_PORT),
        }

        Ok(config)
    }

    /// Address the listener binds to
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }
}
