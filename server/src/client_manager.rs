//! Connection tracking for the game server
//!
//! This module handles the server-side bookkeeping of connected clients:
//! - Client connection lifecycle (connect, disconnect)
//! - Per-client outbound queues feeding each connection's writer task
//! - Wire format negotiation (JSON text or bincode binary frames)
//! - Client capacity management and address tracking
//!
//! The client manager is also the concrete `Emitter` handed to engagements,
//! so game code never touches sockets directly.

use crate::engagement::Emitter;
use log::{debug, error, info, warn};
use shared::codec::{self, WireFormat};
use shared::{ClientId, Packet};
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

/// Represents a connected client
#[derive(Debug)]
pub struct Client {
    /// Unique client identifier assigned by the server
    pub id: ClientId,
    /// Peer address, used to route frames from the reader task
    pub addr: SocketAddr,
    /// Format of the most recent frame; replies use the same one
    pub format: WireFormat,
    /// Queue drained by this connection's writer task
    sender: mpsc::UnboundedSender<Message>,
}

impl Client {
    pub fn new(id: ClientId, addr: SocketAddr, sender: mpsc::UnboundedSender<Message>) -> Self {
        Self {
            id,
            addr,
            format: WireFormat::default(),
            sender,
        }
    }

    /// Remembers which frame format the client speaks.
    pub fn touch(&mut self, format: WireFormat) {
        self.format = format;
    }

    /// Encodes and queues a packet. Returns false if the connection's writer
    /// has already gone away.
    pub fn send(&self, packet: &Packet) -> bool {
        let message = match self.format {
            WireFormat::Json => codec::encode_text(packet).map(Message::Text),
            WireFormat::Binary => codec::encode_binary(packet).map(Message::Binary),
        };

        match message {
            Ok(message) => self.sender.send(message).is_ok(),
            Err(e) => {
                error!("Failed to encode packet for client {}: {}", self.id, e);
                false
            }
        }
    }

    /// Asks the writer task to close the socket.
    pub fn close(&self) {
        let _ = self.sender.send(Message::Close(None));
    }
}

/// Manages all connected clients
///
/// Assigns ids, enforces the server capacity limit and delivers packets to
/// individual connections.
pub struct ClientManager {
    /// Connected clients indexed by their unique ID
    clients: HashMap<ClientId, Client>,
    /// Next available client ID for new connections
    next_client_id: ClientId,
    /// Maximum number of concurrent clients allowed
    max_clients: usize,
}

impl ClientManager {
    /// Client IDs start from 1 and increment for each new connection.
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
        }
    }

    /// Attempts to register a new connection
    ///
    /// Returns Some(client_id) if successful, None if the server is at
    /// capacity.
    pub fn add_client(
        &mut self,
        addr: SocketAddr,
        sender: mpsc::UnboundedSender<Message>,
    ) -> Option<ClientId> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} connected from {}", client_id, addr);
        self.clients
            .insert(client_id, Client::new(client_id, addr, sender));

        Some(client_id)
    }

    /// Removes a client. Returns true if the client was found and removed,
    /// false if they were already gone.
    pub fn remove_client(&mut self, client_id: &ClientId) -> bool {
        if let Some(client) = self.clients.remove(client_id) {
            info!("Client {} disconnected", client.id);
            client.close();
            true
        } else {
            false
        }
    }

    /// Used to associate incoming frames with existing client connections.
    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<ClientId> {
        self.clients
            .iter()
            .find(|(_, client)| client.addr == addr)
            .map(|(id, _)| *id)
    }

    pub fn get(&self, client_id: ClientId) -> Option<&Client> {
        self.clients.get(&client_id)
    }

    pub fn touch(&mut self, client_id: ClientId, format: WireFormat) {
        if let Some(client) = self.clients.get_mut(&client_id) {
            client.touch(format);
        }
    }

    /// Returns the number of currently connected clients
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns true if no clients are currently connected
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

impl Emitter for ClientManager {
    fn emit(&mut self, client_id: ClientId, packet: Packet) {
        match self.clients.get(&client_id) {
            Some(client) => {
                if !client.send(&packet) {
                    warn!("Dropped packet for client {}: connection closing", client_id);
                }
            }
            None => debug!("Dropped packet for unknown client {}", client_id),
        }
    }
}
