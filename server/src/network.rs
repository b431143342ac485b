//! Server network layer: WebSocket transport and the sequential event loop

use crate::client_manager::ClientManager;
use crate::engagement::Emitter;
use crate::rooms::RoomRegistry;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::codec::{self, WireFormat};
use shared::{ClientId, Packet};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::interval;
use tokio_tungstenite::tungstenite::Message;

/// How often the event loop logs room and connection counts.
const STATUS_INTERVAL: Duration = Duration::from_secs(60);

/// Messages sent from connection tasks to the main server loop
#[derive(Debug)]
pub enum ServerMessage {
    ConnectionOpened {
        addr: SocketAddr,
        sender: mpsc::UnboundedSender<Message>,
    },
    PacketReceived {
        packet: Packet,
        format: WireFormat,
        addr: SocketAddr,
    },
    ConnectionClosed {
        addr: SocketAddr,
    },
}

/// Main server: owns every room and connection and applies one event at a
/// time, so game state never needs locking.
pub struct Server {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    clients: ClientManager,
    rooms: RoomRegistry,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    pub async fn new(
        addr: &str,
        max_clients: usize,
        rooms: RoomRegistry,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!("Server listening on {}", local_addr);

        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener: Some(listener),
            local_addr,
            clients: ClientManager::new(max_clients),
            rooms,
            server_tx,
            server_rx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Spawns task that accepts TCP connections and upgrades them
    fn spawn_acceptor(&mut self) {
        let Some(listener) = self.listener.take() else {
            return;
        };
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        let server_tx = server_tx.clone();
                        tokio::spawn(async move {
                            if let Err(e) = Self::handle_connection(stream, addr, server_tx).await {
                                warn!("Connection from {} ended with error: {}", addr, e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Runs one connection: a writer task drains the outbound queue while
    /// this task decodes inbound frames and forwards them to the main loop.
    async fn handle_connection(
        stream: TcpStream,
        addr: SocketAddr,
        server_tx: mpsc::UnboundedSender<ServerMessage>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let ws_stream = tokio_tungstenite::accept_async(stream).await?;
        debug!("WebSocket handshake completed with {}", addr);

        let (mut write, mut read) = ws_stream.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

        server_tx.send(ServerMessage::ConnectionOpened { addr, sender: tx })?;

        let writer = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                let closing = matches!(message, Message::Close(_));
                if let Err(e) = write.send(message).await {
                    debug!("Failed to write to {}: {}", addr, e);
                    break;
                }
                if closing {
                    break;
                }
            }
        });

        while let Some(frame) = read.next().await {
            let decoded = match frame {
                Ok(Message::Text(text)) => codec::decode_text(&text).map(|p| (p, WireFormat::Json)),
                Ok(Message::Binary(data)) => {
                    codec::decode_binary(&data).map(|p| (p, WireFormat::Binary))
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => continue,
                Err(e) => {
                    debug!("Read error from {}: {}", addr, e);
                    break;
                }
            };

            match decoded {
                Ok((packet, format)) => {
                    if server_tx
                        .send(ServerMessage::PacketReceived {
                            packet,
                            format,
                            addr,
                        })
                        .is_err()
                    {
                        break;
                    }
                }
                Err(e) => warn!("Dropping malformed frame from {}: {}", addr, e),
            }
        }

        let _ = server_tx.send(ServerMessage::ConnectionClosed { addr });
        writer.abort();
        Ok(())
    }

    /// Processes one packet from a connected client
    fn handle_packet(&mut self, packet: Packet, format: WireFormat, addr: SocketAddr) {
        let Some(client_id) = self.clients.find_client_by_addr(addr) else {
            warn!("Packet from unregistered address {}", addr);
            return;
        };
        self.clients.touch(client_id, format);

        match packet {
            Packet::Join { room } => {
                self.rooms.join(client_id, &room, &mut self.clients);
            }
            Packet::Ready { vessels, ready } => {
                self.rooms.ready(client_id, &vessels, ready, &mut self.clients);
            }
            Packet::Attack {
                attacker_id,
                x,
                y,
                ordinance,
            } => {
                self.rooms
                    .attack(client_id, attacker_id, x, y, ordinance, &mut self.clients);
            }
            Packet::Chat { text } => {
                self.rooms.chat(client_id, &text, &mut self.clients);
            }
            Packet::Disconnect => {
                self.disconnect(client_id);
            }
            _ => {
                warn!("Unexpected packet type from client {}", client_id);
            }
        }
    }

    fn connect(&mut self, addr: SocketAddr, sender: mpsc::UnboundedSender<Message>) {
        match self.clients.add_client(addr, sender.clone()) {
            Some(client_id) => {
                self.clients.emit(client_id, Packet::Connected { client_id });
            }
            None => {
                warn!("Rejecting connection from {}: server full", addr);
                if let Ok(text) = codec::encode_text(&Packet::Disconnected {
                    reason: "Server full".to_string(),
                }) {
                    let _ = sender.send(Message::Text(text));
                }
                let _ = sender.send(Message::Close(None));
            }
        }
    }

    fn disconnect(&mut self, client_id: ClientId) {
        self.rooms.leave(client_id, &mut self.clients);
        self.clients.remove_client(&client_id);
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_acceptor();

        let mut status_interval = interval(STATUS_INTERVAL);
        info!(
            "Server started successfully with rooms: {}",
            self.rooms.room_names().join(", ")
        );

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::ConnectionOpened { addr, sender }) => {
                            self.connect(addr, sender);
                        },
                        Some(ServerMessage::PacketReceived { packet, format, addr }) => {
                            self.handle_packet(packet, format, addr);
                        },
                        Some(ServerMessage::ConnectionClosed { addr }) => {
                            if let Some(client_id) = self.clients.find_client_by_addr(addr) {
                                self.disconnect(client_id);
                            }
                        },
                        None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                _ = status_interval.tick() => {
                    if !self.clients.is_empty() {
                        debug!(
                            "{} clients connected, {} seated across {} rooms",
                            self.clients.len(),
                            self.rooms.member_count(),
                            self.rooms.len()
                        );
                    }
                },
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rooms::DEFAULT_ROOMS;
    use shared::{OrdinanceKind, ViewerState};
    use std::net::{IpAddr, Ipv4Addr};

    fn test_addr(port: u16) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), port)
    }

    async fn test_server(max_clients: usize) -> Server {
        Server::new("127.0.0.1:0", max_clients, RoomRegistry::new(DEFAULT_ROOMS))
            .await
            .unwrap()
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Message>) -> Vec<Packet> {
        let mut packets = Vec::new();
        while let Ok(message) = rx.try_recv() {
            if let Message::Text(text) = message {
                packets.push(codec::decode_text(&text).unwrap());
            }
        }
        packets
    }

    fn last_state(packets: &[Packet]) -> Option<&ViewerState> {
        packets.iter().rev().find_map(|p| match p {
            Packet::StateUpdate(state) => Some(state),
            _ => None,
        })
    }

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let server = test_server(4).await;
        assert_ne!(server.local_addr().port(), 0);
    }

    #[tokio::test]
    async fn test_connect_assigns_id() {
        let mut server = test_server(4).await;
        let (tx, mut rx) = mpsc::unbounded_channel();

        server.connect(test_addr(9000), tx);

        assert_eq!(drain(&mut rx), vec![Packet::Connected { client_id: 1 }]);
        assert_eq!(server.clients.len(), 1);
    }

    #[tokio::test]
    async fn test_connect_when_full() {
        let mut server = test_server(1).await;
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();

        server.connect(test_addr(9000), tx1);
        server.connect(test_addr(9001), tx2);

        match rx2.try_recv() {
            Ok(Message::Text(text)) => assert_eq!(
                codec::decode_text(&text).unwrap(),
                Packet::Disconnected {
                    reason: "Server full".to_string()
                }
            ),
            other => panic!("Unexpected message {:?}", other),
        }
        assert!(matches!(rx2.try_recv(), Ok(Message::Close(None))));
        assert_eq!(server.clients.len(), 1);
    }

    #[tokio::test]
    async fn test_join_then_disconnect() {
        let mut server = test_server(4).await;
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        server.connect(test_addr(9000), tx1);
        server.connect(test_addr(9001), tx2);

        let join = Packet::Join {
            room: "http://localhost/room/bucket".to_string(),
        };
        server.handle_packet(join.clone(), WireFormat::Json, test_addr(9000));
        server.handle_packet(join, WireFormat::Json, test_addr(9001));

        let state = last_state(&drain(&mut rx1)).cloned().unwrap();
        assert_eq!(state.player_state.slot_number, Some(1));
        drain(&mut rx2);

        server.handle_packet(Packet::Disconnect, WireFormat::Json, test_addr(9000));
        assert_eq!(server.clients.len(), 1);
        assert_eq!(server.rooms.room_of(1), None);

        let packets = drain(&mut rx2);
        assert!(packets.contains(&Packet::Chat {
            text: "Only 1 player. Game resetting".to_string()
        }));
        assert_eq!(last_state(&packets).unwrap().player_state.slot_number, Some(1));
    }

    #[tokio::test]
    async fn test_packet_from_unknown_address_ignored() {
        let mut server = test_server(4).await;
        server.handle_packet(
            Packet::Attack {
                attacker_id: 1,
                x: 1,
                y: 1,
                ordinance: OrdinanceKind::Standard,
            },
            WireFormat::Json,
            test_addr(9000),
        );
        assert!(server.clients.is_empty());
        assert_eq!(server.rooms.member_count(), 0);
    }

    #[tokio::test]
    async fn test_server_only_packets_ignored() {
        let mut server = test_server(4).await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        server.connect(test_addr(9000), tx);
        drain(&mut rx);

        server.handle_packet(
            Packet::Connected { client_id: 5 },
            WireFormat::Json,
            test_addr(9000),
        );
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_server_message_creation() {
        let addr = test_addr(8080);
        let msg = ServerMessage::PacketReceived {
            packet: Packet::Disconnect,
            format: WireFormat::Binary,
            addr,
        };

        match msg {
            ServerMessage::PacketReceived {
                packet,
                format,
                addr: a,
            } => {
                assert_eq!(a, addr);
                assert_eq!(format, WireFormat::Binary);
                assert_eq!(packet, Packet::Disconnect);
            }
            _ => panic!("Unexpected message type"),
        }
    }
}
