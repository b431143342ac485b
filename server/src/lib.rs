//! # Flotilla Game Server Library
//!
//! This library provides the authoritative server for a two-player naval
//! combat game played over WebSockets. Every room holds one engagement: two
//! players place five vessels on a 14x14 board, then take turns firing
//! ordinance at each other while any number of observers watch.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Rules
//! All rule decisions are made here. Clients only submit intents (join a
//! room, ready a fleet, attack a cell, chat) and receive a freshly projected
//! view of the game after every change.
//!
//! ### Information Hiding
//! A player's view never contains the opponent's vessels or hit marks. Only
//! observers see both fleets in full.
//!
//! ### Room Management
//! Connections move between a fixed set of named rooms. Leaving a match as a
//! player resets the room so the remaining participants start over.
//!
//! ## Architecture Design
//!
//! ### Single-Threaded Event Loop
//! Connection tasks decode frames and forward them over a channel to one
//! event loop that owns every room. Each event is applied to completion
//! before the next is read, so game state needs no locking.
//!
//! ### Emit Hook
//! Game code never touches sockets. Engagements and the room registry push
//! packets through the `Emitter` trait; the client manager implements it
//! for live connections and a plain `Vec` implements it in tests.
//!
//! ## Module Organization
//!
//! - `vessel`: a single ship's placement, movement and damage
//! - `combatant`: one participant's fleet, shot log and ordinance stock
//! - `engagement`: turn order, attack resolution and per-viewer projection
//! - `rooms`: named rooms, membership and chat announcements
//! - `client_manager`: connection bookkeeping and wire format per client
//! - `network`: WebSocket accept loop and the main event loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::Server;
//! use server::rooms::{RoomRegistry, DEFAULT_ROOMS};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let rooms = RoomRegistry::new(DEFAULT_ROOMS);
//!     let mut server = Server::new("127.0.0.1:2000", 64, rooms).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod combatant;
pub mod engagement;
pub mod network;
pub mod rooms;
pub mod vessel;
