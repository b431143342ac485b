//! Room registry: one engagement per named room, and the routing of
//! connection events to the engagement a connection has joined.

use crate::engagement::{Emitter, Engagement};
use log::{info, warn};
use shared::{ClientId, OrdinanceKind, Packet, VesselPlacement, MAX_CHAT_LENGTH};
use std::collections::HashMap;

pub const DEFAULT_ROOMS: [&str; 6] = ["walnut", "spoors", "desist", "melons", "bucket", "coffee"];

pub struct RoomRegistry {
    rooms: HashMap<String, Engagement>,
    /// Room each connection currently belongs to.
    memberships: HashMap<ClientId, String>,
}

impl RoomRegistry {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            rooms: names
                .into_iter()
                .map(|name| (name.into(), Engagement::new()))
                .collect(),
            memberships: HashMap::new(),
        }
    }

    pub fn room_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.rooms.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn engagement(&self, room: &str) -> Option<&Engagement> {
        self.rooms.get(room)
    }

    pub fn room_of(&self, client_id: ClientId) -> Option<&str> {
        self.memberships.get(&client_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Connections currently seated in any room.
    pub fn member_count(&self) -> usize {
        self.memberships.len()
    }

    /// Joins the room named by the last path segment of `token`, which may
    /// be a bare room name or a page URL such as `http://host/room/walnut`.
    pub fn join(&mut self, client_id: ClientId, token: &str, emitter: &mut dyn Emitter) -> bool {
        let room = room_from_token(token);
        if !self.rooms.contains_key(room) {
            warn!("Client {} asked for unknown room {:?}", client_id, room);
            emitter.emit(
                client_id,
                Packet::Chat {
                    text: format!("No such room: {}", room),
                },
            );
            return false;
        }

        if self.memberships.contains_key(&client_id) {
            self.leave(client_id, emitter);
        }

        let Some(engagement) = self.rooms.get_mut(room) else {
            return false;
        };
        engagement.admit(client_id, emitter);
        self.memberships.insert(client_id, room.to_string());
        info!("Client {} joined room {}", client_id, room);

        let name = self.display_name(client_id);
        self.broadcast_chat(room, &format!("{} joined", name), emitter);
        true
    }

    /// Removes a connection from its room. A departing player ends the
    /// match: the room is reset and everyone left gets fresh state.
    pub fn leave(&mut self, client_id: ClientId, emitter: &mut dyn Emitter) {
        let Some(room) = self.memberships.get(&client_id).cloned() else {
            return;
        };

        let name = self.display_name(client_id);
        self.broadcast_chat(&room, &format!("{} left", name), emitter);
        self.memberships.remove(&client_id);

        let Some(engagement) = self.rooms.get_mut(&room) else {
            return;
        };
        if engagement.dismiss(client_id) {
            info!("Player left room {}; resetting", room);
            self.broadcast_chat(&room, "Only 1 player. Game resetting", emitter);
            if let Some(engagement) = self.rooms.get_mut(&room) {
                engagement.reset(emitter);
            }
        }
    }

    pub fn ready(
        &mut self,
        client_id: ClientId,
        placements: &[VesselPlacement],
        ready: bool,
        emitter: &mut dyn Emitter,
    ) {
        let Some(room) = self.memberships.get(&client_id).cloned() else {
            warn!("Suspected protocol violation: ready from client {} outside any room", client_id);
            return;
        };
        let Some(engagement) = self.rooms.get_mut(&room) else {
            return;
        };

        if !engagement.submit_readiness(client_id, placements, ready) {
            return;
        }
        let started = engagement.ready_count() == 2;

        if ready {
            let name = self.display_name(client_id);
            self.broadcast_chat(&room, &format!("{} is ready.", name), emitter);
        }
        if started {
            if let Some(engagement) = self.rooms.get_mut(&room) {
                engagement.broadcast_state(emitter);
            }
        }
    }

    /// Resolves an attack and pushes the outcome to the room. The attacker
    /// id claimed in the request must be the sending connection.
    pub fn attack(
        &mut self,
        client_id: ClientId,
        claimed_attacker: ClientId,
        x: i32,
        y: i32,
        ordinance: OrdinanceKind,
        emitter: &mut dyn Emitter,
    ) {
        if claimed_attacker != client_id {
            warn!(
                "Suspected protocol violation: client {} attacked as {}",
                client_id, claimed_attacker
            );
            return;
        }
        let Some(room) = self.memberships.get(&client_id).cloned() else {
            warn!("Suspected protocol violation: attack from client {} outside any room", client_id);
            return;
        };
        let Some(engagement) = self.rooms.get_mut(&room) else {
            return;
        };

        if let Some(report) = engagement.resolve_attack(client_id, x, y, ordinance) {
            let text = format!(
                "Player {} fired a {} at {},{}{}",
                report.attacker_slot.number(),
                ordinance,
                x,
                y,
                report.summary()
            );
            self.broadcast_chat(&room, &text, emitter);
        }
        if let Some(engagement) = self.rooms.get_mut(&room) {
            engagement.broadcast_state(emitter);
        }
    }

    /// Relays a chat line to everyone in the sender's room.
    pub fn chat(&mut self, client_id: ClientId, text: &str, emitter: &mut dyn Emitter) {
        let Some(room) = self.memberships.get(&client_id).cloned() else {
            return;
        };

        let text = text.trim();
        if text.is_empty() {
            return;
        }
        let text: String = text.chars().take(MAX_CHAT_LENGTH).collect();

        let name = self.display_name(client_id);
        self.broadcast_chat(&room, &format!("{}: {}", name, text), emitter);
    }

    fn display_name(&self, client_id: ClientId) -> String {
        let slot = self
            .memberships
            .get(&client_id)
            .and_then(|room| self.rooms.get(room))
            .and_then(|engagement| engagement.participant(client_id))
            .and_then(|combatant| combatant.slot());

        match slot {
            Some(slot) => format!("Player {}", slot.number()),
            None => format!("Observer {}", client_id),
        }
    }

    fn broadcast_chat(&self, room: &str, text: &str, emitter: &mut dyn Emitter) {
        let Some(engagement) = self.rooms.get(room) else {
            return;
        };
        for id in engagement.participant_ids() {
            emitter.emit(
                id,
                Packet::Chat {
                    text: text.to_string(),
                },
            );
        }
    }
}

/// Last non-empty path segment of a join token, ignoring query and fragment.
fn room_from_token(token: &str) -> &str {
    let path = token.split(['?', '#']).next().unwrap_or_default();
    path.rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combatant::FLEET;
    use shared::{Heading, Mode};

    type Emitted = Vec<(ClientId, Packet)>;

    fn registry() -> RoomRegistry {
        RoomRegistry::new(DEFAULT_ROOMS)
    }

    fn fleet() -> Vec<VesselPlacement> {
        FLEET
            .iter()
            .enumerate()
            .map(|(i, (name, _, _))| VesselPlacement {
                name: name.to_string(),
                x: 1,
                y: 2 + 2 * i as i32,
                heading: Heading::East,
            })
            .collect()
    }

    fn chats_for(emitted: &Emitted, client_id: ClientId) -> Vec<String> {
        emitted
            .iter()
            .filter(|(id, _)| *id == client_id)
            .filter_map(|(_, packet)| match packet {
                Packet::Chat { text } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    fn states_for(emitted: &Emitted, client_id: ClientId) -> usize {
        emitted
            .iter()
            .filter(|(id, p)| *id == client_id && matches!(p, Packet::StateUpdate(_)))
            .count()
    }

    #[test]
    fn test_room_from_token() {
        assert_eq!(room_from_token("walnut"), "walnut");
        assert_eq!(room_from_token("http://localhost:2000/room/walnut"), "walnut");
        assert_eq!(room_from_token("http://localhost:2000/room/coffee/"), "coffee");
        assert_eq!(room_from_token("/room/melons?debug=1#top"), "melons");
        assert_eq!(room_from_token(""), "");
    }

    #[test]
    fn test_default_rooms() {
        let registry = registry();
        assert_eq!(registry.len(), 6);
        assert_eq!(
            registry.room_names(),
            vec!["bucket", "coffee", "desist", "melons", "spoors", "walnut"]
        );
    }

    #[test]
    fn test_join_unknown_room() {
        let mut registry = registry();
        let mut emitted = Emitted::new();

        assert!(!registry.join(1, "/room/atlantis", &mut emitted));
        assert_eq!(registry.room_of(1), None);
        assert_eq!(chats_for(&emitted, 1), vec!["No such room: atlantis".to_string()]);
    }

    #[test]
    fn test_join_announces_and_sends_state() {
        let mut registry = registry();
        let mut emitted = Emitted::new();

        assert!(registry.join(1, "http://host/room/walnut", &mut emitted));
        assert!(registry.join(2, "walnut", &mut emitted));
        assert!(registry.join(3, "walnut", &mut emitted));

        assert_eq!(registry.room_of(3), Some("walnut"));
        assert_eq!(states_for(&emitted, 3), 1);
        assert_eq!(
            chats_for(&emitted, 1),
            vec!["Player 1 joined", "Player 2 joined", "Observer 3 joined"]
        );
        assert_eq!(registry.engagement("walnut").unwrap().len(), 3);
        assert!(registry.engagement("spoors").unwrap().is_empty());
    }

    #[test]
    fn test_rejoin_moves_between_rooms() {
        let mut registry = registry();
        let mut emitted = Emitted::new();

        registry.join(1, "walnut", &mut emitted);
        registry.join(1, "coffee", &mut emitted);

        assert_eq!(registry.room_of(1), Some("coffee"));
        assert!(registry.engagement("walnut").unwrap().is_empty());
        assert_eq!(registry.member_count(), 1);
    }

    #[test]
    fn test_player_leaving_resets_room() {
        let mut registry = registry();
        let mut emitted = Emitted::new();
        for id in 1..=3 {
            registry.join(id, "walnut", &mut emitted);
        }
        registry.ready(1, &fleet(), true, &mut emitted);
        emitted.clear();

        registry.leave(1, &mut emitted);

        assert_eq!(
            chats_for(&emitted, 3),
            vec!["Player 1 left", "Only 1 player. Game resetting"]
        );
        assert_eq!(states_for(&emitted, 2), 1);
        assert_eq!(states_for(&emitted, 3), 1);
        assert_eq!(registry.room_of(1), None);

        let engagement = registry.engagement("walnut").unwrap();
        assert_eq!(engagement.mode(), Mode::Placement);
        assert_eq!(engagement.ready_count(), 0);
        assert_eq!(engagement.participant(3).unwrap().slot().map(|s| s.number()), Some(2));
    }

    #[test]
    fn test_observer_leaving_keeps_match() {
        let mut registry = registry();
        let mut emitted = Emitted::new();
        for id in 1..=3 {
            registry.join(id, "walnut", &mut emitted);
        }
        emitted.clear();

        registry.leave(3, &mut emitted);
        assert_eq!(chats_for(&emitted, 1), vec!["Observer 3 left"]);
        assert_eq!(states_for(&emitted, 1), 0);

        registry.leave(3, &mut emitted);
        assert_eq!(chats_for(&emitted, 1).len(), 1);
    }

    #[test]
    fn test_ready_starts_match() {
        let mut registry = registry();
        let mut emitted = Emitted::new();
        registry.join(1, "walnut", &mut emitted);
        registry.join(2, "walnut", &mut emitted);
        emitted.clear();

        registry.ready(1, &fleet(), true, &mut emitted);
        assert_eq!(chats_for(&emitted, 2), vec!["Player 1 is ready."]);
        assert_eq!(states_for(&emitted, 2), 0);

        registry.ready(2, &fleet(), true, &mut emitted);
        assert_eq!(states_for(&emitted, 1), 1);
        assert_eq!(registry.engagement("walnut").unwrap().mode(), Mode::Play);
    }

    #[test]
    fn test_unready_placement_not_announced() {
        let mut registry = registry();
        let mut emitted = Emitted::new();
        registry.join(1, "walnut", &mut emitted);
        registry.join(2, "walnut", &mut emitted);
        emitted.clear();

        registry.ready(1, &fleet(), false, &mut emitted);
        assert!(chats_for(&emitted, 2).is_empty());
        assert_eq!(registry.engagement("walnut").unwrap().ready_count(), 0);

        registry.ready(1, &fleet(), true, &mut emitted);
        assert_eq!(chats_for(&emitted, 2), vec!["Player 1 is ready."]);
    }

    #[test]
    fn test_invalid_ready_is_silent() {
        let mut registry = registry();
        let mut emitted = Emitted::new();
        registry.join(1, "walnut", &mut emitted);
        emitted.clear();

        registry.ready(1, &[], true, &mut emitted);
        registry.ready(9, &fleet(), true, &mut emitted);
        assert!(emitted.is_empty());
    }

    #[test]
    fn test_attack_announced_to_room() {
        let mut registry = registry();
        let mut emitted = Emitted::new();
        for id in 1..=3 {
            registry.join(id, "walnut", &mut emitted);
        }
        registry.ready(1, &fleet(), true, &mut emitted);
        registry.ready(2, &fleet(), true, &mut emitted);
        emitted.clear();

        registry.attack(1, 1, 14, 14, OrdinanceKind::Standard, &mut emitted);

        assert_eq!(
            chats_for(&emitted, 3),
            vec!["Player 1 fired a standard at 14,14 and missed."]
        );
        assert_eq!(states_for(&emitted, 1), 1);
        assert_eq!(states_for(&emitted, 2), 1);
        assert_eq!(states_for(&emitted, 3), 1);
        assert_eq!(registry.engagement("walnut").unwrap().turn_number(), 2);
    }

    #[test]
    fn test_rejected_attack_only_refreshes_state() {
        let mut registry = registry();
        let mut emitted = Emitted::new();
        registry.join(1, "walnut", &mut emitted);
        registry.join(2, "walnut", &mut emitted);
        registry.ready(1, &fleet(), true, &mut emitted);
        registry.ready(2, &fleet(), true, &mut emitted);
        emitted.clear();

        registry.attack(2, 2, 5, 5, OrdinanceKind::Standard, &mut emitted);

        assert!(chats_for(&emitted, 1).is_empty());
        assert_eq!(states_for(&emitted, 1), 1);
        assert_eq!(registry.engagement("walnut").unwrap().turn_number(), 1);
    }

    #[test]
    fn test_spoofed_attacker_dropped() {
        let mut registry = registry();
        let mut emitted = Emitted::new();
        registry.join(1, "walnut", &mut emitted);
        registry.join(2, "walnut", &mut emitted);
        registry.ready(1, &fleet(), true, &mut emitted);
        registry.ready(2, &fleet(), true, &mut emitted);
        emitted.clear();

        registry.attack(2, 1, 5, 5, OrdinanceKind::Standard, &mut emitted);

        assert!(emitted.is_empty());
        assert_eq!(registry.engagement("walnut").unwrap().turn_number(), 1);
    }

    #[test]
    fn test_chat_relay() {
        let mut registry = registry();
        let mut emitted = Emitted::new();
        registry.join(1, "walnut", &mut emitted);
        registry.join(2, "walnut", &mut emitted);
        registry.join(3, "coffee", &mut emitted);
        emitted.clear();

        registry.chat(2, "  ahoy  ", &mut emitted);
        registry.chat(2, "   ", &mut emitted);
        registry.chat(7, "nobody hears this", &mut emitted);

        assert_eq!(chats_for(&emitted, 1), vec!["Player 2: ahoy"]);
        assert!(chats_for(&emitted, 3).is_empty());

        emitted.clear();
        registry.chat(1, &"x".repeat(1000), &mut emitted);
        let line = &chats_for(&emitted, 2)[0];
        assert_eq!(line.len(), "Player 1: ".len() + MAX_CHAT_LENGTH);
    }
}
