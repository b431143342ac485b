//! Authoritative match state for one room.
//!
//! An `Engagement` owns every participant of a room, the two player seats,
//! the turn counter and the match mode. All operations are synchronous and
//! never fail loudly: requests that break the rules are logged as suspected
//! protocol violations and otherwise ignored, so a misbehaving client learns
//! nothing from the server's reaction.

use crate::combatant::{Combatant, Slot};
use crate::vessel;
use log::{debug, info, warn};
use shared::{
    ClientId, Mode, OrdinanceKind, Packet, Role, Shot, VesselPlacement, ViewerState, BOARD_SIZE,
};

/// Half-width of the area attack's square.
const AREA_RADIUS: i32 = 1;
/// Half-width of the reconnaissance scan's square.
const RECON_RADIUS: i32 = 2;

/// Outbound side effect: deliver a packet to one connection.
pub trait Emitter {
    fn emit(&mut self, client_id: ClientId, packet: Packet);
}

/// Collects emitted packets in order. Useful wherever delivery is deferred.
impl Emitter for Vec<(ClientId, Packet)> {
    fn emit(&mut self, client_id: ClientId, packet: Packet) {
        self.push((client_id, packet));
    }
}

/// Outcome of an accepted attack, used to announce it to the room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttackReport {
    pub attacker_slot: Slot,
    pub ordinance: OrdinanceKind,
    pub x: i32,
    pub y: i32,
    pub hits: usize,
    pub misses: usize,
    pub sunk: Vec<String>,
}

impl AttackReport {
    fn new(attacker_slot: Slot, ordinance: OrdinanceKind, x: i32, y: i32) -> Self {
        Self {
            attacker_slot,
            ordinance,
            x,
            y,
            hits: 0,
            misses: 0,
            sunk: Vec::new(),
        }
    }

    fn tally(&mut self, shot: &Shot) {
        if shot.hit {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
        for name in &shot.sunk {
            if !self.sunk.contains(name) {
                self.sunk.push(name.clone());
            }
        }
    }

    /// Text appended to the "fired a ... at x,y" announcement. Reconnaissance
    /// results stay private, so its summary is empty.
    pub fn summary(&self) -> String {
        let mut text = match self.ordinance {
            OrdinanceKind::Reconnaissance => return String::new(),
            OrdinanceKind::Standard if self.hits > 0 => " and hit!".to_string(),
            OrdinanceKind::Standard => " and missed.".to_string(),
            OrdinanceKind::Area => format!(
                " - {} {}, {} {}.",
                self.hits,
                if self.hits == 1 { "hit" } else { "hits" },
                self.misses,
                if self.misses == 1 { "miss" } else { "misses" },
            ),
        };
        if !self.sunk.is_empty() {
            text.push_str(&format!(" Sunk: {}.", self.sunk.join(", ")));
        }
        text
    }
}

#[derive(Debug, Clone)]
pub struct Engagement {
    turn_number: u32,
    mode: Mode,
    /// Seat holders by participant id; these alias entries of `participants`.
    players: [Option<ClientId>; 2],
    /// Every connected participant, in join order.
    participants: Vec<Combatant>,
}

impl Default for Engagement {
    fn default() -> Self {
        Self::new()
    }
}

impl Engagement {
    pub fn new() -> Self {
        Self {
            turn_number: 1,
            mode: Mode::Placement,
            players: [None, None],
            participants: Vec::new(),
        }
    }

    pub fn turn_number(&self) -> u32 {
        self.turn_number
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn board_size(&self) -> i32 {
        BOARD_SIZE
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Participant ids in join order.
    pub fn participant_ids(&self) -> Vec<ClientId> {
        self.participants.iter().map(|c| c.id).collect()
    }

    pub fn participant(&self, id: ClientId) -> Option<&Combatant> {
        self.participants.iter().find(|c| c.id == id)
    }

    pub fn player(&self, slot: Slot) -> Option<&Combatant> {
        self.players[slot.index()].and_then(|id| self.participant(id))
    }

    fn position(&self, id: ClientId) -> Option<usize> {
        self.participants.iter().position(|c| c.id == id)
    }

    fn player_position(&self, slot: Slot) -> Option<usize> {
        self.players[slot.index()].and_then(|id| self.position(id))
    }

    /// Seats a new connection in the first free player slot, or as an
    /// observer when both are taken, then sends it the current state.
    pub fn admit(&mut self, id: ClientId, emitter: &mut dyn Emitter) -> &Combatant {
        let index = match self.position(id) {
            Some(index) => {
                warn!("Participant {} admitted twice; keeping existing seat", id);
                index
            }
            None => {
                let free = self.players.iter().position(Option::is_none);
                let combatant = match free.and_then(Slot::from_index) {
                    Some(slot) => {
                        self.players[slot.index()] = Some(id);
                        info!("Participant {} seated as player {}", id, slot.number());
                        Combatant::player(id, slot)
                    }
                    None => {
                        info!("Participant {} joined as observer", id);
                        Combatant::observer(id)
                    }
                };
                self.participants.push(combatant);
                self.participants.len() - 1
            }
        };

        self.send_state(id, emitter);
        &self.participants[index]
    }

    /// Removes a participant. Returns true if it held a player slot, in
    /// which case the match cannot continue and the caller should reset.
    pub fn dismiss(&mut self, id: ClientId) -> bool {
        let Some(index) = self.position(id) else {
            return false;
        };

        let combatant = self.participants.remove(index);
        match combatant.slot() {
            Some(slot) => {
                self.players[slot.index()] = None;
                info!("Player {} ({}) left the engagement", slot.number(), id);
                true
            }
            None => {
                debug!("Observer {} left the engagement", id);
                false
            }
        }
    }

    /// Starts a fresh match with everyone still connected. The first two
    /// participants by join order become the players.
    pub fn reset(&mut self, emitter: &mut dyn Emitter) {
        let ids = self.participant_ids();
        self.players = [None, None];
        self.participants = ids
            .iter()
            .enumerate()
            .map(|(i, &id)| match Slot::from_index(i) {
                Some(slot) => {
                    self.players[slot.index()] = Some(id);
                    Combatant::player(id, slot)
                }
                None => Combatant::observer(id),
            })
            .collect();
        self.mode = Mode::Placement;
        self.turn_number = 1;

        info!("Engagement reset with {} participants", self.participants.len());
        self.broadcast_state(emitter);
    }

    pub fn ready_count(&self) -> usize {
        self.participants.iter().filter(|c| c.is_ready()).count()
    }

    /// Accepts a player's fleet layout. Every vessel of the fleet must be
    /// placed on the board. Once both players are ready the match starts.
    pub fn submit_readiness(
        &mut self,
        id: ClientId,
        placements: &[VesselPlacement],
        ready: bool,
    ) -> bool {
        if self.mode != Mode::Placement {
            warn!(
                "Suspected protocol violation: participant {} sent placements outside placement mode",
                id
            );
            return false;
        }

        let Some(index) = self.position(id) else {
            warn!("Suspected protocol violation: unknown participant {} sent placements", id);
            return false;
        };
        let combatant = &mut self.participants[index];
        if combatant.role() != Role::Player {
            warn!("Suspected protocol violation: observer {} sent placements", id);
            return false;
        }

        for owned in combatant.vessels() {
            let placement = placements.iter().find(|p| p.name == owned.name);
            let valid = placement.is_some_and(|p| {
                vessel::fits(p.x, p.y, p.heading, owned.length, BOARD_SIZE)
            });
            if !valid {
                warn!(
                    "Suspected protocol violation: participant {} sent invalid placement for {}",
                    id, owned.name
                );
                return false;
            }
        }

        combatant.set_readiness(placements, ready);

        if self.ready_count() == 2 {
            self.mode = Mode::Play;
            info!("Both players ready; engagement in play");
        }
        true
    }

    fn refresh_mode(&mut self) {
        let defeated = self
            .participants
            .iter()
            .any(|c| c.role() == Role::Player && !c.has_live_vessels());
        if defeated && self.mode != Mode::GameOver {
            info!("Engagement over on turn {}", self.turn_number);
            self.mode = Mode::GameOver;
        }
    }

    /// Fires `kind` from `attacker_id` at `(x, y)` on the opponent's board.
    /// Returns `None` when the attack is rejected; the turn counter only
    /// moves on accepted attacks.
    pub fn resolve_attack(
        &mut self,
        attacker_id: ClientId,
        x: i32,
        y: i32,
        kind: OrdinanceKind,
    ) -> Option<AttackReport> {
        self.refresh_mode();

        let Some(attacker_index) = self.position(attacker_id) else {
            warn!("Suspected protocol violation: attack from unknown participant {}", attacker_id);
            return None;
        };
        let attacker = &self.participants[attacker_index];

        if self.mode != Mode::Play {
            warn!(
                "Suspected protocol violation: participant {} attacked while engagement is {:?}",
                attacker_id, self.mode
            );
            return None;
        }
        if !attacker.is_turn_of(self.turn_number) {
            warn!(
                "Suspected protocol violation: participant {} attacked out of turn on turn {}",
                attacker_id, self.turn_number
            );
            return None;
        }
        if attacker.is_depleted(kind) {
            warn!(
                "Suspected protocol violation: participant {} reused depleted ordinance {}",
                attacker_id, kind
            );
            return None;
        }

        // is_turn_of guarantees a slot
        let slot = attacker.slot()?;
        let Some(defender_index) = self.player_position(slot.opponent()) else {
            warn!("Attack from {} rejected: no opponent seated", attacker_id);
            return None;
        };

        let report = match kind {
            OrdinanceKind::Standard => self.fire_standard(attacker_index, defender_index, slot, x, y),
            OrdinanceKind::Area => self.fire_area(attacker_index, defender_index, slot, x, y),
            OrdinanceKind::Reconnaissance => {
                self.fire_reconnaissance(attacker_index, defender_index, slot, x, y)
            }
        };

        debug!(
            "Turn {}: player {} fired {} at {},{} ({} hits, {} misses)",
            self.turn_number,
            slot.number(),
            kind,
            x,
            y,
            report.hits,
            report.misses
        );
        self.turn_number += 1;
        self.refresh_mode();
        Some(report)
    }

    fn fire_standard(
        &mut self,
        attacker: usize,
        defender: usize,
        slot: Slot,
        x: i32,
        y: i32,
    ) -> AttackReport {
        let mut report = AttackReport::new(slot, OrdinanceKind::Standard, x, y);
        let turn = self.turn_number;

        let target = &mut self.participants[defender];
        let shot = target.attack_at(x, y, true, turn, BOARD_SIZE);
        target.advance_vessels(BOARD_SIZE);

        if let Some(shot) = shot {
            report.tally(&shot);
            self.participants[attacker].record_shot(shot, OrdinanceKind::Standard);
        }
        report
    }

    fn fire_area(
        &mut self,
        attacker: usize,
        defender: usize,
        slot: Slot,
        x: i32,
        y: i32,
    ) -> AttackReport {
        let mut report = AttackReport::new(slot, OrdinanceKind::Area, x, y);
        let turn = self.turn_number;

        let target = &mut self.participants[defender];
        let shots = neighbourhood(x, y, AREA_RADIUS)
            .filter_map(|(cx, cy)| target.attack_at(cx, cy, true, turn, BOARD_SIZE))
            .collect::<Vec<_>>();
        target.advance_vessels(BOARD_SIZE);

        let shooter = &mut self.participants[attacker];
        for shot in shots {
            report.tally(&shot);
            shooter.record_shot(shot, OrdinanceKind::Area);
        }
        shooter.expend(OrdinanceKind::Area);
        report
    }

    /// Scans after the defender moves so the intel is current for the
    /// attacker's next turn. Nothing is damaged and nothing is announced.
    fn fire_reconnaissance(
        &mut self,
        attacker: usize,
        defender: usize,
        slot: Slot,
        x: i32,
        y: i32,
    ) -> AttackReport {
        let mut report = AttackReport::new(slot, OrdinanceKind::Reconnaissance, x, y);
        let turn = self.turn_number;

        let target = &mut self.participants[defender];
        target.advance_vessels(BOARD_SIZE);
        let intel = neighbourhood(x, y, RECON_RADIUS)
            .filter_map(|(cx, cy)| target.attack_at(cx, cy, false, turn, BOARD_SIZE))
            .collect::<Vec<_>>();

        for shot in &intel {
            report.tally(shot);
        }
        let shooter = &mut self.participants[attacker];
        shooter.replace_intel(intel);
        shooter.expend(OrdinanceKind::Reconnaissance);
        report
    }

    /// State as seen by one participant. Players only ever see their own
    /// fleet; observers additionally get both players' views.
    pub fn viewer_state(&mut self, id: ClientId) -> Option<ViewerState> {
        self.refresh_mode();
        let game_over = self.mode == Mode::GameOver;

        let viewer = self.participant(id)?;
        let observation_state = match viewer.role() {
            Role::Observer => Some(
                [Slot::First, Slot::Second]
                    .iter()
                    .map(|&slot| {
                        self.player(slot)
                            .map(|player| player.view_state(self.turn_number, game_over))
                    })
                    .collect(),
            ),
            Role::Player => None,
        };

        Some(ViewerState {
            turn_number: self.turn_number,
            mode: self.mode,
            board_size: BOARD_SIZE,
            player_state: viewer.view_state(self.turn_number, game_over),
            observation_state,
        })
    }

    pub fn send_state(&mut self, id: ClientId, emitter: &mut dyn Emitter) {
        if let Some(state) = self.viewer_state(id) {
            emitter.emit(id, Packet::StateUpdate(state));
        }
    }

    pub fn broadcast_state(&mut self, emitter: &mut dyn Emitter) {
        for id in self.participant_ids() {
            self.send_state(id, emitter);
        }
    }

    #[cfg(test)]
    pub(crate) fn participant_mut(&mut self, id: ClientId) -> Option<&mut Combatant> {
        self.participants.iter_mut().find(|c| c.id == id)
    }
}

/// Cells of the square of half-width `radius` around `(x, y)`, row by row.
/// Cells off the board are included; `attack_at` drops them. Coordinates
/// saturate at the `i32` range instead of wrapping onto the board.
fn neighbourhood(x: i32, y: i32, radius: i32) -> impl Iterator<Item = (i32, i32)> {
    (-radius..=radius).flat_map(move |dy| {
        (-radius..=radius).map(move |dx| (x.saturating_add(dx), y.saturating_add(dy)))
    })
}
