//! Per-participant game state: fleet, shot history, intel and readiness.

use crate::vessel::Vessel;
use shared::{ClientId, CombatantView, OrdinanceKind, Role, Shot, VesselPlacement};

/// Fleet handed to every player: (name, length, speed).
pub const FLEET: [(&str, i32, i32); 5] = [
    ("carrier", 5, 1),
    ("destroyer", 4, 2),
    ("cruiser", 3, 3),
    ("submarine", 3, 2),
    ("corvette", 2, 3),
];

/// One of the two player seats in an engagement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    First,
    Second,
}

impl Slot {
    pub fn from_index(index: usize) -> Option<Slot> {
        match index {
            0 => Some(Slot::First),
            1 => Some(Slot::Second),
            _ => None,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Slot::First => 0,
            Slot::Second => 1,
        }
    }

    /// Participant number shown to clients.
    pub fn number(self) -> u8 {
        self.index() as u8 + 1
    }

    pub fn opponent(self) -> Slot {
        match self {
            Slot::First => Slot::Second,
            Slot::Second => Slot::First,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Combatant {
    pub id: ClientId,
    slot: Option<Slot>,
    role: Role,
    ready: bool,
    vessels: Vec<Vessel>,
    /// Shots this combatant has fired at its opponent.
    shots: Vec<Shot>,
    depleted: Vec<OrdinanceKind>,
    /// Result of the most recent reconnaissance scan.
    intel: Vec<Shot>,
}

impl Combatant {
    /// Players get the full fleet; observers get nothing to sink.
    pub fn new(id: ClientId, slot: Option<Slot>, role: Role) -> Self {
        let vessels = match role {
            Role::Player => FLEET
                .iter()
                .map(|(name, length, speed)| {
                    Vessel::new(name, *length, *speed, &format!("{}.png", name))
                })
                .collect(),
            Role::Observer => Vec::new(),
        };

        Self {
            id,
            slot,
            role,
            ready: false,
            vessels,
            shots: Vec::new(),
            depleted: Vec::new(),
            intel: Vec::new(),
        }
    }

    pub fn player(id: ClientId, slot: Slot) -> Self {
        Self::new(id, Some(slot), Role::Player)
    }

    pub fn observer(id: ClientId) -> Self {
        Self::new(id, None, Role::Observer)
    }

    pub fn slot(&self) -> Option<Slot> {
        self.slot
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn vessels(&self) -> &[Vessel] {
        &self.vessels
    }

    pub fn shots(&self) -> &[Shot] {
        &self.shots
    }

    pub fn intel(&self) -> &[Shot] {
        &self.intel
    }

    pub fn is_depleted(&self, kind: OrdinanceKind) -> bool {
        self.depleted.contains(&kind)
    }

    pub fn has_live_vessels(&self) -> bool {
        self.vessels.iter().any(|vessel| !vessel.is_sunk())
    }

    /// Resolves a shot landing on this combatant's board. Returns `None` for
    /// coordinates off the board. Without `live_fire` the outcome is reported
    /// but no vessel is damaged.
    pub fn attack_at(
        &mut self,
        x: i32,
        y: i32,
        live_fire: bool,
        turn_number: u32,
        board_size: i32,
    ) -> Option<Shot> {
        let on_board = |c: i32| (1..=board_size).contains(&c);
        if !on_board(x) || !on_board(y) {
            return None;
        }

        let mut shot = Shot::new(x, y, turn_number);
        for vessel in &mut self.vessels {
            if vessel.register_hit(x, y, live_fire) {
                shot.hit = true;
                if live_fire && vessel.is_sunk() {
                    shot.sunk.push(vessel.name.clone());
                }
            }
        }
        Some(shot)
    }

    pub fn advance_vessels(&mut self, board_size: i32) {
        for vessel in &mut self.vessels {
            vessel.advance(board_size, board_size);
        }
    }

    pub fn record_shot(&mut self, shot: Shot, kind: OrdinanceKind) {
        self.shots.push(shot);
        self.expend(kind);
    }

    /// Marks a limited ordinance kind as used up.
    pub fn expend(&mut self, kind: OrdinanceKind) {
        if kind.is_limited() && !self.depleted.contains(&kind) {
            self.depleted.push(kind);
        }
    }

    pub fn replace_intel(&mut self, intel: Vec<Shot>) {
        self.intel = intel;
    }

    /// Applies client placements by vessel name. Only position and heading
    /// are copied; unknown names are ignored.
    pub fn set_readiness(&mut self, placements: &[VesselPlacement], ready: bool) {
        for placement in placements {
            if let Some(vessel) = self
                .vessels
                .iter_mut()
                .find(|vessel| vessel.name == placement.name)
            {
                vessel.place(placement);
            }
        }
        self.ready = ready;
    }

    /// The first slot acts on odd turns, the second on even turns.
    pub fn is_turn_of(&self, turn_number: u32) -> bool {
        match self.slot {
            Some(Slot::First) => turn_number % 2 == 1,
            Some(Slot::Second) => turn_number % 2 == 0,
            None => false,
        }
    }

    pub fn view_state(&self, turn_number: u32, game_over: bool) -> CombatantView {
        CombatantView {
            id: self.id,
            vessels: self.vessels.iter().map(Vessel::snapshot).collect(),
            shots: self.shots.clone(),
            slot_number: self.slot.map(Slot::number),
            intel: self.intel.clone(),
            depleted_ordinance: self.depleted.clone(),
            is_turn: self.is_turn_of(turn_number),
            is_winner: game_over && self.role == Role::Player && self.has_live_vessels(),
        }
    }

    #[cfg(test)]
    pub(crate) fn vessels_mut(&mut self) -> &mut [Vessel] {
        &mut self.vessels
    }
}
