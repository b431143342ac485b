use shared::{Heading, VesselPlacement, VesselState, UNPLACED};

/// A single ship: where it is, which way it faces and which of its segments
/// have been hit.
#[derive(Debug, Clone)]
pub struct Vessel {
    pub name: String,
    pub length: i32,
    pub speed: i32,
    pub heading: Heading,
    pub x: i32,
    pub y: i32,
    /// One flag per segment, counted from the anchor outward. Never resized.
    hits: Vec<bool>,
    pub sprite: String,
}

impl Vessel {
    pub fn new(name: &str, length: i32, speed: i32, sprite: &str) -> Self {
        Self {
            name: name.to_string(),
            length,
            speed,
            heading: Heading::East,
            x: UNPLACED,
            y: UNPLACED,
            hits: vec![false; length.max(0) as usize],
            sprite: sprite.to_string(),
        }
    }

    pub fn hits(&self) -> &[bool] {
        &self.hits
    }

    pub fn is_placed(&self) -> bool {
        self.x > UNPLACED && self.y > UNPLACED
    }

    pub fn is_sunk(&self) -> bool {
        self.hits.iter().all(|hit| *hit)
    }

    /// Copies position and heading from a client placement. Length, speed and
    /// damage are never taken from the client.
    pub fn place(&mut self, placement: &VesselPlacement) {
        self.x = placement.x;
        self.y = placement.y;
        self.heading = placement.heading;
    }

    /// Moves the vessel one patrol step. A vessel already flush against the
    /// edge it is heading for turns around instead of moving.
    pub fn advance(&mut self, max_x: i32, max_y: i32) {
        if self.is_sunk() || !self.is_placed() {
            return;
        }

        match self.heading {
            Heading::East => {
                if self.x + self.length <= max_x {
                    self.x = (max_x - self.length + 1).min(self.x + self.speed);
                } else {
                    self.heading = self.heading.reversed();
                }
            }
            Heading::South => {
                if self.y + self.length <= max_y {
                    self.y = (max_y - self.length + 1).min(self.y + self.speed);
                } else {
                    self.heading = self.heading.reversed();
                }
            }
            Heading::West => {
                if self.x - self.length > 0 {
                    self.x = self.length.max(self.x - self.speed);
                } else {
                    self.heading = self.heading.reversed();
                }
            }
            Heading::North => {
                if self.y - self.length > 0 {
                    self.y = self.length.max(self.y - self.speed);
                } else {
                    self.heading = self.heading.reversed();
                }
            }
        }
    }

    /// Returns true if `(x, y)` lands on a segment that was not yet damaged.
    /// With `commit` the segment is marked; without it the vessel is left
    /// untouched.
    pub fn register_hit(&mut self, x: i32, y: i32, commit: bool) -> bool {
        let Some(index) = self.segment_at(x, y) else {
            return false;
        };

        if self.hits[index] {
            return false;
        }
        if commit {
            self.hits[index] = true;
        }
        true
    }

    fn segment_at(&self, x: i32, y: i32) -> Option<usize> {
        if !self.is_placed() {
            return None;
        }

        let offset = match self.heading {
            Heading::East if y == self.y => x - self.x,
            Heading::South if x == self.x => y - self.y,
            Heading::West if y == self.y => self.x - x,
            Heading::North if x == self.x => self.y - y,
            _ => return None,
        };

        if (0..self.length).contains(&offset) {
            Some(offset as usize)
        } else {
            None
        }
    }

    pub fn snapshot(&self) -> VesselState {
        VesselState {
            x: self.x,
            y: self.y,
            name: self.name.clone(),
            heading: self.heading,
            hits: self.hits.clone(),
            speed: self.speed,
            length: self.length,
            sprite: self.sprite.clone(),
        }
    }

    #[cfg(test)]
    pub(crate) fn sink(&mut self) {
        self.hits.iter_mut().for_each(|hit| *hit = true);
    }
}

/// Cells covered by a vessel of `length` anchored at `(x, y)`.
pub fn footprint(x: i32, y: i32, heading: Heading, length: i32) -> Vec<(i32, i32)> {
    let (dx, dy) = heading.step();
    (0..length).map(|i| (x + dx * i, y + dy * i)).collect()
}

/// True if every cell of the footprint lies on a `board_size` board. The
/// anchor is checked first so client coordinates never reach the footprint
/// arithmetic unbounded.
pub fn fits(x: i32, y: i32, heading: Heading, length: i32, board_size: i32) -> bool {
    let on_board = |c: i32| (1..=board_size).contains(&c);
    if !on_board(x) || !on_board(y) || !(0..=board_size).contains(&length) {
        return false;
    }

    footprint(x, y, heading, length)
        .iter()
        .all(|&(cx, cy)| on_board(cx) && on_board(cy))
}
