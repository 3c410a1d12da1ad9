use serde::{Deserialize, Serialize};

pub const MAP_MAX_LAYERS: u8 = 16;
pub const MAP_MAX_COORD: u16 = 0xFFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: u16,
    pub y: u16,
    pub z: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    North,
    East,
    South,
    West,
    Northeast,
    Northwest,
    Southeast,
    Southwest,
}

impl Position {
    pub const fn new(x: u16, y: u16, z: u8) -> Self {
        Self { x, y, z }
    }

    /// Planar translation that stays on the map: `x`/`y` below 0xFFFF and
    /// `z` below the layer count.
    pub fn translated(self, dx: i32, dy: i32) -> Option<Self> {
        let x = i32::from(self.x) + dx;
        let y = i32::from(self.y) + dy;
        let max = i32::from(MAP_MAX_COORD);
        if !(0..max).contains(&x) || !(0..max).contains(&y) || self.z >= MAP_MAX_LAYERS {
            return None;
        }
        Some(Self {
            x: x as u16,
            y: y as u16,
            z: self.z,
        })
    }

    pub fn dx(self, other: Position) -> i32 {
        i32::from(other.x) - i32::from(self.x)
    }

    pub fn dy(self, other: Position) -> i32 {
        i32::from(other.y) - i32::from(self.y)
    }

    /// Direction a caster at `self` faces when aiming at `target`.
    /// Diagonals only come back when `diagonals` is set and both axes differ;
    /// otherwise the x axis wins, and a target on the caster faces south.
    pub fn facing(self, target: Position, diagonals: bool) -> Direction {
        let dx = self.dx(target);
        let dy = self.dy(target);
        if diagonals && dx != 0 && dy != 0 {
            return match (dx < 0, dy < 0) {
                (true, true) => Direction::Northwest,
                (false, true) => Direction::Northeast,
                (true, false) => Direction::Southwest,
                (false, false) => Direction::Southeast,
            };
        }
        if dx < 0 {
            Direction::West
        } else if dx > 0 {
            Direction::East
        } else if dy < 0 {
            Direction::North
        } else {
            Direction::South
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lcg_next(state: &mut u64) -> u32 {
        *state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1);
        (*state >> 32) as u32
    }

    #[test]
    fn translation_respects_map_bounds() {
        let corner = Position::new(0, 0, 7);
        assert_eq!(corner.translated(-1, 0), None);
        assert_eq!(corner.translated(2, 3), Some(Position::new(2, 3, 7)));
        let edge = Position::new(0xFFFE, 10, 7);
        assert_eq!(edge.translated(1, 0), None);
        assert_eq!(Position::new(5, 5, 16).translated(0, 0), None);
        assert_eq!(corner.dx(Position::new(3, 9, 7)), 3);
        assert_eq!(Position::new(3, 9, 7).dy(corner), -9);
    }

    #[test]
    fn translation_is_reversible_inside_the_map() {
        let mut state = 0xfeed_face_cafe_beef;
        for _ in 0..256 {
            let origin = Position::new(
                200 + (lcg_next(&mut state) % 100) as u16,
                200 + (lcg_next(&mut state) % 100) as u16,
                (lcg_next(&mut state) % u32::from(MAP_MAX_LAYERS)) as u8,
            );
            let dx = (lcg_next(&mut state) % 7) as i32 - 3;
            let dy = (lcg_next(&mut state) % 7) as i32 - 3;
            let next = origin.translated(dx, dy).expect("inside");
            assert_eq!(origin.dx(next), dx);
            assert_eq!(origin.dy(next), dy);
            assert_eq!(next.translated(-dx, -dy), Some(origin));
        }
    }

    #[test]
    fn facing_prefers_x_axis_without_diagonals() {
        let center = Position::new(100, 100, 7);
        let at = |dx, dy| center.translated(dx, dy).expect("inside");
        assert_eq!(center.facing(center, false), Direction::South);
        assert_eq!(center.facing(at(0, -2), false), Direction::North);
        assert_eq!(center.facing(at(-1, -5), false), Direction::West);
        assert_eq!(center.facing(at(3, 1), false), Direction::East);
        assert_eq!(center.facing(at(0, 4), true), Direction::South);
        assert_eq!(center.facing(at(-1, -5), true), Direction::Northwest);
        assert_eq!(center.facing(at(2, -1), true), Direction::Northeast);
        assert_eq!(center.facing(at(-2, 1), true), Direction::Southwest);
        assert_eq!(center.facing(at(1, 1), true), Direction::Southeast);
    }
}
