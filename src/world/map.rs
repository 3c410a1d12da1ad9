use crate::entities::creature::CreatureId;
use crate::entities::item::Item;
use crate::world::area::TileGrid;
use crate::world::item_types::ItemTypeRegistry;
use crate::world::position::Position;
use bitflags::bitflags;
use std::collections::HashMap;
use std::sync::Arc;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct TileFlags: u32 {
        const PROTECTION_ZONE = 1 << 0;
        const NO_PVP_ZONE = 1 << 1;
        const PVP_ZONE = 1 << 2;
        const NO_LOGOUT = 1 << 3;
        const REFRESH = 1 << 4;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneType {
    Protection,
    NoPvp,
    Pvp,
    Normal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tile {
    pub position: Position,
    pub flags: TileFlags,
    pub items: Vec<Item>,
    /// Topmost creature first.
    pub creatures: Vec<CreatureId>,
    /// Placeholder created for an empty map cell; never persisted.
    pub is_static: bool,
}

impl Tile {
    pub fn new(position: Position) -> Self {
        Self {
            position,
            flags: TileFlags::empty(),
            items: Vec::new(),
            creatures: Vec::new(),
            is_static: false,
        }
    }

    pub fn placeholder(position: Position) -> Self {
        Self {
            is_static: true,
            ..Self::new(position)
        }
    }

    pub fn zone(&self) -> ZoneType {
        if self.flags.contains(TileFlags::PROTECTION_ZONE) {
            ZoneType::Protection
        } else if self.flags.contains(TileFlags::NO_PVP_ZONE) {
            ZoneType::NoPvp
        } else if self.flags.contains(TileFlags::PVP_ZONE) {
            ZoneType::Pvp
        } else {
            ZoneType::Normal
        }
    }

    pub fn blocks_projectile(&self, types: &ItemTypeRegistry) -> bool {
        self.items
            .iter()
            .any(|item| types.get_or_default(item.id()).block_projectile)
    }

    pub fn has_floor_change(&self, types: &ItemTypeRegistry) -> bool {
        self.items
            .iter()
            .any(|item| types.get_or_default(item.id()).floor_change)
    }

    pub fn has_teleport(&self, types: &ItemTypeRegistry) -> bool {
        self.items
            .iter()
            .any(|item| types.get_or_default(item.id()).is_teleport())
    }

    pub fn top_creature(&self) -> Option<CreatureId> {
        self.creatures.first().copied()
    }

    pub fn add_creature(&mut self, id: CreatureId) {
        self.creatures.retain(|existing| *existing != id);
        self.creatures.insert(0, id);
    }

    pub fn remove_creature(&mut self, id: CreatureId) -> bool {
        let before = self.creatures.len();
        self.creatures.retain(|existing| *existing != id);
        before != self.creatures.len()
    }
}

/// Sparse tile storage keyed by position.
#[derive(Debug, Clone)]
pub struct Map {
    tiles: HashMap<Position, Tile>,
    types: Arc<ItemTypeRegistry>,
}

impl Map {
    pub fn new(types: Arc<ItemTypeRegistry>) -> Self {
        Self {
            tiles: HashMap::new(),
            types,
        }
    }

    pub fn item_types(&self) -> &ItemTypeRegistry {
        &self.types
    }

    pub fn shared_item_types(&self) -> Arc<ItemTypeRegistry> {
        Arc::clone(&self.types)
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn tile(&self, position: Position) -> Option<&Tile> {
        self.tiles.get(&position)
    }

    pub fn tile_mut(&mut self, position: Position) -> Option<&mut Tile> {
        self.tiles.get_mut(&position)
    }

    pub fn set_tile(&mut self, tile: Tile) {
        self.tiles.insert(tile.position, tile);
    }

    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.values()
    }

    /// Existing tile, or a fresh static placeholder stored in the map.
    pub fn tile_or_placeholder(&mut self, position: Position) -> &mut Tile {
        self.tiles
            .entry(position)
            .or_insert_with(|| Tile::placeholder(position))
    }

    fn blocks_sight(&self, position: Position) -> bool {
        self.tiles
            .get(&position)
            .map(|tile| tile.blocks_projectile(&self.types))
            .unwrap_or(false)
    }

    /// Bresenham line between the two positions; only the cells strictly
    /// between the endpoints are checked for projectile blockers.
    pub fn check_sight_line(&self, from: Position, to: Position) -> bool {
        let (mut x, mut y) = (i32::from(from.x), i32::from(from.y));
        let (end_x, end_y) = (i32::from(to.x), i32::from(to.y));
        let dx = (end_x - x).abs();
        let dy = -(end_y - y).abs();
        let step_x = if x < end_x { 1 } else { -1 };
        let step_y = if y < end_y { 1 } else { -1 };
        let mut error = dx + dy;

        loop {
            if x == end_x && y == end_y {
                return true;
            }
            let doubled = 2 * error;
            if doubled >= dy {
                error += dy;
                x += step_x;
            }
            if doubled <= dx {
                error += dx;
                y += step_y;
            }
            if x == end_x && y == end_y {
                return true;
            }
            let cell = Position::new(x as u16, y as u16, from.z);
            if self.blocks_sight(cell) {
                return false;
            }
        }
    }
}

impl TileGrid for Map {
    fn is_sight_clear(&self, from: Position, to: Position, same_floor: bool) -> bool {
        if same_floor && from.z != to.z {
            return false;
        }
        self.check_sight_line(from, to)
    }

    fn ensure_tile(&mut self, position: Position) {
        self.tile_or_placeholder(position);
    }
}
