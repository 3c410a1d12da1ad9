use crate::combat::damage::CombatType;
use crate::combat::rules::CombatRules;
use crate::entities::creature::{Creature, CreatureId};
use crate::entities::item::Item;
use crate::world::area::TileGrid;
use crate::world::item_types::ItemTypeRegistry;
use crate::world::map::{Tile, ZoneType};
use crate::world::position::Position;

/// Half-extent of a client's view, added to a combat's reach when
/// collecting the creatures that see its effects.
pub const MAX_VIEWPORT_X: i32 = 8;
pub const MAX_VIEWPORT_Y: i32 = 6;

/// Everything the combat engine needs from the world it runs in.
pub trait CombatContext: TileGrid {
    fn rules(&self) -> &CombatRules;

    fn item_types(&self) -> &ItemTypeRegistry;

    fn creature(&self, id: CreatureId) -> Option<&Creature>;

    fn creature_mut(&mut self, id: CreatureId) -> Option<&mut Creature>;

    fn tile(&self, position: Position) -> Option<&Tile>;

    /// Players within `range_x`/`range_y` of `center` on the same floor.
    fn spectators(&self, center: Position, range_x: i32, range_y: i32) -> Vec<CreatureId>;

    fn roll_normal(&mut self, min: i32, max: i32) -> i32;

    /// Shield and armor pass. May shrink `change`; `true` vetoes the hit.
    fn block_hit(
        &mut self,
        attacker: Option<CreatureId>,
        target: CreatureId,
        combat_type: CombatType,
        change: &mut i32,
        check_defense: bool,
        check_armor: bool,
    ) -> bool;

    fn change_health(
        &mut self,
        attacker: Option<CreatureId>,
        target: CreatureId,
        combat_type: CombatType,
        change: i32,
    ) -> bool;

    fn change_mana(&mut self, attacker: Option<CreatureId>, target: CreatureId, change: i32)
        -> bool;

    fn add_magic_effect(&mut self, spectators: &[CreatureId], position: Position, effect: u8);

    fn add_distance_effect(&mut self, from: Position, to: Position, effect: u8);

    /// Places an item on the tile; `false` when the tile refused it.
    fn add_item(&mut self, position: Position, item: Item) -> bool;

    fn start_decay(&mut self, position: Position, item_id: u16);

    /// Upper bound of the damage `weapon` deals in `attacker`'s hands.
    fn max_weapon_damage(&self, attacker: &Creature, weapon: &Item) -> i32;

    fn on_attacked_creature(&mut self, attacker: CreatureId, target: CreatureId);

    fn on_attacked(&mut self, target: CreatureId);

    fn add_in_fight_ticks(&mut self, player: CreatureId, ticks: u32, pz_lock: bool);
}

/// Zone of the tile a creature stands on.
pub fn creature_zone<C: CombatContext + ?Sized>(ctx: &C, creature: &Creature) -> ZoneType {
    ctx.tile(creature.position)
        .map(Tile::zone)
        .unwrap_or(ZoneType::Normal)
}

/// The creature's master when that master is a player.
pub fn player_master<'a, C: CombatContext + ?Sized>(
    ctx: &'a C,
    creature: &Creature,
) -> Option<&'a Creature> {
    creature
        .master
        .and_then(|id| ctx.creature(id))
        .filter(|master| master.is_player())
}

/// The player itself, or the player commanding a summon.
pub fn player_in_charge<'a, C: CombatContext + ?Sized>(
    ctx: &'a C,
    creature: &'a Creature,
) -> Option<&'a Creature> {
    if creature.is_player() {
        return Some(creature);
    }
    player_master(ctx, creature)
}

pub fn is_player_summon<C: CombatContext + ?Sized>(ctx: &C, creature: &Creature) -> bool {
    player_master(ctx, creature).is_some()
}
