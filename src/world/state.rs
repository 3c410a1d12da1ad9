use crate::combat::context::{player_in_charge, CombatContext};
use crate::combat::damage::{roll_normal, CombatType};
use crate::combat::legality::is_in_pvp_zone;
use crate::combat::params::effects;
use crate::combat::rules::CombatRules;
use crate::entities::creature::{Creature, CreatureId, PlayerFlags, Skull};
use crate::entities::item::Item;
use crate::entities::item_attributes::DecayState;
use crate::world::area::TileGrid;
use crate::world::item_types::ItemTypeRegistry;
use crate::world::map::{Map, Tile, TileFlags};
use crate::world::position::Position;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Something the world did that clients or logs would want to see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorldEvent {
    MagicEffect {
        position: Position,
        effect: u8,
        viewers: usize,
    },
    DistanceEffect {
        from: Position,
        to: Position,
        effect: u8,
    },
    HealthChanged {
        attacker: Option<CreatureId>,
        target: CreatureId,
        combat_type: CombatType,
        change: i32,
    },
    ManaChanged {
        attacker: Option<CreatureId>,
        target: CreatureId,
        change: i32,
    },
    HitBlocked {
        target: CreatureId,
    },
    ItemAdded {
        position: Position,
        item_id: u16,
    },
    DecayStarted {
        position: Position,
        item_id: u16,
    },
    InFight {
        player: CreatureId,
        ticks: u32,
        pz_locked: bool,
    },
    Died {
        creature: CreatureId,
    },
}

/// Map plus creatures: the world a combat runs against.
#[derive(Debug)]
pub struct WorldState {
    map: Map,
    creatures: BTreeMap<CreatureId, Creature>,
    rules: CombatRules,
    types: Arc<ItemTypeRegistry>,
    rng: ChaCha8Rng,
    in_fight: HashMap<CreatureId, u32>,
    events: Vec<WorldEvent>,
}

impl WorldState {
    pub fn new(types: Arc<ItemTypeRegistry>, rules: CombatRules, seed: u64) -> Self {
        Self::from_map(Map::new(Arc::clone(&types)), rules, seed)
    }

    pub fn from_map(map: Map, rules: CombatRules, seed: u64) -> Self {
        let types = map.shared_item_types();
        Self {
            map,
            creatures: BTreeMap::new(),
            rules,
            types,
            rng: ChaCha8Rng::seed_from_u64(seed),
            in_fight: HashMap::new(),
            events: Vec::new(),
        }
    }

    pub fn map(&self) -> &Map {
        &self.map
    }

    pub fn map_mut(&mut self) -> &mut Map {
        &mut self.map
    }

    pub fn rules_mut(&mut self) -> &mut CombatRules {
        &mut self.rules
    }

    /// Creates the tile, or replaces the flags of the one already there.
    pub fn add_tile(&mut self, position: Position, flags: TileFlags) {
        match self.map.tile_mut(position) {
            Some(tile) => tile.flags = flags,
            None => {
                let mut tile = Tile::new(position);
                tile.flags = flags;
                self.map.set_tile(tile);
            }
        }
    }

    pub fn place_item(&mut self, position: Position, item_id: u16, count: u16) {
        let item = Item::new(&self.types, item_id, count);
        self.map.tile_or_placeholder(position).items.push(item);
    }

    /// Registers the creature and puts it on top of its tile.
    pub fn add_creature(&mut self, creature: Creature) {
        let id = creature.id;
        let position = creature.position;
        if let Some(previous) = self.creatures.insert(id, creature) {
            if let Some(tile) = self.map.tile_mut(previous.position) {
                tile.remove_creature(id);
            }
        }
        self.map.tile_or_placeholder(position).add_creature(id);
    }

    pub fn remove_creature(&mut self, id: CreatureId) -> Option<Creature> {
        let creature = self.creatures.remove(&id)?;
        if let Some(tile) = self.map.tile_mut(creature.position) {
            tile.remove_creature(id);
        }
        self.in_fight.remove(&id);
        Some(creature)
    }

    pub fn creatures(&self) -> impl Iterator<Item = &Creature> {
        self.creatures.values()
    }

    pub fn creature_count(&self) -> usize {
        self.creatures.len()
    }

    pub fn in_fight_ticks(&self, id: CreatureId) -> u32 {
        self.in_fight.get(&id).copied().unwrap_or(0)
    }

    pub fn events(&self) -> &[WorldEvent] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.events)
    }

    /// Advances conditions and fight timers by `elapsed_ms`. Condition
    /// damage is applied to the carrier; expired conditions are dropped.
    pub fn tick(&mut self, elapsed_ms: u32) {
        let mut deaths = Vec::new();
        for creature in self.creatures.values_mut() {
            let mut total = Vec::new();
            for condition in &mut creature.conditions {
                let change = condition.advance(elapsed_ms);
                if change != 0 {
                    let combat_type = condition.kind.combat_type().unwrap_or(CombatType::Undefined);
                    total.push((condition.owner, combat_type, change));
                }
            }
            creature.conditions.retain(|condition| !condition.is_expired());

            let was_alive = !creature.stats.is_dead();
            for (owner, combat_type, change) in total {
                let applied = creature.stats.change_health(combat_type, change);
                if applied != 0 {
                    self.events.push(WorldEvent::HealthChanged {
                        attacker: owner,
                        target: creature.id,
                        combat_type,
                        change: applied,
                    });
                }
            }
            if was_alive && creature.stats.is_dead() {
                deaths.push(creature.id);
            }
        }
        for creature in deaths {
            tracing::debug!(creature = creature.0, "creature died from conditions");
            self.events.push(WorldEvent::Died { creature });
        }

        let mut expired = Vec::new();
        for (id, ticks) in self.in_fight.iter_mut() {
            *ticks = ticks.saturating_sub(elapsed_ms);
            if *ticks == 0 {
                expired.push(*id);
            }
        }
        for id in expired {
            self.in_fight.remove(&id);
            if let Some(creature) = self.creatures.get_mut(&id) {
                creature.pz_locked = false;
                creature.attacked.clear();
            }
        }
    }

    fn note_attack(&mut self, attacker: CreatureId, target: CreatureId) {
        let Some(attacker_creature) = self.creatures.get(&attacker) else {
            return;
        };
        let Some(target_creature) = self.creatures.get(&target) else {
            return;
        };
        let Some(player) = player_in_charge(&*self, attacker_creature) else {
            return;
        };
        let Some(victim) = player_in_charge(&*self, target_creature) else {
            return;
        };
        if player.id == victim.id {
            return;
        }

        let unmarked = !player.is_partner(victim)
            && !player.is_war_partner(victim)
            && !player.is_guild_enemy(victim)
            && !is_in_pvp_zone(&*self, player, victim)
            && !victim.has_attacked(player)
            && !player.has_flag(PlayerFlags::NOT_GAIN_IN_FIGHT);
        let gets_skull = unmarked && player.skull == Skull::None && victim.skull == Skull::None;
        let (player, victim) = (player.id, victim.id);

        if let Some(player) = self.creatures.get_mut(&player) {
            if unmarked {
                player.attacked.insert(victim);
            }
            if gets_skull {
                tracing::debug!(player = player.id.0, victim = victim.0, "white skull");
                player.skull = Skull::White;
            }
        }
    }
}

impl TileGrid for WorldState {
    fn is_sight_clear(&self, from: Position, to: Position, same_floor: bool) -> bool {
        self.map.is_sight_clear(from, to, same_floor)
    }

    fn ensure_tile(&mut self, position: Position) {
        self.map.ensure_tile(position);
    }
}

impl CombatContext for WorldState {
    fn rules(&self) -> &CombatRules {
        &self.rules
    }

    fn item_types(&self) -> &ItemTypeRegistry {
        &self.types
    }

    fn creature(&self, id: CreatureId) -> Option<&Creature> {
        self.creatures.get(&id)
    }

    fn creature_mut(&mut self, id: CreatureId) -> Option<&mut Creature> {
        self.creatures.get_mut(&id)
    }

    fn tile(&self, position: Position) -> Option<&Tile> {
        self.map.tile(position)
    }

    fn spectators(&self, center: Position, range_x: i32, range_y: i32) -> Vec<CreatureId> {
        self.creatures
            .values()
            .filter(|creature| {
                creature.is_player()
                    && creature.position.z == center.z
                    && center.dx(creature.position).abs() <= range_x
                    && center.dy(creature.position).abs() <= range_y
            })
            .map(|creature| creature.id)
            .collect()
    }

    fn roll_normal(&mut self, min: i32, max: i32) -> i32 {
        roll_normal(&mut self.rng, min, max)
    }

    /// Damage the target is fully resistant to counts as blocked.
    fn block_hit(
        &mut self,
        _attacker: Option<CreatureId>,
        target: CreatureId,
        combat_type: CombatType,
        change: &mut i32,
        _check_defense: bool,
        _check_armor: bool,
    ) -> bool {
        if *change >= 0 {
            return false;
        }
        let Some(creature) = self.creatures.get(&target) else {
            return true;
        };
        let absorbed = creature
            .stats
            .resistances
            .apply(combat_type, change.saturating_neg())
            == 0;
        if absorbed {
            *change = 0;
            let position = creature.position;
            self.events.push(WorldEvent::HitBlocked { target });
            let viewers = self.spectators(position, 8, 6);
            self.add_magic_effect(&viewers, position, effects::MAGIC_EFFECT_BLOCKHIT);
        }
        absorbed
    }

    fn change_health(
        &mut self,
        attacker: Option<CreatureId>,
        target: CreatureId,
        combat_type: CombatType,
        change: i32,
    ) -> bool {
        let Some(creature) = self.creatures.get_mut(&target) else {
            return false;
        };
        if creature.stats.is_dead() {
            return false;
        }
        let applied = creature.stats.change_health(combat_type, change);
        let died = creature.stats.is_dead();
        self.events.push(WorldEvent::HealthChanged {
            attacker,
            target,
            combat_type,
            change: applied,
        });
        if died {
            tracing::debug!(target = target.0, "creature died");
            self.events.push(WorldEvent::Died { creature: target });
        }
        true
    }

    fn change_mana(&mut self, attacker: Option<CreatureId>, target: CreatureId, change: i32) -> bool {
        let Some(creature) = self.creatures.get_mut(&target) else {
            return false;
        };
        if creature.stats.is_dead() {
            return false;
        }
        let applied = creature.stats.change_mana(change);
        self.events.push(WorldEvent::ManaChanged {
            attacker,
            target,
            change: applied,
        });
        true
    }

    fn add_magic_effect(&mut self, spectators: &[CreatureId], position: Position, effect: u8) {
        self.events.push(WorldEvent::MagicEffect {
            position,
            effect,
            viewers: spectators.len(),
        });
    }

    fn add_distance_effect(&mut self, from: Position, to: Position, effect: u8) {
        self.events.push(WorldEvent::DistanceEffect { from, to, effect });
    }

    fn add_item(&mut self, position: Position, item: Item) -> bool {
        let Some(tile) = self.map.tile_mut(position) else {
            return false;
        };
        let item_id = item.id();
        tile.items.push(item);
        self.events.push(WorldEvent::ItemAdded { position, item_id });
        true
    }

    fn start_decay(&mut self, position: Position, item_id: u16) {
        let types = Arc::clone(&self.types);
        let Some(tile) = self.map.tile_mut(position) else {
            return;
        };
        let Some(item) = tile
            .items
            .iter_mut()
            .rev()
            .find(|item| item.id() == item_id && item.can_decay(&types))
        else {
            return;
        };
        item.attributes_mut().set_decaying(DecayState::Pending);
        self.events.push(WorldEvent::DecayStarted { position, item_id });
    }

    fn max_weapon_damage(&self, attacker: &Creature, weapon: &Item) -> i32 {
        let attack = f64::from(self.types.get_or_default(weapon.id()).attack.max(0));
        let skill = f64::from(attacker.melee_skill);
        (skill * attack * 0.05 + attack * 0.5).ceil() as i32
    }

    fn on_attacked_creature(&mut self, attacker: CreatureId, target: CreatureId) {
        self.note_attack(attacker, target);
        let view: &Self = self;
        let player = view
            .creatures
            .get(&attacker)
            .and_then(|creature| player_in_charge(view, creature))
            .map(|player| player.id);
        if let Some(player) = player {
            let ticks = self.rules.in_fight_duration_ms;
            self.add_in_fight_ticks(player, ticks, false);
        }
    }

    fn on_attacked(&mut self, target: CreatureId) {
        let is_player = self
            .creatures
            .get(&target)
            .map(Creature::is_player)
            .unwrap_or(false);
        if is_player {
            let ticks = self.rules.in_fight_duration_ms;
            self.add_in_fight_ticks(target, ticks, false);
        }
    }

    fn add_in_fight_ticks(&mut self, player: CreatureId, ticks: u32, pz_lock: bool) {
        let Some(creature) = self.creatures.get_mut(&player) else {
            return;
        };
        if !creature.is_player() {
            return;
        }
        if pz_lock {
            creature.pz_locked = true;
        }
        let pz_locked = creature.pz_locked;
        let entry = self.in_fight.entry(player).or_insert(0);
        *entry = (*entry).max(ticks);
        self.events.push(WorldEvent::InFight {
            player,
            ticks,
            pz_locked,
        });
    }
}
