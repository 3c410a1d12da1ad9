use crate::combat::conditions::{Condition, ConditionKind, ConditionMask};
use crate::entities::item::Item;
use crate::entities::stats::Stats;
use crate::world::position::Position;
use bitflags::bitflags;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CreatureId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreatureKind {
    Player,
    Npc,
    Monster,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Skull {
    #[default]
    None,
    Yellow,
    Green,
    White,
    Red,
    Black,
}

bitflags! {
    /// Group permissions that bend combat rules.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct PlayerFlags: u32 {
        const CANNOT_USE_COMBAT = 1 << 0;
        const CANNOT_ATTACK_PLAYER = 1 << 1;
        const CANNOT_ATTACK_MONSTER = 1 << 2;
        const CANNOT_BE_ATTACKED = 1 << 3;
        const IGNORE_PROTECTION_ZONE = 1 << 4;
        const NOT_GAIN_IN_FIGHT = 1 << 5;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vocation {
    pub healing_multiplier: f32,
    pub magic_multiplier: f32,
}

impl Default for Vocation {
    fn default() -> Self {
        Self {
            healing_multiplier: 1.0,
            magic_multiplier: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GuildMembership {
    pub guild_id: u32,
    pub enemies: HashSet<u32>,
    pub at_war: bool,
}

/// Fixed damage range a creature brings to every combat it casts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CombatValues {
    pub min: i32,
    pub max: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Creature {
    pub id: CreatureId,
    pub name: String,
    pub kind: CreatureKind,
    pub position: Position,
    pub stats: Stats,
    pub level: u32,
    pub magic_level: u32,
    pub melee_skill: u32,
    pub vocation: Vocation,
    pub skull: Skull,
    pub flags: PlayerFlags,
    pub safe_mode: bool,
    pub guild: Option<GuildMembership>,
    pub party_id: Option<u32>,
    pub master: Option<CreatureId>,
    pub attackable: bool,
    pub combat_values: Option<CombatValues>,
    pub weapon: Option<Item>,
    pub immunities: ConditionMask,
    pub conditions: Vec<Condition>,
    pub attacked: HashSet<CreatureId>,
    pub attack_locked: HashSet<CreatureId>,
    pub pz_locked: bool,
}

impl Creature {
    pub fn new(id: CreatureId, name: &str, kind: CreatureKind, position: Position) -> Self {
        Self {
            id,
            name: name.to_string(),
            kind,
            position,
            stats: Stats::default(),
            level: 1,
            magic_level: 0,
            melee_skill: 10,
            vocation: Vocation::default(),
            skull: Skull::None,
            flags: PlayerFlags::empty(),
            safe_mode: true,
            guild: None,
            party_id: None,
            master: None,
            attackable: kind != CreatureKind::Npc,
            combat_values: None,
            weapon: None,
            immunities: ConditionMask::default(),
            conditions: Vec::new(),
            attacked: HashSet::new(),
            attack_locked: HashSet::new(),
            pz_locked: false,
        }
    }

    pub fn player(id: CreatureId, name: &str, position: Position) -> Self {
        Self::new(id, name, CreatureKind::Player, position)
    }

    pub fn monster(id: CreatureId, name: &str, position: Position) -> Self {
        Self::new(id, name, CreatureKind::Monster, position)
    }

    pub fn is_player(&self) -> bool {
        self.kind == CreatureKind::Player
    }

    pub fn is_monster(&self) -> bool {
        self.kind == CreatureKind::Monster
    }

    pub fn has_flag(&self, flag: PlayerFlags) -> bool {
        self.is_player() && self.flags.contains(flag)
    }

    pub fn is_partner(&self, other: &Creature) -> bool {
        match (self.party_id, other.party_id) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    pub fn is_guild_enemy(&self, other: &Creature) -> bool {
        match (&self.guild, &other.guild) {
            (Some(own), Some(theirs)) => own.enemies.contains(&theirs.guild_id),
            _ => false,
        }
    }

    /// Same guild, and that guild is at war.
    pub fn is_war_partner(&self, other: &Creature) -> bool {
        match (&self.guild, &other.guild) {
            (Some(own), Some(theirs)) => own.guild_id == theirs.guild_id && own.at_war,
            _ => false,
        }
    }

    pub fn has_attacked(&self, other: &Creature) -> bool {
        if self.has_flag(PlayerFlags::NOT_GAIN_IN_FIGHT) {
            return false;
        }
        self.attacked.contains(&other.id)
    }

    pub fn is_attack_locked_against(&self, other: &Creature) -> bool {
        self.attack_locked.contains(&other.id)
    }

    pub fn is_immune(&self, kind: ConditionKind) -> bool {
        self.immunities.contains(kind)
    }

    pub fn has_condition(&self, kind: ConditionKind) -> bool {
        self.conditions.iter().any(|condition| condition.kind == kind)
    }

    /// Adds or refreshes a condition; immunities refuse it.
    pub fn add_condition(&mut self, condition: Condition) -> bool {
        if self.is_immune(condition.kind) {
            return false;
        }
        if let Some(existing) = self
            .conditions
            .iter_mut()
            .find(|existing| existing.kind == condition.kind)
        {
            existing.merge_from(&condition);
            return true;
        }
        self.conditions.push(condition);
        true
    }

    pub fn remove_condition(&mut self, kind: ConditionKind) -> bool {
        let before = self.conditions.len();
        self.conditions.retain(|condition| condition.kind != kind);
        before != self.conditions.len()
    }
}
