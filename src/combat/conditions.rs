use crate::combat::damage::CombatType;
use crate::entities::creature::CreatureId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionKind {
    Poison,
    Fire,
    Energy,
    Haste,
    Paralyze,
    Outfit,
    Invisible,
    Light,
    ManaShield,
    InFight,
    Drunk,
    Regeneration,
    Soul,
    Drown,
    Freezing,
    Dazzled,
    Cursed,
}

impl ConditionKind {
    pub const ALL: [ConditionKind; 17] = [
        ConditionKind::Poison,
        ConditionKind::Fire,
        ConditionKind::Energy,
        ConditionKind::Haste,
        ConditionKind::Paralyze,
        ConditionKind::Outfit,
        ConditionKind::Invisible,
        ConditionKind::Light,
        ConditionKind::ManaShield,
        ConditionKind::InFight,
        ConditionKind::Drunk,
        ConditionKind::Regeneration,
        ConditionKind::Soul,
        ConditionKind::Drown,
        ConditionKind::Freezing,
        ConditionKind::Dazzled,
        ConditionKind::Cursed,
    ];

    pub fn from_mask(mask: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.mask() == mask)
    }

    pub fn mask(self) -> u32 {
        match self {
            Self::Poison => 1,
            Self::Fire => 1 << 1,
            Self::Energy => 1 << 2,
            Self::Haste => 1 << 3,
            Self::Paralyze => 1 << 4,
            Self::Outfit => 1 << 5,
            Self::Invisible => 1 << 6,
            Self::Light => 1 << 7,
            Self::ManaShield => 1 << 8,
            Self::InFight => 1 << 9,
            Self::Drunk => 1 << 10,
            Self::Regeneration => 1 << 12,
            Self::Soul => 1 << 13,
            Self::Drown => 1 << 14,
            Self::Freezing => 1 << 17,
            Self::Dazzled => 1 << 18,
            Self::Cursed => 1 << 19,
        }
    }

    /// Damage-over-time condition matching a combat type.
    pub fn for_combat_type(kind: CombatType) -> Option<Self> {
        match kind {
            CombatType::Fire => Some(Self::Fire),
            CombatType::Energy => Some(Self::Energy),
            CombatType::Drown => Some(Self::Drown),
            CombatType::Earth => Some(Self::Poison),
            CombatType::Ice => Some(Self::Freezing),
            CombatType::Holy => Some(Self::Dazzled),
            CombatType::Death => Some(Self::Cursed),
            _ => None,
        }
    }

    pub fn combat_type(self) -> Option<CombatType> {
        match self {
            Self::Fire => Some(CombatType::Fire),
            Self::Energy => Some(CombatType::Energy),
            Self::Drown => Some(CombatType::Drown),
            Self::Poison => Some(CombatType::Earth),
            Self::Freezing => Some(CombatType::Ice),
            Self::Dazzled => Some(CombatType::Holy),
            Self::Cursed => Some(CombatType::Death),
            _ => None,
        }
    }
}

/// Bit set of condition kinds, used for immunities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConditionMask(u32);

impl ConditionMask {
    pub fn insert(&mut self, kind: ConditionKind) {
        self.0 |= kind.mask();
    }

    pub fn contains(self, kind: ConditionKind) -> bool {
        self.0 & kind.mask() != 0
    }
}

impl FromIterator<ConditionKind> for ConditionMask {
    fn from_iter<I: IntoIterator<Item = ConditionKind>>(iter: I) -> Self {
        let mut mask = Self::default();
        for kind in iter {
            mask.insert(kind);
        }
        mask
    }
}

/// A timed condition. `ticks` is the remaining lifetime in milliseconds,
/// `-1` for conditions that never run out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub kind: ConditionKind,
    pub ticks: i32,
    #[serde(default)]
    pub tick_damage: i32,
    #[serde(default = "default_interval")]
    pub interval_ms: u32,
    #[serde(skip)]
    pub owner: Option<CreatureId>,
    #[serde(skip)]
    elapsed_ms: u32,
}

fn default_interval() -> u32 {
    2000
}

impl Condition {
    pub fn new(kind: ConditionKind, ticks: i32) -> Self {
        Self {
            kind,
            ticks,
            tick_damage: 0,
            interval_ms: default_interval(),
            owner: None,
            elapsed_ms: 0,
        }
    }

    pub fn with_damage(mut self, tick_damage: i32, interval_ms: u32) -> Self {
        self.tick_damage = tick_damage;
        self.interval_ms = interval_ms.max(1);
        self
    }

    pub fn is_expired(&self) -> bool {
        self.ticks == 0
    }

    /// Advances the clock and returns the health change accumulated by the
    /// intervals that completed.
    pub fn advance(&mut self, elapsed_ms: u32) -> i32 {
        if self.is_expired() {
            return 0;
        }
        let usable = if self.ticks < 0 {
            elapsed_ms
        } else {
            let usable = elapsed_ms.min(self.ticks as u32);
            self.ticks -= usable as i32;
            usable
        };
        let interval = self.interval_ms.max(1);
        let total = self.elapsed_ms.saturating_add(usable);
        let intervals = total / interval;
        self.elapsed_ms = total % interval;
        self.tick_damage.saturating_mul(intervals as i32)
    }

    /// Refreshes an existing condition with a newly applied one.
    pub fn merge_from(&mut self, other: &Condition) {
        if self.kind != other.kind {
            return;
        }
        if self.ticks >= 0 && (other.ticks < 0 || other.ticks > self.ticks) {
            self.ticks = other.ticks;
        }
        if other.tick_damage.abs() > self.tick_damage.abs() {
            self.tick_damage = other.tick_damage;
        }
        self.interval_ms = self.interval_ms.min(other.interval_ms.max(1));
        if other.owner.is_some() {
            self.owner = other.owner;
        }
    }
}
