use crate::combat::conditions::{Condition, ConditionKind};
use crate::combat::damage::CombatType;
use crate::entities::creature::Creature;
use crate::world::position::Position;
use std::fmt;
use std::sync::Arc;

/// Magic effect and projectile ids shown to clients.
pub mod effects {
    pub const MAGIC_EFFECT_NONE: u8 = 0xFF;
    pub const MAGIC_EFFECT_BLOCKHIT: u8 = 3;

    pub const SHOOT_NONE: u8 = 0xFF;
    /// Resolved from the caster's weapon when the effect is shown.
    pub const SHOOT_WEAPON_TYPE: u8 = 0xFE;
    pub const SHOOT_WHIRLWIND_SWORD: u8 = 24;
    pub const SHOOT_WHIRLWIND_AXE: u8 = 25;
    pub const SHOOT_WHIRLWIND_CLUB: u8 = 26;

    pub const TEXT_COLOR_NONE: u8 = 0xFF;
}

#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("hook {hook} failed: {reason}")]
    Failed { hook: &'static str, reason: String },
    #[error("hook {hook} returned an invalid range {min}..{max}")]
    InvalidRange {
        hook: &'static str,
        min: i32,
        max: i32,
    },
}

/// Computes the `(min, max)` change for a player caster.
pub trait ValueHook: Send + Sync {
    fn min_max(
        &self,
        caster: &Creature,
        target: Option<&Creature>,
    ) -> Result<(i32, i32), HookError>;
}

/// Runs once per tile the combat touched.
pub trait TileHook: Send + Sync {
    fn on_tile(&self, caster: Option<&Creature>, position: Position) -> Result<(), HookError>;
}

/// Runs once per creature the effect was applied to.
pub trait TargetHook: Send + Sync {
    fn on_target(&self, caster: Option<&Creature>, target: &Creature) -> Result<(), HookError>;
}

/// Numeric keys of the key/value configuration surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CombatParam {
    CombatType = 1,
    Effect = 2,
    DistanceEffect = 3,
    BlockedByShield = 4,
    BlockedByArmor = 5,
    TargetCasterOrTopMost = 6,
    CreateItem = 7,
    Aggressive = 8,
    Dispel = 9,
    UseCharges = 10,
    HitEffect = 11,
    HitTextColor = 12,
    PzBlock = 13,
}

impl CombatParam {
    pub fn from_key(key: u32) -> Option<Self> {
        let param = match key {
            1 => Self::CombatType,
            2 => Self::Effect,
            3 => Self::DistanceEffect,
            4 => Self::BlockedByShield,
            5 => Self::BlockedByArmor,
            6 => Self::TargetCasterOrTopMost,
            7 => Self::CreateItem,
            8 => Self::Aggressive,
            9 => Self::Dispel,
            10 => Self::UseCharges,
            11 => Self::HitEffect,
            12 => Self::HitTextColor,
            13 => Self::PzBlock,
            _ => return None,
        };
        Some(param)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let param = match name {
            "combat_type" | "type" => Self::CombatType,
            "effect" => Self::Effect,
            "distance_effect" => Self::DistanceEffect,
            "blocked_by_shield" => Self::BlockedByShield,
            "blocked_by_armor" => Self::BlockedByArmor,
            "target_caster_or_topmost" => Self::TargetCasterOrTopMost,
            "create_item" => Self::CreateItem,
            "aggressive" => Self::Aggressive,
            "dispel" => Self::Dispel,
            "use_charges" => Self::UseCharges,
            "hit_effect" => Self::HitEffect,
            "hit_text_color" => Self::HitTextColor,
            "pz_block" => Self::PzBlock,
            _ => return None,
        };
        Some(param)
    }
}

#[derive(Clone)]
pub struct CombatParams {
    pub combat_type: CombatType,
    pub impact_effect: u8,
    pub distance_effect: u8,
    pub blocked_by_shield: bool,
    pub blocked_by_armor: bool,
    pub aggressive: bool,
    pub pz_block: bool,
    pub target_caster_or_topmost: bool,
    pub use_charges: bool,
    pub hit_effect: u8,
    pub hit_text_color: u8,
    pub conditions: Vec<Condition>,
    pub dispel_type: Option<ConditionKind>,
    pub item_id: u16,
    pub value_hook: Option<Arc<dyn ValueHook>>,
    pub tile_hook: Option<Arc<dyn TileHook>>,
    pub target_hook: Option<Arc<dyn TargetHook>>,
}

impl Default for CombatParams {
    fn default() -> Self {
        Self {
            combat_type: CombatType::None,
            impact_effect: effects::MAGIC_EFFECT_NONE,
            distance_effect: effects::SHOOT_NONE,
            blocked_by_shield: false,
            blocked_by_armor: false,
            aggressive: true,
            pz_block: false,
            target_caster_or_topmost: false,
            use_charges: false,
            hit_effect: effects::MAGIC_EFFECT_NONE,
            hit_text_color: effects::TEXT_COLOR_NONE,
            conditions: Vec::new(),
            dispel_type: None,
            item_id: 0,
            value_hook: None,
            tile_hook: None,
            target_hook: None,
        }
    }
}

impl fmt::Debug for CombatParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CombatParams")
            .field("combat_type", &self.combat_type)
            .field("impact_effect", &self.impact_effect)
            .field("distance_effect", &self.distance_effect)
            .field("aggressive", &self.aggressive)
            .field("target_caster_or_topmost", &self.target_caster_or_topmost)
            .field("conditions", &self.conditions)
            .field("dispel_type", &self.dispel_type)
            .field("item_id", &self.item_id)
            .field("value_hook", &self.value_hook.is_some())
            .field("tile_hook", &self.tile_hook.is_some())
            .field("target_hook", &self.target_hook.is_some())
            .finish_non_exhaustive()
    }
}

impl CombatParams {
    /// Applies one key/value pair; `false` when the value is not valid for
    /// the key.
    pub fn set(&mut self, param: CombatParam, value: u32) -> bool {
        match param {
            CombatParam::CombatType => match CombatType::from_mask(value) {
                Some(kind) => self.combat_type = kind,
                None => return false,
            },
            CombatParam::Effect => self.impact_effect = value as u8,
            CombatParam::DistanceEffect => self.distance_effect = value as u8,
            CombatParam::BlockedByShield => self.blocked_by_shield = value != 0,
            CombatParam::BlockedByArmor => self.blocked_by_armor = value != 0,
            CombatParam::TargetCasterOrTopMost => self.target_caster_or_topmost = value != 0,
            CombatParam::CreateItem => self.item_id = value as u16,
            CombatParam::Aggressive => self.aggressive = value != 0,
            CombatParam::Dispel => {
                if value == 0 {
                    self.dispel_type = None;
                } else {
                    match ConditionKind::from_mask(value) {
                        Some(kind) => self.dispel_type = Some(kind),
                        None => return false,
                    }
                }
            }
            CombatParam::UseCharges => self.use_charges = value != 0,
            CombatParam::HitEffect => self.hit_effect = value as u8,
            CombatParam::HitTextColor => self.hit_text_color = value as u8,
            CombatParam::PzBlock => self.pz_block = value != 0,
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_and_names_resolve() {
        for key in 1..=13 {
            let param = CombatParam::from_key(key).expect("known key");
            assert_eq!(param as u32, key);
        }
        assert_eq!(CombatParam::from_key(0), None);
        assert_eq!(CombatParam::from_key(14), None);
        assert_eq!(
            CombatParam::from_name("distance_effect"),
            Some(CombatParam::DistanceEffect)
        );
        assert_eq!(CombatParam::from_name("speed"), None);
    }

    #[test]
    fn set_updates_fields() {
        let mut params = CombatParams::default();
        assert!(params.aggressive);
        assert!(params.set(CombatParam::CombatType, CombatType::Fire.mask()));
        assert!(params.set(CombatParam::Aggressive, 0));
        assert!(params.set(CombatParam::CreateItem, 1492));
        assert!(params.set(CombatParam::Dispel, ConditionKind::Paralyze.mask()));
        assert_eq!(params.combat_type, CombatType::Fire);
        assert!(!params.aggressive);
        assert_eq!(params.item_id, 1492);
        assert_eq!(params.dispel_type, Some(ConditionKind::Paralyze));

        assert!(!params.set(CombatParam::CombatType, 3));
        assert_eq!(params.combat_type, CombatType::Fire);
        assert!(!params.set(CombatParam::Dispel, 1 << 11));
        assert!(params.set(CombatParam::Dispel, 0));
        assert_eq!(params.dispel_type, None);
    }
}
