use crate::combat::conditions::Condition;
use crate::combat::context::{
    player_in_charge, CombatContext, MAX_VIEWPORT_X, MAX_VIEWPORT_Y,
};
use crate::combat::damage::CombatType;
use crate::combat::legality::{can_do_combat, can_do_combat_on_tile, check_pvp};
use crate::combat::params::{effects, CombatParam, CombatParams, TargetHook, TileHook, ValueHook};
use crate::entities::creature::{CreatureId, PlayerFlags};
use crate::entities::item::Item;
use crate::world::area::AreaCombat;
use crate::world::item_types::WeaponType;
use crate::world::map::TileFlags;
use crate::world::position::Position;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Field items a combat can leave behind, and the variants that cannot
/// hurt players.
pub mod field_items {
    pub const FIRE_FIELD: u16 = 1492;
    pub const FIRE_FIELD_SAFE: u16 = 1500;
    pub const POISON_FIELD: u16 = 1496;
    pub const POISON_FIELD_SAFE: u16 = 1503;
    pub const ENERGY_FIELD: u16 = 1495;
    pub const ENERGY_FIELD_SAFE: u16 = 1504;
    pub const MAGIC_WALL: u16 = 1497;
    pub const MAGIC_WALL_SAFE: u16 = 11095;
    pub const WILD_GROWTH: u16 = 1499;
    pub const WILD_GROWTH_SAFE: u16 = 11096;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormulaType {
    #[default]
    Undefined,
    LevelMagic,
    Skill,
    Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EffectFn {
    Health { min: i32, max: i32 },
    Mana { min: i32, max: i32 },
    Condition,
    Dispel,
    Null,
}

impl EffectFn {
    fn notifies_attack(self) -> bool {
        matches!(self, EffectFn::Condition | EffectFn::Dispel)
    }
}

/// One configured combat: parameters, optional area and damage formula.
#[derive(Debug, Clone, Default)]
pub struct Combat {
    params: CombatParams,
    area: Option<Arc<AreaCombat>>,
    formula: FormulaType,
    mina: f64,
    minb: f64,
    maxa: f64,
    maxb: f64,
}

impl Combat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn params(&self) -> &CombatParams {
        &self.params
    }

    pub fn formula(&self) -> FormulaType {
        self.formula
    }

    pub fn set_player_combat_values(
        &mut self,
        formula: FormulaType,
        mina: f64,
        minb: f64,
        maxa: f64,
        maxb: f64,
    ) {
        self.formula = formula;
        self.mina = mina;
        self.minb = minb;
        self.maxa = maxa;
        self.maxb = maxb;
    }

    /// Raw key/value entry point; unknown keys are refused.
    pub fn set_param(&mut self, key: u32, value: u32) -> bool {
        match CombatParam::from_key(key) {
            Some(param) => self.params.set(param, value),
            None => false,
        }
    }

    pub fn set(&mut self, param: CombatParam, value: u32) -> bool {
        self.params.set(param, value)
    }

    pub fn set_area(&mut self, area: Arc<AreaCombat>) {
        self.area = Some(area);
    }

    pub fn has_area(&self) -> bool {
        self.area.is_some()
    }

    pub fn area(&self) -> Option<&Arc<AreaCombat>> {
        self.area.as_ref()
    }

    pub fn set_condition(&mut self, condition: Condition) {
        self.params.conditions.push(condition);
    }

    pub fn set_value_hook(&mut self, hook: Arc<dyn ValueHook>) {
        self.params.value_hook = Some(hook);
    }

    pub fn set_tile_hook(&mut self, hook: Arc<dyn TileHook>) {
        self.params.tile_hook = Some(hook);
    }

    pub fn set_target_hook(&mut self, hook: Arc<dyn TargetHook>) {
        self.params.target_hook = Some(hook);
    }

    /// `(min, max)` change this combat deals when cast by `caster`.
    pub fn get_min_max_values<C: CombatContext + ?Sized>(
        &self,
        ctx: &mut C,
        caster: Option<CreatureId>,
        target: Option<CreatureId>,
    ) -> Option<(i32, i32)> {
        if let Some(creature) = caster.and_then(|id| ctx.creature(id)) {
            if let Some(values) = creature.combat_values {
                return Some((values.min, values.max));
            }
            if creature.is_player() {
                if let Some(hook) = &self.params.value_hook {
                    let target = target.and_then(|id| ctx.creature(id));
                    match hook.min_max(creature, target) {
                        Ok(values) => return Some(values),
                        Err(err) => {
                            tracing::warn!(caster = creature.id.0, "{}", err);
                        }
                    }
                }
                let caster = creature.id;
                return self.player_formula(ctx, caster);
            }
        }

        if self.formula == FormulaType::Value {
            return Some((self.mina as i32, self.maxa as i32));
        }
        None
    }

    fn player_formula<C: CombatContext + ?Sized>(
        &self,
        ctx: &mut C,
        caster: CreatureId,
    ) -> Option<(i32, i32)> {
        let player = ctx.creature(caster)?;
        match self.formula {
            FormulaType::LevelMagic => {
                let base = f64::from(player.level) + f64::from(player.magic_level) * 4.0;
                let mut max = (base * self.mina + self.minb) as i32;
                let mut min = (base * self.maxa + self.maxb) as i32;
                let vocation = player.vocation;
                if max > 0 && min > 0 && vocation.healing_multiplier != 1.0 {
                    min = (min as f32 * vocation.healing_multiplier) as i32;
                    max = (max as f32 * vocation.healing_multiplier) as i32;
                } else if max < 0 && min < 0 && vocation.magic_multiplier != 1.0 {
                    min = (min as f32 * vocation.magic_multiplier) as i32;
                    max = (max as f32 * vocation.magic_multiplier) as i32;
                }
                Some((min, max))
            }
            FormulaType::Skill => {
                let min = self.minb as i32;
                let Some(weapon) = player.weapon.clone() else {
                    return Some((min, self.maxb as i32));
                };
                let damage = ctx.max_weapon_damage(player, &weapon);
                let max = (f64::from(damage) * self.maxa + self.maxb) as i32;

                let types = ctx.item_types();
                if self.params.use_charges
                    && weapon.has_charges(types)
                    && ctx.rules().remove_weapon_charges
                {
                    let mut worn = weapon;
                    let charges = worn.attributes().charges();
                    worn.set_sub_type(types, charges.saturating_sub(1));
                    if let Some(player) = ctx.creature_mut(caster) {
                        player.weapon = Some(worn);
                    }
                }
                Some((min, max))
            }
            FormulaType::Value => Some((self.mina as i32, self.maxa as i32)),
            FormulaType::Undefined => None,
        }
    }

    /// Target-creature entry point.
    pub fn do_combat<C: CombatContext + ?Sized>(
        &self,
        ctx: &mut C,
        caster: Option<CreatureId>,
        target: CreatureId,
    ) {
        match self.params.combat_type {
            CombatType::None => self.do_combat_default(ctx, caster, target),
            kind => {
                let (min, max) = self
                    .get_min_max_values(ctx, caster, Some(target))
                    .unwrap_or((0, 0));
                if kind == CombatType::ManaDrain {
                    self.do_combat_mana(ctx, caster, target, min, max);
                } else {
                    self.do_combat_health(ctx, caster, target, min, max);
                }
            }
        }
    }

    /// Position entry point; expands the area around `position`.
    pub fn do_combat_at<C: CombatContext + ?Sized>(
        &self,
        ctx: &mut C,
        caster: Option<CreatureId>,
        position: Position,
    ) {
        let func = match self.params.combat_type {
            CombatType::None => EffectFn::Null,
            kind => {
                let (min, max) = self.get_min_max_values(ctx, caster, None).unwrap_or((0, 0));
                if kind == CombatType::ManaDrain {
                    EffectFn::Mana { min, max }
                } else {
                    EffectFn::Health { min, max }
                }
            }
        };
        self.combat_func(ctx, caster, position, func);
    }

    pub fn do_combat_health_at<C: CombatContext + ?Sized>(
        &self,
        ctx: &mut C,
        caster: Option<CreatureId>,
        position: Position,
        min: i32,
        max: i32,
    ) {
        self.combat_func(ctx, caster, position, EffectFn::Health { min, max });
    }

    pub fn do_combat_mana_at<C: CombatContext + ?Sized>(
        &self,
        ctx: &mut C,
        caster: Option<CreatureId>,
        position: Position,
        min: i32,
        max: i32,
    ) {
        self.combat_func(ctx, caster, position, EffectFn::Mana { min, max });
    }

    pub fn do_combat_condition_at<C: CombatContext + ?Sized>(
        &self,
        ctx: &mut C,
        caster: Option<CreatureId>,
        position: Position,
    ) {
        self.combat_func(ctx, caster, position, EffectFn::Condition);
    }

    pub fn do_combat_dispel_at<C: CombatContext + ?Sized>(
        &self,
        ctx: &mut C,
        caster: Option<CreatureId>,
        position: Position,
    ) {
        self.combat_func(ctx, caster, position, EffectFn::Dispel);
    }

    pub fn do_combat_health<C: CombatContext + ?Sized>(
        &self,
        ctx: &mut C,
        caster: Option<CreatureId>,
        target: CreatureId,
        min: i32,
        max: i32,
    ) {
        if !self.may_affect(ctx, caster, target) {
            return;
        }
        self.apply_effect(ctx, caster, target, EffectFn::Health { min, max });
        self.single_target_effects(ctx, caster, target);
    }

    pub fn do_combat_mana<C: CombatContext + ?Sized>(
        &self,
        ctx: &mut C,
        caster: Option<CreatureId>,
        target: CreatureId,
        min: i32,
        max: i32,
    ) {
        if !self.may_affect(ctx, caster, target) {
            return;
        }
        self.apply_effect(ctx, caster, target, EffectFn::Mana { min, max });
        self.run_target_hook(ctx, caster, target);
        self.single_target_effects(ctx, caster, target);
    }

    pub fn do_combat_condition<C: CombatContext + ?Sized>(
        &self,
        ctx: &mut C,
        caster: Option<CreatureId>,
        target: CreatureId,
    ) {
        if !self.may_affect(ctx, caster, target) {
            return;
        }
        self.apply_effect(ctx, caster, target, EffectFn::Condition);
        self.run_target_hook(ctx, caster, target);
        self.single_target_effects(ctx, caster, target);
        self.on_creature_do_combat(ctx, caster, target);
    }

    pub fn do_combat_dispel<C: CombatContext + ?Sized>(
        &self,
        ctx: &mut C,
        caster: Option<CreatureId>,
        target: CreatureId,
    ) {
        if !self.may_affect(ctx, caster, target) {
            return;
        }
        self.apply_effect(ctx, caster, target, EffectFn::Dispel);
        self.run_target_hook(ctx, caster, target);
        self.single_target_effects(ctx, caster, target);
        self.on_creature_do_combat(ctx, caster, target);
    }

    pub fn do_combat_default<C: CombatContext + ?Sized>(
        &self,
        ctx: &mut C,
        caster: Option<CreatureId>,
        target: CreatureId,
    ) {
        if !self.may_affect(ctx, caster, target) {
            return;
        }
        let Some(position) = ctx.creature(target).map(|creature| creature.position) else {
            return;
        };
        let spectators = ctx.spectators(position, MAX_VIEWPORT_X, MAX_VIEWPORT_Y);
        self.apply_effect(ctx, caster, target, EffectFn::Null);
        self.combat_tile_effects(ctx, &spectators, caster, position);
        self.run_target_hook(ctx, caster, target);
        self.single_target_effects(ctx, caster, target);
    }

    /// Aggressive combats skip the caster itself and illegal targets.
    fn may_affect<C: CombatContext + ?Sized>(
        &self,
        ctx: &C,
        caster: Option<CreatureId>,
        target: CreatureId,
    ) -> bool {
        if !self.params.aggressive {
            return true;
        }
        if caster == Some(target) {
            return false;
        }
        let Some(target) = ctx.creature(target) else {
            return false;
        };
        let caster = caster.and_then(|id| ctx.creature(id));
        can_do_combat(ctx, caster, target).is_ok()
    }

    fn single_target_effects<C: CombatContext + ?Sized>(
        &self,
        ctx: &mut C,
        caster: Option<CreatureId>,
        target: CreatureId,
    ) {
        let Some(target_position) = ctx.creature(target).map(|creature| creature.position) else {
            return;
        };
        if self.params.impact_effect != effects::MAGIC_EFFECT_NONE {
            let spectators = ctx.spectators(target_position, MAX_VIEWPORT_X, MAX_VIEWPORT_Y);
            ctx.add_magic_effect(&spectators, target_position, self.params.impact_effect);
        }
        if let Some(caster) = caster {
            if self.params.distance_effect != effects::SHOOT_NONE {
                self.add_distance_effect(ctx, caster, target_position, self.params.distance_effect);
            }
        }
    }

    fn combat_area<C: CombatContext + ?Sized>(
        &self,
        ctx: &mut C,
        center: Position,
        target: Position,
    ) -> Vec<Position> {
        match &self.area {
            Some(area) => area.get_list(center, target, ctx).unwrap_or_default(),
            None => match target.translated(0, 0) {
                Some(position) => {
                    ctx.ensure_tile(position);
                    vec![position]
                }
                None => Vec::new(),
            },
        }
    }

    fn combat_func<C: CombatContext + ?Sized>(
        &self,
        ctx: &mut C,
        caster: Option<CreatureId>,
        position: Position,
        func: EffectFn,
    ) {
        let caster_position = caster
            .and_then(|id| ctx.creature(id))
            .map(|creature| creature.position);
        let tiles = self.combat_area(ctx, caster_position.unwrap_or(position), position);

        let (mut max_x, mut max_y) = (0, 0);
        for tile in &tiles {
            max_x = max_x.max(position.dx(*tile).abs());
            max_y = max_y.max(position.dy(*tile).abs());
        }
        let spectators =
            ctx.spectators(position, max_x + MAX_VIEWPORT_X, max_y + MAX_VIEWPORT_Y);

        for tile_position in tiles {
            let Some(tile) = ctx.tile(tile_position) else {
                continue;
            };
            let caster_creature = caster.and_then(|id| ctx.creature(id));
            if !can_do_combat_on_tile(&*ctx, caster_creature, tile, self.params.aggressive).is_ok() {
                continue;
            }

            let mut creatures = tile.creatures.clone();
            if self.params.target_caster_or_topmost {
                let pick = match caster {
                    Some(id) if caster_position == Some(tile_position) => {
                        creatures.iter().copied().find(|creature| *creature == id)
                    }
                    _ => tile.top_creature(),
                };
                creatures = pick.into_iter().collect();
            }

            for target in creatures {
                if !self.params.aggressive
                    || (caster != Some(target) && self.may_affect(ctx, caster, target))
                {
                    self.apply_effect(ctx, caster, target, func);
                    self.run_target_hook(ctx, caster, target);
                    if func.notifies_attack() {
                        self.on_creature_do_combat(ctx, caster, target);
                    }
                }
            }

            self.combat_tile_effects(ctx, &spectators, caster, tile_position);
        }

        self.post_combat_effects(ctx, caster, position);
    }

    fn apply_effect<C: CombatContext + ?Sized>(
        &self,
        ctx: &mut C,
        caster: Option<CreatureId>,
        target: CreatureId,
        func: EffectFn,
    ) -> bool {
        match func {
            EffectFn::Health { min, max } => self.health_effect(ctx, caster, target, min, max),
            EffectFn::Mana { min, max } => self.mana_effect(ctx, caster, target, min, max),
            EffectFn::Condition => self.condition_effect(ctx, caster, target),
            EffectFn::Dispel => self.dispel_effect(ctx, target),
            EffectFn::Null => {
                self.condition_effect(ctx, caster, target);
                self.dispel_effect(ctx, target);
                self.on_creature_do_combat(ctx, caster, target);
                true
            }
        }
    }

    fn pvp_adjusted<C: CombatContext + ?Sized>(
        &self,
        ctx: &C,
        caster: Option<CreatureId>,
        target: CreatureId,
        change: i32,
    ) -> i32 {
        let Some(target) = ctx.creature(target) else {
            return change;
        };
        let caster = caster.and_then(|id| ctx.creature(id));
        check_pvp(ctx.rules(), caster, target, change)
    }

    fn health_effect<C: CombatContext + ?Sized>(
        &self,
        ctx: &mut C,
        caster: Option<CreatureId>,
        target: CreatureId,
        min: i32,
        max: i32,
    ) -> bool {
        let mut change = ctx.roll_normal(min, max);
        if ctx.block_hit(
            caster,
            target,
            self.params.combat_type,
            &mut change,
            self.params.blocked_by_shield,
            self.params.blocked_by_armor,
        ) {
            return false;
        }
        let change = self.pvp_adjusted(ctx, caster, target, change);
        let applied = ctx.change_health(caster, target, self.params.combat_type, change);
        if applied {
            self.condition_effect(ctx, caster, target);
            self.dispel_effect(ctx, target);
        }
        applied
    }

    fn mana_effect<C: CombatContext + ?Sized>(
        &self,
        ctx: &mut C,
        caster: Option<CreatureId>,
        target: CreatureId,
        min: i32,
        max: i32,
    ) -> bool {
        let change = ctx.roll_normal(min, max);
        let change = self.pvp_adjusted(ctx, caster, target, change);
        let applied = ctx.change_mana(caster, target, change);
        if applied {
            self.condition_effect(ctx, caster, target);
            self.dispel_effect(ctx, target);
        }
        applied
    }

    fn condition_effect<C: CombatContext + ?Sized>(
        &self,
        ctx: &mut C,
        caster: Option<CreatureId>,
        target: CreatureId,
    ) -> bool {
        let Some(creature) = ctx.creature_mut(target) else {
            return false;
        };
        let mut result = false;
        for condition in &self.params.conditions {
            if caster == Some(target) || !creature.is_immune(condition.kind) {
                let mut copy = condition.clone();
                if caster.is_some() {
                    copy.owner = caster;
                }
                result = creature.add_condition(copy);
            }
        }
        result
    }

    fn dispel_effect<C: CombatContext + ?Sized>(&self, ctx: &mut C, target: CreatureId) -> bool {
        let Some(kind) = self.params.dispel_type else {
            return false;
        };
        match ctx.creature_mut(target) {
            Some(creature) if creature.has_condition(kind) => creature.remove_condition(kind),
            _ => false,
        }
    }

    fn on_creature_do_combat<C: CombatContext + ?Sized>(
        &self,
        ctx: &mut C,
        caster: Option<CreatureId>,
        target: CreatureId,
    ) {
        let Some(caster) = caster else {
            return;
        };
        if self.params.aggressive && caster != target {
            ctx.on_attacked_creature(caster, target);
            ctx.on_attacked(target);
        }
    }

    fn run_target_hook<C: CombatContext + ?Sized>(
        &self,
        ctx: &C,
        caster: Option<CreatureId>,
        target: CreatureId,
    ) {
        let Some(hook) = &self.params.target_hook else {
            return;
        };
        let Some(target) = ctx.creature(target) else {
            return;
        };
        let caster = caster.and_then(|id| ctx.creature(id));
        if let Err(err) = hook.on_target(caster, target) {
            tracing::warn!(target = target.id.0, "{}", err);
        }
    }

    /// Field creation, tile hook and impact effect for one tile.
    fn combat_tile_effects<C: CombatContext + ?Sized>(
        &self,
        ctx: &mut C,
        spectators: &[CreatureId],
        caster: Option<CreatureId>,
        position: Position,
    ) {
        if self.params.item_id != 0 {
            let item_id = self.field_item_for(ctx, caster, position);
            let mut item = Item::new(ctx.item_types(), item_id, 0);
            if let Some(caster) = caster {
                item.attributes_mut().set_owner(caster.0);
            }
            if ctx.add_item(position, item) {
                ctx.start_decay(position, item_id);
            }
        }

        if let Some(hook) = &self.params.tile_hook {
            let caster = caster.and_then(|id| ctx.creature(id));
            if let Err(err) = hook.on_tile(caster, position) {
                tracing::warn!(x = position.x, y = position.y, z = position.z, "{}", err);
            }
        }

        if self.params.impact_effect != effects::MAGIC_EFFECT_NONE {
            ctx.add_magic_effect(spectators, position, self.params.impact_effect);
        }
    }

    /// Swaps harmful fields for their safe variants where players may not
    /// hurt each other.
    fn field_item_for<C: CombatContext + ?Sized>(
        &self,
        ctx: &C,
        caster: Option<CreatureId>,
        position: Position,
    ) -> u16 {
        use field_items::*;

        let mut item_id = self.params.item_id;
        let Some(player) = caster
            .and_then(|id| ctx.creature(id))
            .and_then(|creature| player_in_charge(ctx, creature))
        else {
            return item_id;
        };

        let rules = ctx.rules();
        if player.level < rules.min_pvp_level && rules.can_pass_through && rules.min_pvp_level > 0
        {
            item_id = match item_id {
                WILD_GROWTH => WILD_GROWTH_SAFE,
                MAGIC_WALL => MAGIC_WALL_SAFE,
                other => other,
            };
        }

        let no_pvp_tile = ctx
            .tile(position)
            .map(|tile| tile.flags.contains(TileFlags::NO_PVP_ZONE))
            .unwrap_or(false);
        if rules.is_optional_pvp() || no_pvp_tile {
            item_id = match item_id {
                FIRE_FIELD => FIRE_FIELD_SAFE,
                POISON_FIELD => POISON_FIELD_SAFE,
                ENERGY_FIELD => ENERGY_FIELD_SAFE,
                MAGIC_WALL => MAGIC_WALL_SAFE,
                WILD_GROWTH => WILD_GROWTH_SAFE,
                other => other,
            };
        }
        item_id
    }

    fn post_combat_effects<C: CombatContext + ?Sized>(
        &self,
        ctx: &mut C,
        caster: Option<CreatureId>,
        position: Position,
    ) {
        let Some(caster) = caster else {
            return;
        };
        if self.params.distance_effect != effects::SHOOT_NONE {
            self.add_distance_effect(ctx, caster, position, self.params.distance_effect);
        }

        let player = ctx
            .creature(caster)
            .and_then(|creature| player_in_charge(&*ctx, creature))
            .filter(|player| !player.has_flag(PlayerFlags::NOT_GAIN_IN_FIGHT))
            .map(|player| player.id);
        if let Some(player) = player {
            if self.params.aggressive {
                let ticks = ctx.rules().in_fight_duration_ms;
                ctx.add_in_fight_ticks(player, ticks, self.params.pz_block);
            }
        }
    }

    fn add_distance_effect<C: CombatContext + ?Sized>(
        &self,
        ctx: &mut C,
        caster: CreatureId,
        to: Position,
        effect: u8,
    ) {
        let Some(creature) = ctx.creature(caster) else {
            return;
        };
        let from = creature.position;
        let effect = if effect == effects::SHOOT_WEAPON_TYPE {
            let weapon_type = creature
                .weapon
                .as_ref()
                .map(|weapon| ctx.item_types().get_or_default(weapon.id()).weapon_type)
                .unwrap_or(WeaponType::None);
            match weapon_type {
                WeaponType::Axe => effects::SHOOT_WHIRLWIND_AXE,
                WeaponType::Sword => effects::SHOOT_WHIRLWIND_SWORD,
                WeaponType::Club => effects::SHOOT_WHIRLWIND_CLUB,
                _ => effects::SHOOT_NONE,
            }
        } else {
            effect
        };
        if effect != effects::SHOOT_NONE {
            ctx.add_distance_effect(from, to, effect);
        }
    }
}
